use serde::{Deserialize, Serialize};

/// A player present in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Display state of a single answer button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    #[default]
    None,
    Loading,
    Success,
    Failure,
}

/// One of the candidate answers offered by a `reply` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub status: AnswerStatus,
}

impl AnswerOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: AnswerStatus::None,
        }
    }
}

/// Per-round status of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Challenging,
    Winner,
    Loser,
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Challenging => write!(f, "challenging"),
            Self::Winner => write!(f, "winner"),
            Self::Loser => write!(f, "loser"),
        }
    }
}

/// Events pushed by the server over the play socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerEvent {
    // Login handshake
    Ready,
    Rejected {
        reason: String,
    },

    // Round flow
    Question {
        question: String,
    },
    Joined {
        user: String,
    },
    Left {
        user: String,
    },
    Challenged {
        user: String,
    },
    Reply {
        answers: Vec<String>,
        #[serde(default)]
        timeout: Option<u64>,
    },
    Lost {
        user: String,
        #[serde(default)]
        reason: Option<String>,
    },
    End {
        #[serde(default)]
        winner: Option<String>,
        #[serde(default)]
        answer: Option<usize>,
    },

    /// Any event kind this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Short name of the event kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Rejected { .. } => "rejected",
            Self::Question { .. } => "question",
            Self::Joined { .. } => "joined",
            Self::Left { .. } => "left",
            Self::Challenged { .. } => "challenged",
            Self::Reply { .. } => "reply",
            Self::Lost { .. } => "lost",
            Self::End { .. } => "end",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Challenge,
}

/// Messages sent by the local user to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientIntent {
    Action { action: Action },
    Answer { answer: usize },
}

impl ClientIntent {
    pub fn challenge() -> Self {
        Self::Action {
            action: Action::Challenge,
        }
    }

    pub fn answer(index: usize) -> Self {
        Self::Answer { answer: index }
    }
}

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
}

/// Transient, user-visible messages raised by session transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PlayerLeft { user: String },
    PlayerLost { user: String, reason: String },
    Winner { winner: String, is_local: bool },
    NobodyWon,
}

impl Notification {
    pub fn severity(&self) -> Severity {
        match self {
            Self::PlayerLeft { .. } => Severity::Info,
            Self::PlayerLost { .. } => Severity::Warning,
            Self::Winner { is_local: true, .. } => Severity::Success,
            Self::Winner { .. } => Severity::Info,
            Self::NobodyWon => Severity::Info,
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlayerLeft { user } => write!(f, "{} left the game", user),
            Self::PlayerLost { user, reason } => write!(f, "{} lost ({})", user, reason),
            Self::Winner { is_local: true, .. } => write!(f, "You won!"),
            Self::Winner { winner, .. } => write!(f, "{} won", winner),
            Self::NobodyWon => write!(f, "Nobody won"),
        }
    }
}
