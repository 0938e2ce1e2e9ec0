//! Error types for the client.

use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Username rejected: {0}")]
    UsernameRejected(String),
    #[error("Connection error: {0}")]
    Connection(#[source] Box<tungstenite::Error>),
    #[error("Connection closed before the server answered")]
    ClosedBeforeReady,
    #[error("Malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
    #[error("Communication channel closed")]
    ChannelClosed,
    #[error("Invalid server origin: {0}")]
    InvalidOrigin(String),
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Connection(Box::new(err))
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidOrigin(err.to_string())
    }
}

/// Reasons a local intent is refused before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("No answers have been offered yet")]
    NoAnswers,
    #[error("Answer {index} is out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
    #[error("Answers are not accepted right now")]
    NotAccepting,
    #[error("An answer was already chosen this round")]
    AlreadyAnswered,
}
