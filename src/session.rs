//! Client-side state of one game session and the pure reducer that drives it.
//!
//! Every transition takes `&self` and returns a fresh [`Session`] together
//! with the side effects it implies. The caller publishes the new snapshot
//! and executes the effects exactly once.

use std::collections::HashMap;

use crate::error::IntentError;
use crate::types::*;

/// Side effects produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Notification),
    StartCountdown(u64),
    StopCountdown,
}

/// Result of applying one server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

/// The local player's view of the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub question: Option<String>,
    pub answers: Vec<AnswerOption>,
    /// Index into `answers` picked by the local user.
    pub answer: Option<usize>,
    pub accept_answer: bool,
    /// Join order is preserved.
    pub players: Vec<Player>,
    pub players_status: HashMap<String, PlayerStatus>,
    pub challenging: bool,
    /// Seconds allowed to answer after a successful challenge.
    pub reply_timeout: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, username: &str) -> Option<PlayerStatus> {
        self.players_status.get(username).copied()
    }

    /// Reduce one inbound event. `local_user` is the username this client
    /// logged in with.
    pub fn apply(&self, local_user: &str, event: &ServerEvent) -> Transition {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match event {
            ServerEvent::Question { question } => {
                next.question = Some(question.clone());
                next.answers.clear();
                next.answer = None;
                next.players_status.clear();
                next.challenging = false;
                next.accept_answer = true;
                next.reply_timeout = None;
                effects.push(Effect::StopCountdown);
            }

            ServerEvent::Joined { user } => {
                next.players.push(Player::new(user.clone()));
            }

            ServerEvent::Left { user } => {
                match next.players.iter().position(|p| p.username == *user) {
                    Some(pos) => {
                        next.players.remove(pos);
                    }
                    None => tracing::debug!("left event for unknown player {}", user),
                }
                effects.push(Effect::Notify(Notification::PlayerLeft { user: user.clone() }));
            }

            ServerEvent::Challenged { user } => {
                next.players_status
                    .insert(user.clone(), PlayerStatus::Challenging);
                next.challenging = true;
            }

            ServerEvent::Reply { answers, timeout } => {
                next.answers = answers.iter().map(AnswerOption::new).collect();
                if next.answer.is_some_and(|i| i >= next.answers.len()) {
                    next.answer = None;
                }
                next.reply_timeout = *timeout;
                effects.push(match timeout {
                    Some(seconds) => Effect::StartCountdown(*seconds),
                    None => Effect::StopCountdown,
                });
            }

            ServerEvent::Lost { user, reason } => {
                next.players_status.insert(user.clone(), PlayerStatus::Loser);
                next.challenging = false;

                if user == local_user {
                    if let Some(chosen) = next.answer.and_then(|i| next.answers.get_mut(i)) {
                        chosen.status = AnswerStatus::Failure;
                    }
                    next.accept_answer = false;
                    effects.push(Effect::StopCountdown);
                }

                if let Some(reason) = reason {
                    effects.push(Effect::Notify(Notification::PlayerLost {
                        user: user.clone(),
                        reason: reason.clone(),
                    }));
                }
            }

            ServerEvent::End { winner, answer } => {
                match winner {
                    Some(winner) => {
                        next.players_status
                            .insert(winner.clone(), PlayerStatus::Winner);
                        effects.push(Effect::Notify(Notification::Winner {
                            winner: winner.clone(),
                            is_local: winner == local_user,
                        }));
                    }
                    None => effects.push(Effect::Notify(Notification::NobodyWon)),
                }

                if !next.answers.is_empty() {
                    if let Some(index) = answer {
                        match next.answers.get_mut(*index) {
                            Some(correct) => correct.status = AnswerStatus::Success,
                            None => tracing::warn!(
                                "end event names answer {} but only {} were offered",
                                index,
                                next.answers.len()
                            ),
                        }
                    }
                }

                next.accept_answer = false;
                effects.push(Effect::StopCountdown);
            }

            ServerEvent::Ready | ServerEvent::Rejected { .. } => {
                tracing::debug!("ignoring {} event during a session", event.kind());
            }

            ServerEvent::Unknown => {
                tracing::warn!("ignoring unknown event");
            }
        }

        Transition {
            session: next,
            effects,
        }
    }

    /// Optimistically mark a challenge as outstanding. The returned intent is
    /// sent without waiting for an acknowledgement and nothing is rolled back
    /// if the send fails.
    pub fn challenge(&self) -> (Session, ClientIntent) {
        let mut next = self.clone();
        next.challenging = true;
        (next, ClientIntent::challenge())
    }

    /// Pick answer `index` for this round.
    pub fn answer(&self, index: usize) -> Result<(Session, ClientIntent), IntentError> {
        if self.answers.is_empty() {
            return Err(IntentError::NoAnswers);
        }
        if index >= self.answers.len() {
            return Err(IntentError::OutOfRange {
                index,
                len: self.answers.len(),
            });
        }
        if self.answer.is_some() {
            return Err(IntentError::AlreadyAnswered);
        }
        if !self.accept_answer {
            return Err(IntentError::NotAccepting);
        }

        let mut next = self.clone();
        next.answer = Some(index);
        next.answers[index].status = AnswerStatus::Loading;
        Ok((next, ClientIntent::answer(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn question(text: &str) -> ServerEvent {
        ServerEvent::Question {
            question: text.to_string(),
        }
    }

    fn joined(user: &str) -> ServerEvent {
        ServerEvent::Joined {
            user: user.to_string(),
        }
    }

    fn reply(answers: &[&str], timeout: u64) -> ServerEvent {
        ServerEvent::Reply {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            timeout: Some(timeout),
        }
    }

    fn run(local_user: &str, events: &[ServerEvent]) -> Session {
        events.iter().fold(Session::new(), |session, event| {
            session.apply(local_user, event).session
        })
    }

    #[test]
    fn question_resets_round_state() {
        let mut session = run(
            "bob",
            &[
                question("Q1"),
                joined("alice"),
                ServerEvent::Challenged {
                    user: "alice".to_string(),
                },
                reply(&["A", "B"], 10),
            ],
        );
        session.answer = Some(1);
        session.accept_answer = false;

        let next = session.apply("bob", &question("Q2"));

        assert_eq!(next.session.question.as_deref(), Some("Q2"));
        assert!(next.session.answers.is_empty());
        assert_eq!(next.session.answer, None);
        assert!(next.session.players_status.is_empty());
        assert!(!next.session.challenging);
        assert!(next.session.accept_answer);
        assert_eq!(next.session.reply_timeout, None);
        assert_eq!(next.session.players, vec![Player::new("alice")]);
        assert_eq!(next.effects, vec![Effect::StopCountdown]);
    }

    #[test]
    fn apply_leaves_input_untouched() {
        let session = run("bob", &[question("Q1")]);
        let before = session.clone();
        let _ = session.apply("bob", &joined("alice"));
        assert_eq!(session, before);
    }

    #[test]
    fn duplicate_joins_are_kept() {
        let session = run("bob", &[joined("alice"), joined("alice")]);
        assert_eq!(
            session.players,
            vec![Player::new("alice"), Player::new("alice")]
        );
    }

    #[test]
    fn left_removes_first_match_and_notifies() {
        let session = run("bob", &[joined("alice"), joined("carol"), joined("alice")]);
        let next = session.apply(
            "bob",
            &ServerEvent::Left {
                user: "alice".to_string(),
            },
        );

        assert_eq!(
            next.session.players,
            vec![Player::new("carol"), Player::new("alice")]
        );
        assert_eq!(
            next.effects,
            vec![Effect::Notify(Notification::PlayerLeft {
                user: "alice".to_string()
            })]
        );
    }

    #[test]
    fn left_for_absent_player_only_notifies() {
        let session = run("bob", &[joined("carol")]);
        let next = session.apply(
            "bob",
            &ServerEvent::Left {
                user: "dave".to_string(),
            },
        );
        assert_eq!(next.session.players, vec![Player::new("carol")]);
        assert_eq!(next.effects.len(), 1);
    }

    #[test]
    fn challenged_marks_player_and_blocks_challenge() {
        let session = run(
            "bob",
            &[
                question("Q1"),
                ServerEvent::Challenged {
                    user: "alice".to_string(),
                },
            ],
        );
        assert_eq!(session.status_of("alice"), Some(PlayerStatus::Challenging));
        assert!(session.challenging);
    }

    #[test]
    fn reply_offers_answers_and_starts_countdown() {
        let session = run("bob", &[question("Q1")]);
        let next = session.apply("bob", &reply(&["A", "B", "C"], 10));

        assert_eq!(
            next.session.answers,
            vec![
                AnswerOption::new("A"),
                AnswerOption::new("B"),
                AnswerOption::new("C")
            ]
        );
        assert_eq!(next.session.reply_timeout, Some(10));
        assert_eq!(next.effects, vec![Effect::StartCountdown(10)]);
    }

    #[test]
    fn reply_without_timeout_stops_countdown() {
        let session = run("bob", &[question("Q1"), reply(&["A", "B"], 10)]);
        let next = session.apply(
            "bob",
            &ServerEvent::Reply {
                answers: vec!["C".to_string()],
                timeout: None,
            },
        );

        assert_eq!(next.session.reply_timeout, None);
        assert_eq!(next.session.answers, vec![AnswerOption::new("C")]);
        assert_eq!(next.effects, vec![Effect::StopCountdown]);
    }

    #[test]
    fn winning_round_marks_correct_answer() {
        let session = run("bob", &[question("Q1"), reply(&["A", "B"], 10)]);
        let (session, intent) = session.answer(1).unwrap();
        assert_eq!(intent, ClientIntent::answer(1));
        assert_eq!(session.answers[1].status, AnswerStatus::Loading);

        let end = session.apply(
            "bob",
            &ServerEvent::End {
                winner: Some("alice".to_string()),
                answer: Some(1),
            },
        );

        assert_eq!(end.session.answers[1].status, AnswerStatus::Success);
        assert_eq!(end.session.status_of("alice"), Some(PlayerStatus::Winner));
        assert!(!end.session.accept_answer);
        assert_eq!(
            end.effects,
            vec![
                Effect::Notify(Notification::Winner {
                    winner: "alice".to_string(),
                    is_local: false,
                }),
                Effect::StopCountdown,
            ]
        );
    }

    #[test]
    fn local_loss_fails_chosen_answer() {
        let session = run(
            "bob",
            &[
                question("Q1"),
                reply(&["A", "B"], 10),
            ],
        );
        let (session, _) = session.answer(0).unwrap();

        let next = session.apply(
            "bob",
            &ServerEvent::Lost {
                user: "bob".to_string(),
                reason: Some("timeout".to_string()),
            },
        );

        assert_eq!(next.session.answers[0].status, AnswerStatus::Failure);
        assert!(!next.session.accept_answer);
        assert!(!next.session.challenging);
        assert_eq!(next.session.status_of("bob"), Some(PlayerStatus::Loser));
        assert_eq!(
            next.effects,
            vec![
                Effect::StopCountdown,
                Effect::Notify(Notification::PlayerLost {
                    user: "bob".to_string(),
                    reason: "timeout".to_string(),
                }),
            ]
        );
    }

    #[test]
    fn remote_loss_leaves_local_window_open() {
        let session = run(
            "bob",
            &[
                question("Q1"),
                ServerEvent::Challenged {
                    user: "alice".to_string(),
                },
            ],
        );
        let next = session.apply(
            "bob",
            &ServerEvent::Lost {
                user: "alice".to_string(),
                reason: None,
            },
        );

        assert!(next.session.accept_answer);
        assert!(!next.session.challenging);
        assert_eq!(next.session.status_of("alice"), Some(PlayerStatus::Loser));
        assert!(next.effects.is_empty());
    }

    #[test]
    fn end_without_winner_notifies_nobody_won() {
        let session = run("bob", &[question("Q1")]);
        let next = session.apply(
            "bob",
            &ServerEvent::End {
                winner: None,
                answer: Some(3),
            },
        );
        assert!(next.session.players_status.is_empty());
        assert!(next.session.answers.is_empty());
        assert_eq!(
            next.effects,
            vec![Effect::Notify(Notification::NobodyWon), Effect::StopCountdown]
        );
    }

    #[test]
    fn end_with_out_of_range_answer_is_ignored() {
        let session = run("bob", &[question("Q1"), reply(&["A"], 5)]);
        let next = session.apply(
            "bob",
            &ServerEvent::End {
                winner: None,
                answer: Some(4),
            },
        );
        assert_eq!(next.session.answers, vec![AnswerOption::new("A")]);
    }

    #[test]
    fn challenge_is_optimistic() {
        let session = run("bob", &[question("Q1")]);
        let (next, intent) = session.challenge();
        assert!(next.challenging);
        assert_eq!(intent, ClientIntent::challenge());
    }

    #[test]
    fn answer_preconditions() {
        let session = run("bob", &[question("Q1")]);
        assert_eq!(session.answer(0).unwrap_err(), IntentError::NoAnswers);

        let session = session.apply("bob", &reply(&["A", "B"], 10)).session;
        assert_eq!(
            session.answer(2).unwrap_err(),
            IntentError::OutOfRange { index: 2, len: 2 }
        );

        let (answered, _) = session.answer(0).unwrap();
        assert_eq!(answered.answer(1).unwrap_err(), IntentError::AlreadyAnswered);

        let mut closed = session.clone();
        closed.accept_answer = false;
        assert_eq!(closed.answer(0).unwrap_err(), IntentError::NotAccepting);
    }

    #[test]
    fn session_events_after_login_are_ignored() {
        let session = run("bob", &[question("Q1"), joined("alice")]);
        for event in [
            ServerEvent::Ready,
            ServerEvent::Rejected {
                reason: "usernameNotAvailable".to_string(),
            },
            ServerEvent::Unknown,
        ] {
            let next = session.apply("bob", &event);
            assert_eq!(next.session, session);
            assert!(next.effects.is_empty());
        }
    }

    #[derive(Debug, Clone)]
    enum Step {
        Event(ServerEvent),
        Challenge,
        Answer(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        let user = prop::sample::select(vec!["alice", "bob", "carol"]);
        prop_oneof![
            "[a-z]{1,8}".prop_map(|q| Step::Event(ServerEvent::Question { question: q })),
            user.clone()
                .prop_map(|u| Step::Event(ServerEvent::Joined { user: u.to_string() })),
            user.clone()
                .prop_map(|u| Step::Event(ServerEvent::Left { user: u.to_string() })),
            user.clone()
                .prop_map(|u| Step::Event(ServerEvent::Challenged { user: u.to_string() })),
            (
                prop::collection::vec("[a-z]{1,4}", 0..5),
                prop::option::of(1u64..30)
            )
                .prop_map(|(answers, timeout)| Step::Event(ServerEvent::Reply { answers, timeout })),
            (user.clone(), prop::option::of(Just("timeout".to_string()))).prop_map(
                |(u, reason)| Step::Event(ServerEvent::Lost {
                    user: u.to_string(),
                    reason,
                })
            ),
            (prop::option::of(user), prop::option::of(0usize..6)).prop_map(|(winner, answer)| {
                Step::Event(ServerEvent::End {
                    winner: winner.map(str::to_string),
                    answer,
                })
            }),
            Just(Step::Challenge),
            (0usize..6).prop_map(Step::Answer),
        ]
    }

    proptest! {
        #[test]
        fn chosen_answer_stays_in_range(steps in prop::collection::vec(step(), 0..40)) {
            let mut session = Session::new();
            for step in steps {
                match step {
                    Step::Event(event) => session = session.apply("bob", &event).session,
                    Step::Challenge => session = session.challenge().0,
                    Step::Answer(index) => {
                        if let Ok((next, intent)) = session.answer(index) {
                            prop_assert!(index < session.answers.len());
                            prop_assert_eq!(intent, ClientIntent::answer(index));
                            session = next;
                        }
                    }
                }
                if let Some(index) = session.answer {
                    prop_assert!(index < session.answers.len());
                }
            }
        }

        #[test]
        fn question_always_resets(steps in prop::collection::vec(step(), 0..20)) {
            let mut session = Session::new();
            for step in steps {
                session = match step {
                    Step::Event(event) => session.apply("bob", &event).session,
                    Step::Challenge => session.challenge().0,
                    Step::Answer(index) => session.answer(index).map(|(s, _)| s).unwrap_or(session),
                };
            }
            let next = session.apply("bob", &question("fresh")).session;
            prop_assert!(next.answers.is_empty());
            prop_assert_eq!(next.answer, None);
            prop_assert!(next.players_status.is_empty());
            prop_assert!(!next.challenging);
            prop_assert!(next.accept_answer);
        }
    }
}
