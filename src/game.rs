use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::countdown::{Countdown, Tick};
use crate::error::IntentError;
use crate::session::{Effect, Session};
use crate::transport::Channel;
use crate::types::{Notification, ServerEvent};

/// Commands the front end sends to a session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Challenge,
    Answer(usize),
    Leave,
}

/// Transient events broadcast from the session task to the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Notify(Notification),
    Countdown(Tick),
    /// A local intent was refused before anything was sent.
    Refused(IntentError),
}

/// Why a session task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Left,
    Disconnected,
}

#[derive(Clone)]
pub struct SessionHandle {
    pub username: String,
    pub cmd_tx: mpsc::Sender<SessionCommand>,
    pub snapshots: watch::Receiver<Arc<Session>>,
    pub event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Session> {
        Arc::clone(&self.snapshots.borrow())
    }
}

/// Start the task that owns `channel` and the session built on it.
pub fn spawn_session(channel: Channel) -> (SessionHandle, JoinHandle<SessionEnd>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (snapshot_tx, snapshots) = watch::channel(Arc::new(Session::new()));
    let (event_tx, _) = broadcast::channel(64);

    let handle = SessionHandle {
        username: channel.username().to_string(),
        cmd_tx,
        snapshots,
        event_tx: event_tx.clone(),
    };

    let task = tokio::spawn(session_task(channel, cmd_rx, snapshot_tx, event_tx));

    (handle, task)
}

/// Everything the session task mutates, apart from the channel itself.
struct SessionState {
    username: String,
    session: Arc<Session>,
    snapshot_tx: watch::Sender<Arc<Session>>,
    event_tx: broadcast::Sender<SessionEvent>,
    countdown: Countdown,
}

impl SessionState {
    fn publish(&mut self, next: Session) {
        let next = Arc::new(next);
        self.session = next.clone();
        self.snapshot_tx.send_replace(next);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn handle_event(&mut self, event: &ServerEvent) {
        let transition = self.session.apply(&self.username, event);
        self.publish(transition.session);
        for effect in transition.effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Notify(notification) => {
                tracing::info!("{}", notification);
                self.emit(SessionEvent::Notify(notification));
            }
            Effect::StartCountdown(seconds) => self.countdown.start(seconds),
            Effect::StopCountdown => self.countdown.stop(),
        }
    }

    fn handle_tick(&mut self, tick: Tick) {
        if !self.countdown.accepts(&tick) {
            return;
        }
        self.emit(SessionEvent::Countdown(tick));
        if tick.is_finished() {
            self.countdown.stop();
        }
    }

    async fn challenge(&mut self, channel: &Channel) {
        let (next, intent) = self.session.challenge();
        self.publish(next);
        if let Err(e) = channel.send(intent).await {
            tracing::warn!("Challenge not sent: {}", e);
        }
    }

    async fn answer(&mut self, channel: &Channel, index: usize) {
        match self.session.answer(index) {
            Ok((next, intent)) => {
                self.publish(next);
                if let Err(e) = channel.send(intent).await {
                    tracing::warn!("Answer not sent: {}", e);
                }
            }
            Err(e) => {
                tracing::debug!("Answer {} refused: {}", index, e);
                self.emit(SessionEvent::Refused(e));
            }
        }
    }
}

async fn session_task(
    mut channel: Channel,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: watch::Sender<Arc<Session>>,
    event_tx: broadcast::Sender<SessionEvent>,
) -> SessionEnd {
    let (tick_tx, mut tick_rx) = mpsc::channel(16);
    let session = Arc::clone(&snapshot_tx.borrow());
    let mut state = SessionState {
        username: channel.username().to_string(),
        session,
        snapshot_tx,
        event_tx,
        countdown: Countdown::new(tick_tx),
    };

    tracing::info!("Session started on channel {}", channel.id());

    let end = loop {
        tokio::select! {
            event = channel.recv() => match event {
                Some(event) => state.handle_event(&event),
                None => break SessionEnd::Disconnected,
            },
            Some(tick) = tick_rx.recv() => state.handle_tick(tick),
            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCommand::Challenge) => state.challenge(&channel).await,
                Some(SessionCommand::Answer(index)) => state.answer(&channel, index).await,
                Some(SessionCommand::Leave) | None => break SessionEnd::Left,
            },
        }
    };

    state.countdown.stop();
    let id = channel.id();
    if end == SessionEnd::Left {
        channel.close().await;
    }

    tracing::info!("Session on channel {} ended: {:?}", id, end);
    end
}
