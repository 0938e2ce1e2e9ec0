use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, interval_at};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Remaining time of the running countdown, emitted once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
    pub total: u64,
    pub current: u64,
}

impl Tick {
    /// Remaining share of the budget, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.current as f64 / self.total as f64
    }

    pub fn is_finished(&self) -> bool {
        self.current == 0
    }
}

/// A restartable one-second ticker. At most one countdown runs at a time;
/// starting a new one cancels the previous one.
pub struct Countdown {
    ticks: mpsc::Sender<Tick>,
    generation: u64,
    cancel: Option<watch::Sender<bool>>,
}

impl Countdown {
    pub fn new(ticks: mpsc::Sender<Tick>) -> Self {
        Self {
            ticks,
            generation: 0,
            cancel: None,
        }
    }

    pub fn start(&mut self, total: u64) {
        self.stop();
        self.generation += 1;
        if total == 0 {
            return;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(run_countdown(
            self.generation,
            total,
            self.ticks.clone(),
            cancel_rx,
        ));
        self.cancel = Some(cancel_tx);
        tracing::debug!("countdown {} started for {}s", self.generation, total);
    }

    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(true);
            tracing::debug!("countdown {} stopped", self.generation);
        }
    }

    /// Whether `tick` comes from the current countdown. Ticks already queued
    /// when the countdown was stopped or replaced are stale.
    pub fn accepts(&self, tick: &Tick) -> bool {
        self.cancel.is_some() && tick.generation == self.generation
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_countdown(
    generation: u64,
    total: u64,
    ticks: mpsc::Sender<Tick>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    for current in (0..total).rev() {
        tokio::select! {
            biased;
            _ = cancel_rx.changed() => {
                return;
            }
            _ = interval.tick() => {
                let tick = Tick { generation, total, current };
                if ticks.send(tick).await.is_err() {
                    return;
                }
            }
        }
    }
}
