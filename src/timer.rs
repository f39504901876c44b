//! Per-round countdown
//!
//! [`Countdown`] is the pure state machine; [`RoundTimer`] drives one from a
//! tokio task and tags every signal with the run's generation so the owner can
//! drop signals from cancelled or superseded runs.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{GameError, GameResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Tick { remaining: i64 },
    /// Reached zero. Sent at most once per run.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSignal {
    pub generation: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CountdownState {
    #[default]
    Idle,
    Running,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining: i64,
    state: CountdownState,
}

impl Countdown {
    /// Begin counting down from `budget`, replacing any previous run
    pub fn start(&mut self, budget: i64) -> GameResult<()> {
        if budget <= 0 {
            return Err(GameError::InvalidBudget { budget });
        }
        self.remaining = budget;
        self.state = CountdownState::Running;
        Ok(())
    }

    /// Advance by one unit. `None` once the run is over.
    pub fn tick(&mut self) -> Option<TimerKind> {
        if self.state != CountdownState::Running {
            return None;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.state = CountdownState::Expired;
            Some(TimerKind::Expired)
        } else {
            Some(TimerKind::Tick {
                remaining: self.remaining,
            })
        }
    }

    /// Stop without expiring. Returns false if nothing was running.
    pub fn cancel(&mut self) -> bool {
        if self.state == CountdownState::Running {
            self.state = CountdownState::Cancelled;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }
}

/// Countdown ticking in real time on the tokio runtime
pub struct RoundTimer {
    period: Duration,
    generation: u64,
    live: bool,
    task: Option<JoinHandle<()>>,
    signals: mpsc::UnboundedSender<TimerSignal>,
}

impl RoundTimer {
    /// Create a timer ticking once per `period`, plus the receiving end of its signals
    pub fn new(period: Duration) -> (Self, mpsc::UnboundedReceiver<TimerSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                period,
                generation: 0,
                live: false,
                task: None,
                signals: tx,
            },
            rx,
        )
    }

    /// Start a run of `budget` ticks. Cancels any previous run.
    /// Returns the generation that this run's signals will carry.
    pub fn start(&mut self, budget: i64) -> GameResult<u64> {
        let mut countdown = Countdown::default();
        countdown.start(budget)?;

        self.cancel();
        self.generation += 1;
        self.live = true;

        let generation = self.generation;
        let period = self.period;
        let tx = self.signals.clone();

        self.task = Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(kind) = countdown.tick() else {
                    break;
                };
                if tx.send(TimerSignal { generation, kind }).is_err() {
                    break;
                }
                if kind == TimerKind::Expired {
                    break;
                }
            }
        }));

        tracing::debug!("Timer run {} started with budget {}", generation, budget);
        Ok(generation)
    }

    /// Stop the live run. Returns false if nothing was running.
    pub fn cancel(&mut self) -> bool {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.live {
            self.live = false;
            tracing::debug!("Timer run {} cancelled", self.generation);
            true
        } else {
            false
        }
    }

    /// Whether `signal` belongs to the live run. An accepted expiry ends the run.
    pub fn accepts(&mut self, signal: &TimerSignal) -> bool {
        if !self.live || signal.generation != self.generation {
            return false;
        }
        if signal.kind == TimerKind::Expired {
            self.live = false;
            self.task = None;
        }
        true
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
