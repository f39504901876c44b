//! Session controller: sequences rounds and mediates between the round timer,
//! guess capture and the scoring backend.
//!
//! All inputs (player commands, timer signals, network completions) arrive as
//! [`SessionEvent`]s on one channel and are applied one at a time by
//! [`SessionController::dispatch`]. Front-ends hold a [`SessionHandle`], read
//! the published [`Session`] and listen for [`SessionNotice`]s.

mod controller;

pub use controller::SessionController;

use serde::Serialize;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

use crate::error::{GameError, GameResult};
use crate::timer::TimerSignal;
use crate::types::*;

/// What to do when the scoring call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionFailurePolicy {
    /// Keep waiting on the same round; the player may resend the same choice
    #[default]
    HoldForRetry,
    /// End the session as lost
    Forfeit,
}

impl SubmissionFailurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "retry" | "hold" => Some(SubmissionFailurePolicy::HoldForRetry),
            "forfeit" | "lose" => Some(SubmissionFailurePolicy::Forfeit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock length of one countdown unit
    pub tick_interval: Duration,
    pub failure_policy: SubmissionFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            failure_policy: SubmissionFailurePolicy::HoldForRetry,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tick_interval = std::env::var("TICK_MILLIS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);

        let failure_policy = match std::env::var("SUBMISSION_FAILURE_POLICY") {
            Ok(value) => SubmissionFailurePolicy::parse(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown SUBMISSION_FAILURE_POLICY '{}', holding rounds for retry",
                    value
                );
                SubmissionFailurePolicy::HoldForRetry
            }),
            Err(_) => defaults.failure_policy,
        };

        Self {
            tick_interval,
            failure_policy,
        }
    }
}

/// The state of one attempt, as seen by front-ends
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Fixed for the session once fetched
    pub rounds: Vec<Round>,
    pub current_index: usize,
    pub phase: SessionPhase,
    pub last_verdict: Option<Verdict>,
    /// User-facing message for the most recent failure
    pub last_error: Option<String>,
    /// A round list fetch is outstanding
    pub loading: bool,
    pub time_left: Option<i64>,
    pub locked_choice: Option<Choice>,
    /// Correct verdicts in a row, across restarts. Reset by a loss.
    pub streak: u32,
}

impl Session {
    pub fn current_round(&self) -> Option<&Round> {
        match self.phase {
            SessionPhase::Playing { .. } | SessionPhase::Won | SessionPhase::Lost => {
                self.rounds.get(self.current_index)
            }
            SessionPhase::Briefing => None,
        }
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Rounds answered correctly so far
    pub fn rounds_cleared(&self) -> usize {
        match self.phase {
            SessionPhase::Won => self.rounds.len(),
            SessionPhase::Briefing => 0,
            _ => self.current_index,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Identity a scoring call was issued under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessTicket {
    pub epoch: u64,
    pub round_index: usize,
    pub round_id: RoundId,
    pub attempt: u32,
}

/// Everything that can move a session forward
#[derive(Debug)]
pub enum SessionEvent {
    Start,
    Select {
        comment_id: CommentId,
    },
    Restart,
    /// Resend the round's resolved choice after a failed scoring call
    RetrySubmission,
    Timer(TimerSignal),
    RoundsLoaded {
        epoch: u64,
        result: GameResult<Vec<Round>>,
    },
    VerdictArrived {
        ticket: GuessTicket,
        result: GameResult<Verdict>,
    },
    Shutdown,
}

/// Discrete updates for front-ends
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum SessionNotice {
    Phase {
        phase: SessionPhase,
        round_index: usize,
    },
    RoundStarted {
        round_index: usize,
        total_rounds: usize,
        round: Round,
    },
    Tick {
        round_index: usize,
        remaining: i64,
    },
    GuessLocked {
        round_index: usize,
        choice: Choice,
    },
    VerdictRevealed {
        round_index: usize,
        verdict: Verdict,
    },
    Error {
        code: String,
        msg: String,
        /// A network failure; the same action may succeed if repeated
        retryable: bool,
    },
}

/// Front-end side of a running controller
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Receiver<Session>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionHandle {
    fn send(&self, event: SessionEvent) -> GameResult<()> {
        self.events
            .send(event)
            .map_err(|_| GameError::ControllerClosed)
    }

    pub fn start(&self) -> GameResult<()> {
        self.send(SessionEvent::Start)
    }

    pub fn select(&self, comment_id: impl Into<CommentId>) -> GameResult<()> {
        self.send(SessionEvent::Select {
            comment_id: comment_id.into(),
        })
    }

    pub fn restart(&self) -> GameResult<()> {
        self.send(SessionEvent::Restart)
    }

    pub fn retry_submission(&self) -> GameResult<()> {
        self.send(SessionEvent::RetrySubmission)
    }

    pub fn shutdown(&self) -> GameResult<()> {
        self.send(SessionEvent::Shutdown)
    }

    /// Current read view of the session
    pub fn snapshot(&self) -> Session {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.view.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Wait until the published session satisfies `pred`
    pub async fn wait_for(&self, pred: impl FnMut(&Session) -> bool) -> GameResult<Session> {
        let mut view = self.view.clone();
        let session = view
            .wait_for(pred)
            .await
            .map_err(|_| GameError::ControllerClosed)?;
        Ok(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_rounds_cleared_by_phase() {
        let mut session = Session {
            rounds: vec![
                Round {
                    round_id: "r0".into(),
                    media_reference: "v0".into(),
                    time_budget: 10,
                    options: vec![],
                };
                3
            ],
            current_index: 1,
            phase: SessionPhase::Playing {
                round_phase: RoundPhase::Active,
            },
            ..Session::default()
        };
        assert_eq!(session.rounds_cleared(), 1);

        session.phase = SessionPhase::Lost;
        assert_eq!(session.rounds_cleared(), 1);

        session.phase = SessionPhase::Won;
        assert_eq!(session.rounds_cleared(), 3);

        assert_eq!(Session::default().rounds_cleared(), 0);
        assert!(Session::default().current_round().is_none());
    }

    #[test]
    fn test_notice_wire_format() {
        let notice = SessionNotice::Tick {
            round_index: 2,
            remaining: 7,
        };
        assert_eq!(
            serde_json::to_string(&notice).unwrap(),
            r#"{"t":"tick","round_index":2,"remaining":7}"#
        );

        let notice = SessionNotice::Error {
            code: "FETCH_FAILED".into(),
            msg: "offline".into(),
            retryable: true,
        };
        assert_eq!(
            serde_json::to_string(&notice).unwrap(),
            r#"{"t":"error","code":"FETCH_FAILED","msg":"offline","retryable":true}"#
        );
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!(
            SubmissionFailurePolicy::parse("Retry"),
            Some(SubmissionFailurePolicy::HoldForRetry)
        );
        assert_eq!(
            SubmissionFailurePolicy::parse(" forfeit "),
            Some(SubmissionFailurePolicy::Forfeit)
        );
        assert_eq!(SubmissionFailurePolicy::parse("shrug"), None);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("TICK_MILLIS", "250");
        std::env::set_var("SUBMISSION_FAILURE_POLICY", "forfeit");

        let config = SessionConfig::from_env();
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.failure_policy, SubmissionFailurePolicy::Forfeit);

        std::env::set_var("TICK_MILLIS", "0");
        std::env::remove_var("SUBMISSION_FAILURE_POLICY");
        let config = SessionConfig::from_env();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.failure_policy, SubmissionFailurePolicy::HoldForRetry);

        std::env::remove_var("TICK_MILLIS");
    }
}
