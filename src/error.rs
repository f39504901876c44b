/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

/// Errors that can occur while driving a session
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Round list unavailable: {0}")]
    FetchFailed(String),

    #[error("Guess could not be scored: {0}")]
    SubmissionFailed(String),

    #[error("Invalid time budget {budget} (must be positive)")]
    InvalidBudget { budget: i64 },

    #[error("Discarded stale {what} from an earlier round or session")]
    StaleResponse { what: &'static str },

    #[error("Invalid round {round_id}: {reason}")]
    InvalidRound { round_id: String, reason: String },

    #[error("Invalid verdict for round {round_id}: {reason}")]
    InvalidVerdict { round_id: String, reason: String },

    #[error("Comment {0} is not an option in the current round")]
    UnknownOption(String),

    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Session controller is no longer running")]
    ControllerClosed,
}

impl GameError {
    /// Stable code for notices sent to front-ends
    pub fn code(&self) -> &'static str {
        match self {
            GameError::FetchFailed(_) => "FETCH_FAILED",
            GameError::SubmissionFailed(_) => "SUBMISSION_FAILED",
            GameError::InvalidBudget { .. } => "INVALID_BUDGET",
            GameError::StaleResponse { .. } => "STALE_RESPONSE",
            GameError::InvalidRound { .. } => "INVALID_ROUND",
            GameError::InvalidVerdict { .. } => "INVALID_VERDICT",
            GameError::UnknownOption(_) => "UNKNOWN_OPTION",
            GameError::InvalidTransition { .. } => "INVALID_TRANSITION",
            GameError::ConfigError(_) => "CONFIG_ERROR",
            GameError::ControllerClosed => "CONTROLLER_CLOSED",
        }
    }

    /// Transient network failures the player can recover from by retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GameError::FetchFailed(_) | GameError::SubmissionFailed(_)
        )
    }

    /// Message to show the player. Network failures carry one already.
    pub fn user_message(&self) -> String {
        match self {
            GameError::FetchFailed(msg) | GameError::SubmissionFailed(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
