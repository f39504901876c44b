mod http;

use async_trait::async_trait;
use std::time::Duration;

pub use http::HttpBackend;

use crate::error::GameResult;
use crate::protocol::GuessRequest;
use crate::types::{Round, Verdict};

/// Shown when the round endpoint fails without a usable `detail`
pub const FETCH_FALLBACK_MESSAGE: &str =
    "Unable to fetch a new video right now. Please try again soon.";

/// Shown when the scoring endpoint fails without a usable `detail`
pub const SUBMIT_FALLBACK_MESSAGE: &str = "We could not score that guess. Please try a new round.";

/// The remote side of the game: hands out rounds and scores guesses
#[async_trait]
pub trait GameBackend: Send + Sync {
    /// Fetch the ordered rounds for a new session
    async fn fetch_rounds(&self) -> GameResult<Vec<Round>>;

    /// Score one guess and reveal the round
    async fn submit_guess(&self, request: &GuessRequest) -> GameResult<Verdict>;

    /// Get the name of this backend
    fn name(&self) -> &str;
}

/// Which round endpoint a session starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundSource {
    /// A multi-round path (`GET /daily-challenge`)
    #[default]
    DailyPath,
    /// One round per session (`GET /get-game-round`)
    SingleRound,
}

impl RoundSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "path" | "daily" => Some(RoundSource::DailyPath),
            "single" | "round" => Some(RoundSource::SingleRound),
            _ => None,
        }
    }
}

/// Configuration for the HTTP backend
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the API, without trailing slash
    pub base_url: String,
    /// Timeout for each request
    pub timeout: Duration,
    pub round_source: RoundSource,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout: Duration::from_secs(10),
            round_source: RoundSource::DailyPath,
        }
    }
}

impl HttpBackendConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("API_BASE_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim().trim_end_matches('/');
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or(defaults.base_url);

        let round_source = match std::env::var("ROUND_SOURCE") {
            Ok(value) => RoundSource::parse(&value).unwrap_or_else(|| {
                tracing::warn!("Unknown ROUND_SOURCE '{}', using daily path", value);
                RoundSource::DailyPath
            }),
            Err(_) => defaults.round_source,
        };

        Self {
            base_url,
            timeout: std::env::var("API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            round_source,
        }
    }
}
