//! Development scoring service.
//!
//! Serves rounds drawn from a local video catalog on the same endpoints the
//! client talks to, so a session can be played without the real service.

pub mod api;
mod catalog;

pub use catalog::{
    Catalog, CatalogComment, CatalogVideo, IssuedRound, RoundBook, DISTRACTORS, MIN_COMMENTS,
    ROUND_BOOK_CAPACITY,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::protocol::ErrorDetail;

/// What counts as a correct pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    /// Pick the most-liked comment
    #[default]
    Guess,
    /// Pick anything except the most-liked comment
    Avoid,
}

impl GameMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "guess" => Some(GameMode::Guess),
            "avoid" => Some(GameMode::Avoid),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Failed to read catalog {path}: {source}")]
    CatalogIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    #[error("Catalog has no video with at least four usable comments")]
    NoPlayableVideos,

    #[error("Round not found or has expired.")]
    RoundNotFound,

    #[error("Selected comment is not part of this round.")]
    InvalidGuess,
}

impl IntoResponse for OracleError {
    fn into_response(self) -> Response {
        let status = match self {
            OracleError::RoundNotFound => StatusCode::NOT_FOUND,
            OracleError::InvalidGuess => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorDetail::new(self.to_string()))).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub port: u16,
    pub catalog_path: PathBuf,
    /// Rounds handed out by `/daily-challenge`
    pub rounds_per_path: usize,
    /// Seconds per round
    pub round_seconds: i64,
    pub mode: GameMode,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            catalog_path: PathBuf::from("data/catalog.json"),
            rounds_per_path: 5,
            round_seconds: 15,
            mode: GameMode::Guess,
        }
    }
}

impl OracleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mode = match std::env::var("GAME_MODE") {
            Ok(value) => GameMode::parse(&value).unwrap_or_else(|| {
                tracing::warn!("Unknown GAME_MODE '{}', using guess", value);
                GameMode::Guess
            }),
            Err(_) => defaults.mode,
        };

        Self {
            port: std::env::var("ORACLE_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            catalog_path: std::env::var("ROUND_CATALOG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            rounds_per_path: std::env::var("ROUNDS_PER_PATH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.rounds_per_path),
            round_seconds: std::env::var("ROUND_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.round_seconds),
            mode,
        }
    }
}

/// Shared state for the oracle routes
pub struct OracleState {
    pub catalog: Catalog,
    pub config: OracleConfig,
    pub book: RwLock<RoundBook>,
}

impl OracleState {
    pub fn new(catalog: Catalog, config: OracleConfig) -> Self {
        Self {
            catalog,
            config,
            book: RwLock::new(RoundBook::default()),
        }
    }

    /// Draw `count` rounds and remember them for scoring
    pub async fn issue(&self, count: usize) -> Vec<IssuedRound> {
        let issued = {
            let mut rng = rand::rng();
            self.catalog
                .issue(&mut rng, count, self.config.round_seconds)
        };

        let mut book = self.book.write().await;
        for round in &issued {
            tracing::debug!(
                "Issued round {} ({})",
                round.round.round_id,
                round.title
            );
            book.insert(round.clone());
        }
        issued
    }
}

/// Routes under `/api`, with CORS and request tracing
pub fn router(state: Arc<OracleState>) -> Router {
    let api = Router::new()
        .route("/daily-challenge", get(api::daily_challenge))
        .route("/get-game-round", get(api::get_game_round))
        .route("/submit-guess", post(api::submit_guess));

    Router::new()
        .route("/", get(api::hello))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_game_mode_parse() {
        assert_eq!(GameMode::parse("Avoid"), Some(GameMode::Avoid));
        assert_eq!(GameMode::parse(" guess "), Some(GameMode::Guess));
        assert_eq!(GameMode::parse("chaos"), None);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("ORACLE_PORT", "9100");
        std::env::set_var("ROUND_CATALOG", "/tmp/videos.json");
        std::env::set_var("ROUNDS_PER_PATH", "0");
        std::env::set_var("ROUND_SECONDS", "20");
        std::env::set_var("GAME_MODE", "avoid");

        let config = OracleConfig::from_env();
        assert_eq!(config.port, 9100);
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/videos.json"));
        assert_eq!(config.rounds_per_path, 5);
        assert_eq!(config.round_seconds, 20);
        assert_eq!(config.mode, GameMode::Avoid);

        for key in [
            "ORACLE_PORT",
            "ROUND_CATALOG",
            "ROUNDS_PER_PATH",
            "ROUND_SECONDS",
            "GAME_MODE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            OracleError::RoundNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OracleError::InvalidGuess.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OracleError::NoPlayableVideos.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
