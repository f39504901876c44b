use super::*;
use crate::error::GameError;
use crate::protocol::ErrorDetail;

/// Backend talking JSON over HTTP to the scoring service
pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> GameResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GameError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn describe(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!("Request timed out after {:?}", self.config.timeout)
        } else if e.is_connect() {
            "Could not reach the game server".to_string()
        } else {
            format!("Request failed: {}", e)
        }
    }
}

/// Prefer the service's own `detail` message, else the fixed fallback
async fn failure_message(response: reqwest::Response, fallback: &str) -> String {
    let status = response.status();
    match response.json::<ErrorDetail>().await {
        Ok(body) if !body.detail.trim().is_empty() => body.detail,
        _ => {
            tracing::debug!("No error detail in {} response", status);
            fallback.to_string()
        }
    }
}

#[async_trait]
impl GameBackend for HttpBackend {
    async fn fetch_rounds(&self) -> GameResult<Vec<Round>> {
        let path = match self.config.round_source {
            RoundSource::DailyPath => "daily-challenge",
            RoundSource::SingleRound => "get-game-round",
        };
        let url = self.url(path);
        tracing::info!("Fetching rounds from {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!("Round fetch failed: {}", e);
            GameError::FetchFailed(self.describe(&e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = failure_message(response, FETCH_FALLBACK_MESSAGE).await;
            tracing::error!("Round fetch returned {}: {}", status, message);
            return Err(GameError::FetchFailed(message));
        }

        let rounds = match self.config.round_source {
            RoundSource::DailyPath => response.json::<Vec<Round>>().await,
            RoundSource::SingleRound => response.json::<Round>().await.map(|r| vec![r]),
        }
        .map_err(|e| GameError::FetchFailed(format!("Malformed round data: {}", e)))?;

        tracing::info!("Fetched {} rounds", rounds.len());
        Ok(rounds)
    }

    async fn submit_guess(&self, request: &GuessRequest) -> GameResult<Verdict> {
        let url = self.url("submit-guess");
        tracing::info!(
            "Submitting guess {} for round {}",
            request.comment_id,
            request.round_id
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Guess submission failed: {}", e);
                GameError::SubmissionFailed(self.describe(&e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = failure_message(response, SUBMIT_FALLBACK_MESSAGE).await;
            tracing::error!("Guess submission returned {}: {}", status, message);
            return Err(GameError::SubmissionFailed(message));
        }

        response
            .json::<Verdict>()
            .await
            .map_err(|e| GameError::SubmissionFailed(format!("Malformed verdict: {}", e)))
    }

    fn name(&self) -> &str {
        "http"
    }
}
