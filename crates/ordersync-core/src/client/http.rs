//! HTTP implementation of the board API

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::api::{BoardApi, BoardMutation, MutationOutcome, RemoteError};
use crate::config::SyncSettings;
use crate::error::{Error, Result};

/// reqwest-backed board client authenticating with a bearer credential
#[derive(Clone)]
pub struct HttpBoardApi {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl HttpBoardApi {
    /// Build a client from validated settings.
    ///
    /// Requires `api_endpoint` and `api_token`; the per-call timeout is
    /// enforced by the underlying HTTP client.
    pub fn from_settings(settings: &SyncSettings) -> Result<Self> {
        let endpoint = settings
            .api_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Configuration("api_endpoint is not set".to_string()))?;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::Configuration(
                "api_endpoint must include http:// or https://".to_string(),
            ));
        }
        let token = settings
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Configuration("api_token is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(settings.call_timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Override the per-call timeout (primarily for tests)
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }
}

impl fmt::Debug for HttpBoardApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBoardApi")
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct MutationRequest<'a> {
    mutations: &'a [BoardMutation],
}

#[derive(Deserialize)]
struct MutationResponse {
    results: Vec<MutationOutcome>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }

    let trimmed: String = body.trim().chars().take(180).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

impl BoardApi for HttpBoardApi {
    async fn execute(
        &self,
        mutations: &[BoardMutation],
    ) -> std::result::Result<Vec<MutationOutcome>, RemoteError> {
        let url = format!("{}/v1/mutations", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&MutationRequest { mutations })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout
                } else {
                    RemoteError::Transport(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited);
        }
        if status.is_server_error() {
            return Err(RemoteError::Server(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api(
                status.as_u16(),
                parse_api_error(status, &body),
            ));
        }

        let payload = response
            .json::<MutationResponse>()
            .await
            .map_err(|e| RemoteError::InvalidPayload(e.to_string()))?;

        if payload.results.len() != mutations.len() {
            return Err(RemoteError::InvalidPayload(format!(
                "expected {} results, got {}",
                mutations.len(),
                payload.results.len()
            )));
        }
        Ok(payload.results)
    }
}
