/// Backend client: the single point of entry for all AI backend calls.
///
/// No other module may talk to the backend over HTTP. The workflow and the
/// analysis pipeline reach it through the `AdaptiveBackend` and
/// `AnalysisBackend` traits, both implemented here in `endpoints`.
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod endpoints;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// 2xx response whose body reports a failure (`error` field or
    /// `success: false`).
    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Backend returned empty content")]
    EmptyContent,
}

/// FastAPI-style error body: `{"detail": "..."}` or `{"detail": [{"msg": ...}]}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Value,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POSTs `body` as JSON to `path` and deserializes the response.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff,
    /// except for endpoints listed in `endpoints::NON_IDEMPOTENT`.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let attempts = attempts_for(path);
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Backend call to {} attempt {} failed, retrying after {}ms...",
                    path,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(BackendError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Backend {} returned {}: {}", path, status, body);
                last_error = Some(BackendError::Api {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Api {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            let text = response.text().await?;
            if text.trim().is_empty() {
                return Err(BackendError::EmptyContent);
            }
            let value: Value = serde_json::from_str(&text)?;
            check_rejection(&value)?;

            debug!("Backend call to {} succeeded", path);
            return serde_json::from_value(value).map_err(BackendError::Parse);
        }

        Err(last_error.unwrap_or(BackendError::RateLimited { retries: attempts }))
    }
}

fn attempts_for(path: &str) -> u32 {
    if endpoints::NON_IDEMPOTENT.contains(&path) {
        1
    } else {
        MAX_RETRIES
    }
}

/// Pulls a readable message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.detail,
        Err(_) => return body.to_string(),
    };
    match detail {
        Value::String(message) => message,
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// The backend sometimes answers 200 with `{"error": "..."}` or
/// `{"success": false}`.
fn check_rejection(value: &Value) -> Result<(), BackendError> {
    if let Some(error) = value.get("error") {
        match error {
            Value::Null => {}
            Value::String(message) if message.is_empty() => {}
            Value::String(message) => return Err(BackendError::Rejected(message.clone())),
            other => return Err(BackendError::Rejected(other.to_string())),
        }
    }
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request unsuccessful");
        return Err(BackendError::Rejected(message.to_string()));
    }
    Ok(())
}
