//! HTTP client for the remote advisory service.
//!
//! Sends the captured failure context to the service and returns its
//! fix suggestion, if any. Handles:
//! - server URL validation and endpoint normalization
//! - bounded retry with fixed backoff (see [`RetryPolicy`])
//! - classification of network/protocol failures into [`AdvisoryError`]
//!
//! The service is an opaque endpoint: `POST /analyze_error` with
//! `{"machine_id", "error_context"}`, answered by `{"suggestion": string|null}`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AdvisoryError, AdvisoryResult};
use crate::machine::machine_id;

/// Path segment every advisory request must end with.
pub const SUGGESTION_ENDPOINT: &str = "/analyze_error";

/// Marker the service embeds when it cannot produce an actionable fix.
const UNCERTAIN_MARKER: &str = "UNCERTAIN";

/// Opaque bundle of the failed command line, exit code, and captured
/// output. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext(String);

impl ErrorContext {
    /// Build the context in the fixed layout the advisory service expects.
    pub fn new(command_line: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self(format!(
            "Command: {command_line}\nExit Code: {exit_code}\n\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounded-retry policy: total attempt budget is `max_retries + 1`, with
/// a fixed backoff between attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = single attempt).
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts this policy permits.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Configuration for the advisory client.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryConfig {
    /// Base URL of the advisory service (endpoint segment appended when
    /// missing).
    pub server_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for retriable failures.
    pub retry: RetryPolicy,
}

#[derive(Serialize)]
struct SuggestionRequest<'a> {
    machine_id: &'a str,
    error_context: &'a str,
}

#[derive(Deserialize)]
struct SuggestionResponse {
    #[serde(default)]
    suggestion: Option<String>,
}

/// Client for the advisory service.
pub struct AdvisoryClient {
    endpoint: Url,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl AdvisoryClient {
    /// Validate the configured URL and build the client.
    ///
    /// Fails immediately with [`AdvisoryError::InvalidServerUrl`] when the
    /// URL has no scheme or host; no network attempt is made.
    pub fn new(config: AdvisoryConfig) -> AdvisoryResult<Self> {
        let parsed = Url::parse(&config.server_url).map_err(|_| AdvisoryError::InvalidServerUrl {
            url: config.server_url.clone(),
        })?;
        if parsed.scheme().is_empty() || !parsed.has_host() {
            return Err(AdvisoryError::InvalidServerUrl {
                url: config.server_url.clone(),
            });
        }

        let endpoint = normalize_endpoint(parsed);
        tracing::debug!(endpoint = %endpoint, "advisory endpoint resolved");

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| AdvisoryError::Network {
                detail: err.to_string(),
            })?;

        Ok(Self {
            endpoint,
            http,
            retry: config.retry,
        })
    }

    /// The normalized endpoint URL requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Ask the service for a fix suggestion.
    ///
    /// Returns `Ok(None)` when the service has nothing actionable to say
    /// (missing/empty suggestion, or one carrying the uncertainty marker).
    /// Non-200 responses and network failures are retried up to the policy
    /// budget; exhaustion yields [`AdvisoryError::ServiceUnavailable`].
    /// A malformed 200 body is deterministic and never retried.
    pub async fn request_suggestion(&self, ctx: &ErrorContext) -> AdvisoryResult<Option<String>> {
        let payload = SuggestionRequest {
            machine_id: machine_id(),
            error_context: ctx.as_str(),
        };

        let attempts = self.retry.total_attempts();
        for attempt in 1..=attempts {
            if attempt > 1 {
                tracing::info!(attempt, max_attempts = attempts, "retrying advisory request");
                tokio::time::sleep(self.retry.backoff).await;
            }

            match self.http.post(self.endpoint.clone()).json(&payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::OK {
                        let body = response.text().await.map_err(|err| AdvisoryError::Network {
                            detail: err.to_string(),
                        })?;
                        let parsed: SuggestionResponse = serde_json::from_str(&body).map_err(
                            |err| AdvisoryError::ResponseParse {
                                detail: err.to_string(),
                            },
                        )?;
                        return Ok(interpret_suggestion(parsed.suggestion));
                    }
                    tracing::warn!(
                        status = status.as_u16(),
                        attempt,
                        "advisory service returned non-200"
                    );
                }
                Err(err) => {
                    let detail = if err.is_timeout() {
                        "timeout".to_string()
                    } else if err.is_connect() {
                        "connection failed".to_string()
                    } else {
                        err.to_string()
                    };
                    tracing::warn!(error = %detail, attempt, "advisory request failed");
                }
            }
        }

        Err(AdvisoryError::ServiceUnavailable {
            url: self.endpoint.to_string(),
        })
    }
}

/// Interpret the `suggestion` field of a 200 response.
fn interpret_suggestion(suggestion: Option<String>) -> Option<String> {
    match suggestion {
        Some(text) if !text.trim().is_empty() => {
            if text.contains(UNCERTAIN_MARKER) {
                tracing::info!("advisory response indicates uncertainty");
                None
            } else {
                Some(text)
            }
        }
        _ => {
            tracing::warn!("advisory response missing or empty suggestion field");
            None
        }
    }
}

/// Ensure the URL path ends with the suggestion endpoint segment.
///
/// An empty or root path becomes the segment; a path ending in `/` gets
/// the segment appended without an extra slash; a path not mentioning the
/// segment gets it appended; a path already containing it is left alone.
fn normalize_endpoint(mut url: Url) -> Url {
    let path = url.path().to_string();
    if path.ends_with(SUGGESTION_ENDPOINT) {
        return url;
    }

    let new_path = if path.is_empty() || path == "/" {
        SUGGESTION_ENDPOINT.to_string()
    } else if path.ends_with('/') {
        format!("{path}{}", &SUGGESTION_ENDPOINT[1..])
    } else if !path.contains(SUGGESTION_ENDPOINT) {
        format!("{path}{SUGGESTION_ENDPOINT}")
    } else {
        return url;
    };

    url.set_path(&new_path);
    url
}
