// Shared HTTP plumbing for the hosted embedding and chat deployments

#[cfg(test)]
mod tests;

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::AzureConfig;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Authenticated JSON-over-HTTP client for one resource endpoint
#[derive(Debug, Clone)]
pub struct AzureTransport {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
    retry_delay: Duration,
}

/// Error envelope returned by OpenAI-compatible services
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Outcome of a single attempt
enum Attempt {
    Done(String),
    Retry(anyhow::Error),
    Fail(anyhow::Error),
}

impl AzureTransport {
    #[inline]
    pub fn new(config: &AzureConfig) -> Result<Self> {
        config
            .validate()
            .context("Azure OpenAI settings are incomplete")?;

        let base_url = config
            .resource_url()
            .context("Failed to build resource URL from config")?;

        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("API key is not set"))?;

        Ok(Self {
            base_url,
            api_key,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay before the first retry; later retries back off exponentially
    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// URL of a deployment operation, e.g. `embeddings` or `chat/completions`
    #[inline]
    pub fn deployment_url(&self, deployment: &str, operation: &str, api_version: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("openai/deployments/{}/{}", deployment, operation))
            .with_context(|| format!("Failed to build URL for deployment {}", deployment))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// POST a JSON body and return the response text, retrying transient failures
    #[inline]
    pub fn post_json(&self, url: &Url, body: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{} to {}", attempt, self.retry_attempts, url.path());

            match self.try_post(url, body) {
                Attempt::Done(text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(text);
                }
                Attempt::Fail(e) => {
                    warn!("Non-retryable error: {}", e);
                    return Err(e);
                }
                Attempt::Retry(e) => {
                    warn!(
                        "Transient error: {}, attempt {}/{}",
                        e, attempt, self.retry_attempts
                    );
                    last_error = Some(e);

                    if attempt < self.retry_attempts {
                        let delay = backoff_delay(self.retry_delay, attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", url.path());
        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }

    fn try_post(&self, url: &Url, body: &str) -> Attempt {
        let response = self
            .agent
            .post(url.as_str())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(body);

        let mut response = match response {
            Ok(response) => response,
            Err(
                e @ (ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_)),
            ) => return Attempt::Retry(anyhow!("Transport error: {}", e)),
            Err(e) => return Attempt::Fail(anyhow!("Request error: {}", e)),
        };

        let status = response.status().as_u16();
        let text = match response.body_mut().read_to_string() {
            Ok(text) => text,
            Err(e) => return Attempt::Retry(anyhow!("Failed to read response body: {}", e)),
        };

        if (200..300).contains(&status) {
            Attempt::Done(text)
        } else if status >= 500 || status == 429 {
            Attempt::Retry(anyhow!("{}", describe_http_error(status, &text)))
        } else {
            Attempt::Fail(anyhow!("{}", describe_http_error(status, &text)))
        }
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Render an error response, preferring the service's own message
fn describe_http_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope
                .error
                .code
                .map(|value| match value {
                    serde_json::Value::String(s) => format!(" [code={}]", s),
                    other => format!(" [code={}]", other),
                })
                .unwrap_or_default();
            format!("HTTP {}{}: {}", status, code, envelope.error.message)
        }
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

/// Delay before retrying after `attempt` (1-based) failed; saturates instead of overflowing
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1)))
}
