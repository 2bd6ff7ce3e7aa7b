//! Text-generation backend client.
//!
//! The backend is an OpenAI-compatible Responses API: one prompt in, a
//! structured response out. [`GenerationClient`] is the seam the blog
//! pipeline depends on; [`ResponsesClient`] is the HTTP implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{ConfigError, ConfigResult, ServiceError, ServiceResult};

/// One content part of an output item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part kind, e.g. `output_text` or `refusal`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Text payload for text parts.
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentPart {
    /// A text part carrying `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "output_text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// One output item of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputItem {
    /// Item kind, e.g. `message`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Content parts, in order.
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

/// The backend's structured response, reduced to the fields we read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Output items, in order.
    #[serde(default)]
    pub output: Vec<OutputItem>,
    /// Convenience aggregate some deployments include.
    #[serde(default)]
    pub output_text: Option<String>,
}

impl RawResponse {
    /// A response with a single message item holding `parts`.
    pub fn from_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            output: vec![OutputItem {
                kind: "message".to_string(),
                content: parts,
            }],
            output_text: None,
        }
    }
}

/// Sends a prompt to a text-generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a response for `prompt`.
    ///
    /// Fails with [`ServiceError::Upstream`] when the call fails, times out,
    /// or the service answers with a non-success status.
    async fn generate(&self, prompt: &str) -> ServiceResult<RawResponse>;
}

/// HTTP client for an OpenAI-compatible `/responses` endpoint.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

/// First delay between retries; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound on a single retry delay.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Backoff before retry number `attempt_no + 1`.
fn retry_delay(attempt_no: u32) -> Duration {
    2u32.checked_pow(attempt_no)
        .and_then(|factor| RETRY_BASE_DELAY.checked_mul(factor))
        .map_or(RETRY_MAX_DELAY, |delay| delay.min(RETRY_MAX_DELAY))
}

impl ResponsesClient {
    /// Build a client from configuration.
    ///
    /// Fails if no API key is configured or the HTTP client cannot be built.
    pub fn from_config(cfg: &LlmConfig) -> ConfigResult<Self> {
        let api_key = cfg.require_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            http,
            endpoint: format!("{}/responses", cfg.api_base.trim_end_matches('/')),
            api_key,
            model: cfg.model.clone(),
            max_retries: cfg.max_retries,
        })
    }

    /// The model this client asks for.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn attempt(&self, prompt: &str) -> Result<RawResponse, Attempt> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": prompt }))
            .send()
            .await
            .map_err(|e| {
                let retryable = e.is_timeout() || e.is_connect();
                let msg = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {e}")
                };
                Attempt { msg, retryable }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(Attempt {
                msg: format!("status {status}: {body}"),
                retryable: status.is_server_error() || status.as_u16() == 429,
            });
        }

        response.json::<RawResponse>().await.map_err(|e| Attempt {
            msg: format!("unreadable response body: {e}"),
            retryable: false,
        })
    }
}

struct Attempt {
    msg: String,
    retryable: bool,
}

#[async_trait]
impl GenerationClient for ResponsesClient {
    #[tracing::instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> ServiceResult<RawResponse> {
        let start = Instant::now();
        let mut attempt_no = 0u32;
        loop {
            debug!(attempt = attempt_no + 1, "generation request starting");
            match self.attempt(prompt).await {
                Ok(resp) => {
                    info!(
                        duration_secs = format_args!("{:.2}", start.elapsed().as_secs_f32()),
                        items = resp.output.len(),
                        "generation request completed"
                    );
                    return Ok(resp);
                }
                Err(failure) if failure.retryable && attempt_no < self.max_retries => {
                    let delay = retry_delay(attempt_no);
                    warn!(
                        error = %failure.msg,
                        retry_in_ms = delay.as_millis() as u64,
                        "generation request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt_no += 1;
                }
                Err(failure) => {
                    warn!(error = %failure.msg, attempts = attempt_no + 1, "generation request failed");
                    return Err(ServiceError::Upstream(failure.msg));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_responses_api_shape() {
        let body = r##"{
            "id": "resp_1",
            "object": "response",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "# Title", "annotations": []}
                ]}
            ]
        }"##;
        let resp: RawResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.output.len(), 2);
        assert!(resp.output[0].content.is_empty());
        assert_eq!(resp.output[1].content[0].kind, "output_text");
        assert_eq!(resp.output[1].content[0].text.as_deref(), Some("# Title"));
        assert!(resp.output_text.is_none());
    }

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        assert_eq!(retry_delay(0), Duration::from_millis(500));
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(3), Duration::from_secs(4));
        assert_eq!(retry_delay(10), RETRY_MAX_DELAY);
        assert_eq!(retry_delay(40), RETRY_MAX_DELAY);
        assert_eq!(retry_delay(u32::MAX), RETRY_MAX_DELAY);
    }

    #[test]
    fn from_config_requires_key() {
        assert!(ResponsesClient::from_config(&LlmConfig::default()).is_err());
    }

    #[test]
    fn endpoint_joins_base_without_double_slash() {
        let cfg = LlmConfig {
            api_base: "http://localhost:5001/v1/".into(),
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        let client = ResponsesClient::from_config(&cfg).unwrap();
        assert_eq!(client.endpoint, "http://localhost:5001/v1/responses");
        assert_eq!(client.model(), "gpt-4.1-mini");
    }

    #[tokio::test]
    async fn unreachable_backend_is_upstream_error() {
        let cfg = LlmConfig {
            // Port 9 (discard) on loopback is closed on test machines.
            api_base: "http://127.0.0.1:9/v1".into(),
            api_key: Some("sk-test".into()),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let client = ResponsesClient::from_config(&cfg).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }
}
