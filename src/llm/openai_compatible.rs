//! OpenAI-compatible HTTP client (flat call-site shape)
//!
//! Messages and parameters are posted verbatim as a JSON map to
//! `{endpoint}/chat/completions`, and the response is read back as a plain
//! completion object. This works against OpenAI itself and against local
//! services exposing the same API (Ollama, LM Studio, vLLM).

use super::client::LLMClient;
use super::types::{LLMRequest, LLMResponse};
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Default request timeout for API calls
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Client for endpoints speaking the OpenAI chat completions format
///
/// `endpoint` is the API base including its version prefix, e.g.
/// `https://api.openai.com/v1` or `http://localhost:11434/v1`.
pub struct OpenAICompatibleClient {
    /// API base URL
    endpoint: String,

    /// Model used when the request does not name one
    model: String,

    /// Bearer token, if the endpoint needs one
    api_key: Option<String>,

    /// Shared HTTP client with connection pooling
    http_client: Client,

    /// Request timeout duration
    timeout: Duration,
}

impl OpenAICompatibleClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            http_client,
            timeout,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Self::with_timeout(&config.endpoint, &config.model, config.timeout())?;
        Ok(match &config.api_key {
            Some(key) => client.with_api_key(key),
            None => client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// Flattens the request into the JSON body sent on the wire
    ///
    /// The configured model is only a default; a `model` parameter wins.
    fn request_body(&self, request: LLMRequest) -> Result<Value, BackendError> {
        let messages =
            serde_json::to_value(&request.messages).map_err(|e| BackendError::Other {
                message: format!("Failed to encode messages: {}", e),
            })?;

        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.extend(request.params);
        body.insert("messages".to_string(), messages);
        Ok(Value::Object(body))
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            error!("Request timed out after {:?}", self.timeout);
            BackendError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            error!("Cannot connect to {}", self.endpoint);
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            error!("Request error: {}", e);
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }
}

/// Maps a non-success HTTP status to a backend error
fn status_error(status: StatusCode, body: String, retry_after: Option<u64>) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::AuthenticationError {
            message: format!("HTTP {}: {}", status, body),
        },
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimitError { retry_after },
        _ => BackendError::ApiError {
            message: format!("HTTP {}: {}", status, body),
            status_code: Some(status.as_u16()),
        },
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let url = self.completions_url();
        let body = self.request_body(request)?;

        debug!("Sending chat completion request to {}", url);
        let start = Instant::now();

        let mut builder = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();

            error!("API returned error status {}: {}", status, body);
            return Err(status_error(status, body, retry_after));
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let completion: LLMResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: Some(text.clone()),
            })?;

        debug!(
            "Chat completion finished in {:.2}s ({} choices)",
            start.elapsed().as_secs_f64(),
            completion.choices.len()
        );

        Ok(completion)
    }

    fn name(&self) -> &str {
        "OpenAICompatible"
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl fmt::Debug for OpenAICompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAICompatibleClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use serde_json::json;

    fn client() -> OpenAICompatibleClient {
        OpenAICompatibleClient::new("http://localhost:11434/v1/", "qwen2.5-coder:7b").unwrap()
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            client().completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_uses_default_model() {
        let body = client()
            .request_body(LLMRequest::new(vec![ChatMessage::user("hi")]).with_param("n", 1))
            .unwrap();

        assert_eq!(
            body,
            json!({
                "model": "qwen2.5-coder:7b",
                "n": 1,
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[test]
    fn test_request_model_overrides_default() {
        let body = client()
            .request_body(LLMRequest::new(vec![]).with_model("llama3"))
            .unwrap();
        assert_eq!(body["model"], json!("llama3"));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new(), None),
            BackendError::AuthenticationError { .. }
        ));
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new(), Some(3)),
            BackendError::RateLimitError {
                retry_after: Some(3)
            }
        );
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream".to_string(), None),
            BackendError::ApiError {
                status_code: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = client().with_api_key("sk-secret");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("has_api_key: true"));
    }
}
