//! Backend configuration
//!
//! [`BackendConfig`] describes the chat completion client the process binds at
//! startup. It is plain data: hosts can build it in code or deserialize it from
//! their own configuration files. The crate never reads it from the environment.
//!
//! # Example
//!
//! ```no_run
//! use tricot::{bind_client, BackendConfig};
//!
//! let config = BackendConfig::new("https://api.openai.com/v1", "gpt-4o-mini")
//!     .with_api_version("1.40.0");
//! let bound = bind_client(&config).expect("invalid configuration");
//! ```

use crate::error::ConfigError;
use crate::llm::ApiShape;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default values for configuration
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL, including any version prefix
    pub endpoint: String,

    /// Model used when a request does not name one
    pub model: String,

    /// API key; when absent the backend falls back to its own lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Version identifier of the client library being stood in for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Explicit call-site shape, overrides `api_version`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<ApiShape>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_version: None,
            shape: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_shape(mut self, shape: ApiShape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves the call-site shape: the explicit setting, else the version
    /// identifier, else the structured shape
    pub fn resolve_shape(&self) -> Result<ApiShape, ConfigError> {
        if let Some(shape) = self.shape {
            return Ok(shape);
        }
        match &self.api_version {
            Some(version) => ApiShape::from_version(version),
            None => Ok(ApiShape::Structured),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }

        self.resolve_shape()?;
        Ok(())
    }
}
