//! Client call-site shape selection
//!
//! Chat completion client libraries come in two incompatible shapes: an older
//! flat entry point that takes and returns plain JSON maps, and a newer one with
//! a nested entry point and distinct structured message types. The shape is
//! resolved once at startup, from explicit configuration or from the client
//! library's version identifier, and the matching backend is bound for the
//! lifetime of the process. Nothing here probes a backend by calling it.

use super::client::LLMClient;
use super::genai_client::GenAIClient;
use super::openai_compatible::OpenAICompatibleClient;
use crate::config::BackendConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Call-site shape of the underlying chat completion client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiShape {
    /// Single flat entry point, messages are plain maps
    Flat,
    /// Nested entry point, messages are structured types
    Structured,
}

impl ApiShape {
    /// Selects the shape from a semantic version: `0.x` is flat, anything later
    /// is structured
    pub fn from_version(version: &str) -> Result<Self, ConfigError> {
        let parsed =
            semver::Version::parse(version.trim()).map_err(|e| ConfigError::InvalidVersion {
                version: version.to_string(),
                reason: e.to_string(),
            })?;

        Ok(if parsed.major == 0 {
            ApiShape::Flat
        } else {
            ApiShape::Structured
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiShape::Flat => "flat",
            ApiShape::Structured => "structured",
        }
    }
}

impl FromStr for ApiShape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "legacy" => Ok(ApiShape::Flat),
            "structured" | "current" => Ok(ApiShape::Structured),
            _ => Err(ConfigError::InvalidShape(s.to_string())),
        }
    }
}

impl fmt::Display for ApiShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The chat completion client bound at startup
pub struct BoundClient {
    pub client: Arc<dyn LLMClient>,
    pub shape: ApiShape,
    pub description: String,
}

impl fmt::Debug for BoundClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundClient")
            .field("shape", &self.shape)
            .field("description", &self.description)
            .finish()
    }
}

/// Validates `config`, resolves its shape and constructs the matching backend
pub fn bind_client(config: &BackendConfig) -> Result<BoundClient, ConfigError> {
    config.validate()?;
    let shape = config.resolve_shape()?;

    let client: Arc<dyn LLMClient> = match shape {
        ApiShape::Flat => Arc::new(OpenAICompatibleClient::from_config(config)?),
        ApiShape::Structured => Arc::new(GenAIClient::from_config(config)?),
    };

    let description = format!("{} ({}, {} shape)", client.name(), config.model, shape);
    info!("Bound chat completion client: {}", description);

    Ok(BoundClient {
        client,
        shape,
        description,
    })
}
