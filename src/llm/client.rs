use super::types::{LLMRequest, LLMResponse};
use crate::error::BackendError;
use async_trait::async_trait;

/// Capability to perform a chat completion
///
/// Applications hold an `Arc<dyn LLMClient>` instead of calling a provider
/// directly, so interception is a matter of handing them a decorated client.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}
