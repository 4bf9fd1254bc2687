//! LLM client abstraction layer
//!
//! Applications talk to an `Arc<dyn LLMClient>`. Concrete backends implement
//! the trait for each call-site shape, and [`InterceptingClient`] decorates any
//! of them with request editing and tracing.

mod client;
mod compat;
mod genai_client;
mod intercept;
mod mock;
mod openai_compatible;
mod types;

pub use client::LLMClient;
pub use compat::{bind_client, ApiShape, BoundClient};
pub use genai_client::GenAIClient;
pub use intercept::{
    edit_hook, global_interceptor, install, intercept, uninstall, EditHook, InterceptingClient,
    Interceptor,
};
pub use mock::{MockLLMClient, MockResponse};
pub use openai_compatible::OpenAICompatibleClient;
pub use types::{ChatMessage, Choice, LLMRequest, LLMResponse, MessageRole};
