//! tricot - trace interception and collection for LLM chat completions
//!
//! This library sits between an application and its chat completion backend.
//! Every call made through an intercepted client is recorded as one JSON line on
//! the `TRICOT` channel, and an optional editing hook can rewrite the outgoing
//! messages before they are sent.
//!
//! # Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tricot::{bind_client, edit_hook, install, intercept, open_log};
//! use tricot::{BackendConfig, ChatMessage, LLMClient, LLMRequest};
//!
//! async fn run() -> anyhow::Result<()> {
//!     tricot::util::init_default();
//!     open_log(None)?;
//!
//!     install(Some(edit_hook(|mut messages| {
//!         messages.insert(0, ChatMessage::system("Answer in French."));
//!         Ok(messages)
//!     })));
//!
//!     let bound = bind_client(&BackendConfig::default().with_api_version("1.40.0"))?;
//!     let client = intercept(bound.client);
//!
//!     let response = client
//!         .chat(LLMRequest::new(vec![ChatMessage::user("Hello")]))
//!         .await?;
//!     println!("{:?}", response.content());
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`llm`]: client trait, backends, call-site shape selection and interception
//! - [`trace`]: trace records and the log sink behind the `TRICOT` channel
//! - [`config`]: backend configuration
//! - [`util`]: diagnostic logging setup

pub mod config;
pub mod error;
pub mod llm;
pub mod trace;
pub mod util;

pub use config::BackendConfig;
pub use error::{BackendError, ConfigError, SinkError};
pub use llm::{
    bind_client, edit_hook, install, intercept, uninstall, ApiShape, BoundClient, ChatMessage,
    EditHook, InterceptingClient, Interceptor, LLMClient, LLMRequest, LLMResponse, MessageRole,
};
pub use trace::{
    close_log, current_log_path, global_sink, open_log, TraceRecord, TraceSink, TRICOT_CHANNEL,
};
pub use util::{init_default, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
