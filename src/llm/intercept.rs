//! Interception of chat completion calls
//!
//! An [`Interceptor`] is a single slot holding the current editing hook, bound to
//! the [`TraceSink`] its records go to. An [`InterceptingClient`] decorates any
//! [`LLMClient`]: it reads the hook from its interceptor on every call, lets the
//! hook rewrite the outgoing messages, forwards the request and writes one
//! [`TraceRecord`] before handing the inner client's response back untouched.
//!
//! Installing a hook replaces the previous one; hooks never stack. Every client
//! wrapped by the same interceptor sees the replacement on its next call.

use super::client::LLMClient;
use super::types::{ChatMessage, LLMRequest, LLMResponse};
use crate::error::BackendError;
use crate::trace::{epoch_seconds, global_sink, TraceRecord, TraceSink};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Rewrites the outgoing messages of a call
///
/// The hook owns the messages it receives and may mutate them freely; the
/// caller's own sequence is never handed to it. An `Err` aborts the call.
pub type EditHook =
    Arc<dyn Fn(Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> + Send + Sync>;

static GLOBAL_INTERCEPTOR: Lazy<Arc<Interceptor>> = Lazy::new(|| Arc::new(Interceptor::new()));

/// Wraps a closure as an [`EditHook`]
pub fn edit_hook<F>(hook: F) -> EditHook
where
    F: Fn(Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> + Send + Sync + 'static,
{
    Arc::new(hook)
}

/// Single-slot holder of the active editing hook
pub struct Interceptor {
    hook: Mutex<Option<EditHook>>,
    sink: Arc<TraceSink>,
}

impl Interceptor {
    /// An interceptor writing to the process-wide trace sink
    pub fn new() -> Self {
        Self::with_sink(global_sink())
    }

    pub fn with_sink(sink: Arc<TraceSink>) -> Self {
        Self {
            hook: Mutex::new(None),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<EditHook>> {
        self.hook.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the installed hook; `None` means messages are sent unchanged
    pub fn install(&self, hook: Option<EditHook>) {
        let has_hook = hook.is_some();
        let replaced = std::mem::replace(&mut *self.lock(), hook);
        debug!(
            "Installed interceptor (hook: {}, replaced hook: {})",
            has_hook,
            replaced.is_some()
        );
    }

    pub fn uninstall(&self) {
        self.install(None);
    }

    pub fn current_hook(&self) -> Option<EditHook> {
        self.lock().clone()
    }

    pub fn has_hook(&self) -> bool {
        self.lock().is_some()
    }

    pub fn sink(&self) -> &Arc<TraceSink> {
        &self.sink
    }

    /// Decorates `inner` so that its calls go through this interceptor
    pub fn wrap(self: &Arc<Self>, inner: Arc<dyn LLMClient>) -> InterceptingClient {
        InterceptingClient::new(inner, Arc::clone(self))
    }
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("has_hook", &self.has_hook())
            .field("sink", &self.sink)
            .finish()
    }
}

/// The process-wide interceptor used by [`install`] and [`intercept`]
pub fn global_interceptor() -> Arc<Interceptor> {
    Arc::clone(&GLOBAL_INTERCEPTOR)
}

/// Installs `hook` on the process-wide interceptor, replacing any previous one
pub fn install(hook: Option<EditHook>) {
    GLOBAL_INTERCEPTOR.install(hook);
}

pub fn uninstall() {
    GLOBAL_INTERCEPTOR.uninstall();
}

/// Decorates `inner` with the process-wide interceptor
pub fn intercept(inner: Arc<dyn LLMClient>) -> InterceptingClient {
    GLOBAL_INTERCEPTOR.wrap(inner)
}

/// [`LLMClient`] decorator that edits requests and traces every exchange
pub struct InterceptingClient {
    inner: Arc<dyn LLMClient>,
    interceptor: Arc<Interceptor>,
}

impl InterceptingClient {
    pub fn new(inner: Arc<dyn LLMClient>, interceptor: Arc<Interceptor>) -> Self {
        Self { inner, interceptor }
    }

    pub fn inner(&self) -> &Arc<dyn LLMClient> {
        &self.inner
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    fn edit(&self, messages: Vec<ChatMessage>) -> Result<Vec<ChatMessage>, BackendError> {
        let Some(hook) = self.interceptor.current_hook() else {
            return Ok(messages);
        };

        hook(messages).map_err(|e| {
            warn!("Editing hook rejected the request: {:#}", e);
            BackendError::EditHook {
                message: format!("{:#}", e),
            }
        })
    }
}

#[async_trait]
impl LLMClient for InterceptingClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let LLMRequest { messages, params } = request;
        let messages = self.edit(messages)?;

        let started = epoch_seconds(Utc::now());
        let forwarded = LLMRequest {
            messages: messages.clone(),
            params,
        };

        debug!(
            "Forwarding intercepted request to {} ({} messages)",
            self.inner.name(),
            forwarded.messages.len()
        );

        let response = self.inner.chat(forwarded).await.map_err(|e| {
            warn!("Intercepted call to {} failed: {}", self.inner.name(), e);
            e
        })?;

        let reply = response
            .top_message()
            .cloned()
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "Response contains no choices".to_string(),
                raw_response: serde_json::to_string(&response).ok(),
            })?;

        let record = TraceRecord::new(started, messages, reply);
        let written = record.emit(self.interceptor.sink())?;
        if !written {
            debug!("No trace log open, record was not written to a file");
        }

        Ok(response)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model_info(&self) -> Option<String> {
        self.inner.model_info()
    }
}

impl std::fmt::Debug for InterceptingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptingClient")
            .field("inner", &self.inner.name())
            .field("interceptor", &self.interceptor)
            .finish()
    }
}
