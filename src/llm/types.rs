//! Chat completion types
//!
//! These types are the uniform request/response shape shared by every backend,
//! whichever client call-site shape was bound at startup. Fields the crate does
//! not model explicitly are preserved verbatim in flattened `extra` maps, so a
//! message or response survives a trip through the interception layer untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Role of a message in the conversation
///
/// Roles outside the known set (legacy `function`, provider-specific names) are
/// kept as [`MessageRole::Other`] and serialize back to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// Developer instructions (newer name for system on some providers)
    Developer,
    /// User message
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool response
    Tool,
    /// Any other role, kept verbatim
    #[serde(untagged)]
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::System => "system",
            MessageRole::Developer => "developer",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::Other(role) => role,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: MessageRole,
    /// Text content of the message; `null` from a backend reads as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Any other fields (name, tool_call_id, tool_calls, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Creates a tool response message
    pub fn tool_response(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content).with_field("tool_call_id", call_id.into())
    }

    /// Attaches an additional field that is carried verbatim
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Request to send to the LLM
///
/// Everything except `messages` is an open-ended set of named parameters
/// (model, temperature, ...) forwarded to the backend as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LLMRequest {
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Pass-through parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl LLMRequest {
    /// Creates a new request with messages
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            params: Map::new(),
        }
    }

    /// Sets an arbitrary named parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the model
    pub fn with_model(self, model: impl Into<String>) -> Self {
        self.with_param("model", model.into())
    }

    /// Sets the temperature
    pub fn with_temperature(self, temperature: f32) -> Self {
        self.with_param("temperature", temperature)
    }

    /// Sets the maximum tokens
    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        self.with_param("max_tokens", max_tokens)
    }

    /// Sets stop sequences
    pub fn with_stop_sequences(self, sequences: Vec<String>) -> Self {
        self.with_param("stop", sequences)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Model requested by the caller, if any
    pub fn model(&self) -> Option<&str> {
        self.param("model").and_then(Value::as_str)
    }
}

/// One generated alternative in a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response from the LLM
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LLMResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LLMResponse {
    /// Creates a response with a single assistant reply
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_message(ChatMessage::assistant(content))
    }

    /// Creates a response whose only choice carries `message`
    pub fn from_message(message: ChatMessage) -> Self {
        Self {
            choices: vec![Choice {
                index: 0,
                message,
                finish_reason: Some("stop".to_string()),
                extra: Map::new(),
            }],
            ..Default::default()
        }
    }

    /// Sets the model that produced the response
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The reply message of the first choice
    pub fn top_message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|choice| &choice.message)
    }

    /// Text of the first choice
    pub fn content(&self) -> Option<&str> {
        self.top_message().map(|message| message.content.as_str())
    }
}
