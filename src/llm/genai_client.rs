//! GenAI-based LLM client (structured call-site shape)
//!
//! Messages are converted to the `genai` crate's structured chat types and the
//! supported parameters are mapped to `ChatOptions`. Requests this shape cannot
//! express are rejected before anything is sent. The reply, including tool calls
//! and usage, is normalized back into the uniform [`LLMResponse`] shape.

use super::client::LLMClient;
use super::types::{ChatMessage, Choice, LLMRequest, LLMResponse, MessageRole};
use crate::config::{BackendConfig, DEFAULT_ENDPOINT};
use crate::error::BackendError;
use async_trait::async_trait;
use genai::chat::{
    ChatMessage as GenAIChatMessage, ChatOptions, ChatRequest as GenAIChatRequest,
    MessageContent, ToolCall, ToolResponse,
};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ServiceTarget};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error};

/// GenAI-based LLM client supporting multiple providers
///
/// The provider is inferred by `genai` from the model name; credentials come
/// from the configuration when given, otherwise from the provider's usual
/// environment variable.
pub struct GenAIClient {
    /// GenAI client instance
    client: Client,
    /// Model used when the request does not name one
    model: String,
    /// Request timeout
    timeout: Duration,
}

impl GenAIClient {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            timeout,
        }
    }

    /// Creates a client, routing requests to a custom endpoint or key when the
    /// configuration sets one
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let custom_endpoint = config.endpoint.trim_end_matches('/') != DEFAULT_ENDPOINT;
        if !custom_endpoint && config.api_key.is_none() {
            return Ok(Self::new(&config.model, config.timeout()));
        }

        debug!(
            "Using custom GenAI service target: endpoint={}, api_key={}",
            config.endpoint,
            config.api_key.is_some()
        );

        let endpoint_url = format!("{}/", config.endpoint.trim_end_matches('/'));
        let api_key = config.api_key.clone();

        let resolver = ServiceTargetResolver::from_resolver_fn(
            move |service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                let ServiceTarget {
                    endpoint,
                    auth,
                    model,
                } = service_target;

                let endpoint = if custom_endpoint {
                    Endpoint::from_owned(endpoint_url.clone())
                } else {
                    endpoint
                };
                let auth = match &api_key {
                    Some(key) => AuthData::from_single(key.clone()),
                    None => auth,
                };

                Ok(ServiceTarget {
                    endpoint,
                    auth,
                    model,
                })
            },
        );

        Ok(Self {
            client: Client::builder()
                .with_service_target_resolver(resolver)
                .build(),
            model: config.model.clone(),
            timeout: config.timeout(),
        })
    }

    /// Converts our ChatMessage to genai ChatMessage
    ///
    /// Fails when the message carries something genai's structured types cannot
    /// represent, rather than sending an altered conversation.
    fn convert_message(msg: &ChatMessage) -> Result<GenAIChatMessage, BackendError> {
        let allowed: &[&str] = match msg.role {
            MessageRole::Assistant => &["tool_calls"],
            MessageRole::Tool => &["tool_call_id"],
            _ => &[],
        };
        let mut dropped: Vec<&str> = msg
            .extra
            .keys()
            .map(String::as_str)
            .filter(|key| !allowed.contains(key))
            .collect();
        if !dropped.is_empty() {
            dropped.sort_unstable();
            return Err(unsupported(format!(
                "{} message fields {}",
                msg.role.as_str(),
                dropped.join(", ")
            )));
        }

        let converted = match &msg.role {
            MessageRole::System | MessageRole::Developer => GenAIChatMessage::system(&msg.content),
            MessageRole::User => GenAIChatMessage::user(&msg.content),
            MessageRole::Assistant => match msg.extra.get("tool_calls") {
                Some(calls) => {
                    if !msg.content.is_empty() {
                        return Err(unsupported(
                            "assistant message with both text and tool calls".to_string(),
                        ));
                    }
                    GenAIChatMessage::assistant(MessageContent::from_tool_calls(
                        tool_calls_from_json(calls)?,
                    ))
                }
                None => GenAIChatMessage::assistant(&msg.content),
            },
            MessageRole::Tool => {
                let call_id = msg
                    .extra
                    .get("tool_call_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| unsupported("tool message without tool_call_id".to_string()))?;
                ToolResponse {
                    call_id: call_id.to_string(),
                    content: msg.content.clone(),
                }
                .into()
            }
            MessageRole::Other(role) => {
                return Err(unsupported(format!("message role '{}'", role)));
            }
        };

        Ok(converted)
    }
}

fn unsupported(what: String) -> BackendError {
    BackendError::ConfigurationError {
        message: format!("The structured client shape cannot express {}", what),
    }
}

/// Maps pass-through parameters onto `ChatOptions`
///
/// Any parameter this shape cannot express is an error naming every such
/// parameter.
fn chat_options(params: &Map<String, Value>) -> Result<ChatOptions, BackendError> {
    let mut options = ChatOptions::default();
    let mut rejected = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "model" => {}
            "temperature" => match value.as_f64() {
                Some(temp) => options = options.with_temperature(temp),
                None => rejected.push(key.as_str()),
            },
            "top_p" => match value.as_f64() {
                Some(top_p) => options = options.with_top_p(top_p),
                None => rejected.push(key.as_str()),
            },
            "max_tokens" => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(max_tokens) => options = options.with_max_tokens(max_tokens),
                None => rejected.push(key.as_str()),
            },
            "stop" => match stop_sequences(value) {
                Some(sequences) => options = options.with_stop_sequences(sequences),
                None => rejected.push(key.as_str()),
            },
            _ => rejected.push(key.as_str()),
        }
    }

    if rejected.is_empty() {
        Ok(options)
    } else {
        rejected.sort_unstable();
        Err(unsupported(format!("parameters {}", rejected.join(", "))))
    }
}

fn stop_sequences(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Reads OpenAI-style `tool_calls` into genai tool calls
fn tool_calls_from_json(calls: &Value) -> Result<Vec<ToolCall>, BackendError> {
    let malformed = || unsupported(format!("malformed tool_calls {}", calls));

    calls
        .as_array()
        .ok_or_else(malformed)?
        .iter()
        .map(|call| {
            let call_id = call
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(malformed)?;
            let function = call.get("function").ok_or_else(malformed)?;
            let fn_name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(malformed)?;
            let fn_arguments = match function.get("arguments") {
                Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|_| malformed())?,
                Some(other) => other.clone(),
                None => Value::Object(Map::new()),
            };
            Ok(ToolCall {
                call_id: call_id.to_string(),
                fn_name: fn_name.to_string(),
                fn_arguments,
            })
        })
        .collect()
}

/// Writes a genai tool call in the OpenAI `tool_calls` format
fn tool_call_json(call: &ToolCall) -> Value {
    json!({
        "id": call.call_id,
        "type": "function",
        "function": {
            "name": call.fn_name,
            "arguments": call.fn_arguments.to_string(),
        }
    })
}

/// Builds the assistant reply from genai's text and tool calls
///
/// A reply with neither is reported instead of being turned into an empty
/// message.
fn reply_message(
    text: Option<&str>,
    tool_calls: &[&ToolCall],
) -> Result<ChatMessage, BackendError> {
    if text.is_none() && tool_calls.is_empty() {
        return Err(BackendError::InvalidResponse {
            message: "Structured client returned neither text nor tool calls".to_string(),
            raw_response: None,
        });
    }

    let mut reply = ChatMessage::assistant(text.unwrap_or_default());
    if !tool_calls.is_empty() {
        let calls: Vec<Value> = tool_calls.iter().map(|call| tool_call_json(call)).collect();
        reply = reply.with_field("tool_calls", calls);
    }
    Ok(reply)
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let model = request.model().unwrap_or(&self.model).to_string();

        let options = chat_options(&request.params)?;
        let messages = request
            .messages
            .iter()
            .map(Self::convert_message)
            .collect::<Result<Vec<_>, _>>()?;
        let genai_request = GenAIChatRequest::new(messages);

        let response = match tokio::time::timeout(
            self.timeout,
            self.client.exec_chat(&model, genai_request, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!("{} request failed: {}", model, e);
                return Err(BackendError::ApiError {
                    message: format!("{} request failed: {}", model, e),
                    status_code: None,
                });
            }
            Err(_) => {
                error!(
                    "{} request timed out after {}s",
                    model,
                    self.timeout.as_secs()
                );
                return Err(BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let reply = reply_message(response.first_text(), &response.tool_calls())?;

        // genai does not surface the provider's finish reason
        Ok(LLMResponse {
            model: Some(model),
            choices: vec![Choice {
                index: 0,
                message: reply,
                finish_reason: None,
                extra: Map::new(),
            }],
            usage: serde_json::to_value(&response.usage).ok(),
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "GenAI"
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_genai_client_creation() {
        let client = GenAIClient::new("gpt-4o-mini", Duration::from_secs(30));

        assert_eq!(client.name(), "GenAI");
        assert_eq!(client.model_info(), Some("gpt-4o-mini".to_string()));
    }

    #[test]
    fn test_from_config_with_custom_endpoint() {
        let config = BackendConfig::new("http://localhost:11434/v1", "llama3")
            .with_api_key("local-key");
        let client = GenAIClient::from_config(&config).unwrap();
        assert_eq!(client.model_info(), Some("llama3".to_string()));
    }

    fn configuration_message(err: BackendError) -> String {
        match err {
            BackendError::ConfigurationError { message } => message,
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_supported_params_are_mapped() {
        let options = chat_options(&params(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.2,
            "top_p": 0.9,
            "max_tokens": 128,
            "stop": ["\n\n"]
        })));
        assert!(options.is_ok());
    }

    #[test]
    fn test_unsupported_params_are_rejected_by_name() {
        let err = chat_options(&params(json!({
            "temperature": "hot",
            "logit_bias": {"50256": -100},
            "stop": 3
        })))
        .unwrap_err();

        let message = configuration_message(err);
        assert!(message.ends_with("parameters logit_bias, stop, temperature"));
    }

    #[test]
    fn test_message_extras_are_rejected() {
        let named = ChatMessage::user("hi").with_field("name", "alice");
        let message = configuration_message(GenAIClient::convert_message(&named).unwrap_err());
        assert!(message.contains("user message fields name"));

        let legacy = ChatMessage::new(MessageRole::Other("function".to_string()), "42");
        let message = configuration_message(GenAIClient::convert_message(&legacy).unwrap_err());
        assert!(message.contains("role 'function'"));
    }

    #[test]
    fn test_tool_messages_convert() {
        let call = ChatMessage::assistant("").with_field(
            "tool_calls",
            json!([{
                "id": "call_1",
                "type": "function",
                "function": {"name": "read_file", "arguments": "{\"path\":\"Cargo.toml\"}"}
            }]),
        );
        assert!(GenAIClient::convert_message(&call).is_ok());

        let result = ChatMessage::tool_response("call_1", "[package]");
        assert!(GenAIClient::convert_message(&result).is_ok());

        let orphan = ChatMessage::new(MessageRole::Tool, "[package]");
        assert!(GenAIClient::convert_message(&orphan).is_err());
    }

    #[test]
    fn test_tool_calls_from_json() {
        let calls = tool_calls_from_json(&json!([{
            "id": "call_7",
            "type": "function",
            "function": {"name": "list_files", "arguments": "{\"dir\":\"src\"}"}
        }]))
        .unwrap();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id, "call_7");
        assert_eq!(calls[0].fn_name, "list_files");
        assert_eq!(calls[0].fn_arguments, json!({"dir": "src"}));

        assert!(tool_calls_from_json(&json!([{"id": "call_8"}])).is_err());
        assert!(tool_calls_from_json(&json!({"id": "call_9"})).is_err());
    }

    #[test]
    fn test_reply_without_content_is_invalid() {
        let err = reply_message(None, &[]).unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse { .. }));
    }

    #[test]
    fn test_reply_keeps_text_and_tool_calls() {
        assert_eq!(
            reply_message(Some("hello"), &[]).unwrap(),
            ChatMessage::assistant("hello")
        );

        let call = ToolCall {
            call_id: "call_1".to_string(),
            fn_name: "read_file".to_string(),
            fn_arguments: json!({"path": "README.md"}),
        };
        let reply = reply_message(None, &[&call]).unwrap();

        assert_eq!(reply.content, "");
        assert_eq!(
            reply.extra.get("tool_calls"),
            Some(&json!([{
                "id": "call_1",
                "type": "function",
                "function": {"name": "read_file", "arguments": "{\"path\":\"README.md\"}"}
            }]))
        );
    }

    #[test]
    fn test_stop_sequences() {
        assert_eq!(stop_sequences(&json!("END")), Some(vec!["END".to_string()]));
        assert_eq!(
            stop_sequences(&json!(["a", "b"])),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(stop_sequences(&json!(["a", 1])), None);
    }

    #[test]
    fn test_debug_impl() {
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_debug::<GenAIClient>();
    }
}
