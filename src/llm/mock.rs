use super::client::LLMClient;
use super::types::{ChatMessage, LLMRequest, LLMResponse};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Scripted client that replays queued responses and remembers what it was sent
pub struct MockLLMClient {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<LLMRequest>>,
    name: String,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub response: LLMResponse,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self::response(LLMResponse::text(content))
    }

    pub fn message(message: ChatMessage) -> Self {
        Self::response(LLMResponse::from_message(message))
    }

    pub fn response(response: LLMResponse) -> Self {
        Self {
            response,
            error: None,
        }
    }

    /// A completion with no choices at all
    pub fn empty() -> Self {
        Self::response(LLMResponse::default())
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            response: LLMResponse::default(),
            error: Some(error),
        }
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::with_name("MockLLM")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            name: name.into(),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<MockResponse>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self) -> MutexGuard<'_, Vec<LLMRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_response(&self, response: MockResponse) {
        self.queue().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.queue();
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.queue().len()
    }

    /// Requests received so far, in call order
    pub fn received_requests(&self) -> Vec<LLMRequest> {
        self.log().clone()
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        self.log().push(request);

        let scripted = self
            .queue()
            .pop_front()
            .ok_or_else(|| BackendError::Other {
                message: "MockLLMClient: No more responses in queue".to_string(),
            })?;

        match scripted.error {
            Some(error) => Err(error),
            None => Ok(scripted.response),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some("mock-model".to_string())
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLLMClient")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_basic() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::text("Hello!"));

        let response = client.chat(LLMRequest::new(vec![])).await.unwrap();

        assert_eq!(response.content(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::error(BackendError::TimeoutError {
            seconds: 30,
        }));

        let result = client.chat(LLMRequest::new(vec![])).await;

        assert_eq!(result.unwrap_err(), BackendError::TimeoutError { seconds: 30 });
    }

    #[tokio::test]
    async fn test_mock_client_no_responses() {
        let client = MockLLMClient::new();

        let result = client.chat(LLMRequest::new(vec![])).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_multiple_responses() {
        let client = MockLLMClient::new();
        client.add_responses(vec![
            MockResponse::text("First"),
            MockResponse::text("Second"),
            MockResponse::text("Third"),
        ]);

        assert_eq!(client.remaining_responses(), 3);

        let r1 = client.chat(LLMRequest::new(vec![])).await.unwrap();
        assert_eq!(r1.content(), Some("First"));

        let r2 = client.chat(LLMRequest::new(vec![])).await.unwrap();
        assert_eq!(r2.content(), Some("Second"));

        assert_eq!(client.remaining_responses(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_records_requests() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::empty());

        let request = LLMRequest::new(vec![ChatMessage::user("ping")]).with_param("n", 2);
        let response = client.chat(request.clone()).await.unwrap();

        assert!(response.choices.is_empty());
        assert_eq!(client.received_requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_mock_client_survives_poisoned_lock() {
        let client = std::sync::Arc::new(MockLLMClient::new());
        let poisoner = std::sync::Arc::clone(&client);
        let _ = std::thread::spawn(move || {
            let _held = poisoner.queue();
            panic!("poison the response queue");
        })
        .join();

        client.add_response(MockResponse::text("still works"));
        let response = client.chat(LLMRequest::new(vec![])).await.unwrap();

        assert_eq!(response.content(), Some("still works"));
        assert_eq!(client.received_requests().len(), 1);
    }

    #[test]
    fn test_custom_name() {
        let client = MockLLMClient::with_name("TestClient");
        assert_eq!(client.name(), "TestClient");
    }
}
