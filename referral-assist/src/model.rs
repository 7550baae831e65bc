use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::AssistError;

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// JSON constrained by an OpenAPI-style schema.
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub format: ResponseFormat,
}

/// Anything that turns a prompt into model text.
pub trait GenerativeModel {
    fn generate(&self, request: &GenerateRequest) -> Result<String, AssistError>;
}

/// Replays queued responses and records every request it sees.
#[derive(Default)]
pub struct MockModel {
    responses: Mutex<VecDeque<Result<String, AssistError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: &str) -> Self {
        self.push(Ok(text.to_string()))
    }

    pub fn fail(self, error: AssistError) -> Self {
        self.push(Err(error))
    }

    fn push(self, response: Result<String, AssistError>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl GenerativeModel for MockModel {
    fn generate(&self, request: &GenerateRequest) -> Result<String, AssistError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(Err(AssistError::EmptyResponse))
    }
}
