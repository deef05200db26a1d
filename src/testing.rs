//! Fakes for the transport and classifier seams.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{ApiRequest, ApiResponse, ChatError, Classifier, Transport};

/// A transport that replays canned responses in order and records every request.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, String>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(ApiResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ChatError> {
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ChatError::Transport { message }),
            None => panic!("no response scripted for request"),
        }
    }
}

/// A classifier that always answers with the same text.
#[derive(Debug)]
pub struct ScriptedClassifier {
    response: String,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Classifier for ScriptedClassifier {
    async fn classify(&self, user_text: &str) -> Result<String, ChatError> {
        self.calls.lock().unwrap().push(user_text.to_string());
        Ok(self.response.clone())
    }
}
