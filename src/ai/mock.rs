use super::gemini::image::CONTENT_POLICY_MESSAGE;
use super::ImageEditService;
use crate::models::InboundRequest;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// 1x1 transparent PNG
const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Canned responses for handler tests; records every request it receives.
pub struct MockImageEditClient {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<InboundRequest>>>,
}

#[derive(Clone)]
enum MockResponse {
    Image(String),
    Blocked(serde_json::Value),
    Unavailable,
}

impl MockImageEditClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_image_response(self, base64_data: String) -> Self {
        self.push(MockResponse::Image(base64_data))
    }

    pub fn with_blocked_response(self, details: serde_json::Value) -> Self {
        self.push(MockResponse::Blocked(details))
    }

    pub fn with_unavailable_response(self) -> Self {
        self.push(MockResponse::Unavailable)
    }

    fn push(self, response: MockResponse) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<InboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockImageEditClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEditService for MockImageEditClient {
    async fn edit_image(&self, request: &InboundRequest) -> Result<String> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        let response = {
            let responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses[(count - 1) % responses.len()].clone())
            }
        };

        match response {
            None => Ok(TINY_PNG_BASE64.to_string()),
            Some(MockResponse::Image(data)) => Ok(data),
            Some(MockResponse::Blocked(details)) => Err(Error::GenerationBlockedOrFailed {
                message: CONTENT_POLICY_MESSAGE.to_string(),
                details,
            }),
            Some(MockResponse::Unavailable) => Err(Error::UpstreamUnavailable {
                attempts: 5,
                last_error: "Gemini API error (status 503 Service Unavailable)".to_string(),
            }),
        }
    }
}
