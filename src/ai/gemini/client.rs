use crate::models::DEFAULT_GEMINI_BASE_URL;
use crate::retry::{is_retriable_status, AttemptOutcome, RetryPolicy};
use crate::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Gemini REST client that wraps every call in the configured retry policy.
pub struct GeminiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiHttpClient {
    pub fn new(api_key: String, timeout: Duration, retry: RetryPolicy) -> Self {
        Self::new_with_client(api_key, timeout, retry, Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        timeout: Duration,
        retry: RetryPolicy,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout,
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Endpoint for `model`, without the credential.
    ///
    /// `model` may carry a `models/` prefix; it is stripped.
    pub fn generate_content_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Calls `generateContent` with retry and returns the raw JSON response.
    pub async fn generate_content<Req: Serialize>(
        &self,
        model: &str,
        request: &Req,
    ) -> Result<serde_json::Value> {
        let url = self.generate_content_url(model);
        // Serialized once; every attempt sends the same bytes.
        let payload = serde_json::to_vec(request)?;

        tracing::debug!(
            url = %url,
            payload_bytes = payload.len(),
            "Sending generateContent request to Gemini"
        );

        let body = self
            .retry
            .run(|_| self.attempt(&url, payload.clone()))
            .await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}\nBody: {}", e, body);
            Error::Internal(format!("Failed to parse Gemini response: {}", e))
        })
    }

    async fn attempt(&self, url: &str, payload: Vec<u8>) -> AttemptOutcome<String> {
        let sent = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await;

        // The query string carries the credential, so URLs are stripped
        // from every reqwest error before it is logged or surfaced.
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                return AttemptOutcome::Retriable(format!(
                    "Failed to send request to Gemini: {}",
                    e.without_url()
                ))
            }
        };

        let status = response.status();

        if status.is_success() {
            return match response.text().await {
                Ok(body) => AttemptOutcome::Success(body),
                Err(e) => AttemptOutcome::Retriable(format!(
                    "Failed to read Gemini response body: {}",
                    e.without_url()
                )),
            };
        }

        if is_retriable_status(status) {
            return AttemptOutcome::Retriable(format!("Gemini API error (status {})", status));
        }

        let body = response.text().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read Gemini error body: {}", e.without_url());
            String::new()
        });
        tracing::error!("Gemini API error (status {}): {}", status, body);

        AttemptOutcome::Fatal(Error::UpstreamRejected {
            status: status.as_u16(),
            body,
        })
    }
}
