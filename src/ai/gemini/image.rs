use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentRequest, GenerationConfig, InlineData, Part};
use crate::ai::ImageEditService;
use crate::models::{Config, InboundRequest};
use crate::{Error, Result};
use async_trait::async_trait;

pub const CONTENT_POLICY_MESSAGE: &str =
    "Image generation was blocked by the provider's content policy.";
pub const GENERATION_FAILED_MESSAGE: &str =
    "Image generation failed: the model returned no image data.";

pub struct GeminiImageClient {
    http: GeminiHttpClient,
}

impl GeminiImageClient {
    pub fn new(http: GeminiHttpClient) -> Self {
        Self { http }
    }

    /// Build a client from process configuration.
    ///
    /// Fails with [`Error::ServerMisconfigured`] when no API key is set.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| Error::ServerMisconfigured("GEMINI_API_KEY is not set".to_string()))?;

        let http = GeminiHttpClient::new_with_client(
            api_key,
            config.request_timeout,
            config.retry_policy(),
            client,
        )
        .with_base_url(config.gemini_base_url.clone());

        Ok(Self::new(http))
    }

    pub fn build_request(request: &InboundRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::Text {
                        text: request.prompt_text.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        }
    }

    /// Pull the first inline image out of the first candidate.
    ///
    /// A response without one is a generation failure; a `HIGH` first safety
    /// rating on the first candidate marks it as a content-policy block.
    ///
    /// The response is read field by field rather than decoded as a whole, so
    /// a missing `mimeType` or a `null` sibling cannot hide an image.
    pub fn extract_image(raw: serde_json::Value) -> Result<String> {
        let first = raw.pointer("/candidates/0");

        let image = first
            .and_then(|c| c.pointer("/content/parts"))
            .and_then(serde_json::Value::as_array)
            .and_then(|parts| parts.iter().find_map(inline_data));

        if let Some(data) = image {
            tracing::debug!("Gemini returned image ({} base64 chars)", data.len());
            return Ok(data.to_string());
        }

        let top_rating = first.and_then(|c| c.pointer("/safetyRatings/0"));
        let rating_field = |name: &str| {
            top_rating
                .and_then(|r| r.get(name))
                .and_then(serde_json::Value::as_str)
        };
        let blocked = rating_field("probability") == Some("HIGH");

        let message = if blocked {
            CONTENT_POLICY_MESSAGE
        } else {
            GENERATION_FAILED_MESSAGE
        };

        tracing::error!(
            blocked,
            category = rating_field("category").unwrap_or("none"),
            finish_reason = first
                .and_then(|c| c.get("finishReason"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("none"),
            "No image data in Gemini response"
        );

        Err(Error::GenerationBlockedOrFailed {
            message: message.to_string(),
            details: raw,
        })
    }
}

/// Base64 payload of a part carrying inline binary data, if any.
fn inline_data(part: &serde_json::Value) -> Option<&str> {
    part.get("inlineData")
        .or_else(|| part.get("inline_data"))
        .and_then(|inline| inline.get("data"))
        .and_then(serde_json::Value::as_str)
        .filter(|data| !data.is_empty())
}

#[async_trait]
impl ImageEditService for GeminiImageClient {
    async fn edit_image(&self, request: &InboundRequest) -> Result<String> {
        let payload = Self::build_request(request);
        let raw = self.http.generate_content(&request.model, &payload).await?;
        Self::extract_image(raw)
    }
}
