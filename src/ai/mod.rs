//! Upstream generative-image integration.
//!
//! [`ImageEditService`] is the seam between the HTTP handler and the provider;
//! [`GeminiImageClient`] is the production implementation.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiImageClient;
pub use mock::MockImageEditClient;

use crate::models::InboundRequest;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ImageEditService: Send + Sync {
    /// Returns the base64 image produced for `request`.
    async fn edit_image(&self, request: &InboundRequest) -> Result<String>;
}
