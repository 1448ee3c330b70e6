pub mod content_client;

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{GeneratedImage, ImagePart, ResponseModality},
};

pub use content_client::GeminiClient;

/// One call to the generative model: reference images, then the instruction.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub prompt: String,
    pub images: Vec<ImagePart>,
    pub modalities: Vec<ResponseModality>,
    pub temperature: Option<f32>,
}

/// What the model sent back: any number of images plus concatenated text parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamOutput {
    pub images: Vec<GeneratedImage>,
    pub text: String,
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Fails with `ConfigurationError` when the backend cannot call upstream at all.
    fn ensure_configured(&self) -> Result<()>;

    async fn generate(&self, request: &UpstreamRequest) -> Result<UpstreamOutput>;
}
