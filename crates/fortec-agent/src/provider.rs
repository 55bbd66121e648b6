use async_trait::async_trait;

use fortec_core::Transcript;

use crate::error::UpstreamError;

/// Produces the assistant's next reply for a conversation.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Complete `transcript` (an owned snapshot) and return the reply text.
    async fn complete(&self, transcript: Transcript) -> Result<String, UpstreamError>;
}

/// Turns a text prompt into one or more image URLs.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Vec<String>, UpstreamError>;
}
