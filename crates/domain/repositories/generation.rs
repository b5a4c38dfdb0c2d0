use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::generation::GeneratedImage;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationFailure {
    #[error("OpenAI API key not configured or invalid")]
    InvalidCredential,
    /// Provider refused the request (content policy, model error). Message is passed through.
    #[error("{0}")]
    Rejected(String),
    #[error("image generation request failed: {0}")]
    Transport(String),
}

#[automock]
#[async_trait]
pub trait ImageGenerator {
    async fn generate_emoji(
        &self,
        api_key: &str,
        description: &str,
    ) -> std::result::Result<GeneratedImage, GenerationFailure>;

    /// `Ok(false)` when the provider rejects the key; `Err` only for transport problems.
    async fn validate_api_key(&self, api_key: &str) -> Result<bool>;
}
