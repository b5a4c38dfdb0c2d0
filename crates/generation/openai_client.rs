use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{
    repositories::generation::{GenerationFailure, ImageGenerator},
    value_objects::{emojis::EMOJI_CONTENT_TYPE, generation::GeneratedImage},
};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";
const IMAGE_QUALITY: &str = "standard";
const IMAGE_STYLE: &str = "vivid";

/// Art direction wrapped around the user's description.
const EMOJI_PROMPT_TEMPLATE: &str = "Design a single modern emoji.
Style: flat shapes with light shading, bold consistent outlines, rounded corners,
a clean silhouette that stays readable from large sizes down to 32px.
Palette: at most four saturated primary colors plus subtle highlights, good contrast.
Composition: one centered subject, generous negative space, transparent background,
no text, no numbers, no busy textures.
Keep it inclusive and culturally neutral.

Subject: {description}";

pub fn emoji_prompt(description: &str) -> String {
    EMOJI_PROMPT_TEMPLATE.replace("{description}", description)
}

/// reqwest client for the OpenAI Images API.
pub struct OpenAiImageClient {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: String,
    n: u8,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetails {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(api_base: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, GenerationFailure> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| GenerationFailure::Transport(err.to_string()))?;

        if !resp.status().is_success() {
            return Err(GenerationFailure::Transport(format!(
                "image download returned status {}",
                resp.status()
            )));
        }

        resp.bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| GenerationFailure::Transport(err.to_string()))
    }
}

/// Turns a non-success provider response into a failure kind.
fn classify_failure(status: StatusCode, body: &str) -> GenerationFailure {
    let details = serde_json::from_str::<OpenAiErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    if status == StatusCode::UNAUTHORIZED
        || details.as_ref().and_then(|d| d.code.as_deref()) == Some("invalid_api_key")
    {
        return GenerationFailure::InvalidCredential;
    }

    match details.and_then(|d| d.message).filter(|m| !m.trim().is_empty()) {
        Some(message) => GenerationFailure::Rejected(message),
        None => GenerationFailure::Transport(format!("provider returned status {status}")),
    }
}

fn decode_image(b64: &str) -> Result<Vec<u8>, GenerationFailure> {
    BASE64
        .decode(b64.trim())
        .map_err(|err| GenerationFailure::Transport(format!("invalid base64 image payload: {err}")))
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate_emoji(
        &self,
        api_key: &str,
        description: &str,
    ) -> std::result::Result<GeneratedImage, GenerationFailure> {
        // https://platform.openai.com/docs/api-reference/images/create
        let request = ImageGenerationRequest {
            model: IMAGE_MODEL,
            prompt: emoji_prompt(description),
            n: 1,
            size: IMAGE_SIZE,
            quality: IMAGE_QUALITY,
            style: IMAGE_STYLE,
            response_format: "b64_json",
        };

        let resp = self
            .http
            .post(format!("{}/images/generations", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| GenerationFailure::Transport(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let failure = classify_failure(status, &body);
            warn!(
                status = %status,
                failure = %failure,
                "openai: image generation rejected"
            );
            return Err(failure);
        }

        let parsed: ImageGenerationResponse = resp
            .json()
            .await
            .map_err(|err| GenerationFailure::Transport(err.to_string()))?;

        let image = parsed.data.into_iter().next().ok_or_else(|| {
            GenerationFailure::Transport("provider returned no image".to_string())
        })?;

        let bytes = match (image.b64_json.as_deref(), image.url.as_deref()) {
            (Some(b64), _) => decode_image(b64)?,
            (None, Some(url)) => self.download(url).await?,
            (None, None) => {
                return Err(GenerationFailure::Transport(
                    "provider returned an empty image payload".to_string(),
                ));
            }
        };

        debug!(size = bytes.len(), "openai: image generated");

        Ok(GeneratedImage {
            bytes,
            content_type: EMOJI_CONTENT_TYPE.to_string(),
            revised_prompt: image.revised_prompt,
        })
    }

    async fn validate_api_key(&self, api_key: &str) -> Result<bool> {
        // https://platform.openai.com/docs/api-reference/models/list
        let resp = self
            .http
            .get(format!("{}/models", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                let details = serde_json::from_str::<OpenAiErrorEnvelope>(&body)
                    .ok()
                    .map(|envelope| envelope.error);
                warn!(
                    status = %status,
                    error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
                    "openai: key validation request failed"
                );
                anyhow::bail!("OpenAI key validation failed with status {}", status)
            }
        }
    }
}
