use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::emojis::EmojiEntity, value_objects::entitlements::AvailableCredits,
};

pub const MAX_DESCRIPTION_CHARS: usize = 200;
pub const EMOJI_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Deserialize)]
pub struct GenerateEmojiRequest {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmojiDto {
    pub id: Uuid,
    pub description: String,
    pub image_url: String,
    pub revised_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<EmojiEntity> for EmojiDto {
    fn from(value: EmojiEntity) -> Self {
        Self {
            id: value.id,
            description: value.description,
            image_url: value.image_url,
            revised_prompt: value.revised_prompt,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedEmojiDto {
    pub emoji: EmojiDto,
    pub credits_used: Option<i32>,
    pub available_credits: Option<AvailableCredits>,
    /// Set when the generation succeeded but bookkeeping afterwards did not.
    pub warning: Option<String>,
}

/// Trims the description and enforces the length bound. Counts characters, not bytes.
pub fn normalize_description(raw: &str) -> Result<String, String> {
    let description = raw.trim();
    if description.is_empty() {
        return Err("Please enter a description".to_string());
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        ));
    }
    Ok(description.to_string())
}

/// Object key inside the emoji bucket: `{user_id}/{slug}-{unix_millis}.png`.
pub fn emoji_object_key(user_id: Uuid, description: &str, now: DateTime<Utc>) -> String {
    let slug: String = description
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    format!("{}/{}-{}.png", user_id, slug, now.timestamp_millis())
}
