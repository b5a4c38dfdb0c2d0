use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::emojis;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = emojis)]
pub struct EmojiEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub image_url: String,
    pub storage_path: String,
    pub revised_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = emojis)]
pub struct InsertEmojiEntity {
    pub user_id: Uuid,
    pub description: String,
    pub image_url: String,
    pub storage_path: String,
    pub revised_prompt: Option<String>,
}
