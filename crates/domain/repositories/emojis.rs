use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::emojis::{EmojiEntity, InsertEmojiEntity};

#[automock]
#[async_trait]
pub trait EmojiRepository {
    async fn insert(&self, emoji: InsertEmojiEntity) -> Result<EmojiEntity>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<EmojiEntity>>;
    async fn find_for_user(&self, emoji_id: Uuid, user_id: Uuid) -> Result<Option<EmojiEntity>>;
    async fn delete(&self, emoji_id: Uuid) -> Result<()>;
}
