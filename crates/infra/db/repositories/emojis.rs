use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::emojis},
};
use domain::{
    entities::emojis::{EmojiEntity, InsertEmojiEntity},
    repositories::emojis::EmojiRepository,
};

pub struct EmojiPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EmojiPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EmojiRepository for EmojiPostgres {
    async fn insert(&self, emoji: InsertEmojiEntity) -> Result<EmojiEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let stored = insert_into(emojis::table)
            .values(&emoji)
            .returning(EmojiEntity::as_returning())
            .get_result::<EmojiEntity>(&mut conn)?;

        Ok(stored)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<EmojiEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = emojis::table
            .filter(emojis::user_id.eq(user_id))
            .order(emojis::created_at.desc())
            .select(EmojiEntity::as_select())
            .load::<EmojiEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn find_for_user(&self, emoji_id: Uuid, user_id: Uuid) -> Result<Option<EmojiEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = emojis::table
            .filter(emojis::id.eq(emoji_id))
            .filter(emojis::user_id.eq(user_id))
            .select(EmojiEntity::as_select())
            .first::<EmojiEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn delete(&self, emoji_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(emojis::table.filter(emojis::id.eq(emoji_id))).execute(&mut conn)?;

        Ok(())
    }
}
