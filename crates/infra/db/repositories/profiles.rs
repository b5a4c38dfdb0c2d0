use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::profiles},
};
use domain::{
    entities::profiles::{ProfileEntity, UpsertProfileEntity},
    repositories::profiles::ProfileRepository,
};

pub struct ProfilePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProfilePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProfileRepository for ProfilePostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<ProfileEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = profiles::table
            .filter(profiles::id.eq(user_id))
            .select(ProfileEntity::as_select())
            .first::<ProfileEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn upsert_api_key(
        &self,
        user_id: Uuid,
        api_key: Option<String>,
    ) -> Result<ProfileEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payload = UpsertProfileEntity {
            id: user_id,
            generation_api_key: api_key,
            updated_at: Utc::now(),
        };

        let stored = insert_into(profiles::table)
            .values(&payload)
            .on_conflict(profiles::id)
            .do_update()
            .set(&payload)
            .returning(ProfileEntity::as_returning())
            .get_result::<ProfileEntity>(&mut conn)?;

        Ok(stored)
    }
}
