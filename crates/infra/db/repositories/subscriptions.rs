use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::{SubscriptionChangeset, SubscriptionEntity, UpsertSubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert_if_absent(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let user_id = subscription.user_id;

        insert_into(subscriptions::table)
            .values(&subscription)
            .on_conflict(subscriptions::user_id)
            .do_nothing()
            .execute(&mut conn)?;

        let stored = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .context("subscription row missing after insert")?;

        Ok(stored)
    }

    async fn upsert_by_user_id(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let stored = insert_into(subscriptions::table)
            .values(&subscription)
            .on_conflict(subscriptions::user_id)
            .do_update()
            .set(&subscription)
            .returning(SubscriptionEntity::as_returning())
            .get_result::<SubscriptionEntity>(&mut conn)?;

        Ok(stored)
    }

    async fn update_credits_used(&self, user_id: Uuid, credits_used: i32) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .set((
                subscriptions::credits_used.eq(credits_used),
                subscriptions::updated_at.eq(chrono::Utc::now()),
            ))
            .execute(&mut conn)?;

        if updated == 0 {
            anyhow::bail!("no subscription row for user {}", user_id);
        }

        Ok(())
    }

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        changes: SubscriptionChangeset,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(subscriptions::table)
            .filter(subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .set(&changes)
            .execute(&mut conn)?;

        Ok(updated)
    }
}
