use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{
    SubscriptionChangeset, SubscriptionEntity, UpsertSubscriptionEntity,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Inserts the row unless the user already has one; returns whichever row is stored.
    async fn insert_if_absent(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity>;

    /// Whole-row upsert keyed on `user_id`; concurrent writers resolve last-write-wins.
    async fn upsert_by_user_id(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity>;

    async fn update_credits_used(&self, user_id: Uuid, credits_used: i32) -> Result<()>;

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        changes: SubscriptionChangeset,
    ) -> Result<usize>;
}
