use std::sync::Arc;

use anyhow::{Result, anyhow};
use crates::domain::repositories::subscriptions::SubscriptionRepository;
use tracing::{error, info};
use uuid::Uuid;

/// Debits one generation from the caller's subscription after the result is persisted.
pub struct CreditConsumptionService<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
}

impl<S> CreditConsumptionService<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>) -> Self {
        Self { subscription_repo }
    }

    /// Returns the new `credits_used`. Read-then-write: concurrent calls may both read the same count.
    pub async fn consume(&self, user_id: Uuid) -> Result<i32> {
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to load subscription");
                err
            })?
            .ok_or_else(|| anyhow!("no subscription found for user {}", user_id))?;

        let credits_used = subscription.credits_used.saturating_add(1);

        self.subscription_repo
            .update_credits_used(user_id, credits_used)
            .await
            .map_err(|err| {
                error!(%user_id, credits_used, db_error = ?err, "credits: failed to persist usage");
                err
            })?;

        info!(%user_id, credits_used, plan = %subscription.plan, "credits: generation consumed");
        Ok(credits_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::subscription_row;
    use crates::domain::{
        repositories::subscriptions::MockSubscriptionRepository,
        value_objects::enums::plan_tiers::PlanTier,
    };
    use mockall::predicate::eq;

    #[tokio::test]
    async fn increments_and_persists_usage() {
        let user_id = Uuid::new_v4();
        let mut repo = MockSubscriptionRepository::new();

        let row = subscription_row(user_id, PlanTier::Free, 3);
        repo.expect_find_by_user_id()
            .with(eq(user_id))
            .returning(move |_| Ok(Some(row.clone())));
        repo.expect_update_credits_used()
            .with(eq(user_id), eq(4))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = CreditConsumptionService::new(Arc::new(repo));

        assert_eq!(service.consume(user_id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn missing_subscription_is_an_error() {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_by_user_id().returning(|_| Ok(None));
        repo.expect_update_credits_used().never();

        let service = CreditConsumptionService::new(Arc::new(repo));

        assert!(service.consume(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn persist_failure_is_returned() {
        let user_id = Uuid::new_v4();
        let mut repo = MockSubscriptionRepository::new();
        let row = subscription_row(user_id, PlanTier::Pro, 0);
        repo.expect_find_by_user_id()
            .returning(move |_| Ok(Some(row.clone())));
        repo.expect_update_credits_used()
            .returning(|_, _| Err(anyhow!("connection reset")));

        let service = CreditConsumptionService::new(Arc::new(repo));

        assert!(service.consume(user_id).await.is_err());
    }
}
