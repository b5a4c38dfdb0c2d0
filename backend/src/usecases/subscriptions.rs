use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use crates::{
    domain::{
        entities::subscriptions::{SubscriptionChangeset, UpsertSubscriptionEntity},
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{
            entitlements::EntitlementSnapshot,
            enums::{plan_tiers::PlanTier, subscription_statuses::SubscriptionStatus},
            plans::{FREE_PERIOD_DAYS, PlanCatalog, PlanDefinition},
            subscriptions::{
                CheckoutSessionDto, CurrentSubscriptionDto, PortalSessionDto,
                ProviderSubscriptionState, SubscriptionDto,
            },
        },
    },
    payments::stripe_client::{StripeClient, StripeEvent, StripeSubscription},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        price_id: &str,
        user_id: Uuid,
        customer_id: Option<String>,
    ) -> AnyResult<CheckoutSessionDto>;

    async fn create_billing_portal_session(&self, customer_id: &str) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        price_id: &str,
        user_id: Uuid,
        customer_id: Option<String>,
    ) -> AnyResult<CheckoutSessionDto> {
        self.create_checkout_session(price_id, user_id, customer_id)
            .await
    }

    async fn create_billing_portal_session(&self, customer_id: &str) -> AnyResult<String> {
        self.create_billing_portal_session(customer_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("unknown plan: {0}")]
    InvalidPlan(String),
    #[error("the Free plan does not require checkout")]
    FreePlanCheckout,
    #[error("plan {0} is not available for purchase")]
    MissingPrice(PlanTier),
    #[error("no billing account found for this user")]
    NoBillingAccount,
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::InvalidPlan(_)
            | SubscriptionError::FreePlanCheckout
            | SubscriptionError::MissingPrice(_)
            | SubscriptionError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::NoBillingAccount => StatusCode::NOT_FOUND,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

/// What a webhook delivery did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    /// Already reflected in the stored row (redelivery).
    Unchanged,
    Ignored,
}

pub struct SubscriptionUseCase<S, Stripe>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
    catalog: Arc<PlanCatalog>,
}

impl<S, Stripe> SubscriptionUseCase<S, Stripe>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, stripe_client: Arc<Stripe>, catalog: Arc<PlanCatalog>) -> Self {
        Self {
            subscription_repo,
            stripe_client,
            catalog,
        }
    }

    pub fn list_plans(&self) -> Vec<PlanDefinition> {
        self.catalog.plans().to_vec()
    }

    pub async fn current(&self, user_id: Uuid) -> UseCaseResult<CurrentSubscriptionDto> {
        info!(%user_id, "subscriptions: loading current subscription");
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?;

        let entitlement = EntitlementSnapshot::evaluate(subscription.as_ref(), Utc::now());

        Ok(CurrentSubscriptionDto {
            subscription: subscription.map(SubscriptionDto::from),
            entitlement,
        })
    }

    /// Onboarding and Free fallback. A row that is active and inside its period is
    /// returned untouched; a lapsed or canceled row restarts on a fresh Free period.
    pub async fn activate_free(&self, user_id: Uuid) -> UseCaseResult<SubscriptionDto> {
        let now = Utc::now();
        let existing = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription before onboarding");
                SubscriptionError::Internal(err)
            })?;

        if let Some(existing) = existing.as_ref() {
            if existing.subscription_status().is_active() && now < existing.current_period_end {
                info!(%user_id, plan = %existing.plan, "subscriptions: onboarding skipped, subscription still current");
                return Ok(existing.clone().into());
            }
        }

        let mut row = UpsertSubscriptionEntity {
            user_id,
            plan: PlanTier::Free.to_string(),
            credits_used: 0,
            current_period_start: now,
            current_period_end: now + Duration::days(FREE_PERIOD_DAYS),
            status: SubscriptionStatus::Active.to_string(),
            cancel_at_period_end: false,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            updated_at: now,
        };

        let stored = match existing {
            None => self.subscription_repo.insert_if_absent(row).await,
            Some(lapsed) => {
                // Keep the billing account so the portal and later checkouts still find it.
                // A provider subscription that was not canceled may still renew; keep its link.
                if lapsed.subscription_status() != SubscriptionStatus::Canceled {
                    row.stripe_subscription_id = lapsed.stripe_subscription_id.clone();
                }
                row.stripe_customer_id = lapsed.stripe_customer_id.clone();
                info!(
                    %user_id,
                    previous_plan = %lapsed.plan,
                    previous_status = %lapsed.status,
                    "subscriptions: restarting lapsed subscription on the free plan"
                );
                self.subscription_repo.upsert_by_user_id(row).await
            }
        }
        .map_err(|err| {
            error!(%user_id, db_error = ?err, "subscriptions: failed to activate free plan");
            SubscriptionError::Internal(err)
        })?;

        info!(%user_id, plan = %stored.plan, "subscriptions: onboarding complete");
        Ok(stored.into())
    }

    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        plan: &str,
    ) -> UseCaseResult<CheckoutSessionDto> {
        info!(%user_id, plan, "subscriptions: create checkout session requested");

        let tier = PlanTier::from_str(plan).ok_or_else(|| {
            let err = SubscriptionError::InvalidPlan(plan.to_string());
            warn!(%user_id, plan, status = err.status_code().as_u16(), "subscriptions: unknown plan");
            err
        })?;

        if !tier.is_paid() {
            let err = SubscriptionError::FreePlanCheckout;
            warn!(%user_id, status = err.status_code().as_u16(), "subscriptions: free plan checkout attempted");
            return Err(err);
        }

        let price_id = self.catalog.price_id_for(tier).ok_or_else(|| {
            let err = SubscriptionError::MissingPrice(tier);
            warn!(%user_id, plan = %tier, status = err.status_code().as_u16(), "subscriptions: plan has no price configured");
            err
        })?;

        let customer_id = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription before checkout");
                SubscriptionError::Internal(err)
            })?
            .and_then(|row| row.stripe_customer_id);

        let session = self
            .stripe_client
            .create_checkout_session(price_id, user_id, customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, plan = %tier, error = ?err, "subscriptions: failed to create checkout session");
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, plan = %tier, session_id = %session.session_id, "subscriptions: checkout session created");
        Ok(session)
    }

    pub async fn create_portal(&self, user_id: Uuid) -> UseCaseResult<PortalSessionDto> {
        let customer_id = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(SubscriptionError::Internal)?
            .and_then(|row| row.stripe_customer_id)
            .ok_or(SubscriptionError::NoBillingAccount)?;

        let url = self
            .stripe_client
            .create_billing_portal_session(&customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "subscriptions: failed to create portal session");
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, "subscriptions: billing portal session created");
        Ok(PortalSessionDto { url })
    }

    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        let signature = signature
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SubscriptionError::InvalidWebhook("missing stripe-signature header".into()))?;

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "subscriptions: webhook verification failed");
                SubscriptionError::InvalidWebhook(err.to_string())
            })?;

        info!(event_id = ?event.id, event_type = %event.type_, "subscriptions: webhook received");

        let outcome = match event.type_.as_str() {
            CHECKOUT_COMPLETED => self.on_checkout_completed(&event).await?,
            SUBSCRIPTION_UPDATED => self.on_subscription_updated(&event).await?,
            SUBSCRIPTION_DELETED => self.on_subscription_deleted(&event).await?,
            _ => WebhookOutcome::Ignored,
        };

        info!(event_id = ?event.id, event_type = %event.type_, outcome = ?outcome, "subscriptions: webhook handled");
        Ok(outcome)
    }

    async fn on_checkout_completed(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let Some(session) = StripeClient::extract_checkout_session(event) else {
            warn!(event_id = ?event.id, "subscriptions: checkout event without a session object");
            return Ok(WebhookOutcome::Ignored);
        };

        let (Some(user_id), Some(subscription_id)) = (session.user_id(), session.subscription.as_deref())
        else {
            warn!(
                event_id = ?event.id,
                session_id = ?session.id,
                "subscriptions: checkout session missing user reference or subscription"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let provider = self
            .stripe_client
            .retrieve_subscription(subscription_id)
            .await
            .and_then(|subscription| subscription.to_provider_state(&self.catalog))
            .map_err(|err| {
                error!(%user_id, subscription_id, error = ?err, "subscriptions: failed to load provider subscription");
                SubscriptionError::Internal(err)
            })?;

        let existing = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(SubscriptionError::Internal)?;

        if let Some(existing) = existing.as_ref() {
            if existing.stripe_subscription_id.as_deref() == Some(provider.subscription_id.as_str())
                && existing.current_period_start == provider.current_period_start
            {
                info!(%user_id, subscription_id, "subscriptions: checkout already applied");
                return Ok(WebhookOutcome::Unchanged);
            }
        }

        let tier = provider.tier.unwrap_or_default();
        let row = UpsertSubscriptionEntity {
            user_id,
            plan: tier.to_string(),
            credits_used: 0,
            current_period_start: provider.current_period_start,
            current_period_end: provider.current_period_end,
            status: provider
                .status
                .clone()
                .unwrap_or_else(|| SubscriptionStatus::Unknown.to_string()),
            cancel_at_period_end: provider.cancel_at_period_end,
            stripe_customer_id: provider.customer_id.clone().or(session.customer.clone()),
            stripe_subscription_id: Some(provider.subscription_id.clone()),
            updated_at: Utc::now(),
        };

        self.subscription_repo
            .upsert_by_user_id(row)
            .await
            .map_err(|err| {
                error!(%user_id, subscription_id, db_error = ?err, "subscriptions: failed to store paid subscription");
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, plan = %tier, subscription_id, "subscriptions: paid plan activated");
        Ok(WebhookOutcome::Applied)
    }

    async fn on_subscription_updated(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let Some(subscription) = StripeClient::extract_subscription(event) else {
            warn!(event_id = ?event.id, "subscriptions: update event without a subscription object");
            return Ok(WebhookOutcome::Ignored);
        };

        let provider = subscription
            .to_provider_state(&self.catalog)
            .map_err(|err| {
                warn!(event_id = ?event.id, error = %err, "subscriptions: unusable subscription payload");
                SubscriptionError::InvalidWebhook(err.to_string())
            })?;

        let Some(existing) = self
            .subscription_repo
            .find_by_stripe_subscription_id(&provider.subscription_id)
            .await
            .map_err(SubscriptionError::Internal)?
        else {
            warn!(subscription_id = %provider.subscription_id, "subscriptions: update for unknown subscription");
            return Ok(WebhookOutcome::Ignored);
        };

        let changes = changes_from_provider(&existing, &provider);
        if changes.is_empty() {
            return Ok(WebhookOutcome::Unchanged);
        }

        let period_reset = changes.credits_used == Some(0);
        self.apply_changes(&provider.subscription_id, changes).await?;

        info!(
            user_id = %existing.user_id,
            subscription_id = %provider.subscription_id,
            status = ?provider.status,
            period_reset,
            "subscriptions: subscription updated from provider"
        );
        Ok(WebhookOutcome::Applied)
    }

    async fn on_subscription_deleted(&self, event: &StripeEvent) -> UseCaseResult<WebhookOutcome> {
        let Some(subscription) = StripeClient::extract_subscription(event) else {
            warn!(event_id = ?event.id, "subscriptions: delete event without a subscription object");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(existing) = self
            .subscription_repo
            .find_by_stripe_subscription_id(&subscription.id)
            .await
            .map_err(SubscriptionError::Internal)?
        else {
            warn!(subscription_id = %subscription.id, "subscriptions: delete for unknown subscription");
            return Ok(WebhookOutcome::Ignored);
        };

        if existing.subscription_status() == SubscriptionStatus::Canceled {
            return Ok(WebhookOutcome::Unchanged);
        }

        let changes = SubscriptionChangeset {
            status: Some(SubscriptionStatus::Canceled.to_string()),
            ..Default::default()
        };
        self.apply_changes(&subscription.id, changes).await?;

        info!(user_id = %existing.user_id, subscription_id = %subscription.id, "subscriptions: subscription canceled");
        Ok(WebhookOutcome::Applied)
    }

    async fn apply_changes(
        &self,
        subscription_id: &str,
        mut changes: SubscriptionChangeset,
    ) -> UseCaseResult<()> {
        changes.updated_at = Some(Utc::now());
        self.subscription_repo
            .update_by_stripe_subscription_id(subscription_id, changes)
            .await
            .map_err(|err| {
                error!(subscription_id, db_error = ?err, "subscriptions: failed to apply provider changes");
                SubscriptionError::Internal(err)
            })?;
        Ok(())
    }
}

/// Diff between the stored row and the provider's view. Empty when nothing moved.
fn changes_from_provider(
    existing: &crates::domain::entities::subscriptions::SubscriptionEntity,
    provider: &ProviderSubscriptionState,
) -> SubscriptionChangeset {
    fn differs<T: PartialEq + Clone>(current: &T, incoming: &T) -> Option<T> {
        (current != incoming).then(|| incoming.clone())
    }

    // Unknown prices and absent statuses leave the stored values alone.
    let plan = provider.tier.map(|tier| tier.to_string());
    let new_period = provider.current_period_start > existing.current_period_start;

    SubscriptionChangeset {
        plan: plan.and_then(|plan| differs(&existing.plan, &plan)),
        credits_used: (new_period && existing.credits_used != 0).then_some(0),
        current_period_start: differs(&existing.current_period_start, &provider.current_period_start),
        current_period_end: differs(&existing.current_period_end, &provider.current_period_end),
        status: provider
            .status
            .as_ref()
            .and_then(|status| differs(&existing.status, status)),
        cancel_at_period_end: differs(&existing.cancel_at_period_end, &provider.cancel_at_period_end),
        updated_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{InMemorySubscriptions, subscription_row};
    use crates::{
        domain::repositories::subscriptions::MockSubscriptionRepository,
        payments::stripe_client::StripeSubscription,
    };
    use chrono::DateTime;
    use mockall::predicate::eq;

    const PERIOD_START: i64 = 1_700_000_000;
    const PERIOD_END: i64 = 1_702_592_000;

    fn catalog() -> Arc<PlanCatalog> {
        Arc::new(PlanCatalog::new(
            Some("price_pro".into()),
            Some("price_ent".into()),
        ))
    }

    fn event(type_: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": type_,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn provider_subscription(price: &str, status: &str, start: i64, end: i64) -> serde_json::Value {
        serde_json::json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": status,
            "cancel_at_period_end": false,
            "current_period_start": start,
            "current_period_end": end,
            "items": { "data": [{ "price": { "id": price } }] }
        })
    }

    fn gateway_returning(event: StripeEvent, subscription: Option<serde_json::Value>) -> MockStripeGateway {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        if let Some(subscription) = subscription {
            let subscription: StripeSubscription = serde_json::from_value(subscription).unwrap();
            stripe
                .expect_retrieve_subscription()
                .returning(move |_| Ok(subscription.clone()));
        }
        stripe
    }

    fn paid_row(user_id: Uuid, credits_used: i32) -> crates::domain::entities::subscriptions::SubscriptionEntity {
        let mut row = subscription_row(user_id, PlanTier::Pro, credits_used);
        row.stripe_customer_id = Some("cus_1".into());
        row.stripe_subscription_id = Some("sub_1".into());
        row.current_period_start = DateTime::from_timestamp(PERIOD_START, 0).unwrap();
        row.current_period_end = DateTime::from_timestamp(PERIOD_END, 0).unwrap();
        row
    }

    #[tokio::test]
    async fn checkout_rejects_free_and_unknown_plans() {
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_find_by_user_id().never();
        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_checkout_session().never();

        let usecase = SubscriptionUseCase::new(Arc::new(repo), Arc::new(stripe), catalog());
        let user_id = Uuid::new_v4();

        assert!(matches!(
            usecase.create_checkout(user_id, "Free").await,
            Err(SubscriptionError::FreePlanCheckout)
        ));
        assert!(matches!(
            usecase.create_checkout(user_id, "Platinum").await,
            Err(SubscriptionError::InvalidPlan(_))
        ));
    }

    #[tokio::test]
    async fn checkout_rejects_plan_without_price() {
        let usecase = SubscriptionUseCase::new(
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockStripeGateway::new()),
            Arc::new(PlanCatalog::new(Some("price_pro".into()), None)),
        );

        let err = usecase
            .create_checkout(Uuid::new_v4(), "Enterprise")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_passes_price_and_existing_customer() {
        let user_id = Uuid::new_v4();
        let mut repo = MockSubscriptionRepository::new();
        let row = paid_row(user_id, 0);
        repo.expect_find_by_user_id()
            .with(eq(user_id))
            .returning(move |_| Ok(Some(row.clone())));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_create_checkout_session()
            .withf(move |price, uid, customer| {
                price == "price_pro" && *uid == user_id && customer.as_deref() == Some("cus_1")
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(CheckoutSessionDto {
                    session_id: "cs_1".into(),
                    url: "https://checkout.stripe.com/c/cs_1".into(),
                })
            });

        let usecase = SubscriptionUseCase::new(Arc::new(repo), Arc::new(stripe), catalog());
        let session = usecase.create_checkout(user_id, "pro").await.unwrap();

        assert_eq!(session.session_id, "cs_1");
    }

    #[tokio::test]
    async fn portal_requires_billing_account() {
        let user_id = Uuid::new_v4();
        let repo = InMemorySubscriptions::with(vec![subscription_row(user_id, PlanTier::Free, 0)]);
        let mut stripe = MockStripeGateway::new();
        stripe.expect_create_billing_portal_session().never();

        let usecase = SubscriptionUseCase::new(Arc::new(repo), Arc::new(stripe), catalog());
        let err = usecase.create_portal(user_id).await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn activate_free_is_idempotent() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::default());
        let usecase = SubscriptionUseCase::new(Arc::clone(&repo), Arc::new(MockStripeGateway::new()), catalog());

        let first = usecase.activate_free(user_id).await.unwrap();
        repo.update_credits_used(user_id, 4).await.unwrap();
        let second = usecase.activate_free(user_id).await.unwrap();

        assert_eq!(first.plan, "Free");
        assert_eq!(first.id, second.id);
        assert_eq!(second.credits_used, 4);
    }

    #[tokio::test]
    async fn activate_free_restarts_expired_free_period() {
        let user_id = Uuid::new_v4();
        let mut lapsed = subscription_row(user_id, PlanTier::Free, 10);
        lapsed.current_period_start = Utc::now() - Duration::days(33);
        lapsed.current_period_end = Utc::now() - Duration::days(3);
        let lapsed_id = lapsed.id;
        let repo = Arc::new(InMemorySubscriptions::with(vec![lapsed]));
        let usecase = SubscriptionUseCase::new(Arc::clone(&repo), Arc::new(MockStripeGateway::new()), catalog());

        let restarted = usecase.activate_free(user_id).await.unwrap();
        let current = usecase.current(user_id).await.unwrap();

        assert_eq!(restarted.id, lapsed_id);
        assert_eq!(restarted.plan, "Free");
        assert_eq!(restarted.credits_used, 0);
        assert!(restarted.current_period_end > Utc::now() + Duration::days(FREE_PERIOD_DAYS - 1));
        assert!(current.entitlement.can_generate);
        assert_eq!(
            current.entitlement.available_credits,
            crates::domain::value_objects::entitlements::AvailableCredits::Limited(10)
        );
    }

    #[tokio::test]
    async fn activate_free_recovers_canceled_paid_subscription() {
        let user_id = Uuid::new_v4();
        let mut canceled = paid_row(user_id, 80);
        canceled.status = SubscriptionStatus::Canceled.to_string();
        canceled.current_period_start = Utc::now() - Duration::days(33);
        canceled.current_period_end = Utc::now() - Duration::days(3);
        let repo = Arc::new(InMemorySubscriptions::with(vec![canceled]));
        let usecase = SubscriptionUseCase::new(Arc::clone(&repo), Arc::new(MockStripeGateway::new()), catalog());

        usecase.activate_free(user_id).await.unwrap();
        let row = repo.get(user_id).unwrap();
        let current = usecase.current(user_id).await.unwrap();

        assert_eq!(row.plan, "Free");
        assert_eq!(row.status, "active");
        assert_eq!(row.credits_used, 0);
        assert_eq!(row.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(row.stripe_subscription_id, None);
        assert!(current.entitlement.can_generate);
    }

    #[tokio::test]
    async fn activate_free_leaves_current_paid_plan_alone() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![subscription_row(
            user_id,
            PlanTier::Pro,
            12,
        )]));
        let usecase = SubscriptionUseCase::new(Arc::clone(&repo), Arc::new(MockStripeGateway::new()), catalog());

        let kept = usecase.activate_free(user_id).await.unwrap();

        assert_eq!(kept.plan, "Pro");
        assert_eq!(kept.credits_used, 12);
    }

    #[tokio::test]
    async fn current_reports_entitlement() {
        let user_id = Uuid::new_v4();
        let repo = InMemorySubscriptions::with(vec![subscription_row(user_id, PlanTier::Free, 3)]);
        let usecase = SubscriptionUseCase::new(Arc::new(repo), Arc::new(MockStripeGateway::new()), catalog());

        let current = usecase.current(user_id).await.unwrap();

        assert!(current.entitlement.can_generate);
        assert_eq!(
            current.entitlement.available_credits,
            crates::domain::value_objects::entitlements::AvailableCredits::Limited(7)
        );
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();
        let usecase = SubscriptionUseCase::new(
            Arc::new(InMemorySubscriptions::default()),
            Arc::new(stripe),
            catalog(),
        );

        let err = usecase.handle_webhook(b"{}", None).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_changes_nothing() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow::anyhow!("invalid webhook signature")));
        let mut repo = MockSubscriptionRepository::new();
        repo.expect_upsert_by_user_id().never();
        repo.expect_update_by_stripe_subscription_id().never();

        let usecase = SubscriptionUseCase::new(Arc::new(repo), Arc::new(stripe), catalog());
        let err = usecase
            .handle_webhook(b"{}", Some("t=1,v1=00"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidWebhook(_)));
    }

    #[tokio::test]
    async fn checkout_completed_activates_paid_plan_once() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![subscription_row(
            user_id,
            PlanTier::Free,
            7,
        )]));
        let completed = event(
            CHECKOUT_COMPLETED,
            serde_json::json!({
                "id": "cs_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "userId": user_id.to_string() }
            }),
        );
        let stripe = gateway_returning(
            completed,
            Some(provider_subscription("price_pro", "active", PERIOD_START, PERIOD_END)),
        );
        let usecase = SubscriptionUseCase::new(Arc::clone(&repo), Arc::new(stripe), catalog());

        let first = usecase.handle_webhook(b"{}", Some("sig")).await.unwrap();
        let row = repo.get(user_id).unwrap();
        assert_eq!(first, WebhookOutcome::Applied);
        assert_eq!(row.plan, "Pro");
        assert_eq!(row.credits_used, 0);
        assert_eq!(row.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(row.stripe_customer_id.as_deref(), Some("cus_1"));

        repo.update_credits_used(user_id, 2).await.unwrap();
        let second = usecase.handle_webhook(b"{}", Some("sig")).await.unwrap();

        assert_eq!(second, WebhookOutcome::Unchanged);
        assert_eq!(repo.get(user_id).unwrap().credits_used, 2);
    }

    #[tokio::test]
    async fn subscription_update_resets_credits_on_new_period() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![paid_row(user_id, 42)]));
        let next_start = PERIOD_END;
        let next_end = PERIOD_END + 2_592_000;
        let updated = event(
            SUBSCRIPTION_UPDATED,
            provider_subscription("price_pro", "active", next_start, next_end),
        );
        let stripe = gateway_returning(updated, None);
        let usecase = SubscriptionUseCase::new(Arc::clone(&repo), Arc::new(stripe), catalog());

        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Applied
        );
        let row = repo.get(user_id).unwrap();
        assert_eq!(row.credits_used, 0);
        assert_eq!(row.current_period_start.timestamp(), next_start);

        repo.update_credits_used(user_id, 1).await.unwrap();
        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Unchanged
        );
        assert_eq!(repo.get(user_id).unwrap().credits_used, 1);
    }

    #[tokio::test]
    async fn subscription_update_within_period_keeps_usage() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![paid_row(user_id, 42)]));
        let upgraded = event(
            SUBSCRIPTION_UPDATED,
            provider_subscription("price_ent", "active", PERIOD_START, PERIOD_END),
        );
        let usecase = SubscriptionUseCase::new(
            Arc::clone(&repo),
            Arc::new(gateway_returning(upgraded, None)),
            catalog(),
        );

        usecase.handle_webhook(b"{}", Some("sig")).await.unwrap();
        let row = repo.get(user_id).unwrap();

        assert_eq!(row.plan, "Enterprise");
        assert_eq!(row.credits_used, 42);
    }

    #[tokio::test]
    async fn subscription_update_with_unknown_price_keeps_plan() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![paid_row(user_id, 42)]));
        let repriced = event(
            SUBSCRIPTION_UPDATED,
            provider_subscription("price_pro_2025", "active", PERIOD_START, PERIOD_END),
        );
        let usecase = SubscriptionUseCase::new(
            Arc::clone(&repo),
            Arc::new(gateway_returning(repriced, None)),
            catalog(),
        );

        let outcome = usecase.handle_webhook(b"{}", Some("sig")).await.unwrap();
        let row = repo.get(user_id).unwrap();

        assert_eq!(outcome, WebhookOutcome::Unchanged);
        assert_eq!(row.plan, "Pro");
        assert_eq!(row.credits_used, 42);
    }

    #[tokio::test]
    async fn subscription_update_stores_unrecognized_status_verbatim() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![paid_row(user_id, 3)]));
        let paused = event(
            SUBSCRIPTION_UPDATED,
            provider_subscription("price_pro", "on_hold", PERIOD_START, PERIOD_END),
        );
        let usecase = SubscriptionUseCase::new(
            Arc::clone(&repo),
            Arc::new(gateway_returning(paused, None)),
            catalog(),
        );

        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Applied
        );
        let current = usecase.current(user_id).await.unwrap();

        assert_eq!(repo.get(user_id).unwrap().status, "on_hold");
        assert_eq!(current.subscription.unwrap().status, "on_hold");
        assert_eq!(current.entitlement.status, Some(SubscriptionStatus::Unknown));
        assert!(!current.entitlement.can_generate);
    }

    #[tokio::test]
    async fn subscription_deleted_cancels_row() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(InMemorySubscriptions::with(vec![paid_row(user_id, 5)]));
        let deleted = event(
            SUBSCRIPTION_DELETED,
            provider_subscription("price_pro", "canceled", PERIOD_START, PERIOD_END),
        );
        let usecase = SubscriptionUseCase::new(
            Arc::clone(&repo),
            Arc::new(gateway_returning(deleted, None)),
            catalog(),
        );

        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Applied
        );
        assert_eq!(repo.get(user_id).unwrap().status, "canceled");
        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn unknown_subscription_and_event_types_are_acknowledged() {
        let updated = event(
            SUBSCRIPTION_UPDATED,
            provider_subscription("price_pro", "active", PERIOD_START, PERIOD_END),
        );
        let usecase = SubscriptionUseCase::new(
            Arc::new(InMemorySubscriptions::default()),
            Arc::new(gateway_returning(updated, None)),
            catalog(),
        );
        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Ignored
        );

        let other = event("invoice.paid", serde_json::json!({}));
        let usecase = SubscriptionUseCase::new(
            Arc::new(InMemorySubscriptions::default()),
            Arc::new(gateway_returning(other, None)),
            catalog(),
        );
        assert_eq!(
            usecase.handle_webhook(b"{}", Some("sig")).await.unwrap(),
            WebhookOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn persistence_failure_surfaces_as_internal() {
        let user_id = Uuid::new_v4();
        let repo = InMemorySubscriptions::default().failing_writes();
        let completed = event(
            CHECKOUT_COMPLETED,
            serde_json::json!({
                "id": "cs_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "client_reference_id": user_id.to_string()
            }),
        );
        let stripe = gateway_returning(
            completed,
            Some(provider_subscription("price_pro", "active", PERIOD_START, PERIOD_END)),
        );
        let usecase = SubscriptionUseCase::new(Arc::new(repo), Arc::new(stripe), catalog());

        let err = usecase.handle_webhook(b"{}", Some("sig")).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
