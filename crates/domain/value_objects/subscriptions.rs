use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::{
        entitlements::EntitlementSnapshot,
        enums::{plan_tiers::PlanTier, subscription_statuses::SubscriptionStatus},
    },
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub plan: String,
    /// Stored provider status, unrecognized values included.
    pub status: String,
    pub credits_used: i32,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub has_billing_account: bool,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            status: value.status,
            plan: value.plan,
            credits_used: value.credits_used,
            current_period_start: value.current_period_start,
            current_period_end: value.current_period_end,
            cancel_at_period_end: value.cancel_at_period_end,
            has_billing_account: value.stripe_customer_id.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentSubscriptionDto {
    pub subscription: Option<SubscriptionDto>,
    pub entitlement: EntitlementSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PortalSessionDto {
    pub url: String,
}

/// Values the payment provider reports for a subscription, normalized for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscriptionState {
    pub subscription_id: String,
    pub customer_id: Option<String>,
    /// `None` when the price is absent or not one of ours.
    pub tier: Option<PlanTier>,
    /// Status string exactly as the provider sent it.
    pub status: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}

impl ProviderSubscriptionState {
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.status
            .as_deref()
            .map(SubscriptionStatus::from_str)
            .unwrap_or(SubscriptionStatus::Unknown)
    }
}
