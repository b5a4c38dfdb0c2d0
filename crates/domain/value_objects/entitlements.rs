//! Entitlement ledger: pure eligibility answers derived from a subscription row.
//!
//! Nothing here performs I/O or fails. A missing subscription is a valid input and is
//! never eligible.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::enums::{plan_tiers::PlanTier, subscription_statuses::SubscriptionStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailableCredits {
    Limited(u32),
    Unbounded,
}

impl AvailableCredits {
    pub const NONE: AvailableCredits = AvailableCredits::Limited(0);

    pub fn has_remaining(&self) -> bool {
        match self {
            AvailableCredits::Limited(remaining) => *remaining > 0,
            AvailableCredits::Unbounded => true,
        }
    }
}

impl Serialize for AvailableCredits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AvailableCredits::Limited(remaining) => serializer.serialize_u32(*remaining),
            AvailableCredits::Unbounded => serializer.serialize_str("unlimited"),
        }
    }
}

fn is_within_active_period(subscription: &SubscriptionEntity, now: DateTime<Utc>) -> bool {
    subscription.subscription_status().is_active() && now < subscription.current_period_end
}

pub fn available_credits(
    subscription: Option<&SubscriptionEntity>,
    now: DateTime<Utc>,
) -> AvailableCredits {
    let Some(subscription) = subscription else {
        return AvailableCredits::NONE;
    };

    if !is_within_active_period(subscription, now) {
        return AvailableCredits::NONE;
    }

    let Some(tier) = subscription.plan_tier() else {
        return AvailableCredits::NONE;
    };

    match tier.credit_ceiling() {
        None => AvailableCredits::Unbounded,
        Some(ceiling) => {
            let used = u32::try_from(subscription.credits_used).unwrap_or(0);
            AvailableCredits::Limited(ceiling.saturating_sub(used))
        }
    }
}

pub fn can_generate(subscription: Option<&SubscriptionEntity>, now: DateTime<Utc>) -> bool {
    match subscription {
        Some(subscription) if is_within_active_period(subscription, now) => {
            available_credits(Some(subscription), now).has_remaining()
        }
        _ => false,
    }
}

/// Read model combining a subscription with its derived eligibility.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntitlementSnapshot {
    pub plan: Option<PlanTier>,
    pub status: Option<SubscriptionStatus>,
    pub credits_used: i32,
    pub available_credits: AvailableCredits,
    pub can_generate: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl EntitlementSnapshot {
    pub fn evaluate(subscription: Option<&SubscriptionEntity>, now: DateTime<Utc>) -> Self {
        Self {
            plan: subscription.and_then(SubscriptionEntity::plan_tier),
            status: subscription.map(SubscriptionEntity::subscription_status),
            credits_used: subscription.map(|s| s.credits_used).unwrap_or(0),
            available_credits: available_credits(subscription, now),
            can_generate: can_generate(subscription, now),
            current_period_start: subscription.map(|s| s.current_period_start),
            current_period_end: subscription.map(|s| s.current_period_end),
        }
    }
}
