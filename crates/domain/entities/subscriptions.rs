use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        plan_tiers::PlanTier, subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub credits_used: i32,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    pub fn plan_tier(&self) -> Option<PlanTier> {
        PlanTier::from_str(&self.plan)
    }

    pub fn subscription_status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status)
    }
}

/// Whole-row payload. Inserted on onboarding, upserted on `user_id` after checkout.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = subscriptions, treat_none_as_null = true)]
pub struct UpsertSubscriptionEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub credits_used: i32,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied from provider notifications. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionChangeset {
    pub plan: Option<String>,
    pub credits_used: Option<i32>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub cancel_at_period_end: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubscriptionChangeset {
    pub fn is_empty(&self) -> bool {
        self.plan.is_none()
            && self.credits_used.is_none()
            && self.current_period_start.is_none()
            && self.current_period_end.is_none()
            && self.status.is_none()
            && self.cancel_at_period_end.is_none()
    }
}
