use serde::Serialize;

use crate::domain::value_objects::enums::plan_tiers::PlanTier;

/// Length of the billing window granted when a user onboards on the free tier.
pub const FREE_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanDefinition {
    pub tier: PlanTier,
    pub name: &'static str,
    pub description: &'static str,
    /// `None` for unbounded plans.
    pub monthly_credits: Option<u32>,
    pub price: &'static str,
    pub features: &'static [&'static str],
    pub purchasable: bool,
    #[serde(skip)]
    pub stripe_price_id: Option<String>,
}

/// Immutable plan table, built once from configuration at startup.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<PlanDefinition>,
}

impl PlanCatalog {
    pub fn new(pro_price_id: Option<String>, enterprise_price_id: Option<String>) -> Self {
        let plans = PlanTier::ALL
            .iter()
            .map(|tier| {
                let stripe_price_id = match tier {
                    PlanTier::Free => None,
                    PlanTier::Pro => pro_price_id.clone(),
                    PlanTier::Enterprise => enterprise_price_id.clone(),
                }
                .filter(|price| !price.trim().is_empty());

                PlanDefinition {
                    tier: *tier,
                    name: tier.as_str(),
                    description: tier.description(),
                    monthly_credits: tier.credit_ceiling(),
                    price: tier.price_label(),
                    features: tier.features(),
                    purchasable: stripe_price_id.is_some(),
                    stripe_price_id,
                }
            })
            .collect();

        Self { plans }
    }

    pub fn plans(&self) -> &[PlanDefinition] {
        &self.plans
    }

    pub fn get(&self, tier: PlanTier) -> Option<&PlanDefinition> {
        self.plans.iter().find(|plan| plan.tier == tier)
    }

    pub fn price_id_for(&self, tier: PlanTier) -> Option<&str> {
        self.get(tier).and_then(|plan| plan.stripe_price_id.as_deref())
    }

    /// Tier whose configured price is `price_id`, if any.
    pub fn find_tier_for_price_id(&self, price_id: &str) -> Option<PlanTier> {
        self.plans
            .iter()
            .find(|plan| plan.stripe_price_id.as_deref() == Some(price_id))
            .map(|plan| plan.tier)
    }

    /// Maps a provider price back to a tier. Unrecognized prices fall back to `Free`.
    pub fn tier_for_price_id(&self, price_id: &str) -> PlanTier {
        self.find_tier_for_price_id(price_id).unwrap_or(PlanTier::Free)
    }
}
