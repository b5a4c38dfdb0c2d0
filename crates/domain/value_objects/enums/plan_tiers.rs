use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Pro, PlanTier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "Free",
            PlanTier::Pro => "Pro",
            PlanTier::Enterprise => "Enterprise",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(PlanTier::Free),
            "pro" => Some(PlanTier::Pro),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }

    /// Monthly generation ceiling. `None` means unbounded.
    pub fn credit_ceiling(&self) -> Option<u32> {
        match self {
            PlanTier::Free => Some(10),
            PlanTier::Pro => Some(100),
            PlanTier::Enterprise => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PlanTier::Free => "Perfect for trying out",
            PlanTier::Pro => "For regular users",
            PlanTier::Enterprise => "For teams and businesses",
        }
    }

    pub fn price_label(&self) -> &'static str {
        match self {
            PlanTier::Free => "Free forever",
            PlanTier::Pro => "$0.99/month",
            PlanTier::Enterprise => "Contact us",
        }
    }

    pub fn features(&self) -> &'static [&'static str] {
        match self {
            PlanTier::Free => &[
                "10 emoji generations per month",
                "Basic customization",
                "Standard quality images",
            ],
            PlanTier::Pro => &[
                "100 emoji generations per month",
                "Advanced customization",
                "High quality images",
                "Priority support",
            ],
            PlanTier::Enterprise => &[
                "Unlimited emoji generations",
                "Custom branding",
                "Dedicated support",
                "API access",
            ],
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }
}

impl Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tiers_case_insensitively() {
        assert_eq!(PlanTier::from_str("pro"), Some(PlanTier::Pro));
        assert_eq!(PlanTier::from_str(" Enterprise "), Some(PlanTier::Enterprise));
        assert_eq!(PlanTier::from_str("FREE"), Some(PlanTier::Free));
        assert_eq!(PlanTier::from_str("gold"), None);
    }

    #[test]
    fn ceilings_match_catalog() {
        assert_eq!(PlanTier::Free.credit_ceiling(), Some(10));
        assert_eq!(PlanTier::Pro.credit_ceiling(), Some(100));
        assert_eq!(PlanTier::Enterprise.credit_ceiling(), None);
    }
}
