//! Subscription status rules.

use serde::{Deserialize, Serialize};

/// Plan id given to principals that predate subscription billing.
pub const LEGACY_PLAN_ID: &str = "legacy";

/// Billing status of a subscription row.
///
/// Unknown statuses from the billing provider (e.g. `past_due`) deserialize
/// to [`SubscriptionStatus::Other`] and are treated as inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    #[serde(other)]
    Other,
}

impl SubscriptionStatus {
    pub fn is_active(self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_other_and_inactive() {
        let status: SubscriptionStatus =
            serde_json::from_str("\"past_due\"").expect("should deserialize");
        assert_eq!(status, SubscriptionStatus::Other);
        assert!(!status.is_active());
    }

    #[test]
    fn only_active_is_active() {
        assert!(SubscriptionStatus::Active.is_active());
        assert!(!SubscriptionStatus::Cancelled.is_active());
        let json = serde_json::to_string(&SubscriptionStatus::Cancelled).expect("serialize");
        assert_eq!(json, "\"cancelled\"");
    }
}
