use scout_core::subscription::SubscriptionStatus;
use scout_core::types::{PrincipalId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row from the `subscriptions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for inserting a subscription.
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscription {
    pub user_id: PrincipalId,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Timestamp,
}
