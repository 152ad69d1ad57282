//! Best-effort TTL cache in front of subscription lookups.
//!
//! The store stays the source of truth. A miss, an expired entry, or a
//! poisoned lock all fall through to a direct store read. With a TTL of zero
//! the cache is disabled and every lookup reads the store, so a cancellation
//! takes effect on the very next validation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use scout_core::types::PrincipalId;
use scout_store::models::subscription::Subscription;

#[derive(Debug)]
pub struct SubscriptionCache {
    ttl: Duration,
    entries: Mutex<HashMap<PrincipalId, (Instant, Subscription)>>,
}

impl SubscriptionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Cached subscription for `user_id` if it is younger than the TTL.
    pub fn get(&self, user_id: PrincipalId) -> Option<Subscription> {
        if !self.is_enabled() {
            return None;
        }
        let mut entries = self.entries.lock().ok()?;
        match entries.get(&user_id) {
            Some((stored_at, sub)) if stored_at.elapsed() < self.ttl => Some(sub.clone()),
            Some(_) => {
                entries.remove(&user_id);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, subscription: &Subscription) {
        if !self.is_enabled() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                subscription.user_id,
                (Instant::now(), subscription.clone()),
            );
        }
    }

    /// Drop the cached entry so the next lookup reads the store.
    pub fn invalidate(&self, user_id: PrincipalId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&user_id);
        }
    }
}
