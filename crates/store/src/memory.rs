//! In-process [`TokenStore`] and [`IdentityProvider`].
//!
//! All state sits behind one mutex, so every trait method is atomic by
//! construction. Used by the test suites and by `SCOUT_STORE=memory` local
//! runs.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::Utc;
use scout_core::rate_limit::RateLimitPolicy;
use scout_core::subscription::SubscriptionStatus;
use scout_core::types::{PrincipalId, Timestamp};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::identity::{Identity, IdentityProvider};
use crate::models::extension_token::{ExtensionToken, NewExtensionToken};
use crate::models::principal::Principal;
use crate::models::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::models::revocation::{NewRevokedToken, RevokedToken};
use crate::models::subscription::{NewSubscription, Subscription};
use crate::store::TokenStore;

#[derive(Debug, Default)]
struct MemoryState {
    principals: HashMap<PrincipalId, Principal>,
    subscriptions: Vec<Subscription>,
    extension_tokens: Vec<ExtensionToken>,
    refresh_tokens: Vec<RefreshTokenRecord>,
    revoked: Vec<RevokedToken>,
    attempts: HashMap<IpAddr, Vec<Timestamp>>,
}

/// Token store holding every table in memory.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    state: Mutex<MemoryState>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a principal.
    pub async fn put_principal(&self, principal: Principal) {
        self.state
            .lock()
            .await
            .principals
            .insert(principal.id, principal);
    }

    /// Change the status of every subscription the principal holds.
    pub async fn set_subscription_status(&self, user_id: PrincipalId, status: SubscriptionStatus) {
        let mut state = self.state.lock().await;
        for sub in state
            .subscriptions
            .iter_mut()
            .filter(|s| s.user_id == user_id)
        {
            sub.status = status;
        }
    }

    /// All extension tokens ever issued to the principal, oldest first.
    pub async fn extension_tokens_for(&self, user_id: PrincipalId) -> Vec<ExtensionToken> {
        self.state
            .lock()
            .await
            .extension_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// All refresh-token records of the principal, oldest first.
    pub async fn refresh_tokens_for(&self, user_id: PrincipalId) -> Vec<RefreshTokenRecord> {
        self.state
            .lock()
            .await
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Number of revocation entries recorded.
    pub async fn revocation_count(&self) -> usize {
        self.state.lock().await.revoked.len()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        Ok(self.state.lock().await.principals.get(&id).cloned())
    }

    async fn find_principal_by_api_key(&self, api_key: &str) -> StoreResult<Option<Principal>> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .values()
            .find(|p| p.api_key.as_deref() == Some(api_key))
            .cloned())
    }

    async fn find_principal_by_legacy_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<Principal>> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .values()
            .find(|p| p.legacy_token.as_deref() == Some(token))
            .cloned())
    }

    async fn set_api_key(
        &self,
        id: PrincipalId,
        api_key: &str,
        expires_at: Timestamp,
        subscription_id: Option<Uuid>,
    ) -> StoreResult<()> {
        if let Some(p) = self.state.lock().await.principals.get_mut(&id) {
            p.api_key = Some(api_key.to_string());
            p.api_key_expires_at = Some(expires_at);
            p.api_key_subscription_id = subscription_id;
        }
        Ok(())
    }

    async fn migrate_legacy_token(
        &self,
        id: PrincipalId,
        token: &str,
        expires_at: Timestamp,
    ) -> StoreResult<()> {
        if let Some(p) = self.state.lock().await.principals.get_mut(&id) {
            if p.legacy_token.as_deref() == Some(token) {
                p.api_key = Some(token.to_string());
                p.api_key_expires_at = Some(expires_at);
                p.legacy_token = None;
            }
        }
        Ok(())
    }

    async fn touch_last_active(&self, id: PrincipalId, at: Timestamp) -> StoreResult<()> {
        if let Some(p) = self.state.lock().await.principals.get_mut(&id) {
            p.last_active_at = Some(at);
        }
        Ok(())
    }

    async fn list_principals(&self, limit: usize, offset: usize) -> StoreResult<Vec<Principal>> {
        let state = self.state.lock().await;
        let mut all: Vec<Principal> = state.principals.values().cloned().collect();
        all.sort_by_key(|p| (p.created_at, p.id));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn latest_subscription(
        &self,
        user_id: PrincipalId,
    ) -> StoreResult<Option<Subscription>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn insert_subscription(&self, input: &NewSubscription) -> StoreResult<Subscription> {
        let row = Subscription {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            plan_id: input.plan_id.clone(),
            status: input.status,
            current_period_start: input.current_period_start,
            current_period_end: input.current_period_end,
            created_at: Utc::now(),
        };
        self.state.lock().await.subscriptions.push(row.clone());
        Ok(row)
    }

    async fn find_extension_token(&self, token: &str) -> StoreResult<Option<ExtensionToken>> {
        let state = self.state.lock().await;
        Ok(state
            .extension_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn rotate_extension_token(
        &self,
        input: &NewExtensionToken,
    ) -> StoreResult<ExtensionToken> {
        let mut state = self.state.lock().await;
        for t in state
            .extension_tokens
            .iter_mut()
            .filter(|t| t.user_id == input.user_id && t.is_active)
        {
            t.is_active = false;
        }
        let row = ExtensionToken {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            token: input.token.clone(),
            created_at: input.created_at,
            expires_at: input.expires_at,
            is_active: true,
        };
        state.extension_tokens.push(row.clone());
        Ok(row)
    }

    async fn deactivate_extension_token(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(t) = state.extension_tokens.iter_mut().find(|t| t.id == id) {
            t.is_active = false;
        }
        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        input: &NewRefreshToken,
    ) -> StoreResult<RefreshTokenRecord> {
        let row = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            token_hash: input.token_hash.clone(),
            expires_at: input.expires_at,
            is_revoked: false,
            created_at: Utc::now(),
        };
        self.state.lock().await.refresh_tokens.push(row.clone());
        Ok(row)
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn redeem_refresh_token(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .refresh_tokens
            .iter_mut()
            .find(|t| t.id == id && !t.is_revoked)
        {
            Some(t) => {
                t.is_revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_revocation(&self, input: &NewRevokedToken) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.revoked.iter().any(|r| r.token_hash == input.token_hash) {
            return Ok(());
        }
        state.revoked.push(RevokedToken {
            token_hash: input.token_hash.clone(),
            reason: input.reason.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn is_revoked(&self, token_hash: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.revoked.iter().any(|r| r.token_hash == token_hash))
    }

    async fn register_attempt(
        &self,
        ip: IpAddr,
        now: Timestamp,
        policy: &RateLimitPolicy,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let log = state.attempts.entry(ip).or_default();
        Ok(policy.admit(log, now))
    }

    async fn purge_expired(&self, before: Timestamp) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before_len = state.refresh_tokens.len() + state.extension_tokens.len();
        state.refresh_tokens.retain(|t| t.expires_at >= before);
        state.extension_tokens.retain(|t| t.expires_at >= before);
        let after_len = state.refresh_tokens.len() + state.extension_tokens.len();
        Ok((before_len - after_len) as u64)
    }
}

/// Identity provider with a fixed credential table.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, (String, PrincipalId)>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, email: &str, password: &str, id: PrincipalId) {
        self.accounts
            .lock()
            .await
            .insert(email.to_lowercase(), (password.to_string(), id));
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Option<Identity>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .get(&email.to_lowercase())
            .filter(|(stored, _)| stored == password)
            .map(|(_, id)| Identity {
                id: *id,
                email: email.to_string(),
            }))
    }
}
