//! [`TokenStore`] backed by the EIP REST data API.
//!
//! The atomic operations are stored functions declared in
//! `sql/eip_functions.sql`; everything else is a plain table request.

use std::net::IpAddr;

use async_trait::async_trait;
use scout_core::rate_limit::RateLimitPolicy;
use scout_core::types::{PrincipalId, Timestamp};
use serde_json::json;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::extension_token::{ExtensionToken, NewExtensionToken};
use crate::models::principal::Principal;
use crate::models::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::models::revocation::NewRevokedToken;
use crate::models::subscription::{NewSubscription, Subscription};
use crate::rest::{filter_timestamp, Query, RestClient};
use crate::store::TokenStore;

const PROFILES: &str = "profiles";
const SUBSCRIPTIONS: &str = "subscriptions";
const EXTENSION_TOKENS: &str = "extension_tokens";
const REFRESH_TOKENS: &str = "refresh_tokens";
const REVOKED_TOKENS: &str = "revoked_tokens";

/// Column list shared across profile queries to avoid repetition.
const PROFILE_COLUMNS: &str = "id,email,is_admin,is_banned,created_at,api_key,\
                               api_key_expires_at,api_key_subscription_id,legacy_token,\
                               last_active_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id,user_id,plan_id,status,current_period_start,current_period_end,created_at";

const EXTENSION_TOKEN_COLUMNS: &str = "id,user_id,token,created_at,expires_at,is_active";

const REFRESH_TOKEN_COLUMNS: &str = "id,user_id,token_hash,expires_at,is_revoked,created_at";

/// Token store talking to the EIP over HTTP.
#[derive(Debug, Clone)]
pub struct RestTokenStore {
    client: RestClient,
}

impl RestTokenStore {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    async fn find_profile(&self, column: &str, value: &str) -> StoreResult<Option<Principal>> {
        self.client
            .select_one(
                PROFILES,
                Query::new().select(PROFILE_COLUMNS).eq(column, value),
            )
            .await
    }

    async fn patch_profile(&self, query: Query, body: serde_json::Value) -> StoreResult<()> {
        let rows: Vec<serde_json::Value> = self.client.update(PROFILES, &query, &body).await?;
        if rows.is_empty() {
            tracing::debug!("Profile patch matched no rows");
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for RestTokenStore {
    async fn find_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        self.find_profile("id", &id.to_string()).await
    }

    async fn find_principal_by_api_key(&self, api_key: &str) -> StoreResult<Option<Principal>> {
        self.find_profile("api_key", api_key).await
    }

    async fn find_principal_by_legacy_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<Principal>> {
        self.find_profile("legacy_token", token).await
    }

    async fn set_api_key(
        &self,
        id: PrincipalId,
        api_key: &str,
        expires_at: Timestamp,
        subscription_id: Option<Uuid>,
    ) -> StoreResult<()> {
        self.patch_profile(
            Query::new().eq("id", id),
            json!({
                "api_key": api_key,
                "api_key_expires_at": expires_at,
                "api_key_subscription_id": subscription_id,
            }),
        )
        .await
    }

    async fn migrate_legacy_token(
        &self,
        id: PrincipalId,
        token: &str,
        expires_at: Timestamp,
    ) -> StoreResult<()> {
        self.patch_profile(
            Query::new().eq("id", id).eq("legacy_token", token),
            json!({
                "api_key": token,
                "api_key_expires_at": expires_at,
                "legacy_token": null,
            }),
        )
        .await
    }

    async fn touch_last_active(&self, id: PrincipalId, at: Timestamp) -> StoreResult<()> {
        self.patch_profile(Query::new().eq("id", id), json!({ "last_active_at": at }))
            .await
    }

    async fn list_principals(&self, limit: usize, offset: usize) -> StoreResult<Vec<Principal>> {
        self.client
            .select(
                PROFILES,
                &Query::new()
                    .select(PROFILE_COLUMNS)
                    .order_asc("created_at")
                    .limit(limit)
                    .offset(offset),
            )
            .await
    }

    async fn latest_subscription(
        &self,
        user_id: PrincipalId,
    ) -> StoreResult<Option<Subscription>> {
        self.client
            .select_one(
                SUBSCRIPTIONS,
                Query::new()
                    .select(SUBSCRIPTION_COLUMNS)
                    .eq("user_id", user_id)
                    .order_desc("created_at"),
            )
            .await
    }

    async fn insert_subscription(&self, input: &NewSubscription) -> StoreResult<Subscription> {
        self.client.insert_one(SUBSCRIPTIONS, input).await
    }

    async fn find_extension_token(&self, token: &str) -> StoreResult<Option<ExtensionToken>> {
        self.client
            .select_one(
                EXTENSION_TOKENS,
                Query::new()
                    .select(EXTENSION_TOKEN_COLUMNS)
                    .eq("token", token),
            )
            .await
    }

    async fn rotate_extension_token(
        &self,
        input: &NewExtensionToken,
    ) -> StoreResult<ExtensionToken> {
        self.client
            .rpc(
                "rotate_extension_token",
                &json!({
                    "p_user_id": input.user_id,
                    "p_token": input.token,
                    "p_created_at": input.created_at,
                    "p_expires_at": input.expires_at,
                }),
            )
            .await
    }

    async fn deactivate_extension_token(&self, id: Uuid) -> StoreResult<()> {
        let _rows: Vec<serde_json::Value> = self
            .client
            .update(
                EXTENSION_TOKENS,
                &Query::new().eq("id", id),
                &json!({ "is_active": false }),
            )
            .await?;
        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        input: &NewRefreshToken,
    ) -> StoreResult<RefreshTokenRecord> {
        self.client.insert_one(REFRESH_TOKENS, input).await
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        self.client
            .select_one(
                REFRESH_TOKENS,
                Query::new()
                    .select(REFRESH_TOKEN_COLUMNS)
                    .eq("token_hash", token_hash),
            )
            .await
    }

    async fn redeem_refresh_token(&self, id: Uuid) -> StoreResult<bool> {
        // The is_revoked filter makes this a compare-and-swap: a second
        // redeemer matches zero rows.
        let rows: Vec<RefreshTokenRecord> = self
            .client
            .update(
                REFRESH_TOKENS,
                &Query::new().eq("id", id).eq("is_revoked", false),
                &json!({ "is_revoked": true }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_revocation(&self, input: &NewRevokedToken) -> StoreResult<()> {
        self.client
            .insert_ignoring_duplicates(REVOKED_TOKENS, "token_hash", input)
            .await
    }

    async fn is_revoked(&self, token_hash: &str) -> StoreResult<bool> {
        let row: Option<serde_json::Value> = self
            .client
            .select_one(
                REVOKED_TOKENS,
                Query::new().select("token_hash").eq("token_hash", token_hash),
            )
            .await?;
        Ok(row.is_some())
    }

    async fn register_attempt(
        &self,
        ip: IpAddr,
        now: Timestamp,
        policy: &RateLimitPolicy,
    ) -> StoreResult<bool> {
        self.client
            .rpc(
                "register_auth_attempt",
                &json!({
                    "p_ip": ip.to_string(),
                    "p_now": now,
                    "p_window_secs": policy.window_secs,
                    "p_max_attempts": policy.max_attempts,
                }),
            )
            .await
    }

    async fn purge_expired(&self, before: Timestamp) -> StoreResult<u64> {
        let cutoff = filter_timestamp(before);
        let refresh = self
            .client
            .delete(REFRESH_TOKENS, &Query::new().lt("expires_at", &cutoff))
            .await?;
        let extension = self
            .client
            .delete(EXTENSION_TOKENS, &Query::new().lt("expires_at", &cutoff))
            .await?;
        Ok(refresh + extension)
    }
}
