//! The [`TokenStore`] trait.

use std::net::IpAddr;

use async_trait::async_trait;
use scout_core::rate_limit::RateLimitPolicy;
use scout_core::types::{PrincipalId, Timestamp};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::extension_token::{ExtensionToken, NewExtensionToken};
use crate::models::principal::Principal;
use crate::models::refresh_token::{NewRefreshToken, RefreshTokenRecord};
use crate::models::revocation::NewRevokedToken;
use crate::models::subscription::{NewSubscription, Subscription};

/// Persistence for principals, subscriptions and every token kind.
///
/// Implementations must be `Send + Sync` because one store is shared across
/// all request handlers. `register_attempt`, `rotate_extension_token` and
/// `redeem_refresh_token` must each be a single atomic operation.
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    // -- principals --------------------------------------------------------

    async fn find_principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    async fn find_principal_by_api_key(&self, api_key: &str) -> StoreResult<Option<Principal>>;

    async fn find_principal_by_legacy_token(&self, token: &str)
        -> StoreResult<Option<Principal>>;

    /// Overwrite the principal's API key. The previous key stops matching.
    async fn set_api_key(
        &self,
        id: PrincipalId,
        api_key: &str,
        expires_at: Timestamp,
        subscription_id: Option<Uuid>,
    ) -> StoreResult<()>;

    /// Move `token` from the legacy column into the API-key column with the
    /// given expiry, clearing the legacy column.
    async fn migrate_legacy_token(
        &self,
        id: PrincipalId,
        token: &str,
        expires_at: Timestamp,
    ) -> StoreResult<()>;

    async fn touch_last_active(&self, id: PrincipalId, at: Timestamp) -> StoreResult<()>;

    /// Page through principals ordered by creation time.
    async fn list_principals(&self, limit: usize, offset: usize) -> StoreResult<Vec<Principal>>;

    // -- subscriptions -----------------------------------------------------

    /// The most recently created subscription for the principal.
    async fn latest_subscription(&self, user_id: PrincipalId)
        -> StoreResult<Option<Subscription>>;

    async fn insert_subscription(&self, input: &NewSubscription) -> StoreResult<Subscription>;

    // -- extension tokens --------------------------------------------------

    async fn find_extension_token(&self, token: &str) -> StoreResult<Option<ExtensionToken>>;

    /// Deactivate every active token of `input.user_id` and insert `input`
    /// as the only active one.
    async fn rotate_extension_token(&self, input: &NewExtensionToken)
        -> StoreResult<ExtensionToken>;

    async fn deactivate_extension_token(&self, id: Uuid) -> StoreResult<()>;

    // -- refresh tokens ----------------------------------------------------

    async fn insert_refresh_token(&self, input: &NewRefreshToken)
        -> StoreResult<RefreshTokenRecord>;

    async fn find_refresh_token(&self, token_hash: &str)
        -> StoreResult<Option<RefreshTokenRecord>>;

    /// Flag the record revoked if it is not already. Returns `true` only for
    /// the call that performed the transition.
    async fn redeem_refresh_token(&self, id: Uuid) -> StoreResult<bool>;

    // -- revocation --------------------------------------------------------

    /// Record a revocation. Recording the same hash twice is not an error
    /// and keeps the first reason.
    async fn insert_revocation(&self, input: &NewRevokedToken) -> StoreResult<()>;

    async fn is_revoked(&self, token_hash: &str) -> StoreResult<bool>;

    // -- rate limiting -----------------------------------------------------

    /// Purge attempts from `ip` older than the window, then record one at
    /// `now` if fewer than the maximum remain. Returns whether it was
    /// admitted.
    async fn register_attempt(
        &self,
        ip: IpAddr,
        now: Timestamp,
        policy: &RateLimitPolicy,
    ) -> StoreResult<bool>;

    // -- retention ---------------------------------------------------------

    /// Delete refresh tokens and extension tokens that expired before
    /// `before`. Returns the number of rows removed.
    async fn purge_expired(&self, before: Timestamp) -> StoreResult<u64>;
}
