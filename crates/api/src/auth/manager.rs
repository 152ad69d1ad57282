//! Token Manager: issuance, refresh, revocation and the validation pipeline.
//!
//! Every presented credential goes through [`TokenManager::validate`]:
//!
//! 1. rate gate for the caller's IP,
//! 2. revocation set lookup by token hash,
//! 3. signed access token,
//! 4. opaque lookup (API key + legacy column, or extension token),
//! 5. subscription check on API-key endpoints,
//! 6. ban check.
//!
//! The first failing step decides the [`AuthError`].

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use scout_core::error::AuthError;
use scout_core::hashing::token_hash;
use scout_core::rate_limit::RateLimitPolicy;
use scout_core::subscription::{SubscriptionStatus, LEGACY_PLAN_ID};
use scout_core::tokens::{generate_opaque_token, perpetual_expiry, EXTENSION_TOKEN_DAYS};
use scout_core::types::{OpaqueKind, PrincipalId, Timestamp, TokenKind};
use scout_store::models::extension_token::{ExtensionToken, NewExtensionToken};
use scout_store::models::principal::Principal;
use scout_store::models::refresh_token::NewRefreshToken;
use scout_store::models::revocation::NewRevokedToken;
use scout_store::models::subscription::{NewSubscription, Subscription};
use scout_store::TokenStore;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::jwt::{TokenCodec, TokenType};
use crate::auth::subscription_cache::SubscriptionCache;

/// Reason recorded when a refresh token is consumed by a refresh.
pub const REASON_REFRESHED: &str = "refreshed";

/// A credential that passed every pipeline step.
#[derive(Debug, Clone)]
pub struct Validated {
    pub principal: Principal,
    pub kind: TokenKind,
}

/// Access + refresh tokens handed out together.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub refresh_expires_at: Timestamp,
}

/// A newly generated API key.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    pub api_key: String,
    pub expires_at: Timestamp,
    pub subscription_id: Uuid,
}

pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    codec: TokenCodec,
    rate_limit: RateLimitPolicy,
    extension_token_days: i64,
    subscriptions: SubscriptionCache,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        codec: TokenCodec,
        rate_limit: RateLimitPolicy,
    ) -> Self {
        Self {
            store,
            codec,
            rate_limit,
            extension_token_days: EXTENSION_TOKEN_DAYS,
            subscriptions: SubscriptionCache::disabled(),
        }
    }

    pub fn with_extension_token_days(mut self, days: i64) -> Self {
        self.extension_token_days = days;
        self
    }

    pub fn with_subscription_cache(mut self, cache: SubscriptionCache) -> Self {
        self.subscriptions = cache;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    /// Run the full validation pipeline for a presented token.
    ///
    /// `opaque` selects which opaque store the endpoint falls back to when
    /// the value is not a valid signed access token.
    pub async fn validate(
        &self,
        token: &str,
        client_ip: IpAddr,
        opaque: OpaqueKind,
    ) -> Result<Validated, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        self.check_rate(client_ip).await?;
        self.ensure_not_revoked(token).await?;

        let validated = match self.signed_attempt(token).await? {
            Some(principal) => Validated {
                principal,
                kind: TokenKind::Access,
            },
            None => match opaque {
                OpaqueKind::ApiKey => self.api_key_attempt(token).await?,
                OpaqueKind::ExtensionToken => Validated {
                    principal: self.verify_extension_token(token).await?,
                    kind: TokenKind::ExtensionToken,
                },
            },
        };

        if opaque == OpaqueKind::ApiKey {
            let subscription = self.current_subscription(validated.principal.id).await?;
            if !subscription.status.is_active() {
                tracing::info!(
                    user_id = %validated.principal.id,
                    status = ?subscription.status,
                    "Rejected token: subscription inactive"
                );
                return Err(AuthError::SubscriptionInactive);
            }
        }

        ensure_not_banned(&validated.principal)?;

        tracing::debug!(
            user_id = %validated.principal.id,
            kind = %validated.kind,
            "Token validated"
        );
        Ok(validated)
    }

    /// Register an attempt from `client_ip`, failing once the window is full.
    pub async fn check_rate(&self, client_ip: IpAddr) -> Result<(), AuthError> {
        let admitted = self
            .store
            .register_attempt(client_ip, Utc::now(), &self.rate_limit)
            .await?;
        if !admitted {
            tracing::warn!(ip = %client_ip, "Rate limit exceeded");
            return Err(AuthError::RateLimited);
        }
        Ok(())
    }

    /// Strict check for routes that require a signed access token.
    pub async fn authenticate_access(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.codec.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::Malformed);
        }
        self.ensure_not_revoked(token).await?;

        let principal = self
            .store
            .find_principal(claims.sub)
            .await?
            .ok_or(AuthError::NotFound)?;
        ensure_not_banned(&principal)?;
        Ok(principal)
    }

    /// Resolve an extension token to its principal.
    ///
    /// An expired token is deactivated on discovery.
    pub async fn verify_extension_token(&self, token: &str) -> Result<Principal, AuthError> {
        let record = self
            .store
            .find_extension_token(token)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !record.is_active {
            return Err(AuthError::NotFound);
        }
        if record.is_expired(Utc::now()) {
            self.store.deactivate_extension_token(record.id).await?;
            tracing::info!(user_id = %record.user_id, "Deactivated expired extension token");
            return Err(AuthError::Expired);
        }

        self.store
            .find_principal(record.user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    async fn ensure_not_revoked(&self, token: &str) -> Result<(), AuthError> {
        if self.store.is_revoked(&token_hash(token)).await? {
            tracing::debug!("Rejected token: revoked");
            return Err(AuthError::Revoked);
        }
        Ok(())
    }

    /// A valid signed access token whose subject exists. Every codec failure
    /// falls through to the opaque lookup.
    async fn signed_attempt(&self, token: &str) -> Result<Option<Principal>, AuthError> {
        let claims = match self.codec.decode(token) {
            Ok(claims) if claims.token_type == TokenType::Access => claims,
            Ok(_) => return Ok(None),
            Err(e) => {
                tracing::trace!(reason = %e, "Not a signed access token");
                return Ok(None);
            }
        };
        Ok(self.store.find_principal(claims.sub).await?)
    }

    async fn api_key_attempt(&self, token: &str) -> Result<Validated, AuthError> {
        if let Some(principal) = self.store.find_principal_by_api_key(token).await? {
            if principal
                .api_key_expires_at
                .is_some_and(|expires_at| expires_at <= Utc::now())
            {
                tracing::info!(user_id = %principal.id, "Rejected API key: expired");
                return Err(AuthError::Expired);
            }
            return Ok(Validated {
                principal,
                kind: TokenKind::ApiKey,
            });
        }

        let Some(mut principal) = self.store.find_principal_by_legacy_token(token).await? else {
            return Err(AuthError::NotFound);
        };

        let expires_at = perpetual_expiry();
        self.store
            .migrate_legacy_token(principal.id, token, expires_at)
            .await?;
        tracing::info!(user_id = %principal.id, "Migrated legacy token to API key");

        principal.api_key = principal.legacy_token.take();
        principal.api_key_expires_at = Some(expires_at);
        Ok(Validated {
            principal,
            kind: TokenKind::LegacyToken,
        })
    }

    // ---------------------------------------------------------------------
    // Issuance
    // ---------------------------------------------------------------------

    /// Issue an access + refresh pair and persist the refresh token's hash.
    ///
    /// Earlier pairs stay valid until they expire or are revoked.
    pub async fn generate_token_pair(
        &self,
        principal: &Principal,
    ) -> Result<TokenPair, AuthError> {
        let access = self.codec.issue_access(principal.id, &principal.email)?;
        let refresh = self.codec.issue_refresh(principal.id)?;

        self.store
            .insert_refresh_token(&NewRefreshToken {
                user_id: principal.id,
                token_hash: token_hash(&refresh.token),
                expires_at: refresh.expires_at,
            })
            .await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.codec.access_ttl().num_seconds(),
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Redeem a refresh token for a new pair. A refresh token redeems at
    /// most once.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<(Principal, TokenPair), AuthError> {
        let claims = self.codec.decode(refresh_token).map_err(|e| {
            tracing::debug!(reason = %e, "Refresh token failed to decode");
            AuthError::InvalidRefreshToken
        })?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidRefreshToken);
        }

        let hash = token_hash(refresh_token);
        if self.store.is_revoked(&hash).await? {
            return Err(AuthError::InvalidRefreshToken);
        }

        let record = self
            .store
            .find_refresh_token(&hash)
            .await?
            .filter(|r| r.user_id == claims.sub && !r.is_revoked && r.expires_at > Utc::now())
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !self.store.redeem_refresh_token(record.id).await? {
            tracing::warn!(user_id = %record.user_id, "Refresh token redeemed concurrently");
            return Err(AuthError::InvalidRefreshToken);
        }
        self.store
            .insert_revocation(&NewRevokedToken {
                token_hash: hash,
                reason: REASON_REFRESHED.to_string(),
            })
            .await?;

        let principal = self
            .store
            .find_principal(claims.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        ensure_not_banned(&principal)?;

        let pair = self.generate_token_pair(&principal).await?;
        Ok((principal, pair))
    }

    /// Record `token` as revoked. A matching refresh record is flagged and a
    /// matching extension token deactivated as well.
    ///
    /// Only values that resolve to a credential are recorded: a signed token
    /// that decodes, or a stored refresh token, extension token, API key or
    /// legacy token. Anything else is `NotFound` and writes nothing.
    pub async fn revoke_token(&self, token: &str, reason: &str) -> Result<(), AuthError> {
        let hash = token_hash(token);
        let refresh = self.store.find_refresh_token(&hash).await?;
        let extension = self.store.find_extension_token(token).await?;

        if refresh.is_none() && extension.is_none() && !self.is_known_credential(token).await? {
            tracing::debug!("Revocation refused: token matches no credential");
            return Err(AuthError::NotFound);
        }

        self.store
            .insert_revocation(&NewRevokedToken {
                token_hash: hash,
                reason: reason.to_string(),
            })
            .await?;

        if let Some(record) = refresh.filter(|r| !r.is_revoked) {
            self.store.redeem_refresh_token(record.id).await?;
        }
        if let Some(ext) = extension.filter(|t| t.is_active) {
            self.store.deactivate_extension_token(ext.id).await?;
        }

        tracing::info!(reason, "Token revoked");
        Ok(())
    }

    /// A decodable signed token, or a value stored as an API key or legacy
    /// token. An expired signed token is reported as such.
    async fn is_known_credential(&self, token: &str) -> Result<bool, AuthError> {
        match self.codec.decode(token) {
            Ok(_) => return Ok(true),
            Err(AuthError::Expired) => return Err(AuthError::Expired),
            Err(_) => {}
        }
        if self.store.find_principal_by_api_key(token).await?.is_some() {
            return Ok(true);
        }
        Ok(self
            .store
            .find_principal_by_legacy_token(token)
            .await?
            .is_some())
    }

    /// Generate a new API key expiring with the principal's current
    /// subscription period. Replaces any previous key.
    pub async fn generate_api_key(
        &self,
        principal: &Principal,
    ) -> Result<IssuedApiKey, AuthError> {
        let subscription = self.current_subscription(principal.id).await?;
        let api_key = generate_opaque_token();

        self.store
            .set_api_key(
                principal.id,
                &api_key,
                subscription.current_period_end,
                Some(subscription.id),
            )
            .await?;
        tracing::info!(user_id = %principal.id, plan = %subscription.plan_id, "API key generated");

        Ok(IssuedApiKey {
            api_key,
            expires_at: subscription.current_period_end,
            subscription_id: subscription.id,
        })
    }

    /// Replace every active extension token of the principal with a new one.
    pub async fn generate_extension_token(
        &self,
        principal: &Principal,
    ) -> Result<ExtensionToken, AuthError> {
        let now = Utc::now();
        let token = self
            .store
            .rotate_extension_token(&NewExtensionToken {
                user_id: principal.id,
                token: generate_opaque_token(),
                created_at: now,
                expires_at: now + Duration::days(self.extension_token_days),
            })
            .await?;
        tracing::info!(user_id = %principal.id, "Extension token generated");
        Ok(token)
    }

    /// The principal's most recent subscription. Principals without one get
    /// a perpetual active legacy subscription created on first lookup.
    pub async fn current_subscription(
        &self,
        user_id: PrincipalId,
    ) -> Result<Subscription, AuthError> {
        if let Some(cached) = self.subscriptions.get(user_id) {
            return Ok(cached);
        }

        let subscription = match self.store.latest_subscription(user_id).await? {
            Some(sub) => sub,
            None => {
                tracing::info!(%user_id, "Creating legacy subscription");
                self.store
                    .insert_subscription(&NewSubscription {
                        user_id,
                        plan_id: LEGACY_PLAN_ID.to_string(),
                        status: SubscriptionStatus::Active,
                        current_period_start: Some(Utc::now()),
                        current_period_end: perpetual_expiry(),
                    })
                    .await?
            }
        };

        self.subscriptions.put(&subscription);
        Ok(subscription)
    }
}

fn ensure_not_banned(principal: &Principal) -> Result<(), AuthError> {
    if principal.is_banned {
        tracing::info!(user_id = %principal.id, "Rejected token: principal banned");
        return Err(AuthError::Banned);
    }
    Ok(())
}
