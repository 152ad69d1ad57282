//! Credential checks against the EIP's auth endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use scout_core::types::PrincipalId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::rest::RestClient;

/// The identity the EIP vouches for after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: PrincipalId,
    pub email: String,
}

/// Email/password authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Returns `Ok(None)` when the credentials are rejected.
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Option<Identity>>;
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct PasswordGrantResponse {
    user: Identity,
}

/// Identity provider calling `POST /auth/v1/token?grant_type=password`.
#[derive(Debug, Clone)]
pub struct RestIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestIdentityProvider {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> StoreResult<Option<Identity>> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        // Rejected credentials come back as 400 (invalid_grant) or 401.
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            tracing::debug!(status = %response.status(), "EIP rejected credentials");
            return Ok(None);
        }

        let response = RestClient::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        let grant: PasswordGrantResponse =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(grant.user))
    }
}
