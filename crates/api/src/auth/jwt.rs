//! Token Codec: HS256 signed access and refresh tokens.
//!
//! Both token types share one [`Claims`] payload distinguished by the `type`
//! claim. Refresh tokens are persisted server-side only as their SHA-256
//! hash (see [`scout_core::hashing::token_hash`]).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use scout_core::error::AuthError;
use scout_core::types::{PrincipalId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two signed token types a [`Claims`] payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Access,
    Refresh,
}

/// JWT claims embedded in every signed token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the principal's EIP user id.
    pub sub: PrincipalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Tokens without a `type` claim are treated as access tokens.
    #[serde(rename = "type", default)]
    pub token_type: TokenType,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier (UUID v4).
    pub jti: String,
}

/// Caller-supplied claims passed to [`TokenCodec::encode`].
#[derive(Debug, Clone)]
pub struct ExtraClaims {
    pub email: Option<String>,
    pub token_type: TokenType,
    pub jti: String,
}

/// Configuration for signed token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret, optionally base64-encoded.
    pub secret: String,
    /// Access token lifetime in minutes (default: 60).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
pub const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 60;
/// Default refresh token expiry in days.
pub const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

/// A freshly signed token with the values callers need to persist or return.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: Timestamp,
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// Key bytes for `secret`: its base64 decoding when that succeeds and is
/// non-empty, otherwise the literal bytes.
pub fn secret_bytes(secret: &str) -> Vec<u8> {
    match STANDARD.decode(secret.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => secret.as_bytes().to_vec(),
    }
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let key = secret_bytes(&config.secret);
        Self {
            encoding: EncodingKey::from_secret(&key),
            decoding: DecodingKey::from_secret(&key),
            access_ttl: Duration::minutes(config.access_token_expiry_mins),
            refresh_ttl: Duration::days(config.refresh_token_expiry_days),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a token for `subject` expiring at `expiry`, issued now.
    pub fn encode(
        &self,
        subject: PrincipalId,
        extra: ExtraClaims,
        expiry: Timestamp,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject,
            email: extra.email,
            token_type: extra.token_type,
            iat: Utc::now().timestamp(),
            exp: expiry.timestamp(),
            jti: extra.jti,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify the signature and expiry of `token` and return its claims.
    ///
    /// Expiry is checked with zero leeway.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed,
            })
    }

    /// Sign an access token carrying the principal's email.
    pub fn issue_access(
        &self,
        subject: PrincipalId,
        email: &str,
    ) -> Result<IssuedToken, AuthError> {
        self.issue(subject, Some(email.to_string()), TokenType::Access, self.access_ttl)
    }

    /// Sign a refresh token. Refresh tokens carry no email.
    pub fn issue_refresh(&self, subject: PrincipalId) -> Result<IssuedToken, AuthError> {
        self.issue(subject, None, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(
        &self,
        subject: PrincipalId,
        email: Option<String>,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let jti = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + ttl;
        let token = self.encode(
            subject,
            ExtraClaims {
                email,
                token_type,
                jti: jti.clone(),
            },
            expires_at,
        )?;
        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// Helper to build a test config with a known secret.
    fn test_config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            access_token_expiry_mins: 60,
            refresh_token_expiry_days: 7,
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(&test_config("test-secret-that-is-long-enough-for-hmac"))
    }

    #[test]
    fn access_token_round_trips_subject() {
        let codec = codec();
        let subject = Uuid::new_v4();
        let issued = codec
            .issue_access(subject, "a@scout.test")
            .expect("token generation should succeed");

        let claims = codec.decode(&issued.token).expect("decode should succeed");
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.email.as_deref(), Some("a@scout.test"));
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.jti, issued.jti);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_is_typed() {
        let codec = codec();
        let issued = codec.issue_refresh(Uuid::new_v4()).expect("issue");
        let claims = codec.decode(&issued.token).expect("decode");
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert!(claims.email.is_none());
    }

    #[test]
    fn expired_token_fails_distinctly() {
        let codec = codec();
        let token = codec
            .encode(
                Uuid::new_v4(),
                ExtraClaims {
                    email: None,
                    token_type: TokenType::Access,
                    jti: Uuid::new_v4().to_string(),
                },
                Utc::now() - Duration::seconds(5),
            )
            .expect("encoding should succeed");

        assert_matches!(codec.decode(&token), Err(AuthError::Expired));
    }

    #[test]
    fn different_secrets_fail_signature() {
        let a = TokenCodec::new(&test_config("secret-alpha"));
        let b = TokenCodec::new(&test_config("secret-bravo"));
        let issued = a.issue_access(Uuid::new_v4(), "x@scout.test").expect("issue");

        assert_matches!(b.decode(&issued.token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn malformed_strings_fail_without_panicking() {
        let codec = codec();
        for input in ["", "abc", "a.b.c", "....", &"f".repeat(64), "eyJhbGciOiJIUzI1NiJ9.e30"] {
            assert_matches!(codec.decode(input), Err(AuthError::Malformed), "{input:?}");
        }
    }

    #[test]
    fn base64_secret_is_decoded_before_use() {
        let raw = "a-raw-secret-value";
        let encoded = STANDARD.encode(raw);
        let from_raw = TokenCodec::new(&test_config(raw));
        let from_encoded = TokenCodec::new(&test_config(&encoded));

        let issued = from_raw.issue_access(Uuid::new_v4(), "x@scout.test").expect("issue");
        assert!(from_encoded.decode(&issued.token).is_ok());
    }

    #[test]
    fn non_base64_secret_is_used_literally() {
        assert_eq!(secret_bytes("not base64!"), b"not base64!".to_vec());
        assert_eq!(secret_bytes("c2VjcmV0"), b"secret".to_vec());
    }
}
