use serde::{Deserialize, Serialize};

/// Principals are identified by the EIP's UUID user id.
pub type PrincipalId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The credential kind a successful validation matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived signed access token.
    Access,
    /// Long-lived signed refresh token.
    Refresh,
    /// Opaque 64-hex API key stored on the principal.
    ApiKey,
    /// Opaque 64-hex token issued to the browser extension.
    ExtensionToken,
    /// Opaque token found under the legacy column and migrated on use.
    LegacyToken,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::ApiKey => "api_key",
            TokenKind::ExtensionToken => "extension_token",
            TokenKind::LegacyToken => "legacy_token",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which opaque store an endpoint falls back to when a presented token is
/// not a valid signed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    /// Look the value up as an API key (then the legacy column). API-key
    /// validation also requires an active subscription.
    ApiKey,
    /// Look the value up in the extension token table.
    ExtensionToken,
}
