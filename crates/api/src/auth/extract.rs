//! Pulling tokens and caller addresses out of HTTP requests.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use scout_core::error::AuthError;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::state::AppState;

/// The token in an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The presented token: the bearer header wins over the body field.
pub fn extract_token(headers: &HeaderMap, body_token: Option<&str>) -> Result<String, AuthError> {
    bearer_token(headers)
        .or_else(|| body_token.map(str::trim).filter(|t| !t.is_empty()))
        .map(str::to_string)
        .ok_or(AuthError::MissingToken)
}

/// Parse a JSON body that may legitimately be absent.
///
/// An empty body yields `T::default()`; anything else must be valid JSON.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Header a reverse proxy appends the address it received a request from.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The caller's IP address, used as the rate-limit key.
///
/// The socket peer from `ConnectInfo` is the caller unless it is one of the
/// configured trusted proxies. Only then is `X-Forwarded-For` consulted. A
/// request with no peer address (never the case under `axum::serve`) keys on
/// `0.0.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    pub fn from_parts(parts: &Parts, trusted_proxies: &[IpAddr]) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = match peer {
            Some(peer) if trusted_proxies.contains(&peer) => {
                forwarded_client(&parts.headers, trusted_proxies).unwrap_or(peer)
            }
            Some(peer) => peer,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        Self(ip)
    }
}

/// Walk `X-Forwarded-For` from the nearest hop outwards and stop at the first
/// address that is not a trusted proxy. Hops further left were written by the
/// client and are never looked at.
fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    let mut client = None;
    for hop in hops.into_iter().rev() {
        let ip = hop.parse::<IpAddr>().ok()?;
        client = Some(ip);
        if !trusted_proxies.contains(&ip) {
            break;
        }
    }
    client
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts, &state.config.trusted_proxies))
    }
}
