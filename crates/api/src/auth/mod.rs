//! Token issuance and validation.
//!
//! - [`jwt`] -- Token Codec for signed access and refresh tokens.
//! - [`manager`] -- Token Manager: the validation pipeline and issuance flows.
//! - [`subscription_cache`] -- TTL cache in front of subscription lookups.
//! - [`extract`] -- Token and client-IP extraction from requests.

pub mod extract;
pub mod jwt;
pub mod manager;
pub mod subscription_cache;
