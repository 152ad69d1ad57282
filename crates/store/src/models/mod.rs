//! Row types for the EIP tables the gateway reads and writes.
//!
//! Field names match column names so rows (de)serialize directly from the
//! REST data API.

pub mod extension_token;
pub mod principal;
pub mod refresh_token;
pub mod revocation;
pub mod subscription;
