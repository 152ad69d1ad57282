//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the principal from a bearer access token
//!   or session cookie.
//! - [`rbac::RequireAdmin`] -- Requires the admin flag.

pub mod auth;
pub mod rbac;
