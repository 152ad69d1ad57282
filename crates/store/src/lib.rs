//! Token Store Adapter.
//!
//! All token-related persistence goes through the [`TokenStore`] trait and
//! all credential checks through [`IdentityProvider`]. Two implementations
//! exist for each:
//!
//! - [`rest_store::RestTokenStore`] / [`identity::RestIdentityProvider`] talk
//!   to the EIP's REST data API and auth endpoint.
//! - [`memory::MemoryTokenStore`] / [`memory::MemoryIdentityProvider`] keep
//!   everything in process, for tests and local development.
//!
//! Reads return `Option` or `Vec`; an empty result means zero rows. Transport
//! failures and non-2xx responses are [`StoreError`]s.

pub mod error;
pub mod identity;
pub mod memory;
pub mod models;
pub mod rest;
pub mod rest_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use identity::{Identity, IdentityProvider};
pub use store::TokenStore;
