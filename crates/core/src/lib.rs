//! Domain primitives shared by every Scout crate.
//!
//! This crate has no I/O: token generation, hashing, the sliding-window
//! rate-limit rule, subscription rules, and the error taxonomy live here so
//! the store adapters and the HTTP gateway agree on them.

pub mod error;
pub mod hashing;
pub mod rate_limit;
pub mod subscription;
pub mod tokens;
pub mod types;
