#![warn(missing_docs)]

//! Arcveil gateway: HTTP surface over the privacy pipeline
//!
//! Bearer-token auth, bounded in-memory access log, and one endpoint per
//! pipeline stage plus the combined secure query.

pub mod access_log;
pub mod api;
pub mod auth;
pub mod config;

pub use access_log::{AccessEntry, AccessLog};
pub use api::{AppState, GatewayApi};
pub use auth::{constant_time_eq, AuthRateLimiter, TokenStore};
pub use config::{GatewayConfig, UserCredential};
