/// Session Keeper - authentication backend
///
/// Access/refresh token issuance, Redis-backed session records, TTL-driven
/// forced logout and refresh-token theft detection, served over axum.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mailer;
pub mod server;
pub mod session;
