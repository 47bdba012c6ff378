// Error types shared by every module
pub mod error;

// TOML configuration and environment overrides
pub mod config;

// RSA key import and connection id signing
pub mod crypto;

// User records and their stores
pub mod users;

// Per-flow credential context
pub mod session;

// Token endpoint exchanges
pub mod oauth;

// Marketplace API client with single 401 retry
pub mod client;

// Connection creation and validation
pub mod provision;

// Iframe URL and browser messages
pub mod embed;

// Embed flows and per-user serialization
pub mod flow;

// Local user identification
pub mod auth;

// HTTP host endpoints
pub mod api;

pub use error::{Error, Result};
