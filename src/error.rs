//! Error taxonomy for the credential/token lifecycle.
//!
//! Refresh failures inside the 401 retry path never reach callers as
//! [`Error::AuthRefresh`]; the client clears the stale tokens and lets the
//! single retry fail on its own. Everything else propagates un-recovered.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The PEM text did not contain an RSA public key.
    #[error("invalid public key format: {0}")]
    InvalidKeyFormat(String),

    /// RSA encryption of the connection id failed (oversized plaintext,
    /// unusable key).
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    /// The HTTP request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The API reported failure through the response envelope.
    #[error("marketplace API error: {0}")]
    Remote(String),

    /// The marketplace rejected connection creation or validation.
    #[error("{0}")]
    Provisioning(String),

    /// The token endpoint refused a refresh token or authorization code.
    #[error("token refresh failed: {0}")]
    AuthRefresh(String),

    /// A remote identifier was not numeric.
    #[error("invalid connection id {0:?}")]
    Format(String),

    /// No user record exists for the id.
    #[error("user {0} does not exist")]
    UnknownUser(String),

    /// The user record store failed.
    #[error("user store error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl Error {
    /// Short machine-readable name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidKeyFormat(_) => "invalid_key_format",
            Error::EncryptionFailure(_) => "encryption_failure",
            Error::Transport(_) => "transport",
            Error::Protocol(_) => "protocol",
            Error::Remote(_) => "remote",
            Error::Provisioning(_) => "provisioning",
            Error::AuthRefresh(_) => "auth_refresh",
            Error::Format(_) => "format",
            Error::UnknownUser(_) => "unknown_user",
            Error::Storage(_) => "storage",
        }
    }
}
