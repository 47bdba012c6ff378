//! RSA primitives for the signed connection identifier.
//!
//! The marketplace publishes a partner-tenant public key as PEM text. The
//! partner encrypts `"{connectionId}||{token}"` with it and hands the
//! URL-safe result to the iframe, which the marketplace decrypts and checks.
//!
//! ```text
//! GET /me/public-key ──► import_public_key ──► RsaPublicKey
//!                                                   │
//! connection id + one-time code ──► sign_connection_id ──► "kLq3..._x"
//! ```

mod key;
mod signer;

pub use key::import_public_key;
pub use signer::{sign_connection_id, url_safe_encode, PKCS1_V15_OVERHEAD, SEPARATOR};

/// Key size the marketplace provisions partner keys with. Informational:
/// encryption works with any modulus size.
pub const PUBLIC_KEY_SIZE_BITS: usize = 4096;
