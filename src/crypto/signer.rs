//! Signed connection identifier.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

/// Separator between connection id and token. The marketplace rebuilds the
/// same string when it verifies the identifier.
pub const SEPARATOR: &str = "||";

/// PKCS#1 v1.5 padding takes at least 11 bytes of the modulus.
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Encrypts `"{connection_id}||{correlation_token}"` with the marketplace key.
///
/// # Arguments
/// * `connection_id` - Marketplace connection id
/// * `correlation_token` - Short-lived token valid at signing time (one-time
///   code or partner token); the marketplace rejects the identifier once it
///   expires
/// * `key` - Imported marketplace public key
///
/// # Returns
/// * `Ok(String)` - RSA-PKCS#1 v1.5 ciphertext, URL-safe base64 without padding
/// * `Err(EncryptionFailure)` - Plaintext larger than `key.size() - 11` bytes,
///   or the key rejected the operation
pub fn sign_connection_id(
    connection_id: i64,
    correlation_token: &str,
    key: &RsaPublicKey,
) -> Result<String> {
    let plaintext = format!("{}{}{}", connection_id, SEPARATOR, correlation_token);

    let capacity = key.size().saturating_sub(PKCS1_V15_OVERHEAD);
    if plaintext.len() > capacity {
        return Err(Error::EncryptionFailure(format!(
            "plaintext is {} bytes, key accepts at most {}",
            plaintext.len(),
            capacity
        )));
    }

    // Padding is random, so two calls never produce the same ciphertext.
    let mut rng = rand::thread_rng();
    let ciphertext = key
        .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
        .map_err(|e| Error::EncryptionFailure(e.to_string()))?;

    Ok(url_safe_encode(&ciphertext))
}

/// Base64 with `+` → `-`, `/` → `_` and trailing `=` removed.
pub fn url_safe_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
