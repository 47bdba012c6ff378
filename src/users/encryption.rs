//! AES-256-GCM sealing of marketplace tokens at rest.
//!
//! Each token is sealed with its own random 96-bit nonce. The master key is
//! 32 bytes, base64-encoded, and only ever read from the environment.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the master key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Seals and opens token strings with a fixed master key.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    /// Invalid base64 or a decoded key that is not exactly 32 bytes.
    pub fn from_base64_key(key_base64: &str) -> Result<Self> {
        let key_bytes = BASE64
            .decode(key_base64)
            .context("Failed to decode base64 encryption key")?;

        if key_bytes.len() != KEY_SIZE {
            return Err(anyhow!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key_bytes.len()
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

        Ok(Self { cipher })
    }

    /// Seals a token. Returns `(ciphertext, nonce)`, both base64.
    pub fn seal(&self, plaintext: &str) -> Result<(String, String)> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        Ok((BASE64.encode(ciphertext), BASE64.encode(nonce)))
    }

    /// Opens a token sealed by [`TokenCipher::seal`] under the same key.
    ///
    /// Fails on a wrong key, a wrong nonce or any tampering.
    pub fn open(&self, ciphertext: &str, nonce: &str) -> Result<String> {
        let ciphertext = BASE64
            .decode(ciphertext)
            .context("Failed to decode ciphertext")?;
        let nonce = BASE64.decode(nonce).context("Failed to decode nonce")?;

        if nonce.len() != NONCE_SIZE {
            return Err(anyhow!(
                "Invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                nonce.len()
            ));
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        String::from_utf8(plaintext).context("Decrypted token is not valid UTF-8")
    }

    /// Seals an optional token; `None` and empty tokens stay `None`.
    pub fn seal_optional(&self, token: Option<&str>) -> Result<(Option<String>, Option<String>)> {
        match token {
            Some(token) if !token.is_empty() => {
                let (ciphertext, nonce) = self.seal(token)?;
                Ok((Some(ciphertext), Some(nonce)))
            }
            _ => Ok((None, None)),
        }
    }

    /// Opens an optional `(ciphertext, nonce)` column pair.
    pub fn open_optional(
        &self,
        ciphertext: Option<String>,
        nonce: Option<String>,
    ) -> Result<Option<String>> {
        match (ciphertext, nonce) {
            (Some(ciphertext), Some(nonce)) => self.open(&ciphertext, &nonce).map(Some),
            _ => Ok(None),
        }
    }
}
