//! PEM import of the marketplace public key.

use crate::error::{Error, Result};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::der::pem;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use tracing::debug;

/// U+FEFF as it appears once the key text has been decoded to a string.
const UTF8_BOM: char = '\u{feff}';

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";
const PEM_DASHES: &str = "-----";

/// Imports an RSA public key from PEM text.
///
/// A leading byte-order mark is stripped first; the marketplace serves the
/// key with one on some tenants. Only the first PEM object in the text is
/// considered. Both SubjectPublicKeyInfo (`PUBLIC KEY`) and PKCS#1
/// (`RSA PUBLIC KEY`) encodings are accepted.
///
/// # Errors
/// * `InvalidKeyFormat` - No PEM object, or the object is not an RSA public
///   key (private keys, certificates, EC keys).
pub fn import_public_key(pem_text: &str) -> Result<RsaPublicKey> {
    let text = pem_text.strip_prefix(UTF8_BOM).unwrap_or(pem_text);

    let (label, block) = first_pem_object(text)?;

    let key = match label {
        "PUBLIC KEY" => RsaPublicKey::from_public_key_pem(block).map_err(|e| {
            Error::InvalidKeyFormat(format!("not an RSA public key: {}", e))
        })?,
        "RSA PUBLIC KEY" => RsaPublicKey::from_pkcs1_pem(block).map_err(|e| {
            Error::InvalidKeyFormat(format!("malformed PKCS#1 public key: {}", e))
        })?,
        other => {
            return Err(Error::InvalidKeyFormat(format!(
                "expected a public key, found '{}'",
                other
            )))
        }
    };

    debug!(bits = key.size() * 8, "Imported marketplace public key");

    Ok(key)
}

/// Returns the label and the full text (BEGIN through END line) of the first
/// PEM object.
fn first_pem_object(text: &str) -> Result<(&str, &str)> {
    let start = text
        .find(PEM_BEGIN)
        .ok_or_else(|| Error::InvalidKeyFormat("no PEM object found".to_string()))?;
    let object = &text[start..];

    let end_line = object
        .find(PEM_END)
        .ok_or_else(|| Error::InvalidKeyFormat("missing PEM END line".to_string()))?;
    let after_end = end_line + PEM_END.len();
    let end = object[after_end..]
        .find(PEM_DASHES)
        .map(|len| after_end + len + PEM_DASHES.len())
        .ok_or_else(|| Error::InvalidKeyFormat("unterminated PEM END line".to_string()))?;
    let block = &object[..end];

    let label = pem::decode_label(block.as_bytes())
        .map_err(|e| Error::InvalidKeyFormat(format!("malformed PEM object: {}", e)))?;

    Ok((label, block))
}
