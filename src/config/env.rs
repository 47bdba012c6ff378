use super::PartnerConfig;
use anyhow::{Context, Result};

/// Base64-encoded 32-byte key sealing tokens at rest. Never read from the
/// config file.
pub const ENCRYPTION_KEY_VAR: &str = "PARTNER_ENCRYPTION_KEY";

/// Apply environment overrides, falling back to what the file said.
pub(super) fn apply_overrides<F>(config: &mut PartnerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ZWAPGRID_API_URL") {
        config.zwapgrid.api_url = v;
    }
    if let Some(v) = lookup("ZWAPGRID_APP_URL") {
        config.zwapgrid.app_url = v;
    }
    if let Some(v) = lookup("ZWAPGRID_CLIENT_ID") {
        config.zwapgrid.client_id = v;
    }
    if let Some(v) = lookup("ZWAPGRID_CLIENT_SECRET") {
        config.zwapgrid.client_secret = v;
    }
    if let Some(v) = lookup("PARTNER_BIND") {
        config.server.bind = v;
    }
    if let Some(v) = lookup("PARTNER_SERIALIZE_PER_USER") {
        if let Ok(b) = v.parse::<bool>() {
            config.flows.serialize_per_user = b;
        }
    }
}

/// Read the at-rest encryption key.
pub fn encryption_key_from_env() -> Result<String> {
    std::env::var(ENCRYPTION_KEY_VAR)
        .with_context(|| format!("{} must be set (base64, 32 bytes)", ENCRYPTION_KEY_VAR))
}
