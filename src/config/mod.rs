mod env;

pub use env::{encryption_key_from_env, ENCRYPTION_KEY_VAR};

use crate::provision::ConnectionCredential;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Complete partner configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerConfig {
    #[serde(default)]
    pub zwapgrid: ZwapgridConfig,
    /// Credential template sent when a connection is created
    #[serde(default)]
    pub connection: ConnectionCredential,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub flows: FlowConfig,
}

/// Marketplace endpoints and OAuth client credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ZwapgridConfig {
    /// API root, e.g. `https://api.zwapgrid.com/`
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Page the iframe loads, e.g. `https://app.zwapgrid.com/zwapstore`
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Partner system name passed as `source`
    #[serde(default = "default_source_system")]
    pub source_system: String,
    #[serde(default = "default_hide_source")]
    pub hide_source: bool,
    /// Iframe language (`en`, `sv`); omitted from the URL when unset
    #[serde(default)]
    pub lang: Option<String>,
}

fn default_api_url() -> String {
    "https://api.zwapgrid.com/".to_string()
}

fn default_app_url() -> String {
    "https://app.zwapgrid.com/zwapstore".to_string()
}

fn default_source_system() -> String {
    "InvoiceOnline".to_string()
}

fn default_hide_source() -> bool {
    true
}

impl Default for ZwapgridConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            app_url: default_app_url(),
            client_id: String::new(),
            client_secret: String::new(),
            source_system: default_source_system(),
            hide_source: default_hide_source(),
            lang: None,
        }
    }
}

impl ZwapgridConfig {
    /// `{api_url}api/v1` without a trailing slash.
    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.api_url.trim_end_matches('/'))
    }
}

/// HTTP host configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// User store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "partner.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Run at most one logical flow per user at a time. Concurrent flows
    /// for one user can otherwise both spend the same single-use refresh
    /// token.
    #[serde(default = "default_serialize_per_user")]
    pub serialize_per_user: bool,
}

fn default_serialize_per_user() -> bool {
    true
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            serialize_per_user: default_serialize_per_user(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PartnerConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PartnerConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load configuration from `PARTNER_CONFIG` (default `partner.toml`), then
/// apply environment overrides. A missing file means all defaults.
pub fn load_from_env() -> Result<PartnerConfig> {
    let path = std::env::var("PARTNER_CONFIG").unwrap_or_else(|_| "partner.toml".to_string());

    let mut config = if Path::new(&path).exists() {
        info!(path = %path, "Loading configuration");
        load_config(&path)?
    } else {
        info!(path = %path, "No config file, using defaults");
        PartnerConfig::default()
    };

    env::apply_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}
