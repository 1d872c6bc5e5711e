//! Application configuration.
//!
//! Read once at startup from an `appsettings.json` file:
//!
//! ```json
//! {
//!   "AzureAd": { "TenantId": "...", "ClientId": "...", "ClientSecret": "..." },
//!   "Graph": { "TargetUser": "user@example.com" }
//! }
//! ```
//!
//! `GRAPHXFER_*` environment variables override the file values.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use graphxfer_common::{ClientSecret, Error, PrincipalName, Result};
use graphxfer_storage::graph::{DEFAULT_AUTHORITY, DEFAULT_TIMEOUT, GRAPH_API_BASE};

use crate::service::TransferSettings;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "appsettings.json";

/// Default directory uploads are read from.
pub const DEFAULT_SOURCE_DIR: &str = "files";

/// Service-principal credentials section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AzureAdConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<ClientSecret>,
    /// Authority host, e.g. `https://login.microsoftonline.us` for sovereign clouds.
    pub authority: Option<String>,
}

/// Graph endpoint section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphConfig {
    /// Principal whose drive is used for both upload and download.
    pub target_user: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Local transfer section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransferConfig {
    pub source_dir: Option<PathBuf>,
}

/// Raw configuration as found in the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(default)]
    pub azure_ad: AzureAdConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Configuration after validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub authority: String,
    pub target_user: PrincipalName,
    pub graph_base_url: String,
    pub timeout: Duration,
    pub source_dir: PathBuf,
}

impl Settings {
    /// Settings for the transfer service.
    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            source_dir: self.source_dir.clone(),
            target_user: self.target_user.clone(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Load the configuration file and apply environment overrides.
    ///
    /// # Errors
    /// - `Configuration` if the file is missing or malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_json_str(&json)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override values from a key lookup (normally the process environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("GRAPHXFER_TENANT_ID") {
            self.azure_ad.tenant_id = Some(value);
        }
        if let Some(value) = lookup("GRAPHXFER_CLIENT_ID") {
            self.azure_ad.client_id = Some(value);
        }
        if let Some(value) = lookup("GRAPHXFER_CLIENT_SECRET") {
            self.azure_ad.client_secret = Some(ClientSecret::new(value));
        }
        if let Some(value) = lookup("GRAPHXFER_TARGET_USER") {
            self.graph.target_user = Some(value);
        }
    }

    /// Check required values and fill in defaults.
    ///
    /// # Errors
    /// - `Configuration` naming the first missing or invalid value
    pub fn validate(&self) -> Result<Settings> {
        let tenant_id = required(&self.azure_ad.tenant_id, "AzureAd:TenantId")?;
        let client_id = required(&self.azure_ad.client_id, "AzureAd:ClientId")?;
        let client_secret = self
            .azure_ad
            .client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("AzureAd:ClientSecret"))?;
        let target_user = PrincipalName::new(required(&self.graph.target_user, "Graph:TargetUser")?)
            .map_err(|_| missing("Graph:TargetUser"))?;

        let timeout = match self.graph.timeout_secs {
            Some(0) => {
                return Err(Error::Configuration(
                    "Graph:TimeoutSecs must be greater than zero".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Settings {
            tenant_id,
            client_id,
            client_secret,
            authority: self
                .azure_ad
                .authority
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
            target_user,
            graph_base_url: self
                .graph
                .base_url
                .clone()
                .unwrap_or_else(|| GRAPH_API_BASE.to_string()),
            timeout,
            source_dir: self
                .transfer
                .source_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR)),
        })
    }
}

fn missing(key: &str) -> Error {
    Error::Configuration(format!("Missing required setting {}", key))
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| missing(key))
}
