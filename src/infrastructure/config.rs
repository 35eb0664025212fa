use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::remote_store::DEFAULT_TABLE;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 5;

const REMOTE_URL_KEYS: &[&str] = &["TASKTIMER_REMOTE_URL", "SUPABASE_URL"];
const REMOTE_KEY_KEYS: &[&str] = &["TASKTIMER_REMOTE_KEY", "SUPABASE_ANON_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub url: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            table: default_table(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            app_name: default_app_name(),
            timezone: default_timezone(),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
            remote: RemoteConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn time_zone(&self) -> Result<Tz, InfraError> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return Ok(chrono_tz::UTC);
        }
        name.parse::<Tz>()
            .map_err(|error| InfraError::InvalidConfig(format!("unknown timezone '{name}': {error}")))
    }

    pub fn refresh_interval_seconds(&self) -> u64 {
        self.refresh_interval_seconds.max(1)
    }
}

fn default_app_name() -> String {
    "TaskTimer".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECONDS
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

/// Connection details for the remote store, resolved from env, config and keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub table: String,
    pub api_key: String,
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    let config: AppConfig = serde_json::from_value(parsed)?;
    config.time_zone()?;
    Ok(config)
}

pub fn resolve_remote_settings<F, C>(
    config: &AppConfig,
    lookup: F,
    credentials: &C,
) -> Option<RemoteSettings>
where
    F: Fn(&str) -> Option<String>,
    C: CredentialStore + ?Sized,
{
    let url = optional_lookup_value(&lookup, REMOTE_URL_KEYS).or_else(|| {
        config
            .remote
            .url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })?;

    let api_key = optional_lookup_value(&lookup, REMOTE_KEY_KEYS).or_else(|| {
        match credentials.load_api_key() {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(error = %error, "failed to read remote api key from credential store");
                None
            }
        }
    })?;

    let table = config.remote.table.trim();
    Some(RemoteSettings {
        url,
        table: if table.is_empty() { default_table() } else { table.to_string() },
        api_key,
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|key| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
