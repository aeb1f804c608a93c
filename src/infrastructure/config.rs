use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const APP_JSON: &str = "app.json";
pub const SETTINGS_JSON: &str = "settings.json";

const DEFAULT_API_BASE_URL: &str = "https://{account}.mite.de/";
const DEFAULT_USER_AGENT: &str = "mite-workitem";
const DEFAULT_TIMEOUT_SECONDS: u64 = 15;
const DEFAULT_TITLE_FIELD: &str = "System.Title";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_title_field")]
    pub title_field: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            request_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            title_field: default_title_field(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if !self.api_base_url.contains("{account}") {
            return Err(InfraError::InvalidConfig(
                "apiBaseUrl must contain an {account} placeholder".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(InfraError::InvalidConfig("userAgent must not be empty".to_string()));
        }
        if self.title_field.trim().is_empty() {
            return Err(InfraError::InvalidConfig("titleField must not be empty".to_string()));
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_title_field() -> String {
    DEFAULT_TITLE_FIELD.to_string()
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "apiBaseUrl": DEFAULT_API_BASE_URL,
                "userAgent": DEFAULT_USER_AGENT,
                "requestTimeoutSeconds": DEFAULT_TIMEOUT_SECONDS,
                "titleField": DEFAULT_TITLE_FIELD
            }),
        ),
        (
            SETTINGS_JSON,
            serde_json::json!({
                "schema": 1,
                "user": {}
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            write_config(&path, &value)?;
        }
    }
    Ok(())
}

pub(crate) fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub(crate) fn write_config(path: &Path, value: &serde_json::Value) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(value)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let value = read_config(&config_dir.join(APP_JSON))?;
    let config: AppConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
