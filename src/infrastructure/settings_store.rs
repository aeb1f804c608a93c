use crate::infrastructure::config::{read_config, write_config};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const ACCOUNT_NAME_KEY: &str = "mite-account-name";
pub const API_KEY_KEY: &str = "mite-api-user-key";
pub const PROJECT_ID_KEY: &str = "mite-project-id";
pub const SERVICE_ID_KEY: &str = "mite-service-id";

const USER_SCOPE: &str = "user";

pub fn project_id_key(host_project_id: &str) -> String {
    format!("{PROJECT_ID_KEY}-{host_project_id}")
}

pub fn service_id_key(host_project_id: &str) -> String {
    format!("{SERVICE_ID_KEY}-{host_project_id}")
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>, InfraError>;
    async fn set_value(&self, key: &str, value: &str) -> Result<(), InfraError>;
}

#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_guard: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, InfraError> {
        let settings = read_config(&self.path)?;
        Ok(settings
            .get(USER_SCOPE)
            .and_then(serde_json::Value::as_object)
            .and_then(|values| values.get(key))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|error| InfraError::Settings(format!("settings file lock poisoned: {error}")))?;

        let mut settings = read_config(&self.path)?;
        let object = settings.as_object_mut().ok_or_else(|| {
            InfraError::InvalidConfig(format!("invalid object structure in {}", self.path.display()))
        })?;
        let scope = object
            .entry(USER_SCOPE)
            .or_insert_with(|| serde_json::json!({}));
        let values = scope.as_object_mut().ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "invalid user settings structure in {}",
                self.path.display()
            ))
        })?;
        values.insert(key.to_string(), serde_json::Value::String(value.to_string()));

        write_config(&self.path, &settings)
    }
}

#[derive(Debug, Clone)]
pub struct KeyringSettingsStore {
    service_name: String,
}

impl KeyringSettingsStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, key)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringSettingsStore {
    fn default() -> Self {
        Self::new("mite-workitem.settings")
    }
}

#[async_trait]
impl SettingsStore for KeyringSettingsStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, InfraError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

#[derive(Debug)]
pub enum SelectedSettingsStore {
    File(JsonFileSettingsStore),
    Keyring(KeyringSettingsStore),
}

#[async_trait]
impl SettingsStore for SelectedSettingsStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, InfraError> {
        match self {
            Self::File(store) => store.get_value(key).await,
            Self::Keyring(store) => store.get_value(key).await,
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), InfraError> {
        match self {
            Self::File(store) => store.set_value(key, value).await,
            Self::Keyring(store) => store.set_value(key, value).await,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, InfraError> {
        let values = self
            .values
            .lock()
            .map_err(|error| InfraError::Settings(format!("in-memory lock poisoned: {error}")))?;
        Ok(values.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let mut values = self
            .values
            .lock()
            .map_err(|error| InfraError::Settings(format!("in-memory lock poisoned: {error}")))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
