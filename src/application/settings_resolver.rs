use crate::domain::models::{EffectiveSettings, encode_default_id, parse_default_id};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_store::{
    ACCOUNT_NAME_KEY, API_KEY_KEY, SettingsStore, project_id_key, service_id_key,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Configured(EffectiveSettings),
    Unconfigured,
}

pub struct SettingsResolver<S>
where
    S: SettingsStore,
{
    store: Arc<S>,
}

impl<S> Clone for SettingsResolver<S>
where
    S: SettingsStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> SettingsResolver<S>
where
    S: SettingsStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, host_project_id: &str) -> Result<Resolution, InfraError> {
        let account_name = self.read_trimmed(ACCOUNT_NAME_KEY).await?;
        let api_key = self.read_trimmed(API_KEY_KEY).await?;
        if account_name.is_empty() || api_key.is_empty() {
            return Ok(Resolution::Unconfigured);
        }

        let default_project_id = self.read_default_id(&project_id_key(host_project_id)).await?;
        let default_service_id = self.read_default_id(&service_id_key(host_project_id)).await?;

        Ok(Resolution::Configured(EffectiveSettings {
            account_name,
            api_key,
            default_project_id,
            default_service_id,
        }))
    }

    pub async fn save_credentials(&self, account_name: &str, api_key: &str) -> Result<bool, InfraError> {
        let account_name = account_name.trim();
        let api_key = api_key.trim();
        if account_name.is_empty() || api_key.is_empty() {
            return Err(InfraError::Settings(
                "account name and api key are both required".to_string(),
            ));
        }

        let saved_account = self.read_trimmed(ACCOUNT_NAME_KEY).await?;
        let saved_key = self.read_trimmed(API_KEY_KEY).await?;
        if saved_account == account_name && saved_key == api_key {
            return Ok(false);
        }

        self.store.set_value(ACCOUNT_NAME_KEY, account_name).await?;
        self.store.set_value(API_KEY_KEY, api_key).await?;
        tracing::info!(account = account_name, "saved mite credentials");
        Ok(true)
    }

    pub async fn save_project_defaults(
        &self,
        host_project_id: &str,
        project_id: Option<u64>,
        service_id: Option<u64>,
    ) -> Result<(), InfraError> {
        if host_project_id.trim().is_empty() {
            return Err(InfraError::Settings("host project id must not be empty".to_string()));
        }
        self.store
            .set_value(&project_id_key(host_project_id), &encode_default_id(project_id))
            .await?;
        self.store
            .set_value(&service_id_key(host_project_id), &encode_default_id(service_id))
            .await?;
        tracing::info!(
            host_project_id,
            ?project_id,
            ?service_id,
            "saved project defaults"
        );
        Ok(())
    }

    async fn read_trimmed(&self, key: &str) -> Result<String, InfraError> {
        Ok(self
            .store
            .get_value(key)
            .await?
            .map(|value| value.trim().to_string())
            .unwrap_or_default())
    }

    async fn read_default_id(&self, key: &str) -> Result<Option<u64>, InfraError> {
        let Some(raw) = self.store.get_value(key).await? else {
            return Ok(None);
        };
        let parsed = parse_default_id(&raw);
        if parsed.is_none() && raw.trim() != "-1" {
            tracing::warn!(key, value = %raw, "ignoring unparsable project default");
        }
        Ok(parsed)
    }
}
