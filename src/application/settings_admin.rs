use crate::application::authorization::{AuthorizationCheck, check_authorization};
use crate::application::settings_resolver::{Resolution, SettingsResolver};
use crate::domain::models::{EffectiveSettings, MiteProject, MiteService};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::mite_client::{MiteClient, MiteClientFactory};
use crate::infrastructure::settings_store::SettingsStore;
use std::sync::Arc;

pub struct SettingsAdmin<S, F>
where
    S: SettingsStore,
    F: MiteClientFactory,
{
    resolver: SettingsResolver<S>,
    client_factory: Arc<F>,
}

impl<S, F> SettingsAdmin<S, F>
where
    S: SettingsStore,
    F: MiteClientFactory,
{
    pub fn new(settings_store: Arc<S>, client_factory: Arc<F>) -> Self {
        Self {
            resolver: SettingsResolver::new(settings_store),
            client_factory,
        }
    }

    pub async fn save_credentials(&self, account_name: &str, api_key: &str) -> Result<bool, InfraError> {
        self.resolver.save_credentials(account_name, api_key).await
    }

    pub async fn test_connection(&self, account_name: &str, api_key: &str) -> AuthorizationCheck {
        let settings = EffectiveSettings {
            account_name: account_name.trim().to_string(),
            api_key: api_key.trim().to_string(),
            default_project_id: None,
            default_service_id: None,
        };
        if let Err(message) = settings.validate() {
            return AuthorizationCheck::Unreachable(message);
        }
        match self.client_factory.connect(&settings) {
            Ok(client) => {
                let check = check_authorization(client.as_ref()).await;
                tracing::info!(account = %settings.account_name, ?check, "tested mite connection");
                check
            }
            Err(error) => AuthorizationCheck::Unreachable(error.to_string()),
        }
    }

    pub async fn save_project_defaults(
        &self,
        host_project_id: &str,
        project_id: Option<u64>,
        service_id: Option<u64>,
    ) -> Result<(), InfraError> {
        self.resolver
            .save_project_defaults(host_project_id, project_id, service_id)
            .await
    }

    pub async fn list_projects(&self, host_project_id: &str) -> Result<Vec<MiteProject>, InfraError> {
        let client = self.connect(host_project_id).await?;
        client.list_projects().await
    }

    pub async fn list_services(&self, host_project_id: &str) -> Result<Vec<MiteService>, InfraError> {
        let client = self.connect(host_project_id).await?;
        client.list_services().await
    }

    async fn connect(&self, host_project_id: &str) -> Result<Arc<F::Client>, InfraError> {
        match self.resolver.resolve(host_project_id).await? {
            Resolution::Configured(settings) => self.client_factory.connect(&settings),
            Resolution::Unconfigured => Err(InfraError::Settings(
                "mite account name and api key are not configured".to_string(),
            )),
        }
    }
}
