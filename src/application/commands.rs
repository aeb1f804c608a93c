use crate::application::authorization::AuthorizationCheck;
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::coordinator::{ActionOutcome, PublishedState, TrackingCoordinator};
use crate::application::settings_admin::SettingsAdmin;
use crate::domain::models::{HostProject, MiteProject, MiteService, WorkItemId};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::host::StaticHostContext;
use crate::infrastructure::mite_client::ReqwestMiteClientFactory;
use crate::infrastructure::settings_store::{
    JsonFileSettingsStore, KeyringSettingsStore, SelectedSettingsStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone)]
pub struct WorkItemTarget {
    pub host_project_id: String,
    pub work_item_id: WorkItemId,
    pub title: Option<String>,
}

type CliCoordinator = TrackingCoordinator<StaticHostContext, SelectedSettingsStore, ReqwestMiteClientFactory>;

pub struct AppState {
    workspace_root: PathBuf,
    logs_dir: PathBuf,
    app_config: AppConfig,
    settings_store: Arc<SelectedSettingsStore>,
    client_factory: Arc<ReqwestMiteClientFactory>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf, store: StoreKind) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let settings_store = match store {
            StoreKind::File => SelectedSettingsStore::File(JsonFileSettingsStore::new(&bootstrap.settings_path)),
            StoreKind::Keyring => SelectedSettingsStore::Keyring(KeyringSettingsStore::default()),
        };

        Ok(Self {
            workspace_root,
            logs_dir: bootstrap.logs_dir,
            client_factory: Arc::new(ReqwestMiteClientFactory::new(bootstrap.app_config.clone())),
            app_config: bootstrap.app_config,
            settings_store: Arc::new(settings_store),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        tracing::error!(command, error = %error, "command failed");
        error.to_string()
    }

    fn coordinator(&self, target: &WorkItemTarget) -> CliCoordinator {
        let project = HostProject {
            id: target.host_project_id.clone(),
            name: target.host_project_id.clone(),
        };
        let mut host = StaticHostContext::new(project).with_work_item(target.work_item_id);
        if let Some(title) = &target.title {
            host = host.with_field(self.app_config.title_field.clone(), title.clone());
        }
        TrackingCoordinator::new(
            Arc::new(host),
            Arc::clone(&self.settings_store),
            Arc::clone(&self.client_factory),
        )
        .with_title_field(self.app_config.title_field.clone())
    }

    fn admin(&self) -> SettingsAdmin<SelectedSettingsStore, ReqwestMiteClientFactory> {
        SettingsAdmin::new(Arc::clone(&self.settings_store), Arc::clone(&self.client_factory))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingCommandResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionOutcome>,
    pub state: PublishedState,
    pub minutes: String,
}

impl TrackingCommandResponse {
    fn new(action: Option<ActionOutcome>, state: PublishedState) -> Self {
        Self {
            minutes: state.minutes_display(),
            action,
            state,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.action.as_ref().is_none_or(|action| *action == ActionOutcome::Applied)
    }
}

pub async fn status_impl(state: &AppState, target: &WorkItemTarget) -> TrackingCommandResponse {
    let coordinator = state.coordinator(target);
    let published = coordinator.initialize().await;
    TrackingCommandResponse::new(None, published)
}

pub async fn start_impl(state: &AppState, target: &WorkItemTarget) -> TrackingCommandResponse {
    let coordinator = state.coordinator(target);
    coordinator.initialize().await;
    let outcome = coordinator.start().await;
    tracing::info!(work_item_id = target.work_item_id, ?outcome, "start command finished");
    TrackingCommandResponse::new(Some(outcome), coordinator.snapshot())
}

pub async fn stop_impl(state: &AppState, target: &WorkItemTarget) -> TrackingCommandResponse {
    let coordinator = state.coordinator(target);
    coordinator.initialize().await;
    let outcome = coordinator.stop().await;
    tracing::info!(work_item_id = target.work_item_id, ?outcome, "stop command finished");
    TrackingCommandResponse::new(Some(outcome), coordinator.snapshot())
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigureResponse {
    pub changed: bool,
}

pub async fn configure_impl(
    state: &AppState,
    account_name: String,
    api_key: String,
) -> Result<ConfigureResponse, InfraError> {
    let changed = state.admin().save_credentials(&account_name, &api_key).await?;
    Ok(ConfigureResponse { changed })
}

pub async fn test_connection_impl(state: &AppState, account_name: String, api_key: String) -> AuthorizationCheck {
    state.admin().test_connection(&account_name, &api_key).await
}

pub async fn save_defaults_impl(
    state: &AppState,
    host_project_id: String,
    project_id: Option<u64>,
    service_id: Option<u64>,
) -> Result<(), InfraError> {
    state
        .admin()
        .save_project_defaults(&host_project_id, project_id, service_id)
        .await
}

pub async fn list_projects_impl(state: &AppState, host_project_id: String) -> Result<Vec<MiteProject>, InfraError> {
    state.admin().list_projects(&host_project_id).await
}

pub async fn list_services_impl(state: &AppState, host_project_id: String) -> Result<Vec<MiteService>, InfraError> {
    state.admin().list_services(&host_project_id).await
}
