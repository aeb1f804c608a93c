use crate::domain::models::{HostProject, WorkItemId};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait HostContext: Send + Sync {
    async fn current_project(&self) -> Result<HostProject, InfraError>;
    async fn current_work_item_id(&self) -> Result<WorkItemId, InfraError>;
    async fn work_item_field_value(&self, field_name: &str) -> Result<Option<String>, InfraError>;
    async fn notify_load_succeeded(&self) -> Result<(), InfraError>;
    async fn notify_ready(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct StaticHostContext {
    project: HostProject,
    work_item_id: Option<WorkItemId>,
    fields: HashMap<String, String>,
}

impl StaticHostContext {
    pub fn new(project: HostProject) -> Self {
        Self {
            project,
            work_item_id: None,
            fields: HashMap::new(),
        }
    }

    pub fn with_work_item(mut self, work_item_id: WorkItemId) -> Self {
        self.work_item_id = Some(work_item_id);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl HostContext for StaticHostContext {
    async fn current_project(&self) -> Result<HostProject, InfraError> {
        Ok(self.project.clone())
    }

    async fn current_work_item_id(&self) -> Result<WorkItemId, InfraError> {
        self.work_item_id
            .ok_or_else(|| InfraError::Host("no work item is open".to_string()))
    }

    async fn work_item_field_value(&self, field_name: &str) -> Result<Option<String>, InfraError> {
        Ok(self.fields.get(field_name).cloned())
    }

    async fn notify_load_succeeded(&self) -> Result<(), InfraError> {
        tracing::debug!(project_id = %self.project.id, "host load succeeded");
        Ok(())
    }

    async fn notify_ready(&self) -> Result<(), InfraError> {
        tracing::debug!(project_id = %self.project.id, "host ready");
        Ok(())
    }
}
