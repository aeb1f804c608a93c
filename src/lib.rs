pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::authorization::AuthorizationCheck;
pub use application::coordinator::{
    ActionOutcome, PublishedState, RejectReason, SetupIssue, TrackingCoordinator,
};
pub use application::settings_admin::SettingsAdmin;
pub use domain::models::{EffectiveSettings, TimeEntry, TimeEntryId, WorkItemId};
pub use domain::tracking::TrackingStatus;
pub use infrastructure::error::InfraError;
pub use infrastructure::host::{HostContext, StaticHostContext};
pub use infrastructure::mite_client::{MiteClient, MiteClientFactory, ReqwestMiteClientFactory};
pub use infrastructure::settings_store::SettingsStore;
