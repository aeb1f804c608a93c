use crate::application::authorization;
use crate::application::entry_locator::{find_running_entry_id, find_today_entry_for};
use crate::application::settings_resolver::{Resolution, SettingsResolver};
use crate::domain::models::{EffectiveSettings, NewTimeEntry, TimeEntry, WorkItemId, format_minutes};
use crate::domain::tracking::{StartPlan, TrackingState, TrackingStatus, TransitionError};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::host::HostContext;
use crate::infrastructure::mite_client::{MiteClient, MiteClientFactory};
use crate::infrastructure::settings_store::SettingsStore;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

const DEFAULT_TITLE_FIELD: &str = "System.Title";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetupIssue {
    NotConfigured,
    Unauthorized,
    ResolutionFailed,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PublishedState {
    pub configured: bool,
    pub status: TrackingStatus,
    pub entry: Option<TimeEntry>,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<SetupIssue>,
}

impl PublishedState {
    pub fn minutes_display(&self) -> String {
        format_minutes(self.entry.as_ref().map_or(0, |entry| entry.minutes))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotReady,
    NotConfigured,
    AlreadyTracking,
    NotTracking,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied,
    Rejected(RejectReason),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Ready,
    Busy,
}

struct Connection<C> {
    client: Arc<C>,
    settings: EffectiveSettings,
    work_item_id: WorkItemId,
}

impl<C> Clone for Connection<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            settings: self.settings.clone(),
            work_item_id: self.work_item_id,
        }
    }
}

struct Session<C> {
    phase: Phase,
    connection: Option<Connection<C>>,
    issue: Option<SetupIssue>,
    tracking: TrackingState,
    entry_lookup_pending: bool,
}

impl<C> Session<C> {
    fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            connection: None,
            issue: None,
            tracking: TrackingState::default(),
            entry_lookup_pending: false,
        }
    }

    fn published(&self) -> PublishedState {
        PublishedState {
            configured: self.connection.is_some(),
            status: self.tracking.status(),
            entry: self.tracking.entry().cloned(),
            ready: self.phase == Phase::Ready,
            issue: self.issue,
        }
    }
}

struct Loaded<C> {
    connection: Option<Connection<C>>,
    issue: Option<SetupIssue>,
    tracking: TrackingState,
    entry_lookup_pending: bool,
}

impl<C> Loaded<C> {
    fn unavailable(issue: SetupIssue) -> Self {
        Self {
            connection: None,
            issue: Some(issue),
            tracking: TrackingState::default(),
            entry_lookup_pending: false,
        }
    }
}

/// Drives one work item's tracker for the lifetime of a host session.
///
/// Start and stop requests are rejected, not queued, while another operation
/// is outstanding. The session lock is never held across a remote call.
pub struct TrackingCoordinator<H, S, F>
where
    H: HostContext,
    S: SettingsStore,
    F: MiteClientFactory,
{
    host: Arc<H>,
    resolver: SettingsResolver<S>,
    client_factory: Arc<F>,
    title_field: String,
    session: Mutex<Session<F::Client>>,
    publisher: watch::Sender<PublishedState>,
}

impl<H, S, F> TrackingCoordinator<H, S, F>
where
    H: HostContext,
    S: SettingsStore,
    F: MiteClientFactory,
{
    pub fn new(host: Arc<H>, settings_store: Arc<S>, client_factory: Arc<F>) -> Self {
        let (publisher, _) = watch::channel(PublishedState::default());
        Self {
            host,
            resolver: SettingsResolver::new(settings_store),
            client_factory,
            title_field: DEFAULT_TITLE_FIELD.to_string(),
            session: Mutex::new(Session::new()),
            publisher,
        }
    }

    pub fn with_title_field(mut self, title_field: impl Into<String>) -> Self {
        self.title_field = title_field.into();
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PublishedState> {
        self.publisher.subscribe()
    }

    pub fn snapshot(&self) -> PublishedState {
        self.publisher.borrow().clone()
    }

    pub async fn initialize(&self) -> PublishedState {
        {
            let mut session = self.lock();
            if session.phase == Phase::Busy {
                tracing::debug!("initialize ignored while another operation is outstanding");
                return session.published();
            }
            session.phase = Phase::Busy;
            self.publish(&session);
        }

        let loaded = self.load().await;
        self.notify_host().await;

        let mut session = self.lock();
        session.connection = loaded.connection;
        session.issue = loaded.issue;
        session.tracking = loaded.tracking;
        session.entry_lookup_pending = loaded.entry_lookup_pending;
        session.phase = Phase::Ready;
        self.publish(&session);
        session.published()
    }

    pub async fn start(&self) -> ActionOutcome {
        let (connection, lookup_pending) = {
            let mut session = self.lock();
            if session.phase != Phase::Ready {
                return ActionOutcome::Rejected(RejectReason::NotReady);
            }
            let Some(connection) = session.connection.clone() else {
                return ActionOutcome::Rejected(RejectReason::NotConfigured);
            };
            if let Err(error) = session.tracking.plan_start() {
                return rejected(error);
            }
            session.phase = Phase::Busy;
            self.publish(&session);
            (connection, session.entry_lookup_pending)
        };

        let outcome = self.run_start(&connection, lookup_pending).await;
        self.settle();
        outcome
    }

    pub async fn stop(&self) -> ActionOutcome {
        let (connection, entry_id) = {
            let mut session = self.lock();
            if session.phase != Phase::Ready {
                return ActionOutcome::Rejected(RejectReason::NotReady);
            }
            let Some(connection) = session.connection.clone() else {
                return ActionOutcome::Rejected(RejectReason::NotConfigured);
            };
            let entry_id = match session.tracking.plan_stop() {
                Ok(entry_id) => entry_id,
                Err(error) => return rejected(error),
            };
            session.phase = Phase::Busy;
            self.publish(&session);
            (connection, entry_id)
        };

        let outcome = match connection.client.stop_tracker(entry_id).await {
            Ok(update) => {
                let minutes = update
                    .stopped
                    .filter(|stopped| stopped.id == entry_id)
                    .and_then(|stopped| stopped.minutes);
                let mut session = self.lock();
                let current = std::mem::take(&mut session.tracking);
                session.tracking = current.tracker_stopped(minutes);
                tracing::info!(
                    work_item_id = connection.work_item_id,
                    entry_id = %entry_id,
                    "tracker stopped"
                );
                ActionOutcome::Applied
            }
            Err(error) => {
                tracing::warn!(
                    work_item_id = connection.work_item_id,
                    entry_id = %entry_id,
                    error = %error,
                    "stopping tracker failed, re-reading tracker"
                );
                self.reconcile_after_failed_stop(&connection).await;
                ActionOutcome::Failed(error.to_string())
            }
        };

        self.settle();
        outcome
    }

    async fn load(&self) -> Loaded<F::Client> {
        let project = match self.host.current_project().await {
            Ok(project) => project,
            Err(error) => {
                tracing::error!(error = %error, "could not read current project from host");
                return Loaded::unavailable(SetupIssue::ResolutionFailed);
            }
        };

        let settings = match self.resolver.resolve(&project.id).await {
            Ok(Resolution::Configured(settings)) => settings,
            Ok(Resolution::Unconfigured) => {
                tracing::info!(host_project_id = %project.id, "mite account is not configured");
                return Loaded::unavailable(SetupIssue::NotConfigured);
            }
            Err(error) => {
                tracing::error!(
                    host_project_id = %project.id,
                    error = %error,
                    "failed to resolve mite settings"
                );
                return Loaded::unavailable(SetupIssue::ResolutionFailed);
            }
        };

        let client = match self.client_factory.connect(&settings) {
            Ok(client) => client,
            Err(error) => {
                tracing::warn!(
                    account = %settings.account_name,
                    error = %error,
                    "configured mite settings are unusable"
                );
                return Loaded::unavailable(SetupIssue::NotConfigured);
            }
        };

        if !authorization::verify(client.as_ref()).await {
            tracing::warn!(account = %settings.account_name, "mite authorization failed");
            return Loaded::unavailable(SetupIssue::Unauthorized);
        }

        let work_item_id = match self.host.current_work_item_id().await {
            Ok(work_item_id) => work_item_id,
            Err(error) => {
                tracing::error!(error = %error, "could not read current work item from host");
                return Loaded::unavailable(SetupIssue::ResolutionFailed);
            }
        };

        let connection = Connection {
            client,
            settings,
            work_item_id,
        };
        let (tracking, entry_lookup_pending) = match derive_tracking(&connection).await {
            Ok(tracking) => (tracking, false),
            Err(error) => {
                tracing::warn!(
                    work_item_id,
                    error = %error,
                    "could not read today's entries, lookup deferred to first start"
                );
                (TrackingState::default(), true)
            }
        };

        Loaded {
            connection: Some(connection),
            issue: None,
            tracking,
            entry_lookup_pending,
        }
    }

    async fn notify_host(&self) {
        if let Err(error) = self.host.notify_load_succeeded().await {
            tracing::warn!(error = %error, "host load notification failed");
        }
        if let Err(error) = self.host.notify_ready().await {
            tracing::warn!(error = %error, "host ready notification failed");
        }
    }

    async fn run_start(&self, connection: &Connection<F::Client>, lookup_pending: bool) -> ActionOutcome {
        if lookup_pending {
            let tracking = match derive_tracking(connection).await {
                Ok(tracking) => tracking,
                Err(error) => {
                    tracing::warn!(
                        work_item_id = connection.work_item_id,
                        error = %error,
                        "today's entries still unavailable"
                    );
                    return ActionOutcome::Failed(error.to_string());
                }
            };
            let mut session = self.lock();
            session.tracking = tracking;
            session.entry_lookup_pending = false;
            self.publish(&session);
        }

        let plan = self.lock().tracking.plan_start();
        let entry_id = match plan {
            Err(error) => return rejected(error),
            Ok(StartPlan::StartExisting(entry_id)) => entry_id,
            Ok(StartPlan::CreateEntry) => match self.create_entry(connection).await {
                Ok(entry) => {
                    let entry_id = entry.id;
                    let mut session = self.lock();
                    let current = std::mem::take(&mut session.tracking);
                    session.tracking = current.entry_created(entry);
                    self.publish(&session);
                    entry_id
                }
                Err(error) => {
                    tracing::warn!(
                        work_item_id = connection.work_item_id,
                        error = %error,
                        "creating time entry failed"
                    );
                    return ActionOutcome::Failed(error.to_string());
                }
            },
        };

        let update = match connection.client.start_tracker(entry_id).await {
            Ok(update) => update,
            Err(error) => {
                tracing::warn!(
                    work_item_id = connection.work_item_id,
                    entry_id = %entry_id,
                    error = %error,
                    "starting tracker failed, entry kept for retry"
                );
                return ActionOutcome::Failed(error.to_string());
            }
        };

        let Some(running) = update.tracking else {
            tracing::warn!(entry_id = %entry_id, "tracker start response reported nothing running");
            return ActionOutcome::Failed("tracker did not report a running entry".to_string());
        };

        let mut session = self.lock();
        let current = std::mem::take(&mut session.tracking);
        match current.tracker_started(running) {
            Ok(next) => {
                session.tracking = next;
                tracing::info!(
                    work_item_id = connection.work_item_id,
                    entry_id = %entry_id,
                    "tracker started"
                );
                ActionOutcome::Applied
            }
            Err(error) => {
                tracing::error!(
                    work_item_id = connection.work_item_id,
                    error = %error,
                    "tracking state inconsistent with remote tracker, resetting"
                );
                session.tracking = TrackingState::default();
                session.entry_lookup_pending = true;
                ActionOutcome::Failed(error.to_string())
            }
        }
    }

    async fn create_entry(&self, connection: &Connection<F::Client>) -> Result<TimeEntry, InfraError> {
        let title = self
            .host
            .work_item_field_value(&self.title_field)
            .await?
            .unwrap_or_default();
        let payload = NewTimeEntry::for_work_item(connection.work_item_id, &title, &connection.settings);
        let entry = connection.client.create_time_entry(&payload).await?;
        tracing::info!(
            work_item_id = connection.work_item_id,
            entry_id = %entry.id,
            "created time entry"
        );
        Ok(entry)
    }

    async fn reconcile_after_failed_stop(&self, connection: &Connection<F::Client>) {
        match find_running_entry_id(connection.client.as_ref()).await {
            Ok(running) => {
                let mut session = self.lock();
                let current = std::mem::take(&mut session.tracking);
                session.tracking = current.reconcile(running);
            }
            Err(error) => {
                tracing::warn!(
                    work_item_id = connection.work_item_id,
                    error = %error,
                    "tracker state unknown, keeping last known state"
                );
            }
        }
    }

    fn settle(&self) {
        let mut session = self.lock();
        session.phase = Phase::Ready;
        self.publish(&session);
    }

    fn publish(&self, session: &Session<F::Client>) {
        self.publisher.send_replace(session.published());
    }

    fn lock(&self) -> MutexGuard<'_, Session<F::Client>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn derive_tracking<C>(connection: &Connection<C>) -> Result<TrackingState, InfraError>
where
    C: MiteClient,
{
    let client = connection.client.as_ref();
    let today_entry = find_today_entry_for(client, connection.work_item_id).await?;
    let running = match today_entry {
        Some(_) => find_running_entry_id(client).await?,
        None => None,
    };
    Ok(TrackingState::derive(today_entry, running))
}

fn rejected(error: TransitionError) -> ActionOutcome {
    match error {
        TransitionError::AlreadyTracking => ActionOutcome::Rejected(RejectReason::AlreadyTracking),
        TransitionError::NotTracking => ActionOutcome::Rejected(RejectReason::NotTracking),
        other => ActionOutcome::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::{FakeClientFactory, FakeMiteClient, Failure, Op, tagged_entry};
    use crate::domain::models::{HostProject, TimeEntryId};
    use crate::domain::tracking::RunningTracker;
    use crate::infrastructure::host::StaticHostContext;
    use crate::infrastructure::mite_client::TrackerUpdate;
    use crate::infrastructure::settings_store::{ACCOUNT_NAME_KEY, API_KEY_KEY, InMemorySettingsStore};

    type TestCoordinator = TrackingCoordinator<StaticHostContext, InMemorySettingsStore, FakeClientFactory>;

    fn project() -> HostProject {
        HostProject {
            id: "p1".to_string(),
            name: "Portal".to_string(),
        }
    }

    fn host(work_item_id: u64) -> StaticHostContext {
        StaticHostContext::new(project())
            .with_work_item(work_item_id)
            .with_field(DEFAULT_TITLE_FIELD, "Fix bug")
    }

    fn configured_store() -> InMemorySettingsStore {
        InMemorySettingsStore::with_values([
            (ACCOUNT_NAME_KEY, "acme"),
            (API_KEY_KEY, "secret"),
            ("mite-project-id-p1", "7"),
            ("mite-service-id-p1", "-1"),
        ])
    }

    fn build(
        host: StaticHostContext,
        store: InMemorySettingsStore,
        client: FakeMiteClient,
    ) -> (Arc<TestCoordinator>, Arc<FakeClientFactory>) {
        let factory = Arc::new(FakeClientFactory::new(client));
        let coordinator = TrackingCoordinator::new(Arc::new(host), Arc::new(store), Arc::clone(&factory));
        (Arc::new(coordinator), factory)
    }

    async fn ready(client: FakeMiteClient) -> (Arc<TestCoordinator>, Arc<FakeClientFactory>) {
        let (coordinator, factory) = build(host(42), configured_store(), client);
        let state = coordinator.initialize().await;
        assert!(state.configured);
        assert!(state.ready);
        (coordinator, factory)
    }

    fn tracking_on_5() -> FakeMiteClient {
        let client = FakeMiteClient::with_entries(vec![tagged_entry(5, 42, 30)]);
        client.set_running(Some(TimeEntryId(5)));
        client
    }

    #[tokio::test]
    async fn missing_credentials_publish_not_configured() {
        let (coordinator, factory) = build(host(42), InMemorySettingsStore::default(), FakeMiteClient::default());

        let state = coordinator.initialize().await;

        assert_eq!(
            state,
            PublishedState {
                configured: false,
                status: TrackingStatus::Idle,
                entry: None,
                ready: true,
                issue: Some(SetupIssue::NotConfigured),
            }
        );
        assert!(factory.connections().is_empty());
        assert_eq!(
            coordinator.start().await,
            ActionOutcome::Rejected(RejectReason::NotConfigured)
        );
    }

    #[tokio::test]
    async fn rejected_credentials_publish_unauthorized() {
        let client = FakeMiteClient::default();
        client.set_authorized(false);
        let (coordinator, factory) = build(host(42), configured_store(), client);

        let state = coordinator.initialize().await;

        assert!(!state.configured);
        assert_eq!(state.issue, Some(SetupIssue::Unauthorized));
        assert_eq!(factory.client.calls(Op::ListToday), 0);
        assert_eq!(coordinator.stop().await, ActionOutcome::Rejected(RejectReason::NotConfigured));
    }

    #[tokio::test]
    async fn missing_work_item_publishes_resolution_failure() {
        let host = StaticHostContext::new(project());
        let (coordinator, _) = build(host, configured_store(), FakeMiteClient::default());

        let state = coordinator.initialize().await;

        assert!(!state.configured);
        assert!(state.ready);
        assert_eq!(state.issue, Some(SetupIssue::ResolutionFailed));
    }

    #[tokio::test]
    async fn initialize_derives_tracking_from_running_tracker() {
        let (coordinator, factory) = ready(tracking_on_5()).await;

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Tracking);
        assert_eq!(state.entry.as_ref().map(|entry| entry.id), Some(TimeEntryId(5)));
        assert_eq!(state.minutes_display(), "00:30");
        assert_eq!(factory.connections()[0].default_project_id, Some(7));
        assert_eq!(factory.connections()[0].default_service_id, None);
    }

    #[tokio::test]
    async fn tracker_on_other_entry_leaves_work_item_idle() {
        let client = FakeMiteClient::with_entries(vec![tagged_entry(5, 42, 30)]);
        client.set_running(Some(TimeEntryId(6)));
        let (coordinator, _) = ready(client).await;

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry.map(|entry| entry.minutes), Some(30));
    }

    #[tokio::test]
    async fn no_entry_today_skips_tracker_query() {
        let client = FakeMiteClient::with_entries(vec![tagged_entry(5, 420, 30)]);
        let (coordinator, factory) = ready(client).await;

        assert_eq!(coordinator.snapshot().entry, None);
        assert_eq!(factory.client.calls(Op::Tracker), 0);
    }

    #[tokio::test]
    async fn start_creates_tagged_entry_and_tracks_it() {
        let (coordinator, factory) = ready(FakeMiteClient::default()).await;

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);

        assert_eq!(
            factory.client.created(),
            vec![NewTimeEntry {
                note: "42### Fix bug".to_string(),
                project_id: Some(7),
                service_id: None,
            }]
        );
        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Tracking);
        assert!(state.ready);
        let entry = state.entry.expect("entry published");
        assert_eq!(entry.id, TimeEntryId(101));
        assert_eq!(entry.note, "42### Fix bug");
        assert_eq!(entry.minutes, 0);
        assert_eq!(factory.client.running(), Some(TimeEntryId(101)));
    }

    #[tokio::test]
    async fn start_uses_configured_title_field() {
        let host = StaticHostContext::new(project())
            .with_work_item(42)
            .with_field("Custom.Summary", "  Spaced title  ");
        let (coordinator, factory) = build(host, configured_store(), FakeMiteClient::default());
        let coordinator = Arc::into_inner(coordinator)
            .expect("sole owner")
            .with_title_field("Custom.Summary");
        coordinator.initialize().await;

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);
        assert_eq!(factory.client.created()[0].note, "42### Spaced title");
    }

    #[tokio::test]
    async fn start_reuses_todays_entry() {
        let (coordinator, factory) = ready(FakeMiteClient::with_entries(vec![tagged_entry(5, 42, 12)])).await;

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);

        assert!(factory.client.created().is_empty());
        assert_eq!(factory.client.running(), Some(TimeEntryId(5)));
        assert_eq!(coordinator.snapshot().minutes_display(), "00:12");
    }

    #[tokio::test]
    async fn start_while_tracking_is_rejected_without_remote_calls() {
        let (coordinator, factory) = ready(tracking_on_5()).await;

        assert_eq!(
            coordinator.start().await,
            ActionOutcome::Rejected(RejectReason::AlreadyTracking)
        );
        assert_eq!(factory.client.calls(Op::Create), 0);
        assert_eq!(factory.client.calls(Op::Start), 0);
        assert!(coordinator.snapshot().ready);
    }

    #[tokio::test]
    async fn create_failure_leaves_state_unchanged() {
        let (coordinator, factory) = ready(FakeMiteClient::default()).await;
        factory.client.fail_next(Op::Create, Failure::Network);

        assert!(matches!(coordinator.start().await, ActionOutcome::Failed(_)));

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry, None);
        assert!(state.ready);
        assert_eq!(factory.client.calls(Op::Start), 0);
    }

    #[tokio::test]
    async fn retry_after_start_failure_does_not_create_again() {
        let (coordinator, factory) = ready(FakeMiteClient::default()).await;
        factory.client.fail_next(Op::Start, Failure::Http(500));

        assert!(matches!(coordinator.start().await, ActionOutcome::Failed(_)));
        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry.map(|entry| entry.id), Some(TimeEntryId(101)));

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);
        assert_eq!(factory.client.calls(Op::Create), 1);
        assert_eq!(factory.client.calls(Op::Start), 2);
        assert_eq!(coordinator.snapshot().status, TrackingStatus::Tracking);
    }

    #[tokio::test]
    async fn mismatched_running_entry_resets_and_retry_reuses_entry() {
        let (coordinator, factory) = ready(FakeMiteClient::default()).await;
        factory.client.override_next_start(TrackerUpdate {
            tracking: Some(RunningTracker {
                id: TimeEntryId(999),
                minutes: None,
            }),
            stopped: None,
        });

        assert!(matches!(coordinator.start().await, ActionOutcome::Failed(_)));

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry, None);
        assert!(state.ready);

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);
        assert_eq!(factory.client.calls(Op::Create), 1);
        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Tracking);
        assert_eq!(state.entry.map(|entry| entry.id), Some(TimeEntryId(101)));
    }

    #[tokio::test]
    async fn start_response_without_running_entry_keeps_created_entry() {
        let (coordinator, factory) = ready(FakeMiteClient::default()).await;
        factory.client.override_next_start(TrackerUpdate::default());

        assert!(matches!(coordinator.start().await, ActionOutcome::Failed(_)));
        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry.map(|entry| entry.id), Some(TimeEntryId(101)));
    }

    #[tokio::test]
    async fn stop_keeps_entry_visible() {
        let (coordinator, factory) = ready(tracking_on_5()).await;

        assert_eq!(coordinator.stop().await, ActionOutcome::Applied);

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry.as_ref().map(|entry| entry.id), Some(TimeEntryId(5)));
        assert_eq!(state.minutes_display(), "00:30");
        assert_eq!(factory.client.running(), None);
        assert_eq!(
            coordinator.stop().await,
            ActionOutcome::Rejected(RejectReason::NotTracking)
        );
    }

    #[tokio::test]
    async fn failed_stop_follows_tracker_that_is_still_running() {
        let (coordinator, factory) = ready(tracking_on_5()).await;
        factory.client.fail_next(Op::Stop, Failure::Network);

        assert!(matches!(coordinator.stop().await, ActionOutcome::Failed(_)));

        assert_eq!(factory.client.calls(Op::Tracker), 2);
        assert_eq!(coordinator.snapshot().status, TrackingStatus::Tracking);
    }

    #[tokio::test]
    async fn failed_stop_follows_tracker_that_already_stopped() {
        let (coordinator, factory) = ready(tracking_on_5()).await;
        factory.client.set_running(None);
        factory.client.fail_next(Op::Stop, Failure::Http(404));

        assert!(matches!(coordinator.stop().await, ActionOutcome::Failed(_)));

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Idle);
        assert_eq!(state.entry.map(|entry| entry.id), Some(TimeEntryId(5)));
    }

    #[tokio::test]
    async fn failed_stop_with_unreadable_tracker_keeps_last_state() {
        let (coordinator, factory) = ready(tracking_on_5()).await;
        factory.client.fail_next(Op::Stop, Failure::Network);
        factory.client.fail_next(Op::Tracker, Failure::Network);

        assert!(matches!(coordinator.stop().await, ActionOutcome::Failed(_)));

        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Tracking);
        assert!(state.ready);
    }

    #[tokio::test]
    async fn actions_before_initialize_are_rejected() {
        let (coordinator, factory) = build(host(42), configured_store(), FakeMiteClient::default());

        assert_eq!(coordinator.start().await, ActionOutcome::Rejected(RejectReason::NotReady));
        assert_eq!(coordinator.stop().await, ActionOutcome::Rejected(RejectReason::NotReady));
        assert!(factory.connections().is_empty());
        assert!(!coordinator.snapshot().ready);
    }

    #[tokio::test]
    async fn requests_during_outstanding_start_are_rejected() {
        let client = FakeMiteClient::default();
        let gate = client.hold_create();
        let (coordinator, factory) = ready(client).await;
        let mut updates = coordinator.subscribe();

        let pending = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.start().await }
        });
        updates
            .wait_for(|state| !state.ready)
            .await
            .expect("publisher alive");

        assert_eq!(coordinator.start().await, ActionOutcome::Rejected(RejectReason::NotReady));
        assert_eq!(coordinator.stop().await, ActionOutcome::Rejected(RejectReason::NotReady));

        gate.notify_one();
        assert_eq!(pending.await.expect("start task"), ActionOutcome::Applied);
        assert_eq!(factory.client.calls(Op::Create), 1);
        assert!(coordinator.snapshot().ready);
    }

    #[tokio::test]
    async fn deferred_lookup_runs_before_creating() {
        let client = FakeMiteClient::with_entries(vec![tagged_entry(5, 42, 12)]);
        client.fail_next(Op::ListToday, Failure::Network);
        let (coordinator, factory) = ready(client).await;
        assert_eq!(coordinator.snapshot().entry, None);

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);

        assert!(factory.client.created().is_empty());
        let state = coordinator.snapshot();
        assert_eq!(state.status, TrackingStatus::Tracking);
        assert_eq!(state.entry.map(|entry| entry.id), Some(TimeEntryId(5)));
    }

    #[tokio::test]
    async fn deferred_lookup_failure_blocks_create() {
        let client = FakeMiteClient::default();
        client.fail_next(Op::ListToday, Failure::Network);
        client.fail_next(Op::ListToday, Failure::Http(503));
        let (coordinator, factory) = ready(client).await;

        assert!(matches!(coordinator.start().await, ActionOutcome::Failed(_)));
        assert_eq!(factory.client.calls(Op::Create), 0);

        assert_eq!(coordinator.start().await, ActionOutcome::Applied);
        assert_eq!(factory.client.calls(Op::Create), 1);
    }

    #[tokio::test]
    async fn subscribers_see_settled_state() {
        let (coordinator, _) = build(host(42), configured_store(), tracking_on_5());
        let mut updates = coordinator.subscribe();
        assert!(!updates.borrow_and_update().ready);

        coordinator.initialize().await;

        assert!(updates.has_changed().expect("publisher alive"));
        let state = updates.borrow_and_update().clone();
        assert!(state.ready);
        assert_eq!(state.status, TrackingStatus::Tracking);

        let json = serde_json::to_value(&state).expect("serialize state");
        assert_eq!(json["status"], "tracking");
        assert_eq!(json["entry"]["id"], 5);
        assert!(json.get("issue").is_none());
    }
}
