use crate::domain::models::{
    EffectiveSettings, MiteProject, MiteService, NewTimeEntry, TimeEntry, TimeEntryId,
};
use crate::domain::tracking::RunningTracker;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::mite_client::{MiteClient, MiteClientFactory, TrackerUpdate};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Authorize,
    ListToday,
    Tracker,
    Create,
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Network,
    Http(u16),
}

impl Failure {
    fn into_error(self) -> InfraError {
        match self {
            Self::Network => InfraError::Network("connection reset".to_string()),
            Self::Http(status) => InfraError::MiteApi {
                status,
                message: "scripted failure".to_string(),
            },
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeMiteClient {
    authorized: Mutex<bool>,
    entries: Mutex<Vec<TimeEntry>>,
    running: Mutex<Option<TimeEntryId>>,
    next_id: Mutex<u64>,
    failures: Mutex<HashMap<Op, VecDeque<Failure>>>,
    calls: Mutex<HashMap<Op, usize>>,
    created: Mutex<Vec<NewTimeEntry>>,
    start_override: Mutex<Option<TrackerUpdate>>,
    create_gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for FakeMiteClient {
    fn default() -> Self {
        Self {
            authorized: Mutex::new(true),
            entries: Mutex::new(Vec::new()),
            running: Mutex::new(None),
            next_id: Mutex::new(100),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            start_override: Mutex::new(None),
            create_gate: Mutex::new(None),
        }
    }
}

impl FakeMiteClient {
    pub(crate) fn with_entries(entries: Vec<TimeEntry>) -> Self {
        let fake = Self::default();
        *fake.entries.lock().expect("entries lock") = entries;
        fake
    }

    pub(crate) fn set_authorized(&self, authorized: bool) {
        *self.authorized.lock().expect("authorized lock") = authorized;
    }

    pub(crate) fn set_running(&self, running: Option<TimeEntryId>) {
        *self.running.lock().expect("running lock") = running;
    }

    pub(crate) fn running(&self) -> Option<TimeEntryId> {
        *self.running.lock().expect("running lock")
    }

    pub(crate) fn fail_next(&self, op: Op, failure: Failure) {
        self.failures
            .lock()
            .expect("failures lock")
            .entry(op)
            .or_default()
            .push_back(failure);
    }

    pub(crate) fn override_next_start(&self, update: TrackerUpdate) {
        *self.start_override.lock().expect("override lock") = Some(update);
    }

    pub(crate) fn hold_create(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.create_gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self, op: Op) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn created(&self) -> Vec<NewTimeEntry> {
        self.created.lock().expect("created lock").clone()
    }

    fn record(&self, op: Op) -> Result<(), InfraError> {
        *self.calls.lock().expect("calls lock").entry(op).or_default() += 1;
        let failure = self
            .failures
            .lock()
            .expect("failures lock")
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn minutes_of(&self, entry_id: TimeEntryId) -> Option<u32> {
        self.entries
            .lock()
            .expect("entries lock")
            .iter()
            .find(|entry| entry.id == entry_id)
            .map(|entry| entry.minutes)
    }
}

#[async_trait]
impl MiteClient for FakeMiteClient {
    async fn is_authorized(&self) -> Result<bool, InfraError> {
        self.record(Op::Authorize)?;
        Ok(*self.authorized.lock().expect("authorized lock"))
    }

    async fn time_entries_for_today(&self) -> Result<Vec<TimeEntry>, InfraError> {
        self.record(Op::ListToday)?;
        Ok(self.entries.lock().expect("entries lock").clone())
    }

    async fn tracking_time_entry(&self) -> Result<Option<RunningTracker>, InfraError> {
        self.record(Op::Tracker)?;
        Ok(self.running().map(|id| RunningTracker {
            id,
            minutes: self.minutes_of(id),
        }))
    }

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, InfraError> {
        let gate = self.create_gate.lock().expect("gate lock").take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record(Op::Create)?;
        self.created.lock().expect("created lock").push(entry.clone());

        let id = {
            let mut next_id = self.next_id.lock().expect("next id lock");
            *next_id += 1;
            TimeEntryId(*next_id)
        };
        let created = TimeEntry {
            id,
            note: entry.note.clone(),
            minutes: 0,
            project_id: entry.project_id,
            service_id: entry.service_id,
            date_at: None,
        };
        self.entries.lock().expect("entries lock").push(created.clone());
        Ok(created)
    }

    async fn start_tracker(&self, entry_id: TimeEntryId) -> Result<TrackerUpdate, InfraError> {
        self.record(Op::Start)?;
        if let Some(update) = self.start_override.lock().expect("override lock").take() {
            return Ok(update);
        }
        let previous = self.running.lock().expect("running lock").replace(entry_id);
        Ok(TrackerUpdate {
            tracking: Some(RunningTracker {
                id: entry_id,
                minutes: self.minutes_of(entry_id),
            }),
            stopped: previous.filter(|id| *id != entry_id).map(|id| RunningTracker {
                id,
                minutes: self.minutes_of(id),
            }),
        })
    }

    async fn stop_tracker(&self, entry_id: TimeEntryId) -> Result<TrackerUpdate, InfraError> {
        self.record(Op::Stop)?;
        let mut running = self.running.lock().expect("running lock");
        if *running == Some(entry_id) {
            *running = None;
        }
        Ok(TrackerUpdate {
            tracking: None,
            stopped: Some(RunningTracker {
                id: entry_id,
                minutes: self.minutes_of(entry_id),
            }),
        })
    }

    async fn list_projects(&self) -> Result<Vec<MiteProject>, InfraError> {
        Ok(vec![MiteProject {
            id: 1,
            name: "Website".to_string(),
            customer_name: None,
        }])
    }

    async fn list_services(&self) -> Result<Vec<MiteService>, InfraError> {
        Ok(vec![MiteService {
            id: 2,
            name: "Development".to_string(),
        }])
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeClientFactory {
    pub(crate) client: Arc<FakeMiteClient>,
    connections: Mutex<Vec<EffectiveSettings>>,
}

impl FakeClientFactory {
    pub(crate) fn new(client: FakeMiteClient) -> Self {
        Self {
            client: Arc::new(client),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn connections(&self) -> Vec<EffectiveSettings> {
        self.connections.lock().expect("connections lock").clone()
    }
}

impl MiteClientFactory for FakeClientFactory {
    type Client = FakeMiteClient;

    fn connect(&self, settings: &EffectiveSettings) -> Result<Arc<Self::Client>, InfraError> {
        self.connections
            .lock()
            .expect("connections lock")
            .push(settings.clone());
        Ok(Arc::clone(&self.client))
    }
}

pub(crate) fn tagged_entry(id: u64, work_item_id: u64, minutes: u32) -> TimeEntry {
    TimeEntry {
        id: TimeEntryId(id),
        note: format!("{work_item_id}### Sample"),
        minutes,
        project_id: None,
        service_id: None,
        date_at: None,
    }
}
