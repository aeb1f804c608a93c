use crate::domain::models::{
    EffectiveSettings, MiteProject, MiteService, NewTimeEntry, TimeEntry, TimeEntryId,
};
use crate::domain::tracking::RunningTracker;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

const API_KEY_HEADER: &str = "X-MiteApiKey";
const ACCOUNT_PLACEHOLDER: &str = "{account}";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerUpdate {
    pub tracking: Option<RunningTracker>,
    pub stopped: Option<RunningTracker>,
}

#[async_trait]
pub trait MiteClient: Send + Sync {
    async fn is_authorized(&self) -> Result<bool, InfraError>;

    async fn time_entries_for_today(&self) -> Result<Vec<TimeEntry>, InfraError>;

    async fn tracking_time_entry(&self) -> Result<Option<RunningTracker>, InfraError>;

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, InfraError>;

    async fn start_tracker(&self, entry_id: TimeEntryId) -> Result<TrackerUpdate, InfraError>;

    async fn stop_tracker(&self, entry_id: TimeEntryId) -> Result<TrackerUpdate, InfraError>;

    async fn list_projects(&self) -> Result<Vec<MiteProject>, InfraError>;

    async fn list_services(&self) -> Result<Vec<MiteService>, InfraError>;
}

pub trait MiteClientFactory: Send + Sync {
    type Client: MiteClient + 'static;

    fn connect(&self, settings: &EffectiveSettings) -> Result<Arc<Self::Client>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestMiteClientFactory {
    config: AppConfig,
}

impl ReqwestMiteClientFactory {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl MiteClientFactory for ReqwestMiteClientFactory {
    type Client = ReqwestMiteClient;

    fn connect(&self, settings: &EffectiveSettings) -> Result<Arc<Self::Client>, InfraError> {
        ReqwestMiteClient::new(&self.config, &settings.account_name, &settings.api_key).map(Arc::new)
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestMiteClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl ReqwestMiteClient {
    pub fn new(config: &AppConfig, account_name: &str, api_key: &str) -> Result<Self, InfraError> {
        if api_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig("api key must not be empty".to_string()));
        }
        let base_url = account_base_url(&config.api_base_url, account_name)?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|error| InfraError::Network(format!("failed to build http client: {error}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.trim().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, InfraError> {
        self.base_url
            .join(path)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid mite endpoint {path}: {error}")))
    }

    fn tracker_endpoint(&self, entry_id: TimeEntryId) -> Result<Url, InfraError> {
        self.endpoint(&format!("tracker/{entry_id}.json"))
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<(StatusCode, String), InfraError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("failed reading response while {action}: {error}")))?;
        Ok((status, body))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<T, InfraError> {
        let (status, body) = self.send(request, action).await?;
        if !status.is_success() {
            return Err(mite_http_error(status, &body));
        }
        parse_payload(&body, action)
    }
}

#[derive(Debug, serde::Deserialize)]
struct TimeEntryEnvelope {
    time_entry: TimeEntry,
}

#[derive(Debug, serde::Serialize)]
struct CreateTimeEntryRequest<'a> {
    time_entry: &'a NewTimeEntry,
}

#[derive(Debug, serde::Deserialize)]
struct TrackerEnvelope {
    #[serde(default)]
    tracker: TrackerPayload,
}

#[derive(Debug, Default, serde::Deserialize)]
struct TrackerPayload {
    tracking_time_entry: Option<TrackerEntryPayload>,
    stopped_time_entry: Option<TrackerEntryPayload>,
}

#[derive(Debug, serde::Deserialize)]
struct TrackerEntryPayload {
    id: TimeEntryId,
    #[serde(default)]
    minutes: Option<u32>,
}

impl From<TrackerEntryPayload> for RunningTracker {
    fn from(payload: TrackerEntryPayload) -> Self {
        Self {
            id: payload.id,
            minutes: payload.minutes,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ProjectEnvelope {
    project: MiteProject,
}

#[derive(Debug, serde::Deserialize)]
struct ServiceEnvelope {
    service: MiteService,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

#[async_trait]
impl MiteClient for ReqwestMiteClient {
    async fn is_authorized(&self) -> Result<bool, InfraError> {
        let request = self.client.get(self.endpoint("myself.json")?);
        let (status, body) = self.send(request, "checking authorization").await?;
        if status.is_success() {
            return Ok(true);
        }
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(false);
        }
        Err(mite_http_error(status, &body))
    }

    async fn time_entries_for_today(&self) -> Result<Vec<TimeEntry>, InfraError> {
        let request = self
            .client
            .get(self.endpoint("time_entries.json")?)
            .query(&[("at", "today")]);
        let envelopes: Vec<TimeEntryEnvelope> = self.execute(request, "listing time entries").await?;
        Ok(envelopes.into_iter().map(|envelope| envelope.time_entry).collect())
    }

    async fn tracking_time_entry(&self) -> Result<Option<RunningTracker>, InfraError> {
        let request = self.client.get(self.endpoint("tracker.json")?);
        let envelope: TrackerEnvelope = self.execute(request, "reading tracker").await?;
        Ok(tracker_update(envelope).tracking)
    }

    async fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, InfraError> {
        let request = self
            .client
            .post(self.endpoint("time_entries.json")?)
            .json(&CreateTimeEntryRequest { time_entry: entry });
        let envelope: TimeEntryEnvelope = self.execute(request, "creating time entry").await?;
        Ok(envelope.time_entry)
    }

    async fn start_tracker(&self, entry_id: TimeEntryId) -> Result<TrackerUpdate, InfraError> {
        let request = self.client.patch(self.tracker_endpoint(entry_id)?);
        let envelope: TrackerEnvelope = self.execute(request, "starting tracker").await?;
        Ok(tracker_update(envelope))
    }

    async fn stop_tracker(&self, entry_id: TimeEntryId) -> Result<TrackerUpdate, InfraError> {
        let request = self.client.delete(self.tracker_endpoint(entry_id)?);
        let envelope: TrackerEnvelope = self.execute(request, "stopping tracker").await?;
        Ok(tracker_update(envelope))
    }

    async fn list_projects(&self) -> Result<Vec<MiteProject>, InfraError> {
        let request = self.client.get(self.endpoint("projects.json")?);
        let envelopes: Vec<ProjectEnvelope> = self.execute(request, "listing projects").await?;
        Ok(envelopes.into_iter().map(|envelope| envelope.project).collect())
    }

    async fn list_services(&self) -> Result<Vec<MiteService>, InfraError> {
        let request = self.client.get(self.endpoint("services.json")?);
        let envelopes: Vec<ServiceEnvelope> = self.execute(request, "listing services").await?;
        Ok(envelopes.into_iter().map(|envelope| envelope.service).collect())
    }
}

fn tracker_update(envelope: TrackerEnvelope) -> TrackerUpdate {
    TrackerUpdate {
        tracking: envelope.tracker.tracking_time_entry.map(RunningTracker::from),
        stopped: envelope.tracker.stopped_time_entry.map(RunningTracker::from),
    }
}

pub fn account_base_url(template: &str, account_name: &str) -> Result<Url, InfraError> {
    let account_name = account_name.trim();
    if account_name.is_empty() {
        return Err(InfraError::InvalidConfig("account name must not be empty".to_string()));
    }
    if !account_name
        .chars()
        .all(|character| character.is_ascii_alphanumeric() || character == '-')
    {
        return Err(InfraError::InvalidConfig(format!(
            "account name '{account_name}' must be a mite subdomain"
        )));
    }

    let mut raw = template.replace(ACCOUNT_PLACEHOLDER, account_name);
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|error| InfraError::InvalidConfig(format!("invalid mite base url {raw}: {error}")))
}

fn parse_payload<T: DeserializeOwned>(body: &str, action: &str) -> Result<T, InfraError> {
    serde_json::from_str(body).map_err(|error| InfraError::MiteApi {
        status: 200,
        message: format!("invalid payload while {action}: {error}; body={body}"),
    })
}

fn mite_http_error(status: StatusCode, body: &str) -> InfraError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response body".to_string()
            } else {
                format!("body={body}")
            }
        });
    InfraError::MiteApi {
        status: status.as_u16(),
        message,
    }
}
