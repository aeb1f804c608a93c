use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NO_SELECTION: i64 = -1;

const CORRELATION_DELIMITER: &str = "###";

pub type WorkItemId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TimeEntryId(pub u64);

impl fmt::Display for TimeEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub account_name: String,
    pub api_key: String,
    pub default_project_id: Option<u64>,
    pub default_service_id: Option<u64>,
}

impl EffectiveSettings {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.account_name, "settings.account_name")?;
        validate_non_empty(&self.api_key, "settings.api_key")?;
        Ok(())
    }
}

impl fmt::Debug for EffectiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveSettings")
            .field("account_name", &self.account_name)
            .field("api_key", &"<redacted>")
            .field("default_project_id", &self.default_project_id)
            .field("default_service_id", &self.default_service_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub service_id: Option<u64>,
    #[serde(default)]
    pub date_at: Option<NaiveDate>,
}

impl TimeEntry {
    pub fn belongs_to(&self, work_item_id: WorkItemId) -> bool {
        note_references_work_item(&self.note, work_item_id)
    }
}

/// Payload for creating a time entry. Unset defaults are omitted, never sent as the sentinel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<u64>,
}

impl NewTimeEntry {
    pub fn for_work_item(work_item_id: WorkItemId, title: &str, settings: &EffectiveSettings) -> Self {
        Self {
            note: correlation_note(work_item_id, title),
            project_id: settings.default_project_id,
            service_id: settings.default_service_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MiteProject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MiteService {
    pub id: u64,
    pub name: String,
}

pub fn correlation_tag(work_item_id: WorkItemId) -> String {
    format!("{work_item_id}{CORRELATION_DELIMITER}")
}

pub fn correlation_note(work_item_id: WorkItemId, title: &str) -> String {
    format!("{} {}", correlation_tag(work_item_id), title.trim())
}

pub fn note_references_work_item(note: &str, work_item_id: WorkItemId) -> bool {
    let tag = correlation_tag(work_item_id);
    note.match_indices(&tag).any(|(index, _)| {
        note[..index]
            .chars()
            .next_back()
            .is_none_or(|previous| !previous.is_ascii_digit())
    })
}

pub fn parse_default_id(raw: &str) -> Option<u64> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Some(value as u64),
        _ => None,
    }
}

pub fn encode_default_id(value: Option<u64>) -> String {
    match value {
        Some(id) => id.to_string(),
        None => NO_SELECTION.to_string(),
    }
}

pub fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    format!("{hours:02}:{rest:02}")
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
