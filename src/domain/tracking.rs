use crate::domain::models::{TimeEntry, TimeEntryId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    #[default]
    Idle,
    Tracking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingState {
    Idle { entry: Option<TimeEntry> },
    EntryCreatedNotStarted { entry: TimeEntry },
    Tracking { entry: TimeEntry },
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::Idle { entry: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPlan {
    CreateEntry,
    StartExisting(TimeEntryId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("work item is already being tracked")]
    AlreadyTracking,
    #[error("work item is not being tracked")]
    NotTracking,
    #[error("tracker reports entry {actual} running, expected {expected}")]
    RunningEntryMismatch {
        expected: TimeEntryId,
        actual: TimeEntryId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningTracker {
    pub id: TimeEntryId,
    pub minutes: Option<u32>,
}

impl TrackingState {
    pub fn derive(today_entry: Option<TimeEntry>, running: Option<TimeEntryId>) -> Self {
        match today_entry {
            Some(entry) if running == Some(entry.id) => Self::Tracking { entry },
            entry => Self::Idle { entry },
        }
    }

    pub fn status(&self) -> TrackingStatus {
        match self {
            Self::Tracking { .. } => TrackingStatus::Tracking,
            Self::Idle { .. } | Self::EntryCreatedNotStarted { .. } => TrackingStatus::Idle,
        }
    }

    pub fn entry(&self) -> Option<&TimeEntry> {
        match self {
            Self::Idle { entry } => entry.as_ref(),
            Self::EntryCreatedNotStarted { entry } | Self::Tracking { entry } => Some(entry),
        }
    }

    pub fn plan_start(&self) -> Result<StartPlan, TransitionError> {
        match self {
            Self::Tracking { .. } => Err(TransitionError::AlreadyTracking),
            Self::Idle { entry: None } => Ok(StartPlan::CreateEntry),
            Self::Idle { entry: Some(entry) } | Self::EntryCreatedNotStarted { entry } => {
                Ok(StartPlan::StartExisting(entry.id))
            }
        }
    }

    pub fn entry_created(self, entry: TimeEntry) -> Self {
        Self::EntryCreatedNotStarted { entry }
    }

    pub fn tracker_started(self, running: RunningTracker) -> Result<Self, TransitionError> {
        let Some(mut entry) = self.entry().cloned() else {
            return Err(TransitionError::NotTracking);
        };
        if running.id != entry.id {
            return Err(TransitionError::RunningEntryMismatch {
                expected: entry.id,
                actual: running.id,
            });
        }
        if let Some(minutes) = running.minutes {
            entry.minutes = minutes;
        }
        Ok(Self::Tracking { entry })
    }

    pub fn plan_stop(&self) -> Result<TimeEntryId, TransitionError> {
        match self {
            Self::Tracking { entry } => Ok(entry.id),
            _ => Err(TransitionError::NotTracking),
        }
    }

    pub fn tracker_stopped(self, stopped_minutes: Option<u32>) -> Self {
        match self {
            Self::Tracking { mut entry } => {
                if let Some(minutes) = stopped_minutes {
                    entry.minutes = minutes;
                }
                Self::Idle { entry: Some(entry) }
            }
            other => other,
        }
    }

    pub fn reconcile(self, running: Option<TimeEntryId>) -> Self {
        match self {
            Self::Tracking { entry } if running != Some(entry.id) => Self::Idle { entry: Some(entry) },
            Self::Idle { entry: Some(entry) } | Self::EntryCreatedNotStarted { entry }
                if running == Some(entry.id) =>
            {
                Self::Tracking { entry }
            }
            other => other,
        }
    }
}
