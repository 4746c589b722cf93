use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::trigger::TriggerSchedule;

/// Group assigned to triggers that are scheduled without an explicit group
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Payload delivered verbatim to a job at fire time
pub type JobDataMap = BTreeMap<String, serde_json::Value>;

/// Deserialize a payload treating an explicit `null` the same as an absent field
pub fn deserialize_job_data<'de, D>(deserializer: D) -> Result<JobDataMap, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<JobDataMap>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

// ============================================================================
// Keys
// ============================================================================

/// Native (name, group) key used by the scheduling engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NativeKey {
    pub name: String,
    pub group: String,
}

impl NativeKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// Key in the default group
    pub fn in_default_group(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_GROUP)
    }

    /// Both halves must carry non-blank text
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && !self.group.trim().is_empty()
    }
}

impl fmt::Display for NativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Kind of native object an identity mapping points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Job,
    Trigger,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Job => "job",
            EntityKind::Trigger => "trigger",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(EntityKind::Job),
            "trigger" => Ok(EntityKind::Trigger),
            other => Err(format!("unknown entity kind '{}'", other)),
        }
    }
}

// ============================================================================
// Job Models
// ============================================================================

/// Job as stored by the scheduling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: NativeKey,
    pub job_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_job_data")]
    pub job_data: JobDataMap,
}

/// Request to create a job under a native key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub group: String,
    pub job_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_job_data")]
    pub job_data: JobDataMap,
}

impl CreateJobRequest {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        job_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            job_type: job_type.into(),
            description: None,
            job_data: JobDataMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_job_data(mut self, job_data: JobDataMap) -> Self {
        self.job_data = job_data;
        self
    }

    pub fn key(&self) -> NativeKey {
        NativeKey::new(&self.name, &self.group)
    }
}

/// Job record returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub job_name: String,
    pub job_group: String,
    pub job_type: String,
    pub scheduler_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Trigger Models
// ============================================================================

/// Trigger state as reported by the scheduling engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    Normal,
    Paused,
    Complete,
    Error,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerState::Normal => "normal",
            TriggerState::Paused => "paused",
            TriggerState::Complete => "complete",
            TriggerState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Trigger as stored by the scheduling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDetail {
    pub key: NativeKey,
    pub job_key: NativeKey,
    #[serde(default)]
    pub description: Option<String>,
    pub schedule: TriggerSchedule,
    #[serde(default, deserialize_with = "deserialize_job_data")]
    pub job_data: JobDataMap,
    pub state: TriggerState,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_fire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub previous_fire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub times_triggered: u64,
}

/// Trigger record returned to API callers
///
/// `id` is absent only for triggers that were scheduled around the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub detail: TriggerDetail,
}

/// Single computed fire time as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireTime {
    pub trigger_key: NativeKey,
    pub job_key: NativeKey,
    pub fire_time: DateTime<Utc>,
}

/// Fire time returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerFireTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<Uuid>,
    pub trigger_name: String,
    pub trigger_group: String,
    pub job_name: String,
    pub job_group: String,
    pub fire_time: DateTime<Utc>,
}
