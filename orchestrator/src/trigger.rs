//! Trigger descriptions handed to the scheduling engine.
//!
//! A trigger is either interval-based (fire `repeat_count + 1` times, `repeat_interval_ms`
//! apart) or calendar-based (fire whenever a cron expression matches). Both carry a
//! payload that is delivered to the job on every fire.

use crate::errors::ValidationError;
use crate::models::{default_group, deserialize_job_data, JobDataMap, NativeKey};
use crate::schedule::parse_cron_expression;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Repeat count meaning "repeat until removed"
pub const REPEAT_INDEFINITELY: i32 = -1;

/// Recurrence of a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSchedule {
    Interval {
        repeat_count: i32,
        repeat_interval_ms: u64,
    },
    Calendar {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<Tz>,
    },
}

impl TriggerSchedule {
    pub fn interval(repeat_count: i32, repeat_interval: std::time::Duration) -> Self {
        TriggerSchedule::Interval {
            repeat_count,
            repeat_interval_ms: repeat_interval.as_millis() as u64,
        }
    }

    pub fn calendar(expression: impl Into<String>) -> Self {
        TriggerSchedule::Calendar {
            expression: expression.into(),
            time_zone: None,
        }
    }

    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerSchedule::Interval { .. } => "interval",
            TriggerSchedule::Calendar { .. } => "calendar",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TriggerSchedule::Interval {
                repeat_count,
                repeat_interval_ms,
            } => {
                if *repeat_count < REPEAT_INDEFINITELY {
                    return Err(ValidationError::invalid(
                        "repeat_count",
                        format!("must be >= 0 or {}, got {}", REPEAT_INDEFINITELY, repeat_count),
                    ));
                }
                if *repeat_count != 0 && *repeat_interval_ms == 0 {
                    return Err(ValidationError::invalid(
                        "repeat_interval",
                        "must be greater than zero for a repeating trigger",
                    ));
                }
                if i64::try_from(*repeat_interval_ms).is_err() {
                    return Err(ValidationError::invalid(
                        "repeat_interval",
                        "is too large",
                    ));
                }
                Ok(())
            }
            TriggerSchedule::Calendar { expression, .. } => {
                if expression.trim().is_empty() {
                    return Err(ValidationError::MissingField("expression".to_string()));
                }
                parse_cron_expression(expression).map(|_| ())
            }
        }
    }
}

/// Trigger description submitted for scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    pub job_name: String,
    pub job_group: String,
    #[serde(default)]
    pub description: Option<String>,
    pub schedule: TriggerSchedule,
    #[serde(default, deserialize_with = "deserialize_job_data")]
    pub job_data: JobDataMap,
    /// Defaults to the moment the trigger is scheduled
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl TriggerSpec {
    pub fn new(name: impl Into<String>, job_key: &NativeKey, schedule: TriggerSchedule) -> Self {
        Self {
            name: name.into(),
            group: default_group(),
            job_name: job_key.name.clone(),
            job_group: job_key.group.clone(),
            description: None,
            schedule,
            job_data: JobDataMap::new(),
            start_time: None,
            end_time: None,
        }
    }

    /// Interval trigger for a job
    pub fn interval(
        name: impl Into<String>,
        job_key: &NativeKey,
        repeat_count: i32,
        repeat_interval: std::time::Duration,
    ) -> Self {
        Self::new(
            name,
            job_key,
            TriggerSchedule::interval(repeat_count, repeat_interval),
        )
    }

    /// Calendar trigger for a job
    pub fn calendar(
        name: impl Into<String>,
        job_key: &NativeKey,
        expression: impl Into<String>,
    ) -> Self {
        Self::new(name, job_key, TriggerSchedule::calendar(expression))
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_job_data(mut self, job_data: JobDataMap) -> Self {
        self.job_data = job_data;
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn key(&self) -> NativeKey {
        NativeKey::new(&self.name, &self.group)
    }

    pub fn job_key(&self) -> NativeKey {
        NativeKey::new(&self.job_name, &self.job_group)
    }

    /// Reject descriptions the engine could never honour
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("name", &self.name),
            ("group", &self.group),
            ("job_name", &self.job_name),
            ("job_group", &self.job_group),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field.to_string()));
            }
        }

        self.schedule.validate()?;

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(ValidationError::invalid(
                    "end_time",
                    "must not be before start_time",
                ));
            }
        }

        Ok(())
    }
}

/// Milliseconds to a chrono duration, `None` when it does not fit
pub(crate) fn interval_duration(repeat_interval_ms: u64) -> Option<Duration> {
    i64::try_from(repeat_interval_ms)
        .ok()
        .and_then(Duration::try_milliseconds)
}
