// Error handling framework for the orchestration core

use crate::models::NativeKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Trigger and request validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidTimeWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Time window too large: more than {limit} fire times for trigger within it")]
    TooManyFireTimes { limit: usize },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Identity store errors
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identifier not found: {0}")]
    NotFound(String),

    #[error("Native key already mapped: {0}")]
    DuplicateKey(String),

    #[error("Identity store failure: {0}")]
    Storage(String),
}

/// Errors reported by the scheduling engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Job not found: {0}")]
    JobNotFound(NativeKey),

    #[error("Trigger not found: {0}")]
    TriggerNotFound(NativeKey),

    #[error("Object already exists: {0}")]
    AlreadyExists(NativeKey),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Scheduler engine failure: {0}")]
    Internal(String),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// One trigger that could not be removed during a cascade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeFailure {
    pub key: NativeKey,
    pub reason: String,
}

/// Errors surfaced by the scheduler orchestrator to its caller
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Not authorized for group '{0}'")]
    Unauthorized(String),

    #[error("Invalid job type: {0}")]
    InvalidJobType(String),

    #[error("Scheduler engine failure: {0}")]
    EngineFailure(String),

    #[error("Removal of {key} incomplete: {} trigger(s) could not be removed", .failures.len())]
    CascadeFailed {
        key: NativeKey,
        failures: Vec<CascadeFailure>,
    },

    #[error("Identity store failure: {0}")]
    Storage(String),
}

/// Who is at fault for a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultType {
    Sender,
    Server,
}

impl SchedulerError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Validation(_) => "VALIDATION_ERROR",
            SchedulerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            SchedulerError::NotFound(_) => "NOT_FOUND",
            SchedulerError::DuplicateKey(_) => "DUPLICATE_KEY",
            SchedulerError::Unauthorized(_) => "UNAUTHORIZED",
            SchedulerError::InvalidJobType(_) => "INVALID_JOB_TYPE",
            SchedulerError::EngineFailure(_) => "ENGINE_FAILURE",
            SchedulerError::CascadeFailed { .. } => "CASCADE_FAILED",
            SchedulerError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::Validation(_) => "validation",
            SchedulerError::InvalidArgument(_) => "invalid_argument",
            SchedulerError::NotFound(_) => "not_found",
            SchedulerError::DuplicateKey(_) => "duplicate_key",
            SchedulerError::Unauthorized(_) => "unauthorized",
            SchedulerError::InvalidJobType(_) => "invalid_job_type",
            SchedulerError::EngineFailure(_) => "engine_failure",
            SchedulerError::CascadeFailed { .. } => "cascade_failed",
            SchedulerError::Storage(_) => "storage",
        }
    }

    pub fn fault_type(&self) -> FaultType {
        match self {
            SchedulerError::Validation(_)
            | SchedulerError::InvalidArgument(_)
            | SchedulerError::NotFound(_)
            | SchedulerError::DuplicateKey(_)
            | SchedulerError::Unauthorized(_)
            | SchedulerError::InvalidJobType(_) => FaultType::Sender,
            SchedulerError::EngineFailure(_)
            | SchedulerError::CascadeFailed { .. }
            | SchedulerError::Storage(_) => FaultType::Server,
        }
    }
}

/// API response error type for HTTP responses
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    #[serde(rename = "type")]
    pub fault_type: FaultType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, fault_type: FaultType, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            fault_type,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&SchedulerError> for ApiError {
    fn from(err: &SchedulerError) -> Self {
        let api_error = ApiError::new(err.code(), err.fault_type(), err.to_string());
        match err {
            SchedulerError::CascadeFailed { failures, .. } => {
                api_error.with_details(serde_json::json!({ "failures": failures }))
            }
            _ => api_error,
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        ApiError::from(&err)
    }
}

impl From<IdentityError> for SchedulerError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound(id) => SchedulerError::NotFound(id),
            IdentityError::DuplicateKey(key) => SchedulerError::DuplicateKey(key),
            IdentityError::Storage(msg) => SchedulerError::Storage(msg),
        }
    }
}

impl From<EngineError> for SchedulerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::JobNotFound(key) => SchedulerError::NotFound(format!("job {}", key)),
            EngineError::TriggerNotFound(key) => {
                SchedulerError::NotFound(format!("trigger {}", key))
            }
            EngineError::AlreadyExists(key) => SchedulerError::DuplicateKey(key.to_string()),
            EngineError::UnknownJobType(name) => SchedulerError::InvalidJobType(name),
            EngineError::Validation(e) => SchedulerError::Validation(e),
            EngineError::Internal(msg) => SchedulerError::EngineFailure(msg),
        }
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => IdentityError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) if code.as_ref() == "23505" => {
                    IdentityError::DuplicateKey(db_err.message().to_string())
                }
                _ => IdentityError::Storage(db_err.message().to_string()),
            },
            _ => IdentityError::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidCronExpression {
            expression: "* * * *".to_string(),
            reason: "invalid format".to_string(),
        };
        assert!(err.to_string().contains("Invalid cron expression"));
    }

    #[test]
    fn test_engine_errors_translate_into_taxonomy() {
        let key = NativeKey::new("Job1", "Group1");
        assert!(matches!(
            SchedulerError::from(EngineError::JobNotFound(key.clone())),
            SchedulerError::NotFound(_)
        ));
        assert!(matches!(
            SchedulerError::from(EngineError::AlreadyExists(key)),
            SchedulerError::DuplicateKey(_)
        ));
        assert!(matches!(
            SchedulerError::from(EngineError::UnknownJobType("ghost".into())),
            SchedulerError::InvalidJobType(_)
        ));
        assert!(matches!(
            SchedulerError::from(EngineError::Internal("boom".into())),
            SchedulerError::EngineFailure(_)
        ));
    }

    #[test]
    fn test_identity_errors_translate_into_taxonomy() {
        assert!(matches!(
            SchedulerError::from(IdentityError::DuplicateKey("k".into())),
            SchedulerError::DuplicateKey(_)
        ));
        assert!(matches!(
            SchedulerError::from(IdentityError::Storage("down".into())),
            SchedulerError::Storage(_)
        ));
    }

    #[test]
    fn test_not_found_and_unauthorized_are_distinct_codes() {
        let not_found = SchedulerError::NotFound("x".into());
        let unauthorized = SchedulerError::Unauthorized("Group2".into());
        assert_ne!(not_found.code(), unauthorized.code());
        assert_eq!(unauthorized.fault_type(), FaultType::Sender);
    }

    #[test]
    fn test_cascade_failure_carries_details() {
        let err = SchedulerError::CascadeFailed {
            key: NativeKey::new("Job1", "Group1"),
            failures: vec![CascadeFailure {
                key: NativeKey::new("Trigger1", "DEFAULT"),
                reason: "engine unavailable".to_string(),
            }],
        };
        assert!(err.to_string().contains("1 trigger(s)"));
        let api_err = ApiError::from(&err);
        assert_eq!(api_err.code, "CASCADE_FAILED");
        assert_eq!(api_err.fault_type, FaultType::Server);
        assert!(api_err.details.is_some());
    }
}
