pub mod health;
pub mod jobs;
pub mod metrics;
pub mod triggers;

// Common response types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orchestrator::errors::{ApiError, SchedulerError};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthError;

/// Envelope returned by every mutating endpoint
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub errors: Vec<ApiError>,
}

impl QueryResponse {
    pub fn ok() -> Self {
        Self {
            valid: true,
            id: None,
            errors: Vec::new(),
        }
    }

    pub fn created(id: Uuid) -> Self {
        Self {
            valid: true,
            id: Some(id),
            errors: Vec::new(),
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            valid: false,
            id: None,
            errors: vec![error],
        }
    }
}

/// Failure of a handler, rendered as a `QueryResponse` with a matching status
#[derive(Debug)]
pub enum HandlerError {
    Scheduler(SchedulerError),
    Auth(AuthError),
}

impl From<SchedulerError> for HandlerError {
    fn from(err: SchedulerError) -> Self {
        HandlerError::Scheduler(err)
    }
}

impl From<AuthError> for HandlerError {
    fn from(err: AuthError) -> Self {
        HandlerError::Auth(err)
    }
}

pub fn status_for(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::Validation(_)
        | SchedulerError::InvalidArgument(_)
        | SchedulerError::InvalidJobType(_) => StatusCode::BAD_REQUEST,
        SchedulerError::Unauthorized(_) => StatusCode::FORBIDDEN,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::DuplicateKey(_) => StatusCode::CONFLICT,
        SchedulerError::EngineFailure(_)
        | SchedulerError::CascadeFailed { .. }
        | SchedulerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Auth(err) => err.into_response(),
            HandlerError::Scheduler(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, code = err.code(), "Request failed");
                } else {
                    tracing::debug!(error = %err, code = err.code(), "Request rejected");
                }
                (status, Json(QueryResponse::failure(ApiError::from(&err)))).into_response()
            }
        }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
