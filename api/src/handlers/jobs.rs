use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use orchestrator::models::{deserialize_job_data, CreateJobRequest, JobDataMap, JobSummary};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{JOB_DELETE, JOB_EXECUTE, JOB_READ, JOB_WRITE};
use crate::handlers::{HandlerResult, QueryResponse};
use crate::middleware::{check_permission, AuthenticatedUser};
use crate::state::AppState;

/// Body of `POST /api/jobs`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobBody {
    pub job_name: String,
    pub job_group: String,
    pub job_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_job_data")]
    pub job_data: JobDataMap,
}

impl From<CreateJobBody> for CreateJobRequest {
    fn from(body: CreateJobBody) -> Self {
        let mut request = CreateJobRequest::new(body.job_name, body.job_group, body.job_type)
            .with_job_data(body.job_data);
        request.description = body.description;
        request
    }
}

/// List every job in the caller's permitted groups
#[tracing::instrument(skip(state, user))]
pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> HandlerResult<Json<Vec<JobSummary>>> {
    check_permission(&user, JOB_READ)?;

    let jobs = state.core.get_job_details(&user.permitted_groups()).await?;
    Ok(Json(jobs))
}

#[tracing::instrument(skip(state, user, body), fields(job_name = %body.job_name, job_group = %body.job_group))]
pub async fn create_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateJobBody>,
) -> HandlerResult<(StatusCode, Json<QueryResponse>)> {
    check_permission(&user, JOB_WRITE)?;

    let id = state
        .core
        .create_job(body.into(), &user.permitted_groups())
        .await?;

    tracing::info!(opaque_id = %id, user = %user.0.username, "Job created via API");
    Ok((StatusCode::CREATED, Json(QueryResponse::created(id))))
}

#[tracing::instrument(skip(state, user))]
pub async fn get_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<JobSummary>> {
    check_permission(&user, JOB_READ)?;

    let job = state
        .core
        .get_job_detail(id, &user.permitted_groups())
        .await?;
    Ok(Json(job))
}

/// Run a job once, now
#[tracing::instrument(skip(state, user))]
pub async fn execute_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<QueryResponse>> {
    check_permission(&user, JOB_EXECUTE)?;

    state
        .core
        .execute_job(id, &user.permitted_groups())
        .await?;
    Ok(Json(QueryResponse::ok()))
}

#[tracing::instrument(skip(state, user))]
pub async fn delete_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<QueryResponse>> {
    check_permission(&user, JOB_DELETE)?;

    state.core.remove_job(id, &user.permitted_groups()).await?;

    tracing::info!(opaque_id = %id, user = %user.0.username, "Job removed via API");
    Ok(Json(QueryResponse::ok()))
}
