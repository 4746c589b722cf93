use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use orchestrator::errors::{SchedulerError, ValidationError};
use orchestrator::models::{
    deserialize_job_data, JobDataMap, NativeKey, TriggerFireTime, TriggerState, TriggerView,
    DEFAULT_GROUP,
};
use orchestrator::trigger::{TriggerSchedule, TriggerSpec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{TRIGGER_READ, TRIGGER_WRITE};
use crate::handlers::{HandlerResult, QueryResponse};
use crate::middleware::{check_permission, AuthenticatedUser};
use crate::state::AppState;

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobKeyQuery {
    pub job_name: String,
    pub job_group: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerKeyQuery {
    pub trigger_name: String,
    #[serde(default = "default_group")]
    pub trigger_group: String,
}

#[derive(Debug, Deserialize)]
pub struct FireTimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Fields shared by interval and calendar trigger bodies
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCommon {
    pub trigger_name: String,
    #[serde(default)]
    pub trigger_group: Option<String>,
    pub job_name: String,
    pub job_group: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_job_data")]
    pub job_data: JobDataMap,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl TriggerCommon {
    fn into_spec(self, schedule: TriggerSchedule) -> TriggerSpec {
        let job_key = NativeKey::new(self.job_name, self.job_group);
        let mut spec = TriggerSpec::new(self.trigger_name, &job_key, schedule)
            .with_job_data(self.job_data);
        if let Some(group) = self.trigger_group {
            spec = spec.with_group(group);
        }
        spec.description = self.description;
        spec.start_time = self.start_time;
        spec.end_time = self.end_time;
        spec
    }
}

/// Body of `POST /api/simpleTriggers`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleTriggerBody {
    #[serde(flatten)]
    pub common: TriggerCommon,
    pub repeat_count: i32,
    pub repeat_interval_ms: u64,
}

/// Body of `POST /api/cronTriggers`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronTriggerBody {
    #[serde(flatten)]
    pub common: TriggerCommon,
    pub cron_expression: String,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl CronTriggerBody {
    fn into_spec(self) -> Result<TriggerSpec, SchedulerError> {
        let time_zone = self
            .time_zone
            .map(|tz| {
                tz.parse::<Tz>().map_err(|e| {
                    ValidationError::invalid("timeZone", format!("unknown time zone '{}': {}", tz, e))
                })
            })
            .transpose()?;

        Ok(self.common.into_spec(TriggerSchedule::Calendar {
            expression: self.cron_expression,
            time_zone,
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerStateResponse {
    pub id: Uuid,
    pub state: TriggerState,
}

#[tracing::instrument(skip(state, user))]
pub async fn list_job_triggers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<JobKeyQuery>,
) -> HandlerResult<Json<Vec<TriggerView>>> {
    check_permission(&user, TRIGGER_READ)?;

    let triggers = state
        .core
        .get_triggers_of_job(&query.job_name, &query.job_group, &user.permitted_groups())
        .await?;
    Ok(Json(triggers))
}

#[tracing::instrument(skip(state, user))]
pub async fn remove_trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<TriggerKeyQuery>,
) -> HandlerResult<Json<QueryResponse>> {
    check_permission(&user, TRIGGER_WRITE)?;

    state
        .core
        .remove_trigger(
            &query.trigger_name,
            &query.trigger_group,
            &user.permitted_groups(),
        )
        .await?;
    Ok(Json(QueryResponse::ok()))
}

/// Unschedule every trigger of a job, keeping the job
#[tracing::instrument(skip(state, user))]
pub async fn remove_job_triggers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<JobKeyQuery>,
) -> HandlerResult<Json<QueryResponse>> {
    check_permission(&user, TRIGGER_WRITE)?;

    let removed = state
        .core
        .remove_job_triggers(&query.job_name, &query.job_group, &user.permitted_groups())
        .await?;

    tracing::info!(
        job_name = %query.job_name,
        job_group = %query.job_group,
        removed,
        "Job triggers removed via API"
    );
    Ok(Json(QueryResponse::ok()))
}

#[tracing::instrument(skip(state, user, body), fields(trigger_name = %body.common.trigger_name))]
pub async fn schedule_simple_trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<SimpleTriggerBody>,
) -> HandlerResult<(StatusCode, Json<QueryResponse>)> {
    check_permission(&user, TRIGGER_WRITE)?;

    let schedule = TriggerSchedule::Interval {
        repeat_count: body.repeat_count,
        repeat_interval_ms: body.repeat_interval_ms,
    };
    let id = state
        .core
        .schedule_trigger(body.common.into_spec(schedule), &user.permitted_groups())
        .await?;

    Ok((StatusCode::CREATED, Json(QueryResponse::created(id))))
}

#[tracing::instrument(skip(state, user, body), fields(trigger_name = %body.common.trigger_name))]
pub async fn schedule_cron_trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CronTriggerBody>,
) -> HandlerResult<(StatusCode, Json<QueryResponse>)> {
    check_permission(&user, TRIGGER_WRITE)?;

    let spec = body.into_spec()?;
    let id = state
        .core
        .schedule_trigger(spec, &user.permitted_groups())
        .await?;

    Ok((StatusCode::CREATED, Json(QueryResponse::created(id))))
}

#[tracing::instrument(skip(state, user))]
pub async fn get_trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<TriggerView>> {
    check_permission(&user, TRIGGER_READ)?;

    let trigger = state.core.get_trigger(id, &user.permitted_groups()).await?;
    Ok(Json(trigger))
}

#[tracing::instrument(skip(state, user))]
pub async fn get_trigger_state(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<TriggerStateResponse>> {
    check_permission(&user, TRIGGER_READ)?;

    let trigger_state = state
        .core
        .get_trigger_state(id, &user.permitted_groups())
        .await?;
    Ok(Json(TriggerStateResponse {
        id,
        state: trigger_state,
    }))
}

#[tracing::instrument(skip(state, user))]
pub async fn pause_trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<QueryResponse>> {
    check_permission(&user, TRIGGER_WRITE)?;

    state.core.pause_trigger(id, &user.permitted_groups()).await?;
    Ok(Json(QueryResponse::ok()))
}

#[tracing::instrument(skip(state, user))]
pub async fn resume_trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<QueryResponse>> {
    check_permission(&user, TRIGGER_WRITE)?;

    state
        .core
        .resume_trigger(id, &user.permitted_groups())
        .await?;
    Ok(Json(QueryResponse::ok()))
}

/// Upcoming fire times within `[start, end]` for the caller's groups
#[tracing::instrument(skip(state, user))]
pub async fn fire_times(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(window): Query<FireTimeWindow>,
) -> HandlerResult<Json<Vec<TriggerFireTime>>> {
    check_permission(&user, TRIGGER_READ)?;

    let times = state
        .core
        .get_fire_times_between(window.start, window.end, &user.permitted_groups())
        .await?;
    Ok(Json(times))
}
