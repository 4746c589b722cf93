//! Scheduler orchestrator.
//!
//! [`SchedulerCore`] sits between callers that speak opaque identifiers and the
//! scheduling engine that speaks native (name, group) keys. Every call translates
//! through the [`IdentityStore`]; nothing is cached between calls.
//!
//! Consistency rules:
//!
//! - Creating a native object and storing its mapping happen under the write side of
//!   `consistency`, so readers never observe one without the other. Reads that only
//!   translate take the read side. Engine calls themselves are not serialized beyond
//!   that.
//! - Removals look up and authorize under the read side and unschedule outside the
//!   guard. Only dropping the mapping takes the write side, after checking that the
//!   key was not scheduled again in between. Reconcile checks each entry unguarded
//!   and again under the write side before removing it.
//! - A mapping whose native object has disappeared is removed as soon as it is
//!   noticed, and the operation reports `NotFound`.
//! - Cascading removal is best effort: each trigger mapping is removed only after its
//!   trigger, and the job mapping last. Triggers that could not be removed are
//!   reported together in `CascadeFailed`; nothing is rolled back.

use crate::engine::SchedulingEngine;
use crate::errors::{CascadeFailure, IdentityError, SchedulerError, ValidationError};
use crate::identity::{IdentityEntry, IdentityStore};
use crate::models::{
    CreateJobRequest, EntityKind, JobDetail, JobSummary, NativeKey, TriggerDetail,
    TriggerFireTime, TriggerState, TriggerView,
};
use crate::permissions::PermittedGroups;
use crate::telemetry;
use crate::trigger::TriggerSpec;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct SchedulerCore {
    engine: Arc<dyn SchedulingEngine>,
    identities: Arc<dyn IdentityStore>,
    // Never held across a call into another guarded operation
    consistency: RwLock<()>,
}

impl SchedulerCore {
    pub fn new(engine: Arc<dyn SchedulingEngine>, identities: Arc<dyn IdentityStore>) -> Self {
        Self {
            engine,
            identities,
            consistency: RwLock::new(()),
        }
    }

    pub fn scheduler_name(&self) -> String {
        self.engine.scheduler_name()
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Create a job and its opaque identifier as one unit
    #[instrument(skip(self, request, permitted), fields(job_name = %request.name, job_group = %request.group))]
    pub async fn create_job(
        &self,
        request: CreateJobRequest,
        permitted: &PermittedGroups,
    ) -> Result<Uuid, SchedulerError> {
        self.try_create_job(request, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("create_job", e.kind()))
    }

    async fn try_create_job(
        &self,
        request: CreateJobRequest,
        permitted: &PermittedGroups,
    ) -> Result<Uuid, SchedulerError> {
        for (field, value) in [
            ("name", &request.name),
            ("group", &request.group),
            ("job_type", &request.job_type),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field.to_string()).into());
            }
        }
        permitted.ensure_authorized(&request.group)?;

        let key = request.key();
        let _guard = self.consistency.write().await;

        if let Some(stale) = self.lookup_id(&key, EntityKind::Job).await? {
            if !self.engine.contains_job(&key).await? {
                self.forget(stale, "job mapping without a native job").await;
            }
        }

        self.engine
            .create_job(JobDetail {
                key: key.clone(),
                job_type: request.job_type,
                description: request.description,
                job_data: request.job_data,
            })
            .await?;

        let id = match self.identities.put(EntityKind::Job, &key).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Failed to store job mapping, removing created job");
                if let Err(rollback) = self.engine.remove_job(&key).await {
                    warn!(error = %rollback, "Rollback of created job failed");
                }
                return Err(e.into());
            }
        };

        telemetry::record_job_created();
        info!(opaque_id = %id, "Job created");
        Ok(id)
    }

    /// Remove a job, its triggers first
    #[instrument(skip(self, permitted))]
    pub async fn remove_job(
        &self,
        job_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        self.try_remove_job(job_id, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("remove_job", e.kind()))
    }

    async fn try_remove_job(
        &self,
        job_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        let entry = {
            let _guard = self.consistency.read().await;

            let entry = self.resolve_kind(job_id, EntityKind::Job).await?;
            permitted.ensure_authorized(&entry.key.group)?;

            if !self.engine.contains_job(&entry.key).await? {
                self.forget(job_id, "job mapping without a native job").await;
                return Err(SchedulerError::NotFound(format!("job {}", job_id)));
            }
            entry
        };

        let (_, mut failures) = self.unschedule_all(&entry.key).await?;

        let _guard = self.consistency.write().await;
        self.engine.remove_job(&entry.key).await?;

        // the engine drops a job's triggers along with it
        if !failures.is_empty() {
            let mut remaining = Vec::with_capacity(failures.len());
            for failure in failures {
                if self.engine.contains_trigger(&failure.key).await? {
                    remaining.push(failure);
                } else if let Err(e) = self.forget_key(&failure.key, EntityKind::Trigger).await {
                    remaining.push(CascadeFailure {
                        key: failure.key,
                        reason: e.to_string(),
                    });
                }
            }
            failures = remaining;
        }

        self.identities.remove(job_id).await?;
        telemetry::record_job_removed();

        if !failures.is_empty() {
            warn!(failed = failures.len(), "Job removed with incomplete trigger cascade");
            return Err(SchedulerError::CascadeFailed {
                key: entry.key,
                failures,
            });
        }

        info!(job = %entry.key, "Job removed");
        Ok(())
    }

    /// Run a job once, immediately, without storing a trigger
    #[instrument(skip(self, permitted))]
    pub async fn execute_job(
        &self,
        job_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        self.try_execute_job(job_id, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("execute_job", e.kind()))
    }

    async fn try_execute_job(
        &self,
        job_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        let _guard = self.consistency.read().await;

        let entry = self.resolve_kind(job_id, EntityKind::Job).await?;
        permitted.ensure_authorized(&entry.key.group)?;

        if !self.engine.contains_job(&entry.key).await? {
            self.forget(job_id, "job mapping without a native job").await;
            return Err(SchedulerError::NotFound(format!("job {}", job_id)));
        }

        self.engine.trigger_now(&entry.key).await?;
        info!(job = %entry.key, "Job execution requested");
        Ok(())
    }

    #[instrument(skip(self, permitted))]
    pub async fn get_job_detail(
        &self,
        job_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<JobSummary, SchedulerError> {
        self.try_get_job_detail(job_id, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("get_job_detail", e.kind()))
    }

    async fn try_get_job_detail(
        &self,
        job_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<JobSummary, SchedulerError> {
        let _guard = self.consistency.read().await;

        let entry = self.resolve_kind(job_id, EntityKind::Job).await?;
        permitted.ensure_authorized(&entry.key.group)?;

        match self.engine.job_detail(&entry.key).await? {
            Some(detail) => Ok(self.summarize(job_id, detail)),
            None => {
                self.forget(job_id, "job mapping without a native job").await;
                Err(SchedulerError::NotFound(format!("job {}", job_id)))
            }
        }
    }

    /// Every job in a group the caller may see, ordered by group then name
    #[instrument(skip(self, permitted))]
    pub async fn get_job_details(
        &self,
        permitted: &PermittedGroups,
    ) -> Result<Vec<JobSummary>, SchedulerError> {
        self.try_get_job_details(permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("get_job_details", e.kind()))
    }

    async fn try_get_job_details(
        &self,
        permitted: &PermittedGroups,
    ) -> Result<Vec<JobSummary>, SchedulerError> {
        let _guard = self.consistency.read().await;

        let groups = permitted.filter_groups(self.engine.job_group_names().await?);

        let mut jobs = Vec::new();
        for group in groups {
            for key in self.engine.job_keys(&group).await? {
                let Some(detail) = self.engine.job_detail(&key).await? else {
                    continue;
                };
                match self.lookup_id(&key, EntityKind::Job).await? {
                    Some(id) => jobs.push(self.summarize(id, detail)),
                    None => debug!(job = %key, "Skipping job without an opaque identifier"),
                }
            }
        }
        Ok(jobs)
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Schedule a trigger for an existing job.
    ///
    /// Scheduling under an existing trigger key replaces the previous definition and
    /// keeps its opaque identifier.
    #[instrument(
        skip(self, spec, permitted),
        fields(trigger_name = %spec.name, trigger_group = %spec.group, job_name = %spec.job_name, job_group = %spec.job_group)
    )]
    pub async fn schedule_trigger(
        &self,
        spec: TriggerSpec,
        permitted: &PermittedGroups,
    ) -> Result<Uuid, SchedulerError> {
        self.try_schedule_trigger(spec, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("schedule_trigger", e.kind()))
    }

    async fn try_schedule_trigger(
        &self,
        spec: TriggerSpec,
        permitted: &PermittedGroups,
    ) -> Result<Uuid, SchedulerError> {
        spec.validate()?;
        permitted.ensure_authorized(&spec.job_group)?;

        let job_key = spec.job_key();
        let trigger_key = spec.key();
        let kind = spec.schedule.kind();

        let _guard = self.consistency.write().await;

        if !self.engine.contains_job(&job_key).await? {
            return Err(SchedulerError::NotFound(format!("job {}", job_key)));
        }

        // replacing a trigger bound to another job touches that job's group too
        if let Some(existing) = self.engine.trigger(&trigger_key).await? {
            if existing.job_key.group != job_key.group {
                permitted.ensure_authorized(&existing.job_key.group)?;
            }
        }

        let existing_id = self.lookup_id(&trigger_key, EntityKind::Trigger).await?;

        let next_fire_time = self.engine.schedule_trigger(spec).await?;

        let id = match existing_id {
            Some(id) => id,
            None => match self.identities.put(EntityKind::Trigger, &trigger_key).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "Failed to store trigger mapping, unscheduling trigger");
                    if let Err(rollback) = self.engine.unschedule_trigger(&trigger_key).await {
                        warn!(error = %rollback, "Rollback of scheduled trigger failed");
                    }
                    return Err(e.into());
                }
            },
        };

        telemetry::record_trigger_scheduled(kind);
        info!(
            opaque_id = %id,
            kind,
            next_fire_time = ?next_fire_time,
            "Trigger scheduled"
        );
        Ok(id)
    }

    /// Remove a trigger by its native key
    #[instrument(skip(self, permitted))]
    pub async fn remove_trigger(
        &self,
        trigger_name: &str,
        trigger_group: &str,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        self.try_remove_trigger(trigger_name, trigger_group, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("remove_trigger", e.kind()))
    }

    async fn try_remove_trigger(
        &self,
        trigger_name: &str,
        trigger_group: &str,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        let key = NativeKey::new(trigger_name, trigger_group);
        if !key.is_well_formed() {
            return Err(SchedulerError::InvalidArgument(
                "trigger name and group are required".to_string(),
            ));
        }

        let detail = {
            let _guard = self.consistency.read().await;
            self.engine.trigger(&key).await?
        };
        let Some(detail) = detail else {
            if let Err(e) = self.forget_unscheduled(&key).await {
                warn!(error = %e, "Failed to remove mapping of missing trigger");
            }
            return Err(SchedulerError::NotFound(format!("trigger {}", key)));
        };
        permitted.ensure_authorized(&detail.job_key.group)?;

        if !self.unschedule_one(&key).await? {
            return Err(SchedulerError::NotFound(format!("trigger {}", key)));
        }

        info!(trigger = %key, "Trigger removed");
        Ok(())
    }

    /// Remove every trigger of a job, leaving the job in place.
    /// Returns the number of triggers removed.
    #[instrument(skip(self, permitted))]
    pub async fn remove_job_triggers(
        &self,
        job_name: &str,
        job_group: &str,
        permitted: &PermittedGroups,
    ) -> Result<usize, SchedulerError> {
        self.try_remove_job_triggers(job_name, job_group, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("remove_job_triggers", e.kind()))
    }

    async fn try_remove_job_triggers(
        &self,
        job_name: &str,
        job_group: &str,
        permitted: &PermittedGroups,
    ) -> Result<usize, SchedulerError> {
        let job_key = Self::job_key_argument(job_name, job_group)?;
        permitted.ensure_authorized(&job_key.group)?;

        let exists = {
            let _guard = self.consistency.read().await;
            self.engine.contains_job(&job_key).await?
        };
        if !exists {
            return Err(SchedulerError::NotFound(format!("job {}", job_key)));
        }

        let (removed, failures) = self.unschedule_all(&job_key).await?;
        if !failures.is_empty() {
            return Err(SchedulerError::CascadeFailed {
                key: job_key,
                failures,
            });
        }

        info!(job = %job_key, removed, "Job triggers removed");
        Ok(removed)
    }

    #[instrument(skip(self, permitted))]
    pub async fn pause_trigger(
        &self,
        trigger_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        self.try_set_paused(trigger_id, true, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("pause_trigger", e.kind()))
    }

    #[instrument(skip(self, permitted))]
    pub async fn resume_trigger(
        &self,
        trigger_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        self.try_set_paused(trigger_id, false, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("resume_trigger", e.kind()))
    }

    async fn try_set_paused(
        &self,
        trigger_id: Uuid,
        paused: bool,
        permitted: &PermittedGroups,
    ) -> Result<(), SchedulerError> {
        let _guard = self.consistency.read().await;

        let (entry, detail) = self.resolve_trigger(trigger_id).await?;
        permitted.ensure_authorized(&detail.job_key.group)?;

        if paused {
            self.engine.pause_trigger(&entry.key).await?;
            info!(trigger = %entry.key, "Trigger paused");
        } else {
            self.engine.resume_trigger(&entry.key).await?;
            info!(trigger = %entry.key, "Trigger resumed");
        }
        Ok(())
    }

    /// Triggers of a job ordered by trigger key; empty when the job does not exist
    #[instrument(skip(self, permitted))]
    pub async fn get_triggers_of_job(
        &self,
        job_name: &str,
        job_group: &str,
        permitted: &PermittedGroups,
    ) -> Result<Vec<TriggerView>, SchedulerError> {
        self.try_get_triggers_of_job(job_name, job_group, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("get_triggers_of_job", e.kind()))
    }

    async fn try_get_triggers_of_job(
        &self,
        job_name: &str,
        job_group: &str,
        permitted: &PermittedGroups,
    ) -> Result<Vec<TriggerView>, SchedulerError> {
        let job_key = Self::job_key_argument(job_name, job_group)?;
        permitted.ensure_authorized(&job_key.group)?;

        let _guard = self.consistency.read().await;

        let mut views = Vec::new();
        for detail in self.engine.triggers_of_job(&job_key).await? {
            let id = self.lookup_id(&detail.key, EntityKind::Trigger).await?;
            views.push(TriggerView { id, detail });
        }
        Ok(views)
    }

    #[instrument(skip(self, permitted))]
    pub async fn get_trigger(
        &self,
        trigger_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<TriggerView, SchedulerError> {
        self.try_get_trigger(trigger_id, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("get_trigger", e.kind()))
    }

    async fn try_get_trigger(
        &self,
        trigger_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<TriggerView, SchedulerError> {
        let _guard = self.consistency.read().await;

        let (_, detail) = self.resolve_trigger(trigger_id).await?;
        permitted.ensure_authorized(&detail.job_key.group)?;

        Ok(TriggerView {
            id: Some(trigger_id),
            detail,
        })
    }

    #[instrument(skip(self, permitted))]
    pub async fn get_trigger_state(
        &self,
        trigger_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<TriggerState, SchedulerError> {
        self.try_get_trigger_state(trigger_id, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("get_trigger_state", e.kind()))
    }

    async fn try_get_trigger_state(
        &self,
        trigger_id: Uuid,
        permitted: &PermittedGroups,
    ) -> Result<TriggerState, SchedulerError> {
        let _guard = self.consistency.read().await;

        let (entry, detail) = self.resolve_trigger(trigger_id).await?;
        permitted.ensure_authorized(&detail.job_key.group)?;

        // unscheduling runs outside the guard, so it can land between the two reads
        self.engine
            .trigger_state(&entry.key)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("trigger {}", trigger_id)))
    }

    /// Fire times inside `[start, end]` of triggers whose job the caller may see
    #[instrument(skip(self, permitted))]
    pub async fn get_fire_times_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        permitted: &PermittedGroups,
    ) -> Result<Vec<TriggerFireTime>, SchedulerError> {
        self.try_get_fire_times_between(start, end, permitted)
            .await
            .inspect_err(|e| telemetry::record_operation_error("get_fire_times_between", e.kind()))
    }

    async fn try_get_fire_times_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        permitted: &PermittedGroups,
    ) -> Result<Vec<TriggerFireTime>, SchedulerError> {
        if start > end {
            return Err(ValidationError::InvalidTimeWindow { start, end }.into());
        }

        let _guard = self.consistency.read().await;

        let mut fire_times = Vec::new();
        for fire in self.engine.fire_times_between(start, end).await? {
            if !permitted.authorize(&fire.job_key.group) {
                continue;
            }
            let trigger_id = self.lookup_id(&fire.trigger_key, EntityKind::Trigger).await?;
            fire_times.push(TriggerFireTime {
                trigger_id,
                trigger_name: fire.trigger_key.name,
                trigger_group: fire.trigger_key.group,
                job_name: fire.job_key.name,
                job_group: fire.job_key.group,
                fire_time: fire.fire_time,
            });
        }
        Ok(fire_times)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Remove mappings whose native object no longer exists. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<usize, SchedulerError> {
        let mut removed = 0;
        for kind in [EntityKind::Trigger, EntityKind::Job] {
            for entry in self.identities.entries(kind).await? {
                if self.native_exists(&entry.key, kind).await? {
                    continue;
                }

                // checked again under the guard; the key may have been scheduled again
                let _guard = self.consistency.write().await;
                if !self.native_exists(&entry.key, kind).await? {
                    self.identities.remove(entry.id).await?;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            warn!(removed, "Removed dangling identity mappings");
        } else {
            debug!("Identity mappings consistent with engine");
        }
        Ok(removed)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn summarize(&self, id: Uuid, detail: JobDetail) -> JobSummary {
        JobSummary {
            id,
            job_name: detail.key.name,
            job_group: detail.key.group,
            job_type: detail.job_type,
            scheduler_name: self.engine.scheduler_name(),
            description: detail.description,
        }
    }

    fn job_key_argument(job_name: &str, job_group: &str) -> Result<NativeKey, SchedulerError> {
        let key = NativeKey::new(job_name, job_group);
        if key.is_well_formed() {
            Ok(key)
        } else {
            Err(SchedulerError::InvalidArgument(
                "job name and group are required".to_string(),
            ))
        }
    }

    /// Resolve an identifier that must point at an object of `kind`
    async fn resolve_kind(
        &self,
        id: Uuid,
        kind: EntityKind,
    ) -> Result<IdentityEntry, SchedulerError> {
        let entry = self.identities.resolve(id).await.map_err(|e| match e {
            IdentityError::NotFound(_) => SchedulerError::NotFound(format!("{} {}", kind, id)),
            other => other.into(),
        })?;
        if entry.kind != kind {
            return Err(SchedulerError::NotFound(format!("{} {}", kind, id)));
        }
        Ok(entry)
    }

    async fn resolve_trigger(
        &self,
        trigger_id: Uuid,
    ) -> Result<(IdentityEntry, TriggerDetail), SchedulerError> {
        let entry = self.resolve_kind(trigger_id, EntityKind::Trigger).await?;
        match self.engine.trigger(&entry.key).await? {
            Some(detail) => Ok((entry, detail)),
            None => {
                self.forget(trigger_id, "trigger mapping without a native trigger")
                    .await;
                Err(SchedulerError::NotFound(format!("trigger {}", trigger_id)))
            }
        }
    }

    /// Opaque identifier of `key`, `None` when unmapped
    async fn lookup_id(
        &self,
        key: &NativeKey,
        kind: EntityKind,
    ) -> Result<Option<Uuid>, SchedulerError> {
        match self.identities.reverse_resolve(key, kind).await {
            Ok(id) => Ok(Some(id)),
            Err(IdentityError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a dangling mapping; failure only leaves it for the next reconcile
    async fn forget(&self, id: Uuid, reason: &'static str) {
        warn!(opaque_id = %id, reason, "Removing dangling identity mapping");
        if let Err(e) = self.identities.remove(id).await {
            warn!(opaque_id = %id, error = %e, "Failed to remove dangling identity mapping");
        }
    }

    async fn forget_key(&self, key: &NativeKey, kind: EntityKind) -> Result<(), SchedulerError> {
        if let Some(id) = self.lookup_id(key, kind).await? {
            self.identities.remove(id).await?;
        }
        Ok(())
    }

    async fn native_exists(&self, key: &NativeKey, kind: EntityKind) -> Result<bool, SchedulerError> {
        let exists = match kind {
            EntityKind::Job => self.engine.contains_job(key).await?,
            EntityKind::Trigger => self.engine.contains_trigger(key).await?,
        };
        Ok(exists)
    }

    /// Drop the mapping of an unscheduled trigger unless the key was scheduled again.
    /// Takes the write guard for the mapping step only.
    async fn forget_unscheduled(&self, key: &NativeKey) -> Result<(), SchedulerError> {
        let _guard = self.consistency.write().await;
        if !self.engine.contains_trigger(key).await? {
            self.forget_key(key, EntityKind::Trigger).await?;
        }
        Ok(())
    }

    /// Unschedule one trigger and drop its mapping. `false` when it was already gone.
    async fn unschedule_one(&self, key: &NativeKey) -> Result<bool, SchedulerError> {
        if !self.engine.unschedule_trigger(key).await? {
            return Ok(false);
        }
        self.forget_unscheduled(key).await?;
        telemetry::record_trigger_removed();
        Ok(true)
    }

    /// Unschedule every trigger of `job_key`, removing each mapping after its trigger.
    /// Returns the number removed and the triggers that could not be removed.
    async fn unschedule_all(
        &self,
        job_key: &NativeKey,
    ) -> Result<(usize, Vec<CascadeFailure>), SchedulerError> {
        let mut removed = 0;
        let mut failures = Vec::new();

        let triggers = {
            let _guard = self.consistency.read().await;
            self.engine.triggers_of_job(job_key).await?
        };

        for trigger in triggers {
            match self.unschedule_one(&trigger.key).await {
                Ok(true) => removed += 1,
                // already removed by someone else
                Ok(false) => {}
                Err(e) => {
                    warn!(trigger = %trigger.key, error = %e, "Failed to remove trigger during cascade");
                    failures.push(CascadeFailure {
                        key: trigger.key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok((removed, failures))
    }
}
