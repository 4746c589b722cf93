//! Scheduling engine boundary.
//!
//! The orchestrator talks to the engine exclusively in native (name, group) keys
//! through [`SchedulingEngine`]. Implementations must be safe to call from many tasks
//! at once; the orchestrator adds no locking around individual engine calls.
//!
//! [`InMemoryEngine`] keeps jobs and triggers in RAM and runs its own fire loop.

pub mod job_type;
pub mod memory;

pub use job_type::{JobExecutionContext, JobType, JobTypeRegistry, LogJob, NoOpJob};
pub use memory::InMemoryEngine;

use crate::errors::EngineError;
use crate::models::{FireTime, JobDetail, NativeKey, TriggerDetail, TriggerState};
use crate::trigger::TriggerSpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait SchedulingEngine: Send + Sync {
    /// Name reported in job detail records
    fn scheduler_name(&self) -> String;

    /// Store a job; `AlreadyExists` if the key is taken, `UnknownJobType` if the
    /// job type cannot be resolved
    async fn create_job(&self, job: JobDetail) -> Result<(), EngineError>;

    /// Remove a job together with every trigger bound to it; `false` if absent
    async fn remove_job(&self, key: &NativeKey) -> Result<bool, EngineError>;

    async fn contains_job(&self, key: &NativeKey) -> Result<bool, EngineError>;

    async fn job_detail(&self, key: &NativeKey) -> Result<Option<JobDetail>, EngineError>;

    async fn job_group_names(&self) -> Result<Vec<String>, EngineError>;

    async fn job_keys(&self, group: &str) -> Result<Vec<NativeKey>, EngineError>;

    /// Schedule a trigger, replacing any trigger stored under the same key.
    /// Returns the first fire time, `None` if the trigger will never fire.
    async fn schedule_trigger(
        &self,
        spec: TriggerSpec,
    ) -> Result<Option<DateTime<Utc>>, EngineError>;

    /// `false` if no trigger is stored under `key`
    async fn unschedule_trigger(&self, key: &NativeKey) -> Result<bool, EngineError>;

    async fn contains_trigger(&self, key: &NativeKey) -> Result<bool, EngineError>;

    async fn trigger(&self, key: &NativeKey) -> Result<Option<TriggerDetail>, EngineError>;

    async fn trigger_state(&self, key: &NativeKey) -> Result<Option<TriggerState>, EngineError>;

    /// Triggers bound to `job_key`, ordered by trigger key
    async fn triggers_of_job(&self, job_key: &NativeKey)
        -> Result<Vec<TriggerDetail>, EngineError>;

    async fn pause_trigger(&self, key: &NativeKey) -> Result<(), EngineError>;

    async fn resume_trigger(&self, key: &NativeKey) -> Result<(), EngineError>;

    /// Run the job once, now, without storing a trigger
    async fn trigger_now(&self, job_key: &NativeKey) -> Result<(), EngineError>;

    /// Fire times of every `Normal` trigger inside `[start, end]`, ordered by time
    async fn fire_times_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FireTime>, EngineError>;
}
