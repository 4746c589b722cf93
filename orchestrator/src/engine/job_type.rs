// Executable job types resolved by name when a trigger fires

use crate::models::{JobDataMap, NativeKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Everything a job sees when it runs
#[derive(Debug, Clone, PartialEq)]
pub struct JobExecutionContext {
    pub job_key: NativeKey,
    /// `None` for one-off runs requested through `trigger_now`
    pub trigger_key: Option<NativeKey>,
    pub scheduler_name: String,
    pub fire_time: DateTime<Utc>,
    /// Job data overlaid with the firing trigger's data
    pub job_data: JobDataMap,
}

#[async_trait]
pub trait JobType: Send + Sync {
    async fn execute(&self, context: JobExecutionContext) -> anyhow::Result<()>;
}

/// Does nothing; useful for triggers whose only purpose is bookkeeping
pub struct NoOpJob;

#[async_trait]
impl JobType for NoOpJob {
    async fn execute(&self, _context: JobExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs every fire together with its payload
pub struct LogJob;

#[async_trait]
impl JobType for LogJob {
    async fn execute(&self, context: JobExecutionContext) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&context.job_data)?;
        info!(
            job_name = %context.job_key.name,
            job_group = %context.job_key.group,
            trigger = ?context.trigger_key.as_ref().map(ToString::to_string),
            fire_time = %context.fire_time,
            payload = %payload,
            "Job fired"
        );
        Ok(())
    }
}

/// Name to job type lookup shared by the engine
#[derive(Default)]
pub struct JobTypeRegistry {
    types: RwLock<HashMap<String, Arc<dyn JobType>>>,
}

impl JobTypeRegistry {
    pub const NO_OP: &'static str = "no_op";
    pub const LOG: &'static str = "log";

    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `no_op` and `log`
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Self::NO_OP, Arc::new(NoOpJob));
        registry.register(Self::LOG, Arc::new(LogJob));
        registry
    }

    /// Register (or replace) a job type
    pub fn register(&self, name: impl Into<String>, job_type: Arc<dyn JobType>) {
        self.types
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), job_type);
    }

    /// Jobs already stored under `name` fail to resolve at their next fire
    pub fn deregister(&self, name: &str) -> bool {
        self.types
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
            .is_some()
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn JobType>> {
        self.types
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .types
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
