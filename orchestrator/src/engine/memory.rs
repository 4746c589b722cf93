// In-process scheduling engine with a RAM job store and a polling fire loop

use super::job_type::{JobExecutionContext, JobType, JobTypeRegistry};
use super::SchedulingEngine;
use crate::config::EngineConfig;
use crate::errors::{EngineError, ValidationError};
use crate::models::{FireTime, JobDataMap, JobDetail, NativeKey, TriggerDetail, TriggerState};
use crate::schedule::FireTimeCalculator;
use crate::telemetry;
use crate::trigger::TriggerSpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn, Instrument};

#[derive(Default)]
struct JobStore {
    jobs: BTreeMap<NativeKey, JobDetail>,
    triggers: BTreeMap<NativeKey, TriggerDetail>,
}

impl JobStore {
    fn active_trigger_count(&self) -> usize {
        self.triggers
            .values()
            .filter(|t| t.state == TriggerState::Normal)
            .count()
    }
}

/// One due fire, taken out of the store so the job runs without holding the lock
struct PendingExecution {
    job_type: Arc<dyn JobType>,
    context: JobExecutionContext,
}

/// Scheduling engine keeping jobs and triggers in memory
///
/// Misfires are coalesced: a trigger found overdue fires once and its next fire time
/// is computed from the poll instant.
pub struct InMemoryEngine {
    scheduler_name: String,
    default_time_zone: Tz,
    poll_interval: Duration,
    max_fires_per_poll: usize,
    registry: Arc<JobTypeRegistry>,
    store: RwLock<JobStore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl InMemoryEngine {
    pub fn new(config: &EngineConfig, registry: Arc<JobTypeRegistry>) -> Result<Self, EngineError> {
        let default_time_zone = config
            .time_zone()
            .map_err(|reason| ValidationError::invalid("default_time_zone", reason))?;
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            scheduler_name: config.scheduler_name.clone(),
            default_time_zone,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_fires_per_poll: config.max_fires_per_poll,
            registry,
            store: RwLock::new(JobStore::default()),
            shutdown_tx,
        })
    }

    pub fn registry(&self) -> &Arc<JobTypeRegistry> {
        &self.registry
    }

    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Run the fire loop until [`stop`](Self::stop) is called
    #[instrument(skip(self), fields(scheduler_name = %self.scheduler_name))]
    pub async fn start(&self) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Starting scheduling engine"
        );

        let mut poll_interval = interval(self.poll_interval);
        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    let fired = self.process_due_triggers(Utc::now()).await;
                    if fired > 0 {
                        debug!(fired, "Dispatched due triggers");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping fire loop");
                    break;
                }
            }
        }

        info!("Scheduling engine stopped");
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Fire every `Normal` trigger due at `now`, up to `max_fires_per_poll`.
    /// Returns the number of job executions dispatched.
    #[instrument(skip(self))]
    pub async fn process_due_triggers(&self, now: DateTime<Utc>) -> usize {
        let pending = {
            let mut store = self.store.write().await;
            let pending = self.collect_due(&mut store, now);
            telemetry::set_active_triggers(store.active_trigger_count());
            pending
        };

        let fired = pending.len();
        for execution in pending {
            self.dispatch(execution);
        }
        fired
    }

    fn collect_due(&self, store: &mut JobStore, now: DateTime<Utc>) -> Vec<PendingExecution> {
        let mut due: Vec<(DateTime<Utc>, NativeKey)> = store
            .triggers
            .values()
            .filter(|t| t.state == TriggerState::Normal)
            .filter_map(|t| match t.next_fire_time {
                Some(next) if next <= now => Some((next, t.key.clone())),
                _ => None,
            })
            .collect();
        due.sort();
        due.truncate(self.max_fires_per_poll);

        let mut pending = Vec::with_capacity(due.len());
        for (fire_time, trigger_key) in due {
            let Some(trigger) = store.triggers.get(&trigger_key).cloned() else {
                continue;
            };

            let job_type = store
                .jobs
                .get(&trigger.job_key)
                .and_then(|job| self.registry.resolve(&job.job_type).map(|t| (job, t)));

            let Some((job, job_type)) = job_type else {
                warn!(
                    trigger_name = %trigger_key.name,
                    trigger_group = %trigger_key.group,
                    "Job type of trigger could not be resolved, marking trigger as errored"
                );
                telemetry::record_job_execution_failed(&trigger.job_key.group);
                if let Some(stored) = store.triggers.get_mut(&trigger_key) {
                    stored.state = TriggerState::Error;
                    stored.next_fire_time = None;
                }
                continue;
            };

            let job_data = merge_job_data(&job.job_data, &trigger.job_data);

            pending.push(PendingExecution {
                job_type,
                context: JobExecutionContext {
                    job_key: trigger.job_key.clone(),
                    trigger_key: Some(trigger_key.clone()),
                    scheduler_name: self.scheduler_name.clone(),
                    fire_time,
                    job_data,
                },
            });

            let next = trigger.schedule.fire_time_after(
                trigger.start_time,
                now.max(fire_time),
                trigger.end_time,
                self.default_time_zone,
            );

            if let Some(stored) = store.triggers.get_mut(&trigger_key) {
                stored.previous_fire_time = Some(fire_time);
                stored.times_triggered += 1;
                match next {
                    Ok(Some(next)) => stored.next_fire_time = Some(next),
                    Ok(None) => {
                        stored.next_fire_time = None;
                        stored.state = TriggerState::Complete;
                        debug!(trigger_name = %trigger_key.name, "Trigger complete");
                    }
                    Err(e) => {
                        error!(trigger_name = %trigger_key.name, error = %e, "Failed to compute next fire time");
                        stored.next_fire_time = None;
                        stored.state = TriggerState::Error;
                    }
                }
            }
        }

        pending
    }

    fn dispatch(&self, execution: PendingExecution) {
        let PendingExecution { job_type, context } = execution;
        let job_group = context.job_key.group.clone();
        telemetry::record_trigger_fire(&job_group);

        let span = tracing::info_span!(
            "job_execution",
            job_name = %context.job_key.name,
            job_group = %job_group,
        );
        tokio::spawn(
            async move {
                if let Err(e) = job_type.execute(context).await {
                    error!(error = %e, "Job execution failed");
                    telemetry::record_job_execution_failed(&job_group);
                }
            }
            .instrument(span),
        );
    }

    fn build_trigger(&self, spec: TriggerSpec) -> Result<TriggerDetail, EngineError> {
        let start_time = spec.start_time.unwrap_or_else(Utc::now);
        let next_fire_time = spec.schedule.fire_time_at_or_after(
            start_time,
            start_time,
            spec.end_time,
            self.default_time_zone,
        )?;
        let key = spec.key();
        let job_key = spec.job_key();

        Ok(TriggerDetail {
            key,
            job_key,
            description: spec.description,
            schedule: spec.schedule,
            job_data: spec.job_data,
            state: if next_fire_time.is_some() {
                TriggerState::Normal
            } else {
                TriggerState::Complete
            },
            start_time,
            end_time: spec.end_time,
            next_fire_time,
            previous_fire_time: None,
            times_triggered: 0,
        })
    }
}

#[async_trait]
impl SchedulingEngine for InMemoryEngine {
    fn scheduler_name(&self) -> String {
        self.scheduler_name.clone()
    }

    #[instrument(skip(self, job), fields(job = %job.key))]
    async fn create_job(&self, job: JobDetail) -> Result<(), EngineError> {
        if !self.registry.contains(&job.job_type) {
            return Err(EngineError::UnknownJobType(job.job_type));
        }

        let mut store = self.store.write().await;
        if store.jobs.contains_key(&job.key) {
            return Err(EngineError::AlreadyExists(job.key));
        }
        store.jobs.insert(job.key.clone(), job);
        Ok(())
    }

    #[instrument(skip(self, key), fields(job = %key))]
    async fn remove_job(&self, key: &NativeKey) -> Result<bool, EngineError> {
        let mut store = self.store.write().await;
        if store.jobs.remove(key).is_none() {
            return Ok(false);
        }
        store.triggers.retain(|_, trigger| &trigger.job_key != key);
        telemetry::set_active_triggers(store.active_trigger_count());
        Ok(true)
    }

    async fn contains_job(&self, key: &NativeKey) -> Result<bool, EngineError> {
        Ok(self.store.read().await.jobs.contains_key(key))
    }

    async fn job_detail(&self, key: &NativeKey) -> Result<Option<JobDetail>, EngineError> {
        Ok(self.store.read().await.jobs.get(key).cloned())
    }

    async fn job_group_names(&self) -> Result<Vec<String>, EngineError> {
        let store = self.store.read().await;
        let groups: BTreeSet<String> = store.jobs.keys().map(|k| k.group.clone()).collect();
        Ok(groups.into_iter().collect())
    }

    async fn job_keys(&self, group: &str) -> Result<Vec<NativeKey>, EngineError> {
        Ok(self
            .store
            .read()
            .await
            .jobs
            .keys()
            .filter(|k| k.group == group)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, spec), fields(trigger = %spec.key(), job = %spec.job_key()))]
    async fn schedule_trigger(
        &self,
        spec: TriggerSpec,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        spec.validate()?;

        let mut store = self.store.write().await;
        let job_key = spec.job_key();
        if !store.jobs.contains_key(&job_key) {
            return Err(EngineError::JobNotFound(job_key));
        }

        let trigger = self.build_trigger(spec)?;
        let next_fire_time = trigger.next_fire_time;
        if store.triggers.insert(trigger.key.clone(), trigger).is_some() {
            debug!("Replaced existing trigger definition");
        }
        telemetry::set_active_triggers(store.active_trigger_count());

        Ok(next_fire_time)
    }

    #[instrument(skip(self, key), fields(trigger = %key))]
    async fn unschedule_trigger(&self, key: &NativeKey) -> Result<bool, EngineError> {
        let mut store = self.store.write().await;
        let removed = store.triggers.remove(key).is_some();
        telemetry::set_active_triggers(store.active_trigger_count());
        Ok(removed)
    }

    async fn contains_trigger(&self, key: &NativeKey) -> Result<bool, EngineError> {
        Ok(self.store.read().await.triggers.contains_key(key))
    }

    async fn trigger(&self, key: &NativeKey) -> Result<Option<TriggerDetail>, EngineError> {
        Ok(self.store.read().await.triggers.get(key).cloned())
    }

    async fn trigger_state(&self, key: &NativeKey) -> Result<Option<TriggerState>, EngineError> {
        Ok(self.store.read().await.triggers.get(key).map(|t| t.state))
    }

    async fn triggers_of_job(
        &self,
        job_key: &NativeKey,
    ) -> Result<Vec<TriggerDetail>, EngineError> {
        Ok(self
            .store
            .read()
            .await
            .triggers
            .values()
            .filter(|t| &t.job_key == job_key)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, key), fields(trigger = %key))]
    async fn pause_trigger(&self, key: &NativeKey) -> Result<(), EngineError> {
        let mut store = self.store.write().await;
        let trigger = store
            .triggers
            .get_mut(key)
            .ok_or_else(|| EngineError::TriggerNotFound(key.clone()))?;
        if trigger.state == TriggerState::Normal {
            trigger.state = TriggerState::Paused;
        }
        telemetry::set_active_triggers(store.active_trigger_count());
        Ok(())
    }

    #[instrument(skip(self, key), fields(trigger = %key))]
    async fn resume_trigger(&self, key: &NativeKey) -> Result<(), EngineError> {
        let now = Utc::now();
        let mut store = self.store.write().await;
        let trigger = store
            .triggers
            .get_mut(key)
            .ok_or_else(|| EngineError::TriggerNotFound(key.clone()))?;

        if trigger.state == TriggerState::Paused {
            // fires missed while paused are skipped
            if matches!(trigger.next_fire_time, Some(next) if next < now) {
                trigger.next_fire_time = trigger.schedule.fire_time_at_or_after(
                    trigger.start_time,
                    now,
                    trigger.end_time,
                    self.default_time_zone,
                )?;
            }
            trigger.state = if trigger.next_fire_time.is_some() {
                TriggerState::Normal
            } else {
                TriggerState::Complete
            };
        }
        telemetry::set_active_triggers(store.active_trigger_count());
        Ok(())
    }

    #[instrument(skip(self, job_key), fields(job = %job_key))]
    async fn trigger_now(&self, job_key: &NativeKey) -> Result<(), EngineError> {
        let (job_type, job_data) = {
            let store = self.store.read().await;
            let job = store
                .jobs
                .get(job_key)
                .ok_or_else(|| EngineError::JobNotFound(job_key.clone()))?;
            let job_type = self
                .registry
                .resolve(&job.job_type)
                .ok_or_else(|| EngineError::UnknownJobType(job.job_type.clone()))?;
            (job_type, job.job_data.clone())
        };

        self.dispatch(PendingExecution {
            job_type,
            context: JobExecutionContext {
                job_key: job_key.clone(),
                trigger_key: None,
                scheduler_name: self.scheduler_name.clone(),
                fire_time: Utc::now(),
                job_data,
            },
        });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fire_times_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FireTime>, EngineError> {
        if start > end {
            return Err(ValidationError::InvalidTimeWindow { start, end }.into());
        }

        let store = self.store.read().await;
        let mut fire_times = Vec::new();
        for trigger in store
            .triggers
            .values()
            .filter(|t| t.state == TriggerState::Normal)
        {
            let times = trigger.schedule.fire_times_between(
                trigger.start_time,
                start,
                end,
                trigger.end_time,
                self.default_time_zone,
            )?;
            fire_times.extend(times.into_iter().map(|fire_time| FireTime {
                trigger_key: trigger.key.clone(),
                job_key: trigger.job_key.clone(),
                fire_time,
            }));
        }

        fire_times.sort_by(|a, b| {
            a.fire_time
                .cmp(&b.fire_time)
                .then_with(|| a.trigger_key.cmp(&b.trigger_key))
        });
        Ok(fire_times)
    }
}

/// Payload a job sees at fire time: job data overlaid by trigger data
pub fn merge_job_data(job_data: &JobDataMap, trigger_data: &JobDataMap) -> JobDataMap {
    let mut merged = job_data.clone();
    merged.extend(trigger_data.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
