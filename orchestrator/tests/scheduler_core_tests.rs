// Orchestrator behaviour against the in-memory engine and identity store

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use orchestrator::config::EngineConfig;
use orchestrator::engine::{InMemoryEngine, JobTypeRegistry, SchedulingEngine};
use orchestrator::errors::{EngineError, SchedulerError, ValidationError};
use orchestrator::identity::{InMemoryIdentityStore, IdentityStore};
use orchestrator::models::{
    CreateJobRequest, EntityKind, FireTime, JobDataMap, JobDetail, NativeKey, TriggerDetail,
    TriggerState, DEFAULT_GROUP,
};
use orchestrator::schedule::MAX_FIRE_TIMES_PER_TRIGGER;
use orchestrator::trigger::{TriggerSpec, REPEAT_INDEFINITELY};
use orchestrator::{PermittedGroups, SchedulerCore};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct Harness {
    core: SchedulerCore,
    engine: Arc<InMemoryEngine>,
    identities: Arc<InMemoryIdentityStore>,
}

fn harness() -> Harness {
    let registry = Arc::new(JobTypeRegistry::with_builtins());
    let engine = Arc::new(InMemoryEngine::new(&EngineConfig::default(), registry).unwrap());
    let identities = Arc::new(InMemoryIdentityStore::new());
    let core = SchedulerCore::new(engine.clone(), identities.clone());
    Harness {
        core,
        engine,
        identities,
    }
}

fn all() -> PermittedGroups {
    PermittedGroups::all()
}

fn job1() -> NativeKey {
    NativeKey::new("Job1", "Group1")
}

fn hourly_trigger(name: &str, job_key: &NativeKey) -> TriggerSpec {
    TriggerSpec::interval(name, job_key, 1, Duration::from_secs(3600))
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, hour, 0, 0).unwrap()
}

async fn create(core: &SchedulerCore, name: &str, group: &str) -> uuid::Uuid {
    core.create_job(CreateJobRequest::new(name, group, "no_op"), &all())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_created_job_resolves_in_both_directions() {
    let h = harness();
    let id = create(&h.core, "Job1", "Group1").await;

    let entry = h.identities.resolve(id).await.unwrap();
    assert_eq!(entry.key, job1());
    assert_eq!(entry.kind, EntityKind::Job);
    assert_eq!(
        h.identities
            .reverse_resolve(&job1(), EntityKind::Job)
            .await
            .unwrap(),
        id
    );

    let detail = h.core.get_job_detail(id, &all()).await.unwrap();
    assert_eq!(detail.job_name, "Job1");
    assert_eq!(detail.job_group, "Group1");
    assert_eq!(detail.job_type, "no_op");
    assert_eq!(detail.scheduler_name, h.core.scheduler_name());
}

#[tokio::test]
async fn test_duplicate_job_key_is_rejected() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;

    let result = h
        .core
        .create_job(CreateJobRequest::new("Job1", "Group1", "no_op"), &all())
        .await;

    assert!(matches!(result, Err(SchedulerError::DuplicateKey(_))));
    assert_eq!(h.identities.len().await, 1);
}

#[tokio::test]
async fn test_unknown_job_type_leaves_no_mapping() {
    let h = harness();
    let result = h
        .core
        .create_job(CreateJobRequest::new("Job1", "Group1", "ghost"), &all())
        .await;

    assert!(matches!(result, Err(SchedulerError::InvalidJobType(_))));
    assert!(h.identities.is_empty().await);
    assert!(!h.engine.contains_job(&job1()).await.unwrap());
}

#[tokio::test]
async fn test_blank_job_name_is_validation_error() {
    let h = harness();
    let result = h
        .core
        .create_job(CreateJobRequest::new(" ", "Group1", "no_op"), &all())
        .await;
    assert!(matches!(result, Err(SchedulerError::Validation(_))));
}

#[tokio::test]
async fn test_trigger_for_missing_job_leaves_no_orphan_mapping() {
    let h = harness();
    let result = h
        .core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await;

    assert!(matches!(result, Err(SchedulerError::NotFound(_))));
    assert!(h
        .identities
        .entries(EntityKind::Trigger)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_interval_trigger_without_payload_reads_back_empty() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    let trigger_id = h
        .core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await
        .unwrap();

    let triggers = h
        .core
        .get_triggers_of_job("Job1", "Group1", &all())
        .await
        .unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].id, Some(trigger_id));
    assert_eq!(triggers[0].detail.key.group, DEFAULT_GROUP);
    assert_eq!(triggers[0].detail.job_data.len(), 0);
}

#[tokio::test]
async fn test_interval_trigger_payload_reads_back_exactly() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;

    let mut payload = JobDataMap::new();
    payload.insert("Key1".to_string(), json!("Value1"));
    let trigger_id = h
        .core
        .schedule_trigger(
            hourly_trigger("Trigger1", &job1()).with_job_data(payload.clone()),
            &all(),
        )
        .await
        .unwrap();

    let view = h.core.get_trigger(trigger_id, &all()).await.unwrap();
    assert_eq!(view.detail.job_data, payload);
}

#[tokio::test]
async fn test_pause_then_resume_keeps_identifier() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    let trigger_id = h
        .core
        .schedule_trigger(
            TriggerSpec::interval("Trigger1", &job1(), REPEAT_INDEFINITELY, Duration::from_secs(60)),
            &all(),
        )
        .await
        .unwrap();

    h.core.pause_trigger(trigger_id, &all()).await.unwrap();
    assert_eq!(
        h.core.get_trigger_state(trigger_id, &all()).await.unwrap(),
        TriggerState::Paused
    );

    h.core.resume_trigger(trigger_id, &all()).await.unwrap();
    assert_eq!(
        h.core.get_trigger_state(trigger_id, &all()).await.unwrap(),
        TriggerState::Normal
    );

    let triggers = h
        .core
        .get_triggers_of_job("Job1", "Group1", &all())
        .await
        .unwrap();
    assert_eq!(triggers[0].id, Some(trigger_id));
}

#[tokio::test]
async fn test_pause_unknown_trigger_is_not_found() {
    let h = harness();
    let result = h.core.pause_trigger(uuid::Uuid::new_v4(), &all()).await;
    assert!(matches!(result, Err(SchedulerError::NotFound(_))));
}

#[tokio::test]
async fn test_job_identifier_is_not_a_trigger_identifier() {
    let h = harness();
    let job_id = create(&h.core, "Job1", "Group1").await;
    let result = h.core.pause_trigger(job_id, &all()).await;
    assert!(matches!(result, Err(SchedulerError::NotFound(_))));
}

#[tokio::test]
async fn test_remove_job_cascades_to_triggers() {
    let h = harness();
    let job_id = create(&h.core, "Job1", "Group1").await;
    h.core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await
        .unwrap();
    h.core
        .schedule_trigger(TriggerSpec::calendar("Trigger2", &job1(), "0 0 12 * * *"), &all())
        .await
        .unwrap();

    h.core.remove_job(job_id, &all()).await.unwrap();

    assert!(h
        .core
        .get_triggers_of_job("Job1", "Group1", &all())
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        h.core.get_job_detail(job_id, &all()).await,
        Err(SchedulerError::NotFound(_))
    ));
    assert!(h.identities.is_empty().await);
}

#[tokio::test]
async fn test_listing_is_filtered_by_permitted_groups() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    create(&h.core, "Job2", "Group2").await;

    let group1_only = PermittedGroups::from_groups(["Group1"]);
    let jobs = h.core.get_job_details(&group1_only).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_group, "Group1");

    let wildcard = PermittedGroups::from_groups(["*"]);
    let jobs = h.core.get_job_details(&wildcard).await.unwrap();
    let groups: Vec<&str> = jobs.iter().map(|j| j.job_group.as_str()).collect();
    assert_eq!(groups, vec!["Group1", "Group2"]);
}

#[tokio::test]
async fn test_unauthorized_single_lookup_is_distinct_from_not_found() {
    let h = harness();
    let job_id = create(&h.core, "Job2", "Group2").await;
    let group1_only = PermittedGroups::from_groups(["Group1"]);

    assert!(matches!(
        h.core.get_job_detail(job_id, &group1_only).await,
        Err(SchedulerError::Unauthorized(ref group)) if group == "Group2"
    ));
    assert!(matches!(
        h.core.remove_job(job_id, &group1_only).await,
        Err(SchedulerError::Unauthorized(_))
    ));
    assert!(matches!(
        h.core
            .get_triggers_of_job("Job2", "Group2", &group1_only)
            .await,
        Err(SchedulerError::Unauthorized(_))
    ));
    // still there
    assert!(h.core.get_job_detail(job_id, &all()).await.is_ok());
}

#[tokio::test]
async fn test_trigger_operations_authorize_on_job_group() {
    let h = harness();
    create(&h.core, "Job2", "Group2").await;
    let job2 = NativeKey::new("Job2", "Group2");
    let trigger_id = h
        .core
        .schedule_trigger(hourly_trigger("Trigger1", &job2), &all())
        .await
        .unwrap();
    let group1_only = PermittedGroups::from_groups(["Group1"]);

    assert!(matches!(
        h.core.pause_trigger(trigger_id, &group1_only).await,
        Err(SchedulerError::Unauthorized(_))
    ));
    assert!(matches!(
        h.core
            .remove_trigger("Trigger1", DEFAULT_GROUP, &group1_only)
            .await,
        Err(SchedulerError::Unauthorized(_))
    ));
    assert!(matches!(
        h.core
            .schedule_trigger(hourly_trigger("Trigger2", &job2), &group1_only)
            .await,
        Err(SchedulerError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_remove_trigger_twice() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    let trigger_id = h
        .core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await
        .unwrap();

    h.core
        .remove_trigger("Trigger1", DEFAULT_GROUP, &all())
        .await
        .unwrap();
    assert!(matches!(
        h.core.remove_trigger("Trigger1", DEFAULT_GROUP, &all()).await,
        Err(SchedulerError::NotFound(_))
    ));

    // identity removal stays idempotent
    h.identities.remove(trigger_id).await.unwrap();
    assert!(h.identities.resolve(trigger_id).await.is_err());
}

#[tokio::test]
async fn test_remove_trigger_with_blank_key_is_invalid_argument() {
    let h = harness();
    assert!(matches!(
        h.core.remove_trigger("", DEFAULT_GROUP, &all()).await,
        Err(SchedulerError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.core.remove_trigger("Trigger1", "  ", &all()).await,
        Err(SchedulerError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_rescheduling_same_key_replaces_and_keeps_identifier() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    let first = h
        .core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await
        .unwrap();
    let second = h
        .core
        .schedule_trigger(TriggerSpec::calendar("Trigger1", &job1(), "0 0 12 * * *"), &all())
        .await
        .unwrap();

    assert_eq!(first, second);
    let triggers = h
        .core
        .get_triggers_of_job("Job1", "Group1", &all())
        .await
        .unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].detail.schedule.kind(), "calendar");
}

#[tokio::test]
async fn test_invalid_trigger_is_validation_error() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;

    let bad_interval = TriggerSpec::interval("Trigger1", &job1(), 3, Duration::ZERO);
    assert!(matches!(
        h.core.schedule_trigger(bad_interval, &all()).await,
        Err(SchedulerError::Validation(_))
    ));

    let bad_cron = TriggerSpec::calendar("Trigger2", &job1(), "every day at noon");
    assert!(matches!(
        h.core.schedule_trigger(bad_cron, &all()).await,
        Err(SchedulerError::Validation(_))
    ));
    assert!(h
        .identities
        .entries(EntityKind::Trigger)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_remove_job_triggers_leaves_job() {
    let h = harness();
    let job_id = create(&h.core, "Job1", "Group1").await;
    for name in ["Trigger1", "Trigger2"] {
        h.core
            .schedule_trigger(hourly_trigger(name, &job1()), &all())
            .await
            .unwrap();
    }

    let removed = h
        .core
        .remove_job_triggers("Job1", "Group1", &all())
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert!(h.core.get_job_detail(job_id, &all()).await.is_ok());
    assert!(h
        .identities
        .entries(EntityKind::Trigger)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        h.core
            .remove_job_triggers("Missing", "Group1", &all())
            .await,
        Err(SchedulerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_triggers_of_missing_job_is_empty() {
    let h = harness();
    let triggers = h
        .core
        .get_triggers_of_job("Missing", "Group1", &all())
        .await
        .unwrap();
    assert!(triggers.is_empty());
}

#[tokio::test]
async fn test_triggers_of_job_are_ordered_by_key() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    for name in ["Zeta", "Alpha", "Mid"] {
        h.core
            .schedule_trigger(hourly_trigger(name, &job1()), &all())
            .await
            .unwrap();
    }

    let names: Vec<String> = h
        .core
        .get_triggers_of_job("Job1", "Group1", &all())
        .await
        .unwrap()
        .into_iter()
        .map(|view| view.detail.key.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
}

#[tokio::test]
async fn test_fire_times_filtered_by_group() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    create(&h.core, "Job2", "Group2").await;
    let job2 = NativeKey::new("Job2", "Group2");

    let trigger1 = h
        .core
        .schedule_trigger(
            TriggerSpec::interval("T1", &job1(), REPEAT_INDEFINITELY, Duration::from_secs(3600))
                .with_start_time(at(0)),
            &all(),
        )
        .await
        .unwrap();
    h.core
        .schedule_trigger(
            TriggerSpec::interval("T2", &job2, REPEAT_INDEFINITELY, Duration::from_secs(3600))
                .with_start_time(at(0)),
            &all(),
        )
        .await
        .unwrap();

    let group1_only = PermittedGroups::from_groups(["Group1"]);
    let fire_times = h
        .core
        .get_fire_times_between(at(1), at(3), &group1_only)
        .await
        .unwrap();

    assert_eq!(fire_times.len(), 3);
    assert!(fire_times.iter().all(|f| f.job_group == "Group1"));
    assert!(fire_times.iter().all(|f| f.trigger_id == Some(trigger1)));
    assert_eq!(fire_times[0].fire_time, at(1));
    assert_eq!(fire_times[2].fire_time, at(3));

    let everything = h
        .core
        .get_fire_times_between(at(1), at(3), &all())
        .await
        .unwrap();
    assert_eq!(everything.len(), 6);
}

#[tokio::test]
async fn test_fire_times_reject_inverted_window() {
    let h = harness();
    assert!(matches!(
        h.core.get_fire_times_between(at(3), at(1), &all()).await,
        Err(SchedulerError::Validation(_))
    ));
}

#[tokio::test]
async fn test_fire_times_window_too_large_is_validation_error() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    h.core
        .schedule_trigger(
            TriggerSpec::interval("EverySecond", &job1(), REPEAT_INDEFINITELY, Duration::from_secs(1))
                .with_start_time(at(0)),
            &all(),
        )
        .await
        .unwrap();

    let result = h.core.get_fire_times_between(at(0), at(4), &all()).await;
    assert!(matches!(
        result,
        Err(SchedulerError::Validation(ValidationError::TooManyFireTimes { limit }))
            if limit == MAX_FIRE_TIMES_PER_TRIGGER
    ));

    // a window under the limit still answers
    let minute = h
        .core
        .get_fire_times_between(at(0), at(0) + chrono::Duration::seconds(59), &all())
        .await
        .unwrap();
    assert_eq!(minute.len(), 60);
}

#[tokio::test]
async fn test_execute_job() {
    let h = harness();
    let job_id = create(&h.core, "Job1", "Group1").await;

    h.core.execute_job(job_id, &all()).await.unwrap();

    assert!(h
        .core
        .get_triggers_of_job("Job1", "Group1", &all())
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        h.core.execute_job(uuid::Uuid::new_v4(), &all()).await,
        Err(SchedulerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dangling_job_mapping_is_cleaned_on_access() {
    let h = harness();
    let job_id = create(&h.core, "Job1", "Group1").await;

    // removed around the orchestrator
    h.engine.remove_job(&job1()).await.unwrap();

    assert!(matches!(
        h.core.get_job_detail(job_id, &all()).await,
        Err(SchedulerError::NotFound(_))
    ));
    assert!(h.identities.is_empty().await);

    // the key is free again
    assert!(h
        .core
        .create_job(CreateJobRequest::new("Job1", "Group1", "no_op"), &all())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_reconcile_removes_dangling_mappings() {
    let h = harness();
    create(&h.core, "Job1", "Group1").await;
    create(&h.core, "Job2", "Group1").await;
    h.core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await
        .unwrap();

    h.engine.remove_job(&job1()).await.unwrap();

    assert_eq!(h.core.reconcile().await.unwrap(), 2);
    assert_eq!(h.identities.len().await, 1);
    assert_eq!(h.core.reconcile().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_creates_of_same_key_admit_one() {
    let h = harness();
    let core = Arc::new(h.core);

    let attempts = (0..8).map(|_| {
        let core = core.clone();
        tokio::spawn(async move {
            core.create_job(CreateJobRequest::new("Job1", "Group1", "no_op"), &all())
                .await
        })
    });

    let mut created = 0;
    for outcome in futures::future::join_all(attempts).await {
        match outcome.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert!(matches!(e, SchedulerError::DuplicateKey(_))),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(h.identities.len().await, 1);
}

/// Delegates to the in-memory engine, parking the first key lookup after `arm` until
/// `release`, so a test can act while an orchestrator call is mid-flight
struct GatedEngine {
    inner: Arc<InMemoryEngine>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedEngine {
    fn new(inner: Arc<InMemoryEngine>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn gate(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl SchedulingEngine for GatedEngine {
    fn scheduler_name(&self) -> String {
        self.inner.scheduler_name()
    }

    async fn create_job(&self, job: JobDetail) -> Result<(), EngineError> {
        self.inner.create_job(job).await
    }

    async fn remove_job(&self, key: &NativeKey) -> Result<bool, EngineError> {
        self.inner.remove_job(key).await
    }

    async fn contains_job(&self, key: &NativeKey) -> Result<bool, EngineError> {
        self.gate().await;
        self.inner.contains_job(key).await
    }

    async fn job_detail(&self, key: &NativeKey) -> Result<Option<JobDetail>, EngineError> {
        self.inner.job_detail(key).await
    }

    async fn job_group_names(&self) -> Result<Vec<String>, EngineError> {
        self.inner.job_group_names().await
    }

    async fn job_keys(&self, group: &str) -> Result<Vec<NativeKey>, EngineError> {
        self.inner.job_keys(group).await
    }

    async fn schedule_trigger(
        &self,
        spec: TriggerSpec,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        self.inner.schedule_trigger(spec).await
    }

    async fn unschedule_trigger(&self, key: &NativeKey) -> Result<bool, EngineError> {
        self.inner.unschedule_trigger(key).await
    }

    async fn contains_trigger(&self, key: &NativeKey) -> Result<bool, EngineError> {
        self.gate().await;
        self.inner.contains_trigger(key).await
    }

    async fn trigger(&self, key: &NativeKey) -> Result<Option<TriggerDetail>, EngineError> {
        self.gate().await;
        self.inner.trigger(key).await
    }

    async fn trigger_state(&self, key: &NativeKey) -> Result<Option<TriggerState>, EngineError> {
        self.inner.trigger_state(key).await
    }

    async fn triggers_of_job(
        &self,
        job_key: &NativeKey,
    ) -> Result<Vec<TriggerDetail>, EngineError> {
        self.gate().await;
        self.inner.triggers_of_job(job_key).await
    }

    async fn pause_trigger(&self, key: &NativeKey) -> Result<(), EngineError> {
        self.inner.pause_trigger(key).await
    }

    async fn resume_trigger(&self, key: &NativeKey) -> Result<(), EngineError> {
        self.inner.resume_trigger(key).await
    }

    async fn trigger_now(&self, job_key: &NativeKey) -> Result<(), EngineError> {
        self.inner.trigger_now(job_key).await
    }

    async fn fire_times_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FireTime>, EngineError> {
        self.inner.fire_times_between(start, end).await
    }
}

struct GatedHarness {
    core: Arc<SchedulerCore>,
    engine: Arc<GatedEngine>,
    identities: Arc<InMemoryIdentityStore>,
}

fn gated_harness() -> GatedHarness {
    let registry = Arc::new(JobTypeRegistry::with_builtins());
    let inner = Arc::new(InMemoryEngine::new(&EngineConfig::default(), registry).unwrap());
    let engine = Arc::new(GatedEngine::new(inner));
    let identities = Arc::new(InMemoryIdentityStore::new());
    let core = Arc::new(SchedulerCore::new(engine.clone(), identities.clone()));
    GatedHarness {
        core,
        engine,
        identities,
    }
}

async fn within_a_second<F: std::future::Future>(operation: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), operation)
        .await
        .expect("operation blocked behind an in-flight removal")
}

#[tokio::test]
async fn test_reads_proceed_while_remove_trigger_looks_up_its_trigger() {
    let h = gated_harness();
    let job_id = create(&h.core, "Job1", "Group1").await;
    h.core
        .schedule_trigger(hourly_trigger("Trigger1", &job1()), &all())
        .await
        .unwrap();

    h.engine.arm();
    let removal = {
        let core = h.core.clone();
        tokio::spawn(async move {
            core.remove_trigger("Trigger1", DEFAULT_GROUP, &all())
                .await
        })
    };
    h.engine.entered.notified().await;

    let detail = within_a_second(h.core.get_job_detail(job_id, &all()))
        .await
        .unwrap();
    assert_eq!(detail.job_name, "Job1");

    h.engine.release.notify_one();
    removal.await.unwrap().unwrap();
    assert_eq!(h.identities.len().await, 1);
}

#[tokio::test]
async fn test_reads_proceed_while_remove_job_triggers_is_in_flight() {
    let h = gated_harness();
    let job_id = create(&h.core, "Job1", "Group1").await;
    for name in ["Trigger1", "Trigger2"] {
        h.core
            .schedule_trigger(hourly_trigger(name, &job1()), &all())
            .await
            .unwrap();
    }

    h.engine.arm();
    let removal = {
        let core = h.core.clone();
        tokio::spawn(async move { core.remove_job_triggers("Job1", "Group1", &all()).await })
    };
    h.engine.entered.notified().await;

    within_a_second(h.core.get_job_detail(job_id, &all()))
        .await
        .unwrap();

    h.engine.release.notify_one();
    assert_eq!(removal.await.unwrap().unwrap(), 2);
    assert_eq!(h.identities.len().await, 1);
}

#[tokio::test]
async fn test_writes_proceed_while_reconcile_checks_existence() {
    let h = gated_harness();
    let dangling = h
        .identities
        .put(EntityKind::Trigger, &NativeKey::in_default_group("Gone"))
        .await
        .unwrap();

    h.engine.arm();
    let sweep = {
        let core = h.core.clone();
        tokio::spawn(async move { core.reconcile().await })
    };
    h.engine.entered.notified().await;

    let job_id = within_a_second(
        h.core
            .create_job(CreateJobRequest::new("Job1", "Group1", "no_op"), &all()),
    )
    .await
    .unwrap();

    h.engine.release.notify_one();
    assert_eq!(sweep.await.unwrap().unwrap(), 1);
    assert!(h.identities.resolve(dangling).await.is_err());
    // the job created mid-sweep is backed by a native job and survives
    assert!(h.identities.resolve(job_id).await.is_ok());
}
