// Startup helpers shared by binaries embedding the orchestrator

use crate::config::{IdentityBackend, Settings};
use crate::db::DbPool;
use crate::engine::{InMemoryEngine, JobTypeRegistry};
use crate::identity::{IdentityStore, InMemoryIdentityStore, PostgresIdentityStore};
use crate::orchestrator::SchedulerCore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Identity store chosen by configuration, plus the pool backing it if any
pub struct IdentityStoreHandle {
    pub store: Arc<dyn IdentityStore>,
    pub pool: Option<DbPool>,
}

/// Open the configured identity store, running migrations for the Postgres backend
///
/// # Errors
/// Returns error if the database is unreachable or migrations fail
#[tracing::instrument(skip(settings), fields(backend = ?settings.identity_store.backend))]
pub async fn init_identity_store(settings: &Settings) -> Result<IdentityStoreHandle> {
    match settings.identity_store.backend {
        IdentityBackend::Memory => {
            info!("Using in-memory identity store; mappings are lost on restart");
            Ok(IdentityStoreHandle {
                store: Arc::new(InMemoryIdentityStore::new()),
                pool: None,
            })
        }
        IdentityBackend::Postgres => {
            let database = settings
                .identity_store
                .database
                .as_ref()
                .context("identity_store.database is required for the postgres backend")?;

            let pool = DbPool::new(database)
                .await
                .context("Failed to connect to identity database")?;
            pool.health_check()
                .await
                .context("Identity database failed its health check")?;
            let store = PostgresIdentityStore::new(pool.clone());
            store
                .migrate()
                .await
                .context("Failed to run identity store migrations")?;

            info!("PostgreSQL identity store initialized");
            Ok(IdentityStoreHandle {
                store: Arc::new(store),
                pool: Some(pool),
            })
        }
    }
}

/// Build the in-process engine with the built-in job types registered
pub fn init_engine(settings: &Settings) -> Result<Arc<InMemoryEngine>> {
    let registry = Arc::new(JobTypeRegistry::with_builtins());
    let engine = InMemoryEngine::new(&settings.engine, registry)
        .context("Failed to initialize scheduling engine")?;

    info!(
        scheduler_name = %settings.engine.scheduler_name,
        "Scheduling engine initialized"
    );
    Ok(Arc::new(engine))
}

/// Wire the orchestrator and drop mappings left dangling by a previous run
pub async fn init_scheduler_core(
    engine: Arc<InMemoryEngine>,
    identities: Arc<dyn IdentityStore>,
) -> Result<Arc<SchedulerCore>> {
    let core = SchedulerCore::new(engine, identities);
    let removed = core
        .reconcile()
        .await
        .context("Failed to reconcile identity mappings")?;

    info!(removed, "Identity mappings reconciled");
    Ok(Arc::new(core))
}
