use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use orchestrator::config::Settings;
use orchestrator::SchedulerCore;

use crate::auth::JwtService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<SchedulerCore>,
    pub jwt: JwtService,
    pub metrics_handle: PrometheusHandle,
    pub config: Arc<Settings>,
}

impl AppState {
    pub fn new(core: Arc<SchedulerCore>, metrics_handle: PrometheusHandle, config: Settings) -> Self {
        let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.jwt_expiration_hours);

        Self {
            core,
            jwt,
            metrics_handle,
            config: Arc::new(config),
        }
    }
}
