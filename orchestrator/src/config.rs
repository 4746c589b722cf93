// Layered configuration: defaults file, local overrides, then APP__ environment

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub identity_store: IdentityStoreConfig,
    pub engine: EngineConfig,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where opaque identifier mappings are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityStoreConfig {
    pub backend: IdentityBackend,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reported in job detail records
    pub scheduler_name: String,
    pub poll_interval_ms: u64,
    pub max_fires_per_poll: usize,
    /// IANA name used for calendar triggers that carry no zone of their own
    pub default_time_zone: String,
}

impl EngineConfig {
    pub fn time_zone(&self) -> Result<Tz, String> {
        self.default_time_zone
            .parse::<Tz>()
            .map_err(|e| format!("Unknown time zone '{}': {}", self.default_time_zone, e))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "DefaultScheduler".to_string(),
            poll_interval_ms: 1000,
            max_fires_per_poll: 100,
            default_time_zone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.identity_store.backend == IdentityBackend::Postgres {
            match &self.identity_store.database {
                Some(database) if !database.url.is_empty() => {
                    if database.max_connections == 0 {
                        return Err("Database max_connections must be greater than 0".to_string());
                    }
                }
                _ => {
                    return Err(
                        "Database URL required when identity_store backend is 'postgres'"
                            .to_string(),
                    )
                }
            }
        }

        if self.engine.scheduler_name.trim().is_empty() {
            return Err("Engine scheduler_name cannot be empty".to_string());
        }
        if self.engine.poll_interval_ms == 0 {
            return Err("Engine poll_interval_ms must be greater than 0".to_string());
        }
        if self.engine.max_fires_per_poll == 0 {
            return Err("Engine max_fires_per_poll must be greater than 0".to_string());
        }
        self.engine.time_zone()?;

        if self.auth.jwt_secret.is_empty() {
            return Err("JWT secret cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            identity_store: IdentityStoreConfig {
                backend: IdentityBackend::Memory,
                database: None,
            },
            engine: EngineConfig::default(),
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                jwt_expiration_hours: 24,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                tracing_endpoint: None,
            },
        }
    }
}
