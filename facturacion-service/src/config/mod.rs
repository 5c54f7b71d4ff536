use serde::Deserialize;
use service_core::config::{self as core_config, get_env, parse_env};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct FacturacionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub bulk: BulkConfig,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Unset outside production selects the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfig {
    pub max_file_bytes: usize,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// When false every principal is trusted (BFF trust model).
    pub enforce_permissions: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            max_rows: 5_000,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl FacturacionConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        let database_url = if is_prod {
            Some(get_env("DATABASE_URL", None, is_prod)?)
        } else {
            env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
        };

        let database_defaults = DatabaseConfig::default();
        let bulk_defaults = BulkConfig::default();

        Ok(FacturacionConfig {
            common,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env(
                    "DATABASE_MAX_CONNECTIONS",
                    database_defaults.max_connections,
                ),
                min_connections: parse_env(
                    "DATABASE_MIN_CONNECTIONS",
                    database_defaults.min_connections,
                ),
            },
            bulk: BulkConfig {
                max_file_bytes: parse_env("BULK_MAX_FILE_BYTES", bulk_defaults.max_file_bytes),
                max_rows: parse_env("BULK_MAX_ROWS", bulk_defaults.max_rows),
            },
            auth: AuthConfig {
                enforce_permissions: parse_env("ENFORCE_PERMISSIONS", true),
            },
            observability: ObservabilityConfig {
                log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
                otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
            },
        })
    }

    /// In-memory configuration for tests and local tooling.
    pub fn for_tests() -> Self {
        Self {
            common: core_config::Config {
                port: 0,
                environment: "test".to_string(),
            },
            database: DatabaseConfig::default(),
            bulk: BulkConfig::default(),
            auth: AuthConfig {
                enforce_permissions: true,
            },
            observability: ObservabilityConfig::default(),
        }
    }
}
