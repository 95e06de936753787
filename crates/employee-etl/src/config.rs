//! Configuration management
//!
//! Database parameters come from the `POSTGRES_*` environment variables (after
//! `.env` is loaded). Pipeline knobs are supplied by the CLI. Both end up in one
//! [`EtlConfig`] value that is built once in `main` and passed down.

use crate::allocator::AllocationStrategy;
use crate::error::{EtlError, Result};
use crate::transform::CoercionPolicy;
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Input file read when no path is given.
pub const DEFAULT_INPUT_PATH: &str = "data.csv";

/// Connection attempts made by the startup gate.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Pause between gate attempts, in milliseconds.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 2_000;

/// Upper bound for a single connection attempt, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL connection parameters.
///
/// Every field is optional. A missing value is not replaced by a program
/// default; the driver falls back to its own (`PG*` variables, localhost:5432)
/// exactly as a libpq client would.
#[derive(Clone, Default)]
pub struct DbConfig {
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    /// Kept as text so a malformed value surfaces when connecting
    pub port: Option<String>,
}

impl DbConfig {
    /// Read `POSTGRES_DB`, `POSTGRES_USER`, `POSTGRES_PASSWORD`,
    /// `POSTGRES_HOST` and `POSTGRES_PORT`.
    pub fn from_env() -> Self {
        Self {
            dbname: std::env::var("POSTGRES_DB").ok(),
            user: std::env::var("POSTGRES_USER").ok(),
            password: std::env::var("POSTGRES_PASSWORD").ok(),
            host: std::env::var("POSTGRES_HOST").ok(),
            port: std::env::var("POSTGRES_PORT").ok(),
        }
    }

    /// Build driver options from the present fields.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::new();

        if let Some(ref host) = self.host {
            options = options.host(host);
        }
        if let Some(ref port) = self.port {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| EtlError::config(format!("POSTGRES_PORT '{}' is not a valid port", port)))?;
            options = options.port(port);
        }
        if let Some(ref user) = self.user {
            options = options.username(user);
        }
        if let Some(ref password) = self.password {
            options = options.password(password);
        }
        if let Some(ref dbname) = self.dbname {
            options = options.database(dbname);
        }

        Ok(options)
    }

    /// `user@host:port/dbname` with unset parts shown as `-`, for log lines.
    pub fn display_target(&self) -> String {
        let part = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        format!(
            "{}@{}:{}/{}",
            part(&self.user),
            part(&self.host),
            part(&self.port),
            part(&self.dbname)
        )
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tab-separated source file
    pub input_path: PathBuf,

    /// Total connection attempts made by the startup gate
    pub max_attempts: u32,

    /// Fixed pause between gate attempts
    pub retry_interval: Duration,

    /// Bound on each connection attempt
    pub connect_timeout: Duration,

    pub coercion_policy: CoercionPolicy,

    pub allocation: AllocationStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            coercion_policy: CoercionPolicy::default(),
            allocation: AllocationStrategy::default(),
        }
    }
}

/// Everything the ETL needs to run
#[derive(Debug, Clone, Default)]
pub struct EtlConfig {
    pub database: DbConfig,
    pub pipeline: PipelineConfig,
}

impl EtlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_attempts == 0 {
            return Err(EtlError::config("max_attempts must be greater than 0"));
        }

        if self.pipeline.connect_timeout.is_zero() {
            return Err(EtlError::config("connect_timeout must be greater than 0"));
        }

        if self.pipeline.input_path.as_os_str().is_empty() {
            return Err(EtlError::config("input path cannot be empty"));
        }

        Ok(())
    }
}
