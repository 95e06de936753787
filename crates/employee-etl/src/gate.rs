//! Connectivity gate
//!
//! In containerized deployments the database is often still starting when the
//! loader launches. The gate polls it at a fixed interval for a bounded number
//! of attempts before the pipeline is allowed to run.

use crate::config::DbConfig;
use crate::db;
use crate::error::EtlError;
use async_trait::async_trait;
use sqlx::Connection;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a readiness probe failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Not reachable yet; worth retrying
    Unavailable(String),
    /// Cannot succeed no matter how long we wait
    Fatal(String),
}

/// One readiness check against a dependency
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn probe(&self) -> Result<(), ProbeError>;
}

/// Opens a PostgreSQL connection and closes it right away
pub struct PostgresProbe {
    config: DbConfig,
    connect_timeout: Duration,
}

impl PostgresProbe {
    pub fn new(config: DbConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }
}

#[async_trait]
impl ReadinessProbe for PostgresProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        match db::connect(&self.config, self.connect_timeout).await {
            Ok(conn) => {
                if let Err(e) = conn.close().await {
                    debug!("Error closing probe connection: {}", e);
                }
                Ok(())
            },
            Err(EtlError::Persistence(e)) if db::is_connection_error(&e) => {
                Err(ProbeError::Unavailable(e.to_string()))
            },
            Err(e) => Err(ProbeError::Fatal(e.to_string())),
        }
    }
}

/// Poll `probe` until it succeeds, at most `max_attempts` times.
///
/// Attempts are `retry_interval` apart; there is no wait after the last one.
/// Returns `false` when the attempts run out or a probe fails fatally.
pub async fn wait_for_ready<P>(probe: &P, max_attempts: u32, retry_interval: Duration) -> bool
where
    P: ReadinessProbe + ?Sized,
{
    for attempt in 1..=max_attempts {
        match probe.probe().await {
            Ok(()) => {
                info!("Database is available");
                return true;
            },
            Err(ProbeError::Unavailable(reason)) => {
                info!("Waiting for database ({}/{})", attempt, max_attempts);
                debug!("Connection attempt {} failed: {}", attempt, reason);
                if attempt < max_attempts {
                    tokio::time::sleep(retry_interval).await;
                }
            },
            Err(ProbeError::Fatal(reason)) => {
                warn!("Database connection cannot succeed: {}", reason);
                return false;
            },
        }
    }

    false
}

/// [`wait_for_ready`] against the configured PostgreSQL server.
pub async fn wait_for_database(
    config: &DbConfig,
    max_attempts: u32,
    retry_interval: Duration,
    connect_timeout: Duration,
) -> bool {
    info!("Checking database availability at {}", config.display_target());
    let probe = PostgresProbe::new(config.clone(), connect_timeout);
    wait_for_ready(&probe, max_attempts, retry_interval).await
}
