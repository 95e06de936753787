use crate::config::DbConfig;
use crate::error::{EtlError, Result};
use sqlx::{ConnectOptions, PgConnection};
use std::time::Duration;

/// Open a single connection, giving up after `timeout`.
pub async fn connect(config: &DbConfig, timeout: Duration) -> Result<PgConnection> {
    let options = config.connect_options()?;

    match tokio::time::timeout(timeout, options.connect()).await {
        Ok(result) => result.map_err(EtlError::from),
        Err(_) => Err(EtlError::Persistence(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("connection attempt timed out after {}s", timeout.as_secs_f64()),
        )))),
    }
}

/// Errors a database that is still starting up can produce. Anything else
/// (bad configuration, driver bugs) will not go away by waiting.
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Database(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}
