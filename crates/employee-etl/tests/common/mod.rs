//! Shared helpers for the integration tests
//!
//! Each test starts its own PostgreSQL container, so tests never see each
//! other's rows. Docker must be running; the tests that need it are marked
//! `#[ignore = "requires Docker"]`.
//!
//! ```bash
//! cargo test -p employee-etl -- --ignored
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use employee_etl::config::DbConfig;
use sqlx::{ConnectOptions, Connection, PgConnection};
use std::io::Write;
use std::path::{Path, PathBuf};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// Image tag used for the test database
pub const POSTGRES_TAG: &str = "16-alpine";

/// Header line of a well-formed input file
pub const HEADER: &str = "nombre\tapellido\tfecha_contratacion\tsalario\tid_departamento";

/// PostgreSQL container plus the parameters to reach it
pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    config: DbConfig,
}

impl TestPostgres {
    /// Start a fresh container with the default `postgres` user and database
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag(POSTGRES_TAG)
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = DbConfig {
            dbname: Some("postgres".to_string()),
            user: Some("postgres".to_string()),
            password: Some("postgres".to_string()),
            host: Some(host.to_string()),
            port: Some(port.to_string()),
        };
        debug!("PostgreSQL test target: {}", config.display_target());

        Ok(Self { container, config })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Open a new connection to the container
    pub async fn connect(&self) -> Result<PgConnection> {
        self.config
            .connect_options()?
            .connect()
            .await
            .context("Failed to connect to PostgreSQL")
    }

    /// Number of rows in `employees`
    pub async fn count_employees(&self) -> Result<i64> {
        let mut conn = self.connect().await?;
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        Ok(count)
    }

    /// Every id in `employees`, ascending
    pub async fn employee_ids(&self) -> Result<Vec<i32>> {
        let mut conn = self.connect().await?;
        let ids = sqlx::query_scalar("SELECT employee_id FROM employees ORDER BY employee_id")
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;
        Ok(ids)
    }

    /// Whether the `employees` table exists
    pub async fn table_exists(&self) -> Result<bool> {
        let mut conn = self.connect().await?;
        let exists = sqlx::query_scalar("SELECT to_regclass('public.employees') IS NOT NULL")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        Ok(exists)
    }
}

/// Write `lines` below the standard header into `dir/name`
pub fn write_input(dir: &Path, name: &str, lines: &[&str]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writeln!(file, "{}", HEADER)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(path)
}

/// Initialize tracing for tests
///
/// Call at the start of a test to see log output. Safe to call more than once.
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,employee_etl=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
