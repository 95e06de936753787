//! employee-etl - load employee records from a TSV file into PostgreSQL

use anyhow::Result;
use clap::Parser;
use employee_etl::allocator::AllocationStrategy;
use employee_etl::config::{
    DbConfig, EtlConfig, PipelineConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_INPUT_PATH,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS,
};
use employee_etl::transform::CoercionPolicy;
use etl_common::logging::{init_logging, LogConfig, LogLevel};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "employee-etl")]
#[command(author, version, about = "Load employee records from a TSV file into PostgreSQL")]
struct Cli {
    /// Tab-separated input file
    #[arg(short, long, env = "ETL_INPUT_PATH", default_value = DEFAULT_INPUT_PATH)]
    input: PathBuf,

    /// Connection attempts before giving up on the database
    #[arg(long, env = "ETL_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Pause between connection attempts, in milliseconds
    #[arg(long, env = "ETL_RETRY_INTERVAL_MS", default_value_t = DEFAULT_RETRY_INTERVAL_MS)]
    retry_interval_ms: u64,

    /// Timeout for a single connection attempt, in seconds
    #[arg(long, env = "ETL_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    /// Skip rows that fail type coercion instead of aborting
    #[arg(long)]
    quarantine_invalid_rows: bool,

    /// Lock the table while allocating ids
    #[arg(long)]
    lock_table: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn etl_config(&self) -> EtlConfig {
        EtlConfig {
            database: DbConfig::from_env(),
            pipeline: PipelineConfig {
                input_path: self.input.clone(),
                max_attempts: self.max_attempts,
                retry_interval: Duration::from_millis(self.retry_interval_ms),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                coercion_policy: if self.quarantine_invalid_rows {
                    CoercionPolicy::Quarantine
                } else {
                    CoercionPolicy::FailFast
                },
                allocation: if self.lock_table {
                    AllocationStrategy::TableLock
                } else {
                    AllocationStrategy::ReadMax
                },
            },
        }
    }
}

fn init_tracing(verbose: bool) -> Result<etl_common::LoggingGuard> {
    let log_level = if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("employee-etl")
        .filter_directives("sqlx=warn")
        .build()
        .with_env_overrides()?;

    init_logging(&log_config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        },
    };

    let config = cli.etl_config();
    info!("Starting ETL, input {}", config.pipeline.input_path.display());

    match employee_etl::run(&config).await {
        Ok(stats) => {
            info!(
                extracted = stats.extracted,
                incomplete_dropped = stats.incomplete_dropped,
                rejected = stats.rejected,
                inserted = stats.inserted,
                "Run finished"
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("ETL failed: {}", e);
            ExitCode::FAILURE
        },
    }
}
