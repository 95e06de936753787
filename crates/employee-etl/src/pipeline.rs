//! End-to-end run: gate -> extract -> transform -> allocate -> load
//!
//! The stages run strictly one after another. The load connection is opened
//! only after the transform succeeds and is closed before `run` returns,
//! whichever way the load went.

use crate::config::EtlConfig;
use crate::db;
use crate::error::{EtlError, Result};
use crate::extract::extract;
use crate::gate::wait_for_database;
use crate::loader::EmployeeLoader;
use crate::transform::Transformer;
use sqlx::Connection;
use std::ops::RangeInclusive;
use tracing::{info, warn};

/// Counts from one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Rows read from the source file
    pub extracted: usize,
    /// Rows dropped for missing values
    pub incomplete_dropped: usize,
    /// Rows set aside by a quarantining transform
    pub rejected: usize,
    /// Rows committed to the table
    pub inserted: u64,
    pub id_range: Option<RangeInclusive<i32>>,
}

/// Run the whole ETL once.
pub async fn run(config: &EtlConfig) -> Result<PipelineStats> {
    config.validate()?;
    let pipeline = &config.pipeline;

    let ready = wait_for_database(
        &config.database,
        pipeline.max_attempts,
        pipeline.retry_interval,
        pipeline.connect_timeout,
    )
    .await;
    if !ready {
        return Err(EtlError::Connectivity {
            attempts: pipeline.max_attempts,
        });
    }

    let dataset = extract(&pipeline.input_path)?;
    let extracted = dataset.len();

    let output = Transformer::with_policy(pipeline.coercion_policy).transform(dataset)?;
    if !output.rejected.is_empty() {
        warn!("{} rows rejected during transform", output.rejected.len());
    }

    info!("Connecting to the database");
    let mut conn = db::connect(&config.database, pipeline.connect_timeout).await?;

    let loaded = EmployeeLoader::with_strategy(pipeline.allocation)
        .load(&mut conn, output.records)
        .await;

    if let Err(e) = conn.close().await {
        warn!("Error closing database connection: {}", e);
    }
    info!("Connection closed");

    let report = loaded?;
    info!("ETL completed: {} records inserted", report.inserted);

    Ok(PipelineStats {
        extracted,
        incomplete_dropped: output.incomplete_dropped,
        rejected: output.rejected.len(),
        inserted: report.inserted,
        id_range: report.id_range,
    })
}
