//! Employee ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! One-shot batch load of employee records from a tab-separated file into
//! PostgreSQL.
//!
//! # Stages
//!
//! - **gate**: wait for the database to accept connections
//! - **extract**: read the file into memory
//! - **transform**: drop incomplete rows, coerce column types
//! - **allocator**: assign `employee_id` values after the current maximum
//! - **loader**: create the table if needed and bulk insert in one transaction
//!
//! # Example
//!
//! ```no_run
//! use employee_etl::config::{DbConfig, EtlConfig};
//!
//! #[tokio::main]
//! async fn main() -> employee_etl::Result<()> {
//!     let config = EtlConfig {
//!         database: DbConfig::from_env(),
//!         ..Default::default()
//!     };
//!     let stats = employee_etl::pipeline::run(&config).await?;
//!     println!("{} rows inserted", stats.inserted);
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod gate;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod transform;

pub use error::{EtlError, Result};
pub use pipeline::{run, PipelineStats};
