//! Error types for the employee ETL
//!
//! One variant per failure class of the pipeline. Only `Connectivity` is ever
//! the result of a retry loop; everything else is reported as soon as it
//! happens and ends the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// The database never accepted a connection during the startup gate
    #[error("Could not connect to the database after {attempts} attempts")]
    Connectivity { attempts: u32 },

    /// Source file is missing or unreadable
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source file is not usable as tab-separated text
    #[error("Parse error: {0}")]
    Parse(String),

    /// A field could not be converted to its column type
    #[error(
        "Type coercion error on line {line}: column '{column}' value '{value}' is not a valid {target}"
    )]
    TypeCoercion {
        line: u64,
        column: &'static str,
        value: String,
        target: &'static str,
    },

    /// Schema creation, id lookup, insert or commit failed
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Allocating `count` ids starting at `next_id` would overflow the key column
    #[error("Cannot allocate {count} employee ids starting at {next_id}: INTEGER range exhausted")]
    IdRangeExhausted { next_id: i64, count: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
