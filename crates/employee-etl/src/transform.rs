//! Transform: completeness filter and per-column type coercion
//!
//! Rows with any missing cell are dropped wholesale. The surviving rows are
//! coerced column by column; by default the first value that does not fit its
//! column aborts the whole batch.

use crate::error::{EtlError, Result};
use crate::models::{
    NewEmployee, RawDataset, RawRow, COL_DEPARTMENT_ID, COL_FIRST_NAME, COL_HIRE_DATE,
    COL_LAST_NAME, COL_SALARY,
};
use bigdecimal::RoundingMode;
use sqlx::types::BigDecimal;
use std::str::FromStr;
use tracing::{info, warn};

/// Fractional digits kept for salaries (DECIMAL(10,2))
pub const SALARY_SCALE: i64 = 2;

/// What to do with a row whose values cannot be coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionPolicy {
    /// Abort the transform on the first bad value
    #[default]
    FailFast,
    /// Set the row aside and keep going
    Quarantine,
}

/// A row set aside under [`CoercionPolicy::Quarantine`]
#[derive(Debug)]
pub struct RejectedRow {
    pub line: u64,
    pub error: EtlError,
}

#[derive(Debug, Default)]
pub struct TransformOutput {
    /// Rows ready for id allocation, in input order
    pub records: Vec<NewEmployee>,
    /// Rows dropped by the completeness filter
    pub incomplete_dropped: usize,
    /// Always empty under [`CoercionPolicy::FailFast`]
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, Default)]
pub struct Transformer {
    policy: CoercionPolicy,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CoercionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    pub fn transform(&self, dataset: RawDataset) -> Result<TransformOutput> {
        info!("Transforming {} rows", dataset.len());

        let columns = ColumnMap::resolve(&dataset)?;
        let total = dataset.len();

        let complete: Vec<RawRow> = dataset
            .rows
            .into_iter()
            .filter(RawRow::is_complete)
            .collect();
        let incomplete_dropped = total - complete.len();
        if incomplete_dropped > 0 {
            info!("Dropped {} rows with missing values", incomplete_dropped);
        }

        let mut output = TransformOutput {
            records: Vec::with_capacity(complete.len()),
            incomplete_dropped,
            rejected: Vec::new(),
        };

        for row in &complete {
            match columns.coerce(row) {
                Ok(record) => output.records.push(record),
                Err(error) => match self.policy {
                    CoercionPolicy::FailFast => return Err(error),
                    CoercionPolicy::Quarantine => {
                        warn!(line = row.line, "Rejected row: {}", error);
                        output.rejected.push(RejectedRow {
                            line: row.line,
                            error,
                        });
                    },
                },
            }
        }

        info!("Transformed rows: {} ready to load", output.records.len());
        Ok(output)
    }
}

/// Fail-fast transform returning only the clean rows.
pub fn transform(dataset: RawDataset) -> Result<Vec<NewEmployee>> {
    Transformer::new()
        .transform(dataset)
        .map(|output| output.records)
}

/// Header positions of the five source columns
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    salary: usize,
    first_name: usize,
    last_name: usize,
    hire_date: usize,
    department_id: usize,
}

impl ColumnMap {
    fn resolve(dataset: &RawDataset) -> Result<Self> {
        let index = |name: &str| {
            dataset
                .column_index(name)
                .ok_or_else(|| EtlError::parse(format!("missing required column: {}", name)))
        };

        Ok(Self {
            salary: index(COL_SALARY)?,
            first_name: index(COL_FIRST_NAME)?,
            last_name: index(COL_LAST_NAME)?,
            hire_date: index(COL_HIRE_DATE)?,
            department_id: index(COL_DEPARTMENT_ID)?,
        })
    }

    fn coerce(&self, row: &RawRow) -> Result<NewEmployee> {
        let salary = field(row, self.salary, COL_SALARY)?;
        let department_id = field(row, self.department_id, COL_DEPARTMENT_ID)?;

        Ok(NewEmployee {
            salary: coerce_decimal(salary).ok_or_else(|| {
                coercion_error(row.line, COL_SALARY, salary, "decimal")
            })?,
            first_name: field(row, self.first_name, COL_FIRST_NAME)?.to_string(),
            last_name: field(row, self.last_name, COL_LAST_NAME)?.to_string(),
            hire_date: field(row, self.hire_date, COL_HIRE_DATE)?.to_string(),
            department_id: coerce_integer(department_id).ok_or_else(|| {
                coercion_error(row.line, COL_DEPARTMENT_ID, department_id, "integer")
            })?,
            source_line: row.line,
        })
    }
}

fn field<'r>(row: &'r RawRow, index: usize, column: &str) -> Result<&'r str> {
    row.values
        .get(index)
        .and_then(Option::as_deref)
        .ok_or_else(|| EtlError::parse(format!("line {} has no value for '{}'", row.line, column)))
}

fn coercion_error(line: u64, column: &'static str, value: &str, target: &'static str) -> EtlError {
    EtlError::TypeCoercion {
        line,
        column,
        value: value.to_string(),
        target,
    }
}

/// Parse a decimal and fix it to [`SALARY_SCALE`] fractional digits.
///
/// Ties round away from zero, matching PostgreSQL's NUMERIC cast.
pub fn coerce_decimal(raw: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(raw.trim())
        .ok()
        .map(|value| value.with_scale_round(SALARY_SCALE, RoundingMode::HalfUp))
}

/// Parse a 32-bit integer.
///
/// Integral decimals such as `3.0` are accepted, since numeric columns with
/// gaps are commonly exported as floats. Anything with a fractional part is not.
pub fn coerce_integer(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i32>() {
        return Some(value);
    }

    let value: f64 = trimmed.parse().ok()?;
    if value.is_finite()
        && value.fract() == 0.0
        && value >= f64::from(i32::MIN)
        && value <= f64::from(i32::MAX)
    {
        Some(value as i32)
    } else {
        None
    }
}
