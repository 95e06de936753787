//! Loader: schema step, id allocation and bulk insert in one transaction
//!
//! Everything runs on the caller's connection inside a single transaction.
//! Success commits; any error rolls the transaction back explicitly before
//! it is returned, so a failed run leaves no rows behind.

use crate::allocator::{allocate_ids, id_range, AllocationStrategy};
use crate::error::Result;
use crate::models::{Employee, NewEmployee};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::ops::RangeInclusive;
use tracing::{debug, error, info, warn};

pub const TABLE_NAME: &str = "employees";

/// Idempotent schema step
pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS employees (
        employee_id     INTEGER PRIMARY KEY,
        first_name      VARCHAR(50),
        last_name       VARCHAR(50),
        hire_date       DATE,
        salary          DECIMAL(10, 2),
        department_id   INTEGER
    )
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO employees (
        employee_id,
        first_name,
        last_name,
        hire_date,
        salary,
        department_id
    )
"#;

const BIND_PARAMS_PER_ROW: usize = 6;

/// PostgreSQL's limit on bind parameters in one statement
pub const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Largest row count that fits in a single INSERT
pub const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / BIND_PARAMS_PER_ROW;

/// Outcome of a committed load
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub inserted: u64,
    /// Ids given to this run, `None` when nothing was loaded
    pub id_range: Option<RangeInclusive<i32>>,
}

/// Writes a batch of rows to the `employees` table
#[derive(Debug, Clone)]
pub struct EmployeeLoader {
    strategy: AllocationStrategy,
    rows_per_statement: usize,
}

impl Default for EmployeeLoader {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::default(),
            rows_per_statement: MAX_ROWS_PER_STATEMENT,
        }
    }
}

impl EmployeeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: AllocationStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Cap rows per INSERT. Values outside `1..=MAX_ROWS_PER_STATEMENT` are clamped.
    pub fn with_rows_per_statement(mut self, rows: usize) -> Self {
        self.rows_per_statement = rows.clamp(1, MAX_ROWS_PER_STATEMENT);
        self
    }

    /// Create the table if needed, allocate ids and insert every record.
    pub async fn load(
        &self,
        conn: &mut PgConnection,
        records: Vec<NewEmployee>,
    ) -> Result<LoadReport> {
        let mut tx = conn.begin().await?;

        match self.load_in_transaction(&mut tx, records).await {
            Ok(report) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(report)
            },
            Err(err) => {
                warn!("Load failed, rolling back: {}", err);
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            },
        }
    }

    async fn load_in_transaction(
        &self,
        conn: &mut PgConnection,
        records: Vec<NewEmployee>,
    ) -> Result<LoadReport> {
        ensure_schema(conn).await?;

        let employees = allocate_ids(records, conn, self.strategy).await?;

        info!("Inserting {} rows", employees.len());
        let mut inserted = 0;
        let total_chunks = employees.len().div_ceil(self.rows_per_statement);
        for (chunk_idx, chunk) in employees.chunks(self.rows_per_statement).enumerate() {
            if total_chunks > 1 {
                info!(
                    "Inserting chunk {} / {} ({} rows)",
                    chunk_idx + 1,
                    total_chunks,
                    chunk.len()
                );
            }
            inserted += bulk_insert(conn, chunk).await?;
        }

        Ok(LoadReport {
            inserted,
            id_range: id_range(&employees),
        })
    }
}

/// `CREATE TABLE IF NOT EXISTS`; leaves an existing table untouched.
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<()> {
    info!("Creating table {} if it does not exist", TABLE_NAME);
    sqlx::query(CREATE_TABLE_SQL).execute(&mut *conn).await?;
    Ok(())
}

/// Insert `employees` with a single multi-row statement.
///
/// The caller keeps `employees.len()` within [`MAX_ROWS_PER_STATEMENT`].
pub async fn bulk_insert(conn: &mut PgConnection, employees: &[Employee]) -> Result<u64> {
    if employees.is_empty() {
        return Ok(0);
    }

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(INSERT_SQL);

    query_builder.push_values(employees, |mut b, employee| {
        b.push_bind(employee.employee_id)
            .push_bind(&employee.first_name)
            .push_bind(&employee.last_name)
            .push_bind(&employee.hire_date)
            .push_unseparated("::date")
            .push_bind(&employee.salary)
            .push_bind(employee.department_id);
    });

    let result = query_builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Load `records` with the given allocation strategy.
pub async fn load(
    conn: &mut PgConnection,
    records: Vec<NewEmployee>,
    strategy: AllocationStrategy,
) -> Result<LoadReport> {
    EmployeeLoader::with_strategy(strategy)
        .load(conn, records)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_fits_bind_limit() {
        assert_eq!(MAX_ROWS_PER_STATEMENT, 10_922);
        assert!(MAX_ROWS_PER_STATEMENT * BIND_PARAMS_PER_ROW <= MAX_BIND_PARAMS);
    }

    #[test]
    fn test_rows_per_statement_is_clamped() {
        assert_eq!(EmployeeLoader::new().with_rows_per_statement(0).rows_per_statement, 1);
        assert_eq!(
            EmployeeLoader::new()
                .with_rows_per_statement(1_000_000)
                .rows_per_statement,
            MAX_ROWS_PER_STATEMENT
        );
    }

    #[test]
    fn test_schema_matches_table_contract() {
        let sql = CREATE_TABLE_SQL
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS EMPLOYEES"));
        assert!(sql.contains("EMPLOYEE_ID INTEGER PRIMARY KEY"));
        assert!(sql.contains("FIRST_NAME VARCHAR(50)"));
        assert!(sql.contains("HIRE_DATE DATE"));
        assert!(sql.contains("SALARY DECIMAL(10, 2)"));
    }
}
