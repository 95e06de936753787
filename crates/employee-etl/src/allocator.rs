//! Identifier allocation
//!
//! New rows get `MAX(employee_id) + 1 + offset`, in dataset order. The maximum
//! is read inside the load transaction but, under the default strategy, no lock
//! is taken between that read and the insert, so two loaders running at the
//! same time can pick overlapping ranges. The second to commit then fails on
//! the primary key and rolls back.

use crate::error::{EtlError, Result};
use crate::loader::TABLE_NAME;
use crate::models::{Employee, NewEmployee};
use sqlx::PgConnection;
use std::ops::RangeInclusive;
use tracing::{debug, info};

const SELECT_MAX_ID_SQL: &str = "SELECT COALESCE(MAX(employee_id), 0) FROM employees";

const LOCK_TABLE_SQL: &str = "LOCK TABLE employees IN SHARE ROW EXCLUSIVE MODE";

/// How the current maximum id is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationStrategy {
    /// Plain `SELECT MAX(...)`; concurrent loaders may collide
    #[default]
    ReadMax,
    /// Lock the table against other writers first, held until commit
    TableLock,
}

/// Highest persisted `employee_id`, 0 for an empty table.
pub async fn current_max_id(conn: &mut PgConnection) -> Result<i32> {
    let max: i32 = sqlx::query_scalar(SELECT_MAX_ID_SQL)
        .fetch_one(&mut *conn)
        .await?;

    Ok(max)
}

/// Take a lock that conflicts with itself and with plain writes, so a second
/// loader waits at this point until the first one commits or rolls back.
pub async fn lock_for_allocation(conn: &mut PgConnection) -> Result<()> {
    debug!("Locking {} for id allocation", TABLE_NAME);
    sqlx::query(LOCK_TABLE_SQL).execute(&mut *conn).await?;
    Ok(())
}

/// Read the current maximum and assign the following ids to `records`.
pub async fn allocate_ids(
    records: Vec<NewEmployee>,
    conn: &mut PgConnection,
    strategy: AllocationStrategy,
) -> Result<Vec<Employee>> {
    if strategy == AllocationStrategy::TableLock {
        lock_for_allocation(conn).await?;
    }

    info!("Fetching next available employee id");
    let max = current_max_id(conn).await?;
    let next_id = max
        .checked_add(1)
        .ok_or_else(|| EtlError::IdRangeExhausted {
            next_id: i64::from(max) + 1,
            count: records.len(),
        })?;

    let employees = assign_ids(records, next_id)?;
    if let Some(range) = id_range(&employees) {
        info!("Allocated employee ids {}..={}", range.start(), range.end());
    }

    Ok(employees)
}

/// Give `records[i]` the id `next_id + i`.
pub fn assign_ids(records: Vec<NewEmployee>, next_id: i32) -> Result<Vec<Employee>> {
    let count = records.len();
    let last = i64::from(next_id) + count as i64 - 1;
    if count > 0 && last > i64::from(i32::MAX) {
        return Err(EtlError::IdRangeExhausted {
            next_id: i64::from(next_id),
            count,
        });
    }

    Ok(records
        .into_iter()
        .enumerate()
        .map(|(offset, record)| record.with_id(next_id + offset as i32))
        .collect())
}

/// First and last id of an allocated batch
pub fn id_range(employees: &[Employee]) -> Option<RangeInclusive<i32>> {
    match (employees.first(), employees.last()) {
        (Some(first), Some(last)) => Some(first.employee_id..=last.employee_id),
        _ => None,
    }
}
