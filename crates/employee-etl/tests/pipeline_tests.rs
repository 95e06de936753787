//! End-to-end pipeline tests against a real PostgreSQL container
//!
//! Run with:
//! ```bash
//! cargo test -p employee-etl --test pipeline_tests -- --ignored --nocapture
//! ```

mod common;

use common::{init_test_tracing, write_input, TestPostgres};
use employee_etl::allocator::AllocationStrategy;
use employee_etl::config::{EtlConfig, PipelineConfig};
use employee_etl::loader::{self, EmployeeLoader};
use employee_etl::transform::CoercionPolicy;
use employee_etl::{run, EtlError};
use sqlx::Connection;
use std::path::Path;
use std::time::Duration;

fn config_for(pg: &TestPostgres, input: &Path) -> EtlConfig {
    EtlConfig {
        database: pg.config().clone(),
        pipeline: PipelineConfig {
            input_path: input.to_path_buf(),
            max_attempts: 10,
            retry_interval: Duration::from_millis(500),
            ..Default::default()
        },
    }
}

async fn seed_employee(pg: &TestPostgres, employee_id: i32) {
    let mut conn = pg.connect().await.unwrap();
    loader::ensure_schema(&mut conn).await.unwrap();
    sqlx::query(
        "INSERT INTO employees VALUES ($1, 'Seed', 'Row', '2020-01-01', 1000.00, 1)",
    )
    .bind(employee_id)
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_end_to_end_drops_incomplete_rows() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "data.csv",
        &[
            "Ana\tGarcia\t2020-01-15\t2500.5\t1",
            "Luis\tPerez\t2019-07-01\t\t2",
            "Marta\tLopez\t2021-03-10\t3100\t2",
            "Jorge\tRuiz\t2018-11-30\t1999.999\t3",
        ],
    )
    .unwrap();

    let stats = run(&config_for(&pg, &input)).await.unwrap();

    assert_eq!(stats.extracted, 4);
    assert_eq!(stats.incomplete_dropped, 1);
    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.id_range, Some(1..=3));
    assert_eq!(pg.employee_ids().await.unwrap(), vec![1, 2, 3]);

    let mut conn = pg.connect().await.unwrap();
    let rows: Vec<(i32, String, String, String, i32)> = sqlx::query_as(
        "SELECT employee_id, first_name, hire_date::text, salary::text, department_id \
         FROM employees ORDER BY employee_id",
    )
    .fetch_all(&mut conn)
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, "Ana".into(), "2020-01-15".into(), "2500.50".into(), 1),
            (2, "Marta".into(), "2021-03-10".into(), "3100.00".into(), 2),
            (3, "Jorge".into(), "2018-11-30".into(), "2000.00".into(), 3),
        ]
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_ids_continue_after_existing_max() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    seed_employee(&pg, 41).await;

    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (1..=5)
        .map(|i| format!("Name{i}\tLast{i}\t2022-02-0{i}\t{i}000\t{i}"))
        .collect();
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    let input = write_input(dir.path(), "data.csv", &lines).unwrap();

    let stats = run(&config_for(&pg, &input)).await.unwrap();

    assert_eq!(stats.inserted, 5);
    assert_eq!(stats.id_range, Some(42..=46));
    assert_eq!(pg.employee_ids().await.unwrap(), vec![41, 42, 43, 44, 45, 46]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failed_insert_rolls_back_whole_batch() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let too_long = "X".repeat(60);
    let bad_line = format!("{too_long}\tLong\t2020-01-01\t100\t1");
    let input = write_input(
        dir.path(),
        "data.csv",
        &["Ana\tGarcia\t2020-01-15\t2500\t1", &bad_line],
    )
    .unwrap();

    let err = run(&config_for(&pg, &input)).await.unwrap_err();

    assert!(matches!(err, EtlError::Persistence(_)), "got {err:?}");
    assert_eq!(pg.count_employees().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_schema_step_is_idempotent() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "data.csv", &["Ana\tGarcia\t2020-01-15\t2500\t1"]).unwrap();
    let config = config_for(&pg, &input);

    run(&config).await.unwrap();
    let second = run(&config).await.unwrap();

    assert_eq!(second.id_range, Some(2..=2));
    assert_eq!(pg.employee_ids().await.unwrap(), vec![1, 2]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_bad_salary_persists_nothing() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "data.csv",
        &[
            "Ana\tGarcia\t2020-01-15\t2500\t1",
            "Luis\tPerez\t2019-07-01\tabc\t2",
        ],
    )
    .unwrap();

    let err = run(&config_for(&pg, &input)).await.unwrap_err();

    match err {
        EtlError::TypeCoercion { line, column, .. } => {
            assert_eq!(line, 3);
            assert_eq!(column, "salario");
        },
        other => panic!("expected a coercion error, got {other:?}"),
    }
    // Transform fails before the loader connects, so the table never appears
    assert!(!pg.table_exists().await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_quarantine_loads_valid_rows() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "data.csv",
        &[
            "Ana\tGarcia\t2020-01-15\t2500\t1",
            "Luis\tPerez\t2019-07-01\tabc\t2",
        ],
    )
    .unwrap();
    let mut config = config_for(&pg, &input);
    config.pipeline.coercion_policy = CoercionPolicy::Quarantine;

    let stats = run(&config).await.unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.inserted, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_empty_dataset_creates_table() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "data.csv", &[]).unwrap();

    let stats = run(&config_for(&pg, &input)).await.unwrap();

    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.id_range, None);
    assert!(pg.table_exists().await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_table_lock_strategy_and_chunked_inserts() {
    init_test_tracing();
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    seed_employee(&pg, 10).await;

    let records = {
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<String> = (1..=7)
            .map(|i| format!("N{i}\tL{i}\t2023-01-0{i}\t{i}50.25\t{i}"))
            .collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "data.csv", &lines).unwrap();
        let dataset = employee_etl::extract::extract(&input).unwrap();
        employee_etl::transform::transform(dataset).unwrap()
    };

    let mut conn = pg.connect().await.unwrap();
    let report = EmployeeLoader::with_strategy(AllocationStrategy::TableLock)
        .with_rows_per_statement(3)
        .load(&mut conn, records)
        .await
        .unwrap();
    conn.close().await.unwrap();

    assert_eq!(report.inserted, 7);
    assert_eq!(report.id_range, Some(11..=17));
    assert_eq!(pg.count_employees().await.unwrap(), 8);
}
