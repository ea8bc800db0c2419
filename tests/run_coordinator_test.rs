//! Integration tests for end-to-end runs
//!
//! These tests verify that:
//! - A run commits dimensions, calendar and facts together
//! - Unavailable sources abort before any write
//! - Failed commits, strict mode and interrupts leave the warehouse untouched
//! - Re-running the same feeds changes nothing

use chrono::NaiveDate;
use starload::adapters::database::Warehouse;
use starload::adapters::memory::{MemorySource, MemoryWarehouse};
use starload::config::{parse_config, StarloadConfig};
use starload::core::run::{RunCoordinator, RunStatus, RunStep};
use starload::domain::{
    AttributeValue, Attributes, BusinessKey, SourceEntity, TransactionKey, TransactionLine,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

fn config(as_of: &str) -> StarloadConfig {
    let mut config = parse_config(
        r#"
[source]
kind = "json"

[source.json]
directory = "unused"

[warehouse]
target = "memory"

[[dimensions]]
name = "customer"
table = "dim_customer"
tracked_attributes = ["name", "city"]

[[facts]]
name = "sales"
table = "fact_sales"

[[facts.dimensions]]
dimension = "customer"
"#,
    )
    .unwrap();
    config.load.as_of_date = Some(as_of.parse().unwrap());
    config.validate().unwrap();
    config
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn customer(key: &str, name: &str) -> SourceEntity {
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), AttributeValue::from(name));
    attributes.insert("city".to_string(), AttributeValue::from("Boston"));
    SourceEntity::new(BusinessKey::new(key).unwrap(), attributes)
}

fn sale(key: &str, customer: &str, on: NaiveDate) -> TransactionLine {
    let mut dimension_keys = BTreeMap::new();
    dimension_keys.insert("customer".to_string(), BusinessKey::new(customer).unwrap());
    TransactionLine {
        natural_key: TransactionKey::new(key).unwrap(),
        dimension_keys,
        quantity: 2,
        unit_price: 10.0,
        discount: 0.0,
        transaction_date: on,
    }
}

async fn source(entities: Vec<SourceEntity>, lines: Vec<TransactionLine>) -> Arc<MemorySource> {
    let source = MemorySource::new();
    source.set_entities("customer", entities).await;
    source.set_transactions("sales", lines).await;
    Arc::new(source)
}

fn coordinator(
    config: StarloadConfig,
    source: &Arc<MemorySource>,
    warehouse: &MemoryWarehouse,
) -> RunCoordinator {
    RunCoordinator::with_components(config, source.clone(), Arc::new(warehouse.clone()))
}

#[tokio::test]
async fn test_full_run_commits_everything() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe"), customer("2", "Jane Roe")],
        vec![
            sale("T100", "1", date(2024, 3, 1)),
            sale("T101", "2", date(2024, 3, 3)),
        ],
    )
    .await;

    let summary = coordinator(config("2024-03-01"), &source, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.exit_code(), 0);
    assert!(summary.committed);
    assert_eq!(summary.versions_inserted(), 2);
    assert_eq!(summary.facts_inserted(), 2);
    assert_eq!(summary.calendar_days_inserted, 3);

    let state = warehouse.snapshot().await;
    assert_eq!(state.versions("dim_customer").len(), 2);
    assert_eq!(state.fact_rows("fact_sales").len(), 2);
    assert_eq!(state.calendar_len("dim_date"), 3);
}

#[tokio::test]
async fn test_rerun_with_same_feeds_is_idempotent() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe")],
        vec![sale("T100", "1", date(2024, 3, 1))],
    )
    .await;

    coordinator(config("2024-03-01"), &source, &warehouse)
        .execute_run()
        .await;
    let before = warehouse.snapshot().await;

    let summary = coordinator(config("2024-03-02"), &source, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::Success);
    assert_eq!(summary.versions_inserted(), 0);
    assert_eq!(summary.facts_inserted(), 0);
    assert_eq!(summary.facts[0].already_loaded, 1);

    let after = warehouse.snapshot().await;
    assert_eq!(before.versions("dim_customer"), after.versions("dim_customer"));
    assert_eq!(before.fact_rows("fact_sales"), after.fact_rows("fact_sales"));
}

#[tokio::test]
async fn test_dimension_change_then_fact_uses_new_version() {
    let warehouse = MemoryWarehouse::new();

    let first = source(vec![customer("1", "John Doe")], Vec::new()).await;
    coordinator(config("2024-01-01"), &first, &warehouse)
        .execute_run()
        .await;

    let second = source(
        vec![customer("1", "Johnny Doe")],
        vec![sale("T100", "1", date(2024, 3, 1))],
    )
    .await;
    let summary = coordinator(config("2024-03-01"), &second, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.versions_closed(), 1);
    let state = warehouse.snapshot().await;
    let current = state
        .versions("dim_customer")
        .iter()
        .find(|v| v.is_current)
        .unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(
        state.fact_rows("fact_sales")[0].dimension_keys["customer"],
        current.surrogate_key
    );
}

#[tokio::test]
async fn test_unresolved_line_is_partial_success() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe")],
        vec![
            sale("T100", "1", date(2024, 3, 1)),
            sale("T101", "99", date(2024, 3, 1)),
        ],
    )
    .await;

    let summary = coordinator(config("2024-03-01"), &source, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::PartialSuccess);
    assert!(summary.committed);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.facts_inserted(), 1);
    assert_eq!(summary.resolution_error_count(), 1);
    assert_eq!(
        summary.facts[0].resolution_errors[0].business_key.as_deref(),
        Some("99")
    );
}

#[tokio::test]
async fn test_strict_mode_aborts_on_unresolved_line() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe")],
        vec![sale("T101", "99", date(2024, 3, 1))],
    )
    .await;
    let mut config = config("2024-03-01");
    config.load.strict = true;

    let summary = coordinator(config, &source, &warehouse).execute_run().await;

    assert_eq!(summary.status, RunStatus::Aborted);
    assert_eq!(summary.exit_code(), 3);
    assert_eq!(
        summary.failure.as_ref().map(|f| &f.step),
        Some(&RunStep::Fact("sales".to_string()))
    );

    // The dimension written earlier in the run was rolled back too
    assert!(warehouse.snapshot().await.versions("dim_customer").is_empty());
}

#[tokio::test]
async fn test_unavailable_source_aborts_before_writes() {
    let warehouse = MemoryWarehouse::new();
    let source = source(vec![customer("1", "John Doe")], Vec::new()).await;
    source.set_unavailable(true);

    let summary = coordinator(config("2024-03-01"), &source, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::Aborted);
    assert_eq!(
        summary.failure.as_ref().map(|f| &f.step),
        Some(&RunStep::ReadSource("customer".to_string()))
    );
    assert!(summary.dimensions.is_empty());

    let state = warehouse.snapshot().await;
    assert!(state.versions("dim_customer").is_empty());
    assert_eq!(state.calendar_len("dim_date"), 0);
}

#[tokio::test]
async fn test_failed_commit_leaves_warehouse_unchanged() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe")],
        vec![sale("T100", "1", date(2024, 3, 1))],
    )
    .await;
    warehouse.fail_commits(true);

    let summary = coordinator(config("2024-03-01"), &source, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::Aborted);
    assert!(!summary.committed);
    assert_eq!(
        summary.failure.as_ref().map(|f| &f.step),
        Some(&RunStep::Commit)
    );

    let state = warehouse.snapshot().await;
    assert!(state.versions("dim_customer").is_empty());
    assert!(state.fact_rows("fact_sales").is_empty());
}

#[tokio::test]
async fn test_dry_run_reports_counts_without_committing() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe")],
        vec![sale("T100", "1", date(2024, 3, 1))],
    )
    .await;
    let mut config = config("2024-03-01");
    config.application.dry_run = true;

    let summary = coordinator(config, &source, &warehouse).execute_run().await;

    assert_eq!(summary.status, RunStatus::Success);
    assert!(summary.dry_run);
    assert!(!summary.committed);
    assert_eq!(summary.versions_inserted(), 1);
    assert_eq!(summary.facts_inserted(), 1);

    let state = warehouse.snapshot().await;
    assert!(state.versions("dim_customer").is_empty());
    assert!(state.fact_rows("fact_sales").is_empty());
}

#[tokio::test]
async fn test_shutdown_signal_interrupts_run() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe")],
        vec![sale("T100", "1", date(2024, 3, 1))],
    )
    .await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let summary = coordinator(config("2024-03-01"), &source, &warehouse)
        .with_shutdown_signal(shutdown_rx)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.exit_code(), 130);
    assert!(!summary.committed);
    assert!(warehouse.snapshot().await.versions("dim_customer").is_empty());
}

#[tokio::test]
async fn test_conflicting_snapshot_aborts_dimension_step() {
    let warehouse = MemoryWarehouse::new();
    let source = source(
        vec![customer("1", "John Doe"), customer("1", "Johnny Doe")],
        Vec::new(),
    )
    .await;

    let summary = coordinator(config("2024-03-01"), &source, &warehouse)
        .execute_run()
        .await;

    assert_eq!(summary.status, RunStatus::Aborted);
    assert_eq!(
        summary.failure.as_ref().map(|f| &f.step),
        Some(&RunStep::Dimension("customer".to_string()))
    );
    assert!(warehouse.snapshot().await.versions("dim_customer").is_empty());
}
