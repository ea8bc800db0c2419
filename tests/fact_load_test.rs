//! Integration tests for fact loading and surrogate key resolution

use chrono::NaiveDate;
use starload::adapters::database::{UnitOfWork, Warehouse};
use starload::adapters::memory::MemoryWarehouse;
use starload::config::{parse_config, ResolutionMode, StarloadConfig};
use starload::core::calendar::ensure_calendar;
use starload::core::facts::{FactLoader, FactOutcome};
use starload::core::scd::VersionManager;
use starload::domain::{
    AttributeValue, Attributes, BusinessKey, ResolutionFailure, SourceEntity, StarloadError,
    TransactionKey, TransactionLine,
};
use std::collections::BTreeMap;
use test_case::test_case;

fn config(resolution: ResolutionMode) -> StarloadConfig {
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
tracked_attributes = ["name"]

[[dimensions]]
name = "product"
table = "dim_product"
tracked_attributes = ["category"]

[[facts]]
name = "sales"
table = "fact_sales"

[[facts.dimensions]]
dimension = "customer"

[[facts.dimensions]]
dimension = "product"
"#,
    )
    .unwrap();
    config.load.resolution = resolution;
    config.validate().unwrap();
    config
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entity(key: &str, attribute: &str, value: &str) -> SourceEntity {
    let mut attributes = Attributes::new();
    attributes.insert(attribute.to_string(), AttributeValue::from(value));
    SourceEntity::new(BusinessKey::new(key).unwrap(), attributes)
}

fn line(key: &str, customer: &str, product: &str, on: NaiveDate) -> TransactionLine {
    let mut dimension_keys = BTreeMap::new();
    dimension_keys.insert("customer".to_string(), BusinessKey::new(customer).unwrap());
    dimension_keys.insert("product".to_string(), BusinessKey::new(product).unwrap());
    TransactionLine {
        natural_key: TransactionKey::new(key).unwrap(),
        dimension_keys,
        quantity: 3,
        unit_price: 19.99,
        discount: 0.1,
        transaction_date: on,
    }
}

/// Customer 1 is renamed on 2024-03-01; product P1 never changes
async fn seeded(config: &StarloadConfig) -> MemoryWarehouse {
    let warehouse = MemoryWarehouse::new();
    let customer = &config.dimensions[0];
    let product = &config.dimensions[1];

    let mut uow = warehouse.begin().await.unwrap();
    VersionManager::new(customer, date(2024, 1, 1))
        .load(uow.as_mut(), vec![entity("1", "name", "John Doe")])
        .await
        .unwrap();
    VersionManager::new(product, date(2024, 1, 1))
        .load(uow.as_mut(), vec![entity("P1", "category", "Tools")])
        .await
        .unwrap();
    VersionManager::new(customer, date(2024, 3, 1))
        .load(uow.as_mut(), vec![entity("1", "name", "Johnny Doe")])
        .await
        .unwrap();
    uow.commit().await.unwrap();
    warehouse
}

async fn load(
    warehouse: &MemoryWarehouse,
    config: &StarloadConfig,
    lines: Vec<TransactionLine>,
) -> Result<FactOutcome, StarloadError> {
    let mut uow: Box<dyn UnitOfWork> = warehouse.begin().await?;
    let dates: Vec<NaiveDate> = lines.iter().map(|l| l.transaction_date).collect();
    ensure_calendar(uow.as_mut(), &config.calendar, dates).await?;
    let outcome = FactLoader::new(config, &config.facts[0])
        .load(uow.as_mut(), lines)
        .await?;
    uow.commit().await?;
    Ok(outcome)
}

#[test_case(ResolutionMode::AsOfLoad, [2, 2] ; "as of load uses current versions")]
#[test_case(ResolutionMode::AsOfTransaction, [1, 2] ; "as of transaction uses dated versions")]
#[tokio::test]
async fn test_resolution_modes(mode: ResolutionMode, expected_versions: [u32; 2]) {
    let config = config(mode);
    let warehouse = seeded(&config).await;

    let outcome = load(
        &warehouse,
        &config,
        vec![
            line("T1", "1", "P1", date(2024, 2, 15)),
            line("T2", "1", "P1", date(2024, 3, 5)),
        ],
    )
    .await
    .unwrap();
    assert_eq!(outcome.inserted, 2);

    let state = warehouse.snapshot().await;
    let customers = state.versions("dim_customer");
    let version_of = |record_index: usize| {
        let key = state.fact_rows("fact_sales")[record_index].dimension_keys["customer"];
        customers
            .iter()
            .find(|v| v.surrogate_key == key)
            .map(|v| v.version)
            .unwrap()
    };
    assert_eq!([version_of(0), version_of(1)], expected_versions);
}

#[tokio::test]
async fn test_transaction_before_first_version_is_skipped() {
    let config = config(ResolutionMode::AsOfTransaction);
    let warehouse = seeded(&config).await;

    let outcome = load(
        &warehouse,
        &config,
        vec![line("T0", "1", "P1", date(2023, 12, 1))],
    )
    .await
    .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.skipped(), 1);
    let error = &outcome.resolution_errors[0];
    assert_eq!(error.dimension.as_deref(), Some("customer"));
    assert_eq!(
        error.reason,
        ResolutionFailure::NoVersionOnDate(date(2023, 12, 1))
    );
}

#[tokio::test]
async fn test_measures_are_derived_and_rounded() {
    let config = config(ResolutionMode::AsOfLoad);
    let warehouse = seeded(&config).await;

    load(&warehouse, &config, vec![line("T1", "1", "P1", date(2024, 3, 5))])
        .await
        .unwrap();

    let state = warehouse.snapshot().await;
    let record = &state.fact_rows("fact_sales")[0];
    assert_eq!(record.date_key, 20240305);
    assert!((record.sales_amount - 53.97).abs() < 1e-9);
    assert!((record.cost_amount - 32.38).abs() < 1e-9);
    assert!((record.profit_amount - 21.59).abs() < 1e-9);
}

#[tokio::test]
async fn test_reload_is_exactly_once() {
    let config = config(ResolutionMode::AsOfLoad);
    let warehouse = seeded(&config).await;
    let lines = vec![
        line("T100", "1", "P1", date(2024, 3, 5)),
        line("T101", "1", "P1", date(2024, 3, 6)),
    ];

    let first = load(&warehouse, &config, lines.clone()).await.unwrap();
    assert_eq!(first.inserted, 2);

    let second = load(&warehouse, &config, lines).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_loaded, 2);

    assert_eq!(warehouse.snapshot().await.fact_rows("fact_sales").len(), 2);
}

#[tokio::test]
async fn test_missing_reference_and_unknown_key_are_collected() {
    let config = config(ResolutionMode::AsOfLoad);
    let warehouse = seeded(&config).await;

    let mut no_product = line("T2", "1", "P1", date(2024, 3, 5));
    no_product.dimension_keys.remove("product");

    let outcome = load(
        &warehouse,
        &config,
        vec![
            line("T1", "1", "P1", date(2024, 3, 5)),
            no_product,
            line("T3", "99", "P1", date(2024, 3, 5)),
        ],
    )
    .await
    .unwrap();

    assert_eq!(outcome.inserted, 1);
    let reasons: Vec<&ResolutionFailure> =
        outcome.resolution_errors.iter().map(|e| &e.reason).collect();
    assert_eq!(
        reasons,
        vec![
            &ResolutionFailure::MissingReference,
            &ResolutionFailure::NoCurrentVersion
        ]
    );
}

#[tokio::test]
async fn test_invalid_discount_is_skipped() {
    let config = config(ResolutionMode::AsOfLoad);
    let warehouse = seeded(&config).await;

    let mut bad = line("T1", "1", "P1", date(2024, 3, 5));
    bad.discount = 1.5;

    let outcome = load(&warehouse, &config, vec![bad]).await.unwrap();
    assert_eq!(outcome.inserted, 0);
    assert!(matches!(
        outcome.resolution_errors[0].reason,
        ResolutionFailure::InvalidMeasures(_)
    ));
}

#[tokio::test]
async fn test_in_batch_duplicate_keeps_first_line() {
    let config = config(ResolutionMode::AsOfLoad);
    let warehouse = seeded(&config).await;

    let mut repeat = line("T1", "1", "P1", date(2024, 3, 5));
    repeat.quantity = 100;

    let outcome = load(
        &warehouse,
        &config,
        vec![line("T1", "1", "P1", date(2024, 3, 5)), repeat],
    )
    .await
    .unwrap();

    assert_eq!(outcome.duplicates_in_batch, 1);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(
        warehouse.snapshot().await.fact_rows("fact_sales")[0].quantity,
        3
    );
}
