//! Incremental fact load
//!
//! Pending lines are anti-joined against the natural keys already in the
//! fact table, so a line is loaded at most once however often the run
//! repeats. Unresolvable lines are skipped and reported; the rest are
//! inserted as one batch inside the run's unit of work.

use super::measures::MeasurePolicy;
use super::resolver::KeyResolver;
use crate::adapters::database::traits::UnitOfWork;
use crate::config::{FactConfig, StarloadConfig};
use crate::domain::{
    date_key, FactRecord, ResolutionError, ResolutionFailure, Result, StarloadError,
    TransactionKey, TransactionLine,
};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

/// Counts and skipped lines of one fact load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactOutcome {
    pub fact: String,
    /// Lines read from the source
    pub pending: usize,
    /// Repeats of a natural key within the pending batch (first one kept)
    pub duplicates_in_batch: usize,
    /// Lines whose natural key was loaded by an earlier run
    pub already_loaded: usize,
    pub inserted: u64,
    pub resolution_errors: Vec<ResolutionError>,
}

impl FactOutcome {
    /// Lines skipped because they could not be resolved
    pub fn skipped(&self) -> usize {
        self.resolution_errors.len()
    }
}

/// Loads one fact table
pub struct FactLoader<'a> {
    config: &'a StarloadConfig,
    fact: &'a FactConfig,
    policy: MeasurePolicy,
}

impl<'a> FactLoader<'a> {
    pub fn new(config: &'a StarloadConfig, fact: &'a FactConfig) -> Self {
        Self {
            config,
            fact,
            policy: MeasurePolicy::from_config(&config.measures),
        }
    }

    /// Resolves and inserts every line not loaded yet
    ///
    /// # Errors
    ///
    /// In strict mode the first unresolvable line aborts with
    /// [`StarloadError::Resolution`]; otherwise only warehouse and
    /// configuration errors are returned.
    pub async fn load(
        &self,
        uow: &mut dyn UnitOfWork,
        lines: Vec<TransactionLine>,
    ) -> Result<FactOutcome> {
        let mut outcome = FactOutcome {
            fact: self.fact.name.clone(),
            pending: lines.len(),
            ..Default::default()
        };

        let mut seen: HashSet<TransactionKey> = HashSet::new();
        let mut batch = Vec::with_capacity(lines.len());
        for line in lines {
            if seen.insert(line.natural_key.clone()) {
                batch.push(line);
            } else {
                tracing::warn!(
                    fact = %self.fact.name,
                    natural_key = %line.natural_key,
                    "Duplicate natural key in pending batch, keeping the first line"
                );
                outcome.duplicates_in_batch += 1;
            }
        }

        let keys: Vec<TransactionKey> = batch.iter().map(|l| l.natural_key.clone()).collect();
        let existing = uow.existing_transaction_keys(self.fact, &keys).await?;
        batch.retain(|line| !existing.contains(&line.natural_key));
        outcome.already_loaded = existing.len();

        if batch.is_empty() {
            tracing::info!(fact = %self.fact.name, "No new transaction lines to load");
            return Ok(outcome);
        }

        let resolver =
            KeyResolver::load(uow, self.config, self.fact, self.config.load.resolution).await?;
        let calendar = self.calendar_dates(uow, &batch).await?;

        let mut records = Vec::with_capacity(batch.len());
        for line in &batch {
            match self.resolve_line(&resolver, calendar.as_ref(), line) {
                Ok(record) => records.push(record),
                Err(error) if self.config.load.strict => {
                    return Err(StarloadError::Resolution(error));
                }
                Err(error) => {
                    tracing::warn!(fact = %self.fact.name, error = %error, "Skipping unresolved line");
                    outcome.resolution_errors.push(error);
                }
            }
        }

        if !records.is_empty() {
            outcome.inserted = uow.insert_facts(self.fact, &records).await?;
        }

        tracing::info!(
            fact = %self.fact.name,
            pending = outcome.pending,
            already_loaded = outcome.already_loaded,
            duplicates_in_batch = outcome.duplicates_in_batch,
            inserted = outcome.inserted,
            skipped = outcome.skipped(),
            "Fact loaded"
        );
        Ok(outcome)
    }

    /// Calendar dates covering the batch, or `None` when the date dimension is disabled
    async fn calendar_dates(
        &self,
        uow: &mut dyn UnitOfWork,
        batch: &[TransactionLine],
    ) -> Result<Option<BTreeSet<NaiveDate>>> {
        if !self.config.calendar.enabled {
            return Ok(None);
        }
        let dates = batch.iter().map(|l| l.transaction_date);
        let (Some(start), Some(end)) = (dates.clone().min(), dates.max()) else {
            return Ok(Some(BTreeSet::new()));
        };

        Ok(Some(
            uow.existing_calendar_dates(&self.config.calendar, start, end)
                .await?,
        ))
    }

    fn resolve_line(
        &self,
        resolver: &KeyResolver,
        calendar: Option<&BTreeSet<NaiveDate>>,
        line: &TransactionLine,
    ) -> std::result::Result<FactRecord, ResolutionError> {
        let fail = |reason: ResolutionFailure| {
            ResolutionError::new(&self.fact.name, line.natural_key.as_str(), reason)
        };

        let dimension_keys = resolver.resolve(line)?;

        if let Some(dates) = calendar {
            if !dates.contains(&line.transaction_date) {
                return Err(fail(ResolutionFailure::DateNotInCalendar(line.transaction_date)));
            }
        }

        let measures = self.policy.derive(line).map_err(fail)?;

        Ok(FactRecord {
            natural_key: line.natural_key.clone(),
            dimension_keys,
            date_key: date_key(line.transaction_date),
            transaction_date: line.transaction_date,
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount: line.discount,
            sales_amount: measures.sales_amount,
            cost_amount: measures.cost_amount,
            profit_amount: measures.profit_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::traits::Warehouse;
    use crate::adapters::memory::MemoryWarehouse;
    use crate::config::parse_config;
    use crate::core::scd::VersionManager;
    use crate::domain::{AttributeValue, Attributes, BusinessKey, CalendarDay, SourceEntity};
    use std::collections::BTreeMap;

    fn config(strict: bool) -> StarloadConfig {
        parse_config(&format!(
            r#"
[source]
kind = "json"

[source.json]
directory = "unused"

[warehouse]
target = "memory"

[load]
strict = {strict}

[[dimensions]]
name = "customer"
table = "dim_customer"
tracked_attributes = ["name"]

[[facts]]
name = "sales"
table = "fact_sales"

[[facts.dimensions]]
dimension = "customer"
"#
        ))
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line(key: &str, customer: &str) -> TransactionLine {
        let mut dimension_keys = BTreeMap::new();
        dimension_keys.insert("customer".to_string(), BusinessKey::new(customer).unwrap());
        TransactionLine {
            natural_key: TransactionKey::new(key).unwrap(),
            dimension_keys,
            quantity: 2,
            unit_price: 10.0,
            discount: 0.0,
            transaction_date: date(2024, 3, 1),
        }
    }

    async fn seeded(config: &StarloadConfig) -> MemoryWarehouse {
        let warehouse = MemoryWarehouse::new();
        let mut uow = warehouse.begin().await.unwrap();

        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), AttributeValue::from("John Doe"));
        VersionManager::new(&config.dimensions[0], date(2024, 1, 1))
            .load(
                uow.as_mut(),
                vec![SourceEntity::new(BusinessKey::new("1").unwrap(), attributes)],
            )
            .await
            .unwrap();
        uow.insert_calendar_days(&config.calendar, &[CalendarDay::from_date(date(2024, 3, 1))])
            .await
            .unwrap();
        uow.commit().await.unwrap();
        warehouse
    }

    #[tokio::test]
    async fn test_loads_once_per_natural_key() {
        let config = config(false);
        let warehouse = seeded(&config).await;
        let loader = FactLoader::new(&config, &config.facts[0]);

        let mut uow = warehouse.begin().await.unwrap();
        let first = loader
            .load(uow.as_mut(), vec![line("T100", "1"), line("T100", "1")])
            .await
            .unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(first.duplicates_in_batch, 1);

        let second = loader.load(uow.as_mut(), vec![line("T100", "1")]).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.already_loaded, 1);
        uow.commit().await.unwrap();

        let rows = warehouse.snapshot().await;
        let rows = rows.fact_rows("fact_sales");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_key, 20240301);
        assert_eq!(rows[0].sales_amount, 20.0);
        assert_eq!(rows[0].cost_amount, 12.0);
        assert_eq!(rows[0].profit_amount, 8.0);
    }

    #[tokio::test]
    async fn test_unresolved_line_is_skipped() {
        let config = config(false);
        let warehouse = seeded(&config).await;
        let loader = FactLoader::new(&config, &config.facts[0]);

        let mut uow = warehouse.begin().await.unwrap();
        let outcome = loader
            .load(uow.as_mut(), vec![line("T100", "1"), line("T101", "99")])
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped(), 1);
        assert_eq!(outcome.resolution_errors[0].natural_key, "T101");
        assert_eq!(outcome.resolution_errors[0].reason, ResolutionFailure::NoCurrentVersion);
    }

    #[tokio::test]
    async fn test_date_missing_from_calendar() {
        let config = config(false);
        let warehouse = seeded(&config).await;
        let loader = FactLoader::new(&config, &config.facts[0]);

        let mut late = line("T102", "1");
        late.transaction_date = date(2024, 3, 2);

        let mut uow = warehouse.begin().await.unwrap();
        let outcome = loader.load(uow.as_mut(), vec![late]).await.unwrap();
        assert_eq!(
            outcome.resolution_errors[0].reason,
            ResolutionFailure::DateNotInCalendar(date(2024, 3, 2))
        );
    }

    #[tokio::test]
    async fn test_strict_mode_aborts() {
        let config = config(true);
        let warehouse = seeded(&config).await;
        let loader = FactLoader::new(&config, &config.facts[0]);

        let mut uow = warehouse.begin().await.unwrap();
        let err = loader
            .load(uow.as_mut(), vec![line("T100", "1"), line("T101", "99")])
            .await
            .unwrap_err();
        assert!(matches!(err, StarloadError::Resolution(_)));
    }
}
