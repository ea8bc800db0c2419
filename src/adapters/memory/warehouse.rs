//! In-memory warehouse
//!
//! Holds the star schema in process memory. A unit of work owns the state
//! mutex for its whole lifetime and writes to a staged copy, which replaces the
//! shared state only on commit. Used by tests and by configuration dry runs.

use crate::adapters::database::traits::{TableStats, UnitOfWork, Warehouse};
use crate::config::{CalendarConfig, DimensionConfig, FactConfig, StarloadConfig};
use crate::domain::{
    BusinessKey, CalendarDay, DimensionVersion, FactRecord, NewVersion, Result, StarloadError,
    SurrogateKey, TransactionKey,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Complete warehouse contents, keyed by table name
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub dimensions: BTreeMap<String, Vec<DimensionVersion>>,
    pub facts: BTreeMap<String, Vec<FactRecord>>,
    pub calendar: BTreeMap<String, BTreeMap<NaiveDate, CalendarDay>>,
    next_surrogate_key: i64,
}

impl MemoryState {
    /// Versions of a dimension table (empty if never written)
    pub fn versions(&self, table: &str) -> &[DimensionVersion] {
        self.dimensions.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows of a fact table (empty if never written)
    pub fn fact_rows(&self, table: &str) -> &[FactRecord] {
        self.facts.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of calendar rows in a date dimension table
    pub fn calendar_len(&self, table: &str) -> usize {
        self.calendar.get(table).map(BTreeMap::len).unwrap_or(0)
    }

    fn allocate_key(&mut self) -> SurrogateKey {
        self.next_surrogate_key += 1;
        SurrogateKey::new(self.next_surrogate_key)
    }
}

/// Warehouse backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<MemoryState>>,
    fail_commit: Arc<AtomicBool>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Writes a version directly into committed state, bypassing the manager
    ///
    /// The surrogate key of `version` is replaced by a freshly allocated one.
    pub async fn seed_version(&self, table: &str, mut version: DimensionVersion) -> SurrogateKey {
        let mut state = self.state.lock().await;
        let key = state.allocate_key();
        version.surrogate_key = key;
        state
            .dimensions
            .entry(table.to_string())
            .or_default()
            .push(version);
        key
    }

    /// Makes every following commit fail with a database error
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        tracing::debug!("Memory unit of work started");
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
        }))
    }

    async fn history(
        &self,
        dimension: &DimensionConfig,
        business_key: &BusinessKey,
    ) -> Result<Vec<DimensionVersion>> {
        let state = self.state.lock().await;
        let mut history: Vec<DimensionVersion> = state
            .versions(&dimension.table)
            .iter()
            .filter(|v| &v.business_key == business_key)
            .cloned()
            .collect();
        history.sort_by_key(|v| v.version);
        Ok(history)
    }

    async fn table_stats(&self, config: &StarloadConfig) -> Result<Vec<TableStats>> {
        let state = self.state.lock().await;
        let mut stats = Vec::new();

        for dimension in &config.dimensions {
            let versions = state.versions(&dimension.table);
            stats.push(TableStats {
                name: dimension.name.clone(),
                table: dimension.table.clone(),
                total_rows: versions.len() as u64,
                current_rows: Some(versions.iter().filter(|v| v.is_current).count() as u64),
            });
        }
        for fact in &config.facts {
            stats.push(TableStats {
                name: fact.name.clone(),
                table: fact.table.clone(),
                total_rows: state.fact_rows(&fact.table).len() as u64,
                current_rows: None,
            });
        }
        if config.calendar.enabled {
            stats.push(TableStats {
                name: "calendar".to_string(),
                table: config.calendar.table.clone(),
                total_rows: state.calendar_len(&config.calendar.table) as u64,
                current_rows: None,
            });
        }

        Ok(stats)
    }

    fn warehouse_name(&self) -> &str {
        "memory"
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_commit: bool,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn current_versions(
        &mut self,
        dimension: &DimensionConfig,
    ) -> Result<Vec<DimensionVersion>> {
        let mut current: Vec<DimensionVersion> = self
            .staged
            .versions(&dimension.table)
            .iter()
            .filter(|v| v.is_current)
            .cloned()
            .collect();
        current.sort_by(|a, b| a.business_key.cmp(&b.business_key).then(a.version.cmp(&b.version)));
        Ok(current)
    }

    async fn keys_without_current(
        &mut self,
        dimension: &DimensionConfig,
    ) -> Result<Vec<BusinessKey>> {
        let versions = self.staged.versions(&dimension.table);
        let with_current: HashSet<&BusinessKey> = versions
            .iter()
            .filter(|v| v.is_current)
            .map(|v| &v.business_key)
            .collect();
        let orphans: BTreeSet<BusinessKey> = versions
            .iter()
            .filter(|v| !with_current.contains(&v.business_key))
            .map(|v| v.business_key.clone())
            .collect();
        Ok(orphans.into_iter().collect())
    }

    async fn all_versions(&mut self, dimension: &DimensionConfig) -> Result<Vec<DimensionVersion>> {
        let mut versions = self.staged.versions(&dimension.table).to_vec();
        versions.sort_by(|a, b| a.business_key.cmp(&b.business_key).then(a.version.cmp(&b.version)));
        Ok(versions)
    }

    async fn close_current_version(
        &mut self,
        dimension: &DimensionConfig,
        business_key: &BusinessKey,
        as_of_date: NaiveDate,
    ) -> Result<u64> {
        let expiry = as_of_date.pred_opt().ok_or_else(|| {
            StarloadError::invariant(
                &dimension.name,
                business_key.as_str(),
                format!("cannot close a version as of {as_of_date}"),
            )
        })?;

        let mut closed = 0;
        if let Some(versions) = self.staged.dimensions.get_mut(&dimension.table) {
            for version in versions
                .iter_mut()
                .filter(|v| v.is_current && &v.business_key == business_key)
            {
                version.is_current = false;
                version.expiry_date = expiry;
                closed += 1;
            }
        }
        Ok(closed)
    }

    async fn insert_version(
        &mut self,
        dimension: &DimensionConfig,
        version: &NewVersion,
    ) -> Result<SurrogateKey> {
        let already_current = self
            .staged
            .versions(&dimension.table)
            .iter()
            .any(|v| v.is_current && v.business_key == version.business_key);
        if already_current {
            return Err(StarloadError::ConstraintViolation(format!(
                "{}: business key '{}' already has a current version",
                dimension.table, version.business_key
            )));
        }

        let key = self.staged.allocate_key();
        self.staged
            .dimensions
            .entry(dimension.table.clone())
            .or_default()
            .push(version.clone().into_version(key));
        Ok(key)
    }

    async fn existing_transaction_keys(
        &mut self,
        fact: &FactConfig,
        keys: &[TransactionKey],
    ) -> Result<HashSet<TransactionKey>> {
        let wanted: HashSet<&TransactionKey> = keys.iter().collect();
        Ok(self
            .staged
            .fact_rows(&fact.table)
            .iter()
            .filter(|r| wanted.contains(&r.natural_key))
            .map(|r| r.natural_key.clone())
            .collect())
    }

    async fn insert_facts(&mut self, fact: &FactConfig, records: &[FactRecord]) -> Result<u64> {
        let rows = self.staged.facts.entry(fact.table.clone()).or_default();
        let mut loaded: HashSet<TransactionKey> =
            rows.iter().map(|r| r.natural_key.clone()).collect();

        for record in records {
            if !loaded.insert(record.natural_key.clone()) {
                return Err(StarloadError::ConstraintViolation(format!(
                    "{}: natural key '{}' is already loaded",
                    fact.table, record.natural_key
                )));
            }
        }

        rows.extend(records.iter().cloned());
        Ok(records.len() as u64)
    }

    async fn existing_calendar_dates(
        &mut self,
        calendar: &CalendarConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        Ok(self
            .staged
            .calendar
            .get(&calendar.table)
            .map(|days| days.range(start..=end).map(|(date, _)| *date).collect())
            .unwrap_or_default())
    }

    async fn insert_calendar_days(
        &mut self,
        calendar: &CalendarConfig,
        days: &[CalendarDay],
    ) -> Result<u64> {
        let table = self.staged.calendar.entry(calendar.table.clone()).or_default();
        for day in days {
            if table.insert(day.date, day.clone()).is_some() {
                return Err(StarloadError::ConstraintViolation(format!(
                    "{}: date {} already exists",
                    calendar.table, day.date
                )));
            }
        }
        Ok(days.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit {
            return Err(StarloadError::Database(
                "memory warehouse configured to fail commits".to_string(),
            ));
        }
        let MemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        tracing::debug!("Memory unit of work committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!("Memory unit of work rolled back");
        Ok(())
    }
}
