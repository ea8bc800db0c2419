//! Store abstraction traits
//!
//! A run reads everything it needs through a [`SourceReader`] and writes
//! through exactly one [`UnitOfWork`] obtained from a [`Warehouse`]. Nothing a
//! unit of work does is visible to other readers until
//! [`UnitOfWork::commit`] succeeds; dropping it or calling
//! [`UnitOfWork::rollback`] discards every write.

use crate::config::{CalendarConfig, DimensionConfig, FactConfig, StarloadConfig};
use crate::domain::{
    BusinessKey, CalendarDay, DimensionVersion, FactRecord, NewVersion, Result, SourceEntity,
    SurrogateKey, TransactionKey, TransactionLine,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};

/// Read-only access to the operational source feeds
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Reads the current snapshot of a dimension's source entities
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::StarloadError::SourceUnavailable`] if the feed
    /// cannot be read or a row cannot be decoded.
    async fn read_entities(&self, dimension: &DimensionConfig) -> Result<Vec<SourceEntity>>;

    /// Reads the pending transaction lines of a fact table
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::StarloadError::SourceUnavailable`] if the feed
    /// cannot be read or a row cannot be decoded.
    async fn read_pending_transactions(&self, fact: &FactConfig) -> Result<Vec<TransactionLine>>;

    /// Human-readable source name for logs and errors
    fn source_name(&self) -> &str;
}

/// Row counts reported for a table by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub name: String,
    pub table: String,
    pub total_rows: u64,
    /// Current versions for dimensions, `None` for facts and the calendar
    pub current_rows: Option<u64>,
}

/// Target star schema
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Checks that the warehouse is reachable
    async fn test_connection(&self) -> Result<()>;

    /// Starts the run's single unit of work
    ///
    /// Only one unit of work is open at a time; a second `begin` waits for the
    /// first to finish (memory) or for the advisory lock (PostgreSQL).
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Full version history of one business key, ordered by version
    async fn history(
        &self,
        dimension: &DimensionConfig,
        business_key: &BusinessKey,
    ) -> Result<Vec<DimensionVersion>>;

    /// Row counts for every configured table
    async fn table_stats(&self, config: &StarloadConfig) -> Result<Vec<TableStats>>;

    /// Human-readable warehouse name for logs
    fn warehouse_name(&self) -> &str;
}

/// Writes of one run, applied atomically on commit
#[async_trait]
pub trait UnitOfWork: Send {
    /// Every version with `is_current = true`, in business key order
    ///
    /// More than one current version for a key is returned as-is so the
    /// caller can report the violation.
    async fn current_versions(&mut self, dimension: &DimensionConfig)
        -> Result<Vec<DimensionVersion>>;

    /// Business keys that have history but no current version
    async fn keys_without_current(&mut self, dimension: &DimensionConfig)
        -> Result<Vec<BusinessKey>>;

    /// Every version of the dimension, used for as-of-transaction resolution
    async fn all_versions(&mut self, dimension: &DimensionConfig) -> Result<Vec<DimensionVersion>>;

    /// Closes the current version of `business_key`
    ///
    /// Sets `is_current = false` and `expiry_date = as_of_date - 1 day`.
    ///
    /// # Returns
    ///
    /// The number of rows closed; `0` when no current version exists.
    async fn close_current_version(
        &mut self,
        dimension: &DimensionConfig,
        business_key: &BusinessKey,
        as_of_date: NaiveDate,
    ) -> Result<u64>;

    /// Inserts a current, open version and returns its surrogate key
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::StarloadError::ConstraintViolation`] if the
    /// key already has a current version.
    async fn insert_version(
        &mut self,
        dimension: &DimensionConfig,
        version: &NewVersion,
    ) -> Result<SurrogateKey>;

    /// Subset of `keys` already present in the fact table
    async fn existing_transaction_keys(
        &mut self,
        fact: &FactConfig,
        keys: &[TransactionKey],
    ) -> Result<HashSet<TransactionKey>>;

    /// Inserts resolved fact rows as one batch
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::StarloadError::ConstraintViolation`] if a
    /// natural key is already loaded.
    async fn insert_facts(&mut self, fact: &FactConfig, records: &[FactRecord]) -> Result<u64>;

    /// Dates already present in the date dimension within `[start, end]`
    async fn existing_calendar_dates(
        &mut self,
        calendar: &CalendarConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>>;

    /// Appends calendar rows
    async fn insert_calendar_days(
        &mut self,
        calendar: &CalendarConfig,
        days: &[CalendarDay],
    ) -> Result<u64>;

    /// Makes every write of this unit of work visible
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write of this unit of work
    async fn rollback(self: Box<Self>) -> Result<()>;
}
