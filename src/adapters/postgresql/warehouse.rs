//! PostgreSQL warehouse
//!
//! A unit of work is one pooled connection inside `BEGIN ... COMMIT`. When an
//! advisory lock key is configured the transaction takes
//! `pg_advisory_xact_lock` first, so concurrent runs against the same
//! warehouse are serialized and the lock is released with the transaction.

use super::client::PostgreSQLClient;
use super::models::{version_from_row, TextParam};
use super::queries::{self, VersionFilter};
use crate::adapters::database::traits::{TableStats, UnitOfWork, Warehouse};
use crate::config::{CalendarConfig, DimensionConfig, FactConfig, StarloadConfig};
use crate::domain::{
    attribute_or_null, open_expiry, BusinessKey, CalendarDay, DimensionVersion, FactRecord,
    NewVersion, Result, StarloadError, SurrogateKey, TransactionKey,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::Object;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// PostgreSQL caps a statement at 65535 bind parameters
const MAX_PARAMETERS: usize = 65_535;

/// Rows per multi-row insert
const MAX_ROWS_PER_INSERT: usize = 1_000;

/// Natural keys per `= ANY($1)` lookup
const LOOKUP_CHUNK: usize = 5_000;

type Param<'a> = &'a (dyn ToSql + Sync);

fn rows_per_insert(width: usize) -> usize {
    (MAX_PARAMETERS / width).clamp(1, MAX_ROWS_PER_INSERT)
}

fn attribute_names(dimension: &DimensionConfig) -> Vec<&String> {
    dimension.attribute_columns().collect()
}

/// Warehouse over a PostgreSQL star schema
pub struct PostgreSQLWarehouse {
    client: Arc<PostgreSQLClient>,
    name: String,
}

impl PostgreSQLWarehouse {
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        let name = format!("postgresql:{}", client.connection_string_safe());
        Self { client, name }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl Warehouse for PostgreSQLWarehouse {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute("BEGIN").await?;

        let mut uow = PgUnitOfWork { conn: Some(conn) };
        if let Some(key) = self.client.config().advisory_lock_key {
            tracing::debug!(lock_key = key, "Waiting for advisory lock");
            uow.conn()?
                .execute("SELECT pg_advisory_xact_lock($1)", &[&key])
                .await?;
        }

        tracing::debug!("PostgreSQL unit of work started");
        Ok(Box::new(uow))
    }

    async fn history(
        &self,
        dimension: &DimensionConfig,
        business_key: &BusinessKey,
    ) -> Result<Vec<DimensionVersion>> {
        let conn = self.client.get_connection().await?;
        let sql = queries::select_versions(dimension, VersionFilter::BusinessKey);
        let rows = conn.query(sql.as_str(), &[&business_key.as_str()]).await?;

        let names = attribute_names(dimension);
        rows.iter().map(|row| version_from_row(row, &names)).collect()
    }

    async fn table_stats(&self, config: &StarloadConfig) -> Result<Vec<TableStats>> {
        let conn = self.client.get_connection().await?;
        let mut stats = Vec::new();

        for dimension in &config.dimensions {
            let row = conn
                .query_one(queries::count_dimension_rows(dimension).as_str(), &[])
                .await?;
            stats.push(TableStats {
                name: dimension.name.clone(),
                table: dimension.table.clone(),
                total_rows: row.try_get::<_, i64>(0)?.max(0) as u64,
                current_rows: Some(row.try_get::<_, i64>(1)?.max(0) as u64),
            });
        }
        for fact in &config.facts {
            let row = conn
                .query_one(queries::count_rows(&fact.table).as_str(), &[])
                .await?;
            stats.push(TableStats {
                name: fact.name.clone(),
                table: fact.table.clone(),
                total_rows: row.try_get::<_, i64>(0)?.max(0) as u64,
                current_rows: None,
            });
        }
        if config.calendar.enabled {
            let row = conn
                .query_one(queries::count_rows(&config.calendar.table).as_str(), &[])
                .await?;
            stats.push(TableStats {
                name: "calendar".to_string(),
                table: config.calendar.table.clone(),
                total_rows: row.try_get::<_, i64>(0)?.max(0) as u64,
                current_rows: None,
            });
        }

        Ok(stats)
    }

    fn warehouse_name(&self) -> &str {
        &self.name
    }
}

/// One open transaction
///
/// If dropped before `commit` or `rollback`, the connection is detached from
/// the pool and closed, which makes the server roll the transaction back.
struct PgUnitOfWork {
    conn: Option<Object>,
}

impl PgUnitOfWork {
    fn conn(&self) -> Result<&Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| StarloadError::Connection("unit of work already finished".to_string()))
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| StarloadError::Connection("unit of work already finished".to_string()))?;

        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The transaction state is unknown; never hand this connection back.
                drop(Object::take(conn));
                Err(e.into())
            }
        }
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("PostgreSQL unit of work dropped without commit, rolling back");
            drop(Object::take(conn));
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn current_versions(
        &mut self,
        dimension: &DimensionConfig,
    ) -> Result<Vec<DimensionVersion>> {
        let sql = queries::select_versions(dimension, VersionFilter::Current);
        let rows = self.conn()?.query(sql.as_str(), &[]).await?;
        let names = attribute_names(dimension);
        rows.iter().map(|row| version_from_row(row, &names)).collect()
    }

    async fn keys_without_current(
        &mut self,
        dimension: &DimensionConfig,
    ) -> Result<Vec<BusinessKey>> {
        let sql = queries::select_keys_without_current(dimension);
        let rows = self.conn()?.query(sql.as_str(), &[]).await?;
        rows.iter()
            .map(|row| {
                let key: String = row.try_get(0)?;
                BusinessKey::new(key).map_err(StarloadError::Validation)
            })
            .collect()
    }

    async fn all_versions(&mut self, dimension: &DimensionConfig) -> Result<Vec<DimensionVersion>> {
        let sql = queries::select_versions(dimension, VersionFilter::All);
        let rows = self.conn()?.query(sql.as_str(), &[]).await?;
        let names = attribute_names(dimension);
        rows.iter().map(|row| version_from_row(row, &names)).collect()
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

        let sql = queries::close_current_version(dimension);
        let key = TextParam(business_key.as_str());
        Ok(self.conn()?.execute(sql.as_str(), &[&key, &expiry]).await?)
    }

    async fn insert_version(
        &mut self,
        dimension: &DimensionConfig,
        version: &NewVersion,
    ) -> Result<SurrogateKey> {
        let key = TextParam(version.business_key.as_str());
        let number = i32::try_from(version.version).map_err(|_| {
            StarloadError::invariant(
                &dimension.name,
                version.business_key.as_str(),
                format!("version {} out of range", version.version),
            )
        })?;
        let expiry = open_expiry();

        let mut params: Vec<Param<'_>> = vec![&key, &number, &version.effective_date, &expiry];
        for name in dimension.attribute_columns() {
            params.push(attribute_or_null(&version.attributes, name));
        }

        let sql = queries::insert_version(dimension);
        let row = self.conn()?.query_one(sql.as_str(), &params).await?;
        Ok(SurrogateKey::new(row.try_get(0)?))
    }

    async fn existing_transaction_keys(
        &mut self,
        fact: &FactConfig,
        keys: &[TransactionKey],
    ) -> Result<HashSet<TransactionKey>> {
        let sql = queries::select_existing_transaction_keys(fact);
        let mut existing = HashSet::new();

        for chunk in keys.chunks(LOOKUP_CHUNK) {
            let candidates: Vec<&str> = chunk.iter().map(TransactionKey::as_str).collect();
            let rows = self.conn()?.query(sql.as_str(), &[&candidates]).await?;
            for row in rows {
                let key: String = row.try_get(0)?;
                existing.insert(TransactionKey::new(key).map_err(StarloadError::Validation)?);
            }
        }

        Ok(existing)
    }

    async fn insert_facts(&mut self, fact: &FactConfig, records: &[FactRecord]) -> Result<u64> {
        let width = queries::fact_row_width(fact);
        let mut inserted = 0;

        for chunk in records.chunks(rows_per_insert(width)) {
            let natural_keys: Vec<TextParam<'_>> =
                chunk.iter().map(|r| TextParam(r.natural_key.as_str())).collect();
            let foreign_keys: Vec<Vec<i64>> = chunk
                .iter()
                .map(|record| {
                    fact.dimensions
                        .iter()
                        .map(|reference| {
                            record
                                .dimension_keys
                                .get(&reference.dimension)
                                .map(|sk| sk.value())
                                .ok_or_else(|| {
                                    StarloadError::Validation(format!(
                                        "fact '{}' row '{}' has no surrogate key for '{}'",
                                        fact.name, record.natural_key, reference.dimension
                                    ))
                                })
                        })
                        .collect::<Result<Vec<i64>>>()
                })
                .collect::<Result<_>>()?;

            let mut params: Vec<Param<'_>> = Vec::with_capacity(chunk.len() * width);
            for ((record, natural_key), fks) in chunk.iter().zip(&natural_keys).zip(&foreign_keys) {
                params.push(natural_key);
                for fk in fks {
                    params.push(fk);
                }
                params.push(&record.date_key);
                params.push(&record.transaction_date);
                params.push(&record.quantity);
                params.push(&record.unit_price);
                params.push(&record.discount);
                params.push(&record.sales_amount);
                params.push(&record.cost_amount);
                params.push(&record.profit_amount);
            }

            let sql = queries::insert_facts(fact, chunk.len());
            inserted += self.conn()?.execute(sql.as_str(), &params).await?;
        }

        Ok(inserted)
    }

    async fn existing_calendar_dates(
        &mut self,
        calendar: &CalendarConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        let sql = queries::select_calendar_dates(calendar);
        let rows = self.conn()?.query(sql.as_str(), &[&start, &end]).await?;
        rows.iter()
            .map(|row| row.try_get::<_, NaiveDate>(0).map_err(StarloadError::from))
            .collect()
    }

    async fn insert_calendar_days(
        &mut self,
        calendar: &CalendarConfig,
        days: &[CalendarDay],
    ) -> Result<u64> {
        let mut inserted = 0;

        for chunk in days.chunks(rows_per_insert(queries::CALENDAR_ROW_WIDTH)) {
            // Derived parts are small; the driver has no unsigned integer mapping.
            let parts: Vec<[i32; 5]> = chunk
                .iter()
                .map(|d| {
                    [
                        d.quarter as i32,
                        d.month as i32,
                        d.week_of_year as i32,
                        d.day_of_month as i32,
                        d.day_of_week as i32,
                    ]
                })
                .collect();

            let mut params: Vec<Param<'_>> =
                Vec::with_capacity(chunk.len() * queries::CALENDAR_ROW_WIDTH);
            for (day, p) in chunk.iter().zip(&parts) {
                params.push(&day.date_key);
                params.push(&day.date);
                params.push(&day.year);
                params.push(&p[0]);
                params.push(&p[1]);
                params.push(&day.month_name);
                params.push(&p[2]);
                params.push(&p[3]);
                params.push(&p[4]);
                params.push(&day.day_name);
                params.push(&day.is_weekend);
            }

            let sql = queries::insert_calendar_days(calendar, chunk.len());
            inserted += self.conn()?.execute(sql.as_str(), &params).await?;
        }

        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await?;
        tracing::debug!("PostgreSQL unit of work committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await?;
        tracing::debug!("PostgreSQL unit of work rolled back");
        Ok(())
    }
}
