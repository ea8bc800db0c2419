//! PostgreSQL staging source
//!
//! Reads dimension snapshots and pending transactions from staging tables.
//! Every failure, including a row that cannot be decoded, is reported as
//! [`StarloadError::SourceUnavailable`] so the run aborts before writing.

use super::client::PostgreSQLClient;
use super::models::attribute_from_json;
use super::queries;
use crate::adapters::database::traits::SourceReader;
use crate::config::{DimensionConfig, FactConfig};
use crate::domain::{
    Attributes, BusinessKey, Result, SourceEntity, StarloadError, TransactionKey, TransactionLine,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_postgres::Row;

/// Source reader over PostgreSQL staging tables
pub struct PostgreSQLSource {
    client: Arc<PostgreSQLClient>,
    name: String,
}

impl PostgreSQLSource {
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        let name = format!("postgresql:{}", client.connection_string_safe());
        Self { client, name }
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let conn = self.client.get_connection().await.map_err(|e| self.unavailable(e))?;
        conn.query(sql, &[])
            .await
            .map_err(|e| self.unavailable(StarloadError::from(e)))
    }

    fn unavailable(&self, error: StarloadError) -> StarloadError {
        StarloadError::source_unavailable(&self.name, error.to_string())
    }
}

fn decode_entity(row: &Row, dimension: &DimensionConfig) -> Result<SourceEntity> {
    let business_key = BusinessKey::new(row.try_get::<_, String>(0)?)
        .map_err(StarloadError::Validation)?;
    let as_of_date: Option<NaiveDate> = row.try_get(1)?;

    let mut attributes = Attributes::new();
    for (offset, name) in dimension.attribute_columns().enumerate() {
        let value: Option<Value> = row.try_get(2 + offset)?;
        let value = value.map(attribute_from_json);
        if let Some(value) = value.filter(|v| !v.is_null()) {
            attributes.insert(name.clone(), value);
        }
    }

    Ok(SourceEntity {
        business_key,
        attributes,
        as_of_date,
    })
}

fn decode_line(row: &Row, fact: &FactConfig) -> Result<TransactionLine> {
    let natural_key = TransactionKey::new(row.try_get::<_, String>(0)?)
        .map_err(StarloadError::Validation)?;

    let mut dimension_keys = BTreeMap::new();
    for (offset, reference) in fact.dimensions.iter().enumerate() {
        let key: Option<String> = row.try_get(1 + offset)?;
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            dimension_keys.insert(
                reference.dimension.clone(),
                BusinessKey::new(key).map_err(StarloadError::Validation)?,
            );
        }
    }

    let base = 1 + fact.dimensions.len();
    Ok(TransactionLine {
        natural_key,
        dimension_keys,
        quantity: row.try_get(base)?,
        unit_price: row.try_get(base + 1)?,
        discount: row.try_get(base + 2)?,
        transaction_date: row.try_get(base + 3)?,
    })
}

#[async_trait]
impl SourceReader for PostgreSQLSource {
    async fn read_entities(&self, dimension: &DimensionConfig) -> Result<Vec<SourceEntity>> {
        let staging = dimension.staging.as_ref().ok_or_else(|| {
            StarloadError::Configuration(format!(
                "dimension '{}' has no staging table configured",
                dimension.name
            ))
        })?;

        let rows = self
            .query(&queries::select_staged_entities(dimension, staging))
            .await?;
        tracing::debug!(dimension = %dimension.name, rows = rows.len(), "Read staging snapshot");

        rows.iter()
            .map(|row| decode_entity(row, dimension).map_err(|e| self.unavailable(e)))
            .collect()
    }

    async fn read_pending_transactions(&self, fact: &FactConfig) -> Result<Vec<TransactionLine>> {
        let staging = fact.staging.as_ref().ok_or_else(|| {
            StarloadError::Configuration(format!(
                "fact '{}' has no staging table configured",
                fact.name
            ))
        })?;

        let rows = self
            .query(&queries::select_staged_transactions(fact, staging))
            .await?;
        tracing::debug!(fact = %fact.name, rows = rows.len(), "Read pending transactions");

        rows.iter()
            .map(|row| decode_line(row, fact).map_err(|e| self.unavailable(e)))
            .collect()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
