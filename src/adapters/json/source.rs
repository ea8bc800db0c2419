//! JSON directory source
//!
//! Each dimension and fact is read from a JSON array of flat objects in the
//! configured directory (`<name>.json` unless `source_file` is set).
//!
//! Dimension rows carry `business_key`, an optional `as_of_date` and one key
//! per configured attribute:
//!
//! ```json
//! [{"business_key": 1, "name": "John Doe", "city": "Leeds", "as_of_date": "2024-03-01"}]
//! ```
//!
//! Fact rows carry `natural_key`, `quantity`, `unit_price`, an optional
//! `discount`, `transaction_date` and one business key per dimension
//! reference under the reference's source column (`<dimension>_id`):
//!
//! ```json
//! [{"natural_key": "T100", "customer_id": 1, "quantity": 2, "unit_price": 9.5,
//!   "transaction_date": "2024-03-01"}]
//! ```

use crate::adapters::database::traits::SourceReader;
use crate::config::{DimensionConfig, FactConfig, JsonSourceConfig};
use crate::domain::{
    AttributeValue, Attributes, BusinessKey, Result, SourceEntity, StarloadError, TransactionKey,
    TransactionLine,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

type JsonRow = Map<String, Value>;

/// Source reader over a directory of JSON files
pub struct JsonDirectorySource {
    directory: PathBuf,
    name: String,
}

impl JsonDirectorySource {
    pub fn new(config: &JsonSourceConfig) -> Self {
        let directory = PathBuf::from(&config.directory);
        Self {
            name: format!("json:{}", directory.display()),
            directory,
        }
    }

    async fn read_rows(&self, file_name: &str) -> Result<Vec<JsonRow>> {
        let path = self.directory.join(file_name);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| self.unavailable(&path, e.to_string()))?;

        let rows: Vec<JsonRow> = serde_json::from_str(&contents)
            .map_err(|e| self.unavailable(&path, format!("expected an array of objects: {e}")))?;

        tracing::debug!(
            path = %path.display(),
            rows = rows.len(),
            "Read JSON source file"
        );
        Ok(rows)
    }

    fn unavailable(&self, path: &Path, message: String) -> StarloadError {
        StarloadError::source_unavailable(&self.name, format!("{}: {}", path.display(), message))
    }
}

fn field<T: DeserializeOwned>(row: &JsonRow, name: &str, index: usize) -> std::result::Result<T, String> {
    let value = row
        .get(name)
        .cloned()
        .ok_or_else(|| format!("row {index}: missing field '{name}'"))?;
    serde_json::from_value(value).map_err(|e| format!("row {index}: field '{name}': {e}"))
}

fn optional_field<T: DeserializeOwned>(
    row: &JsonRow,
    name: &str,
    index: usize,
) -> std::result::Result<Option<T>, String> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| format!("row {index}: field '{name}': {e}")),
    }
}

fn decode_entity(
    row: &JsonRow,
    dimension: &DimensionConfig,
    index: usize,
) -> std::result::Result<SourceEntity, String> {
    let business_key: BusinessKey = field(row, "business_key", index)?;
    let as_of_date: Option<NaiveDate> = optional_field(row, "as_of_date", index)?;

    let mut attributes = Attributes::new();
    for name in dimension.attribute_columns() {
        if let Some(value) = optional_field::<AttributeValue>(row, name, index)? {
            attributes.insert(name.clone(), value);
        }
    }

    Ok(SourceEntity {
        business_key,
        attributes,
        as_of_date,
    })
}

fn decode_line(
    row: &JsonRow,
    fact: &FactConfig,
    index: usize,
) -> std::result::Result<TransactionLine, String> {
    let mut dimension_keys = BTreeMap::new();
    for reference in &fact.dimensions {
        if let Some(key) = optional_field::<BusinessKey>(row, &reference.source_column(), index)? {
            dimension_keys.insert(reference.dimension.clone(), key);
        }
    }

    Ok(TransactionLine {
        natural_key: field::<TransactionKey>(row, "natural_key", index)?,
        dimension_keys,
        quantity: field(row, "quantity", index)?,
        unit_price: field(row, "unit_price", index)?,
        discount: optional_field(row, "discount", index)?.unwrap_or(0.0),
        transaction_date: field(row, "transaction_date", index)?,
    })
}

#[async_trait]
impl SourceReader for JsonDirectorySource {
    async fn read_entities(&self, dimension: &DimensionConfig) -> Result<Vec<SourceEntity>> {
        let file_name = dimension.json_file_name();
        let rows = self.read_rows(&file_name).await?;

        rows.iter()
            .enumerate()
            .map(|(index, row)| decode_entity(row, dimension, index))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(|e| self.unavailable(&self.directory.join(&file_name), e))
    }

    async fn read_pending_transactions(&self, fact: &FactConfig) -> Result<Vec<TransactionLine>> {
        let file_name = fact.json_file_name();
        let rows = self.read_rows(&file_name).await?;

        rows.iter()
            .enumerate()
            .map(|(index, row)| decode_line(row, fact, index))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(|e| self.unavailable(&self.directory.join(&file_name), e))
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
