//! Surrogate key resolution
//!
//! Indexes the versions of every dimension a fact references, then maps each
//! line's business keys to surrogate keys. With
//! [`ResolutionMode::AsOfLoad`] only current versions are indexed; with
//! [`ResolutionMode::AsOfTransaction`] the full history is, and the version
//! valid on the transaction date wins.

use crate::adapters::database::traits::UnitOfWork;
use crate::config::{DimensionConfig, FactConfig, ResolutionMode, StarloadConfig};
use crate::domain::{
    BusinessKey, DimensionVersion, ResolutionError, ResolutionFailure, Result, StarloadError,
    SurrogateKey, TransactionLine,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Versions of one dimension grouped by business key
#[derive(Debug, Clone, Default)]
pub struct DimensionIndex {
    versions: HashMap<BusinessKey, Vec<DimensionVersion>>,
}

impl DimensionIndex {
    pub fn new(versions: Vec<DimensionVersion>) -> Self {
        let mut index: HashMap<BusinessKey, Vec<DimensionVersion>> = HashMap::new();
        for version in versions {
            index
                .entry(version.business_key.clone())
                .or_default()
                .push(version);
        }
        for history in index.values_mut() {
            history.sort_by_key(|v| v.version);
        }
        Self { versions: index }
    }

    /// Surrogate key of the current version
    pub fn current(&self, key: &BusinessKey) -> std::result::Result<SurrogateKey, ResolutionFailure> {
        self.versions
            .get(key)
            .and_then(|history| history.iter().rev().find(|v| v.is_current))
            .map(|v| v.surrogate_key)
            .ok_or(ResolutionFailure::NoCurrentVersion)
    }

    /// Surrogate key of the version whose window contains `date`
    pub fn valid_on(
        &self,
        key: &BusinessKey,
        date: NaiveDate,
    ) -> std::result::Result<SurrogateKey, ResolutionFailure> {
        self.versions
            .get(key)
            .and_then(|history| history.iter().find(|v| v.is_valid_on(date)))
            .map(|v| v.surrogate_key)
            .ok_or(ResolutionFailure::NoVersionOnDate(date))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Resolves the dimension references of one fact table
#[derive(Debug, Clone)]
pub struct KeyResolver {
    fact: String,
    mode: ResolutionMode,
    /// In fact reference order
    indexes: Vec<(String, DimensionIndex)>,
}

impl KeyResolver {
    pub fn new(fact: &FactConfig, mode: ResolutionMode, indexes: BTreeMap<String, DimensionIndex>) -> Self {
        let mut indexes = indexes;
        let ordered = fact
            .dimensions
            .iter()
            .map(|reference| {
                let index = indexes.remove(&reference.dimension).unwrap_or_default();
                (reference.dimension.clone(), index)
            })
            .collect();

        Self {
            fact: fact.name.clone(),
            mode,
            indexes: ordered,
        }
    }

    /// Reads and indexes every dimension `fact` references
    ///
    /// Must run after the run's dimension loads so it sees their writes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a reference names an unknown
    /// dimension, or any warehouse error.
    pub async fn load(
        uow: &mut dyn UnitOfWork,
        config: &StarloadConfig,
        fact: &FactConfig,
        mode: ResolutionMode,
    ) -> Result<Self> {
        let mut indexes = BTreeMap::new();
        for reference in &fact.dimensions {
            let dimension: &DimensionConfig = config.dimension(&reference.dimension).ok_or_else(|| {
                StarloadError::Configuration(format!(
                    "fact '{}' references unknown dimension '{}'",
                    fact.name, reference.dimension
                ))
            })?;

            let versions = match mode {
                ResolutionMode::AsOfLoad => uow.current_versions(dimension).await?,
                ResolutionMode::AsOfTransaction => uow.all_versions(dimension).await?,
            };
            let index = DimensionIndex::new(versions);
            tracing::debug!(
                fact = %fact.name,
                dimension = %dimension.name,
                business_keys = index.len(),
                mode = %mode,
                "Indexed dimension for resolution"
            );
            indexes.insert(reference.dimension.clone(), index);
        }

        Ok(Self::new(fact, mode, indexes))
    }

    /// Maps every dimension reference of `line` to a surrogate key
    ///
    /// # Errors
    ///
    /// Returns the first reference that is missing from the line or has no
    /// matching version.
    pub fn resolve(
        &self,
        line: &TransactionLine,
    ) -> std::result::Result<BTreeMap<String, SurrogateKey>, ResolutionError> {
        let mut keys = BTreeMap::new();

        for (dimension, index) in &self.indexes {
            let business_key = line.dimension_keys.get(dimension).ok_or_else(|| {
                ResolutionError::new(
                    &self.fact,
                    line.natural_key.as_str(),
                    ResolutionFailure::MissingReference,
                )
                .with_dimension(dimension)
            })?;

            let found = match self.mode {
                ResolutionMode::AsOfLoad => index.current(business_key),
                ResolutionMode::AsOfTransaction => index.valid_on(business_key, line.transaction_date),
            };
            let surrogate_key = found.map_err(|reason| {
                ResolutionError::new(&self.fact, line.natural_key.as_str(), reason)
                    .with_dimension(dimension)
                    .with_business_key(business_key.as_str())
            })?;

            keys.insert(dimension.clone(), surrogate_key);
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attributes, TransactionKey};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact() -> FactConfig {
        toml::from_str(
            r#"
name = "sales"
table = "fact_sales"

[[dimensions]]
dimension = "customer"
"#,
        )
        .unwrap()
    }

    fn customer_history() -> DimensionIndex {
        let key = BusinessKey::new("1").unwrap();
        DimensionIndex::new(vec![
            DimensionVersion {
                surrogate_key: SurrogateKey::new(10),
                business_key: key.clone(),
                attributes: Attributes::new(),
                version: 1,
                effective_date: date(2024, 1, 1),
                expiry_date: date(2024, 2, 29),
                is_current: false,
            },
            DimensionVersion {
                surrogate_key: SurrogateKey::new(11),
                business_key: key,
                attributes: Attributes::new(),
                version: 2,
                effective_date: date(2024, 3, 1),
                expiry_date: crate::domain::open_expiry(),
                is_current: true,
            },
        ])
    }

    fn resolver(mode: ResolutionMode) -> KeyResolver {
        let mut indexes = BTreeMap::new();
        indexes.insert("customer".to_string(), customer_history());
        KeyResolver::new(&fact(), mode, indexes)
    }

    fn line(customer: Option<&str>, on: NaiveDate) -> TransactionLine {
        let mut dimension_keys = BTreeMap::new();
        if let Some(key) = customer {
            dimension_keys.insert("customer".to_string(), BusinessKey::new(key).unwrap());
        }
        TransactionLine {
            natural_key: TransactionKey::new("T100").unwrap(),
            dimension_keys,
            quantity: 1,
            unit_price: 1.0,
            discount: 0.0,
            transaction_date: on,
        }
    }

    #[test]
    fn test_as_of_load_uses_current_version() {
        let keys = resolver(ResolutionMode::AsOfLoad)
            .resolve(&line(Some("1"), date(2024, 2, 1)))
            .unwrap();
        assert_eq!(keys["customer"], SurrogateKey::new(11));
    }

    #[test]
    fn test_as_of_transaction_uses_version_valid_on_date() {
        let resolver = resolver(ResolutionMode::AsOfTransaction);
        let february = resolver.resolve(&line(Some("1"), date(2024, 2, 1))).unwrap();
        assert_eq!(february["customer"], SurrogateKey::new(10));

        let before = resolver.resolve(&line(Some("1"), date(2023, 12, 31))).unwrap_err();
        assert_eq!(before.reason, ResolutionFailure::NoVersionOnDate(date(2023, 12, 31)));
    }

    #[test]
    fn test_unknown_business_key() {
        let err = resolver(ResolutionMode::AsOfLoad)
            .resolve(&line(Some("99"), date(2024, 3, 1)))
            .unwrap_err();
        assert_eq!(err.reason, ResolutionFailure::NoCurrentVersion);
        assert_eq!(err.business_key.as_deref(), Some("99"));
        assert_eq!(err.dimension.as_deref(), Some("customer"));
    }

    #[test]
    fn test_missing_reference() {
        let err = resolver(ResolutionMode::AsOfLoad)
            .resolve(&line(None, date(2024, 3, 1)))
            .unwrap_err();
        assert_eq!(err.reason, ResolutionFailure::MissingReference);
    }
}
