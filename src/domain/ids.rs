//! Domain identifier types with validation
//!
//! Business keys and transaction keys come from the operational source and are
//! kept as opaque strings; surrogate keys are assigned by the warehouse.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Accepts either a JSON string or an integer for a natural key
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Integer(i64),
}

impl RawKey {
    fn into_string(self) -> String {
        match self {
            RawKey::Text(s) => s,
            RawKey::Integer(i) => i.to_string(),
        }
    }
}

/// Natural identifier of a dimension entity in the source system
///
/// A business key recurs across all versions of the same entity.
///
/// # Examples
///
/// ```
/// use starload::domain::ids::BusinessKey;
/// use std::str::FromStr;
///
/// let key = BusinessKey::from_str("C-1001").unwrap();
/// assert_eq!(key.as_str(), "C-1001");
/// assert!(BusinessKey::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BusinessKey(String);

impl BusinessKey {
    /// Creates a new BusinessKey from a string
    ///
    /// # Arguments
    ///
    /// * `key` - The business key string
    ///
    /// # Returns
    ///
    /// Returns `Ok(BusinessKey)` if the key is non-empty, `Err` otherwise
    pub fn new(key: impl Into<String>) -> Result<Self, String> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err("Business key cannot be empty".to_string());
        }
        Ok(Self(key))
    }

    /// Returns the business key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for BusinessKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawKey::deserialize(deserializer)?;
        BusinessKey::new(raw.into_string()).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BusinessKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for BusinessKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Natural key of an originating business transaction
///
/// Used as the idempotency guard of fact loads: a transaction key is loaded at
/// most once per fact table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TransactionKey(String);

impl TransactionKey {
    /// Creates a new TransactionKey, rejecting empty keys
    pub fn new(key: impl Into<String>) -> Result<Self, String> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err("Transaction key cannot be empty".to_string());
        }
        Ok(Self(key))
    }

    /// Returns the transaction key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for TransactionKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawKey::deserialize(deserializer)?;
        TransactionKey::new(raw.into_string()).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TransactionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Warehouse-assigned identifier of a single dimension version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurrogateKey(i64);

impl SurrogateKey {
    pub fn new(key: i64) -> Self {
        Self(key)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SurrogateKey {
    fn from(key: i64) -> Self {
        Self(key)
    }
}
