//! Type-2 dimension models
//!
//! A [`DimensionVersion`] is one row of a slowly changing dimension. All
//! versions of a business key form a contiguous, non-overlapping sequence of
//! validity windows, and exactly one of them is current.

use super::attributes::Attributes;
use super::ids::{BusinessKey, SurrogateKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Expiry date carried by the current version of a business key (9999-12-31)
pub fn open_expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// An entity as reported by the source feed for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntity {
    /// Natural identifier in the source system
    pub business_key: BusinessKey,

    /// Current attribute values (tracked and passive)
    #[serde(default)]
    pub attributes: Attributes,

    /// Date the snapshot was taken; the run date is used when absent
    #[serde(default)]
    pub as_of_date: Option<NaiveDate>,
}

impl SourceEntity {
    pub fn new(business_key: BusinessKey, attributes: Attributes) -> Self {
        Self {
            business_key,
            attributes,
            as_of_date: None,
        }
    }

    pub fn with_as_of_date(mut self, as_of_date: NaiveDate) -> Self {
        self.as_of_date = Some(as_of_date);
        self
    }

    /// The date this entity's change takes effect
    pub fn effective_on(&self, run_date: NaiveDate) -> NaiveDate {
        self.as_of_date.unwrap_or(run_date)
    }
}

/// One persisted version of a dimension entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionVersion {
    pub surrogate_key: SurrogateKey,
    pub business_key: BusinessKey,
    pub attributes: Attributes,
    pub version: u32,
    pub effective_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub is_current: bool,
}

impl DimensionVersion {
    /// Whether `date` falls inside `[effective_date, expiry_date]`
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.effective_date <= date && date <= self.expiry_date
    }

    /// Whether the version still carries the open expiry sentinel
    pub fn is_open(&self) -> bool {
        self.expiry_date == open_expiry()
    }
}

/// A version about to be inserted; the warehouse assigns the surrogate key
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub business_key: BusinessKey,
    pub attributes: Attributes,
    pub version: u32,
    pub effective_date: NaiveDate,
}

impl NewVersion {
    /// Materializes the version once the warehouse has assigned its key
    pub fn into_version(self, surrogate_key: SurrogateKey) -> DimensionVersion {
        DimensionVersion {
            surrogate_key,
            business_key: self.business_key,
            attributes: self.attributes,
            version: self.version,
            effective_date: self.effective_date,
            expiry_date: open_expiry(),
            is_current: true,
        }
    }
}

/// Checks that a key's history is well formed
///
/// Versions must be numbered 1..=n in order, windows must be contiguous
/// (each expiry is the day before the next effective date), and only the last
/// version may be current and open.
///
/// # Errors
///
/// Returns a description of the first violation found.
pub fn check_history(history: &[DimensionVersion]) -> Result<(), String> {
    let mut sorted: Vec<&DimensionVersion> = history.iter().collect();
    sorted.sort_by_key(|v| v.version);

    for (index, version) in sorted.iter().enumerate() {
        let expected = index as u32 + 1;
        if version.version != expected {
            return Err(format!(
                "expected version {expected}, found {}",
                version.version
            ));
        }
        if version.expiry_date < version.effective_date {
            return Err(format!("version {} has an inverted window", version.version));
        }

        let is_last = index + 1 == sorted.len();
        if is_last {
            if !version.is_current || !version.is_open() {
                return Err(format!(
                    "latest version {} is not current and open",
                    version.version
                ));
            }
        } else {
            let next = sorted[index + 1];
            if version.is_current {
                return Err(format!("superseded version {} is still current", version.version));
            }
            if version.expiry_date.succ_opt() != Some(next.effective_date) {
                return Err(format!(
                    "gap or overlap between version {} and {}",
                    version.version, next.version
                ));
            }
        }
    }

    Ok(())
}
