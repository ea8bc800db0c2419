//! Domain error types
//!
//! This module defines the error hierarchy for Starload. Structural errors
//! (invariant violations, unavailable sources, constraint violations) abort the
//! run's unit of work; [`ResolutionError`]s are collected per fact row and only
//! abort a run in strict mode. No variant exposes third-party types.

use chrono::NaiveDate;
use thiserror::Error;

/// Main Starload error type
#[derive(Debug, Error)]
pub enum StarloadError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A source feed could not be read; raised before any write happens
    #[error("Source unavailable ({source_name}): {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    /// The same business key appears more than once in a snapshot with different tracked values
    #[error("Conflicting source rows in dimension '{dimension}' for business key '{business_key}': {detail}")]
    SourceConflict {
        dimension: String,
        business_key: String,
        detail: String,
    },

    /// The exactly-one-current-version invariant (or a validity window) would be broken
    #[error("Invariant violation in dimension '{dimension}' for business key '{business_key}': {detail}")]
    InvariantViolation {
        dimension: String,
        business_key: String,
        detail: String,
    },

    /// A uniqueness or foreign-key rule was rejected by the warehouse
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A fact row could not be resolved (only raised as an error in strict mode)
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl StarloadError {
    /// Shorthand for an [`StarloadError::InvariantViolation`]
    pub fn invariant(
        dimension: impl Into<String>,
        business_key: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        StarloadError::InvariantViolation {
            dimension: dimension.into(),
            business_key: business_key.into(),
            detail: detail.into(),
        }
    }

    /// Shorthand for an [`StarloadError::SourceUnavailable`]
    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        StarloadError::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts the unit of work it was raised in
    ///
    /// Every variant except a non-strict [`ResolutionError`] is structural; the
    /// loader never raises `Resolution` unless strict mode asked for it, so in
    /// practice everything that reaches the coordinator aborts.
    pub fn is_structural(&self) -> bool {
        !matches!(self, StarloadError::Resolution(_))
    }
}

/// Why a fact line could not be resolved to surrogate keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The line carries no business key for a referenced dimension
    MissingReference,
    /// No version of the business key is current
    NoCurrentVersion,
    /// No version of the business key is valid on the transaction date
    NoVersionOnDate(NaiveDate),
    /// The transaction date is not present in the date dimension
    DateNotInCalendar(NaiveDate),
    /// Measures are outside their domain (e.g. discount above 1)
    InvalidMeasures(String),
}

impl std::fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionFailure::MissingReference => write!(f, "no business key on the line"),
            ResolutionFailure::NoCurrentVersion => write!(f, "no current dimension version"),
            ResolutionFailure::NoVersionOnDate(date) => {
                write!(f, "no dimension version valid on {date}")
            }
            ResolutionFailure::DateNotInCalendar(date) => {
                write!(f, "date {date} missing from the date dimension")
            }
            ResolutionFailure::InvalidMeasures(detail) => write!(f, "invalid measures: {detail}"),
        }
    }
}

/// A fact line that was skipped because it could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fact '{fact}' transaction '{natural_key}'{}: {reason}", describe_reference(.dimension, .business_key))]
pub struct ResolutionError {
    /// Fact table name
    pub fact: String,

    /// Natural transaction key of the skipped line
    pub natural_key: String,

    /// Dimension that failed to resolve, if the failure is dimension-specific
    pub dimension: Option<String>,

    /// Business key that failed to resolve
    pub business_key: Option<String>,

    /// Failure reason
    pub reason: ResolutionFailure,
}

fn describe_reference(dimension: &Option<String>, business_key: &Option<String>) -> String {
    match (dimension, business_key) {
        (Some(d), Some(k)) => format!(" ({d} = '{k}')"),
        (Some(d), None) => format!(" ({d})"),
        _ => String::new(),
    }
}

impl ResolutionError {
    /// Creates a new resolution error for a fact line
    pub fn new(
        fact: impl Into<String>,
        natural_key: impl Into<String>,
        reason: ResolutionFailure,
    ) -> Self {
        Self {
            fact: fact.into(),
            natural_key: natural_key.into(),
            dimension: None,
            business_key: None,
            reason,
        }
    }

    /// Sets the dimension the failure relates to
    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    /// Sets the business key the failure relates to
    pub fn with_business_key(mut self, business_key: impl Into<String>) -> Self {
        self.business_key = Some(business_key.into());
        self
    }
}

impl From<std::io::Error> for StarloadError {
    fn from(err: std::io::Error) -> Self {
        StarloadError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StarloadError {
    fn from(err: serde_json::Error) -> Self {
        StarloadError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for StarloadError {
    fn from(err: toml::de::Error) -> Self {
        StarloadError::Configuration(format!("TOML parse error: {err}"))
    }
}

// SQLSTATE class 23 is "integrity constraint violation"
impl From<tokio_postgres::Error> for StarloadError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.code() {
            Some(code) if code.code().starts_with("23") => {
                StarloadError::ConstraintViolation(err.to_string())
            }
            _ if err.is_closed() => StarloadError::Connection(err.to_string()),
            _ => StarloadError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starload_error_display() {
        let err = StarloadError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_invariant_violation_names_key() {
        let err = StarloadError::invariant("customer", "42", "2 current versions");
        let message = err.to_string();
        assert!(message.contains("customer"));
        assert!(message.contains("'42'"));
        assert!(message.contains("2 current versions"));
    }

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::new("sales", "T100", ResolutionFailure::NoCurrentVersion)
            .with_dimension("customer")
            .with_business_key("99");
        assert_eq!(
            err.to_string(),
            "fact 'sales' transaction 'T100' (customer = '99'): no current dimension version"
        );
    }

    #[test]
    fn test_resolution_error_without_dimension() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let err = ResolutionError::new("sales", "T7", ResolutionFailure::DateNotInCalendar(date));
        assert_eq!(
            err.to_string(),
            "fact 'sales' transaction 'T7': date 2024-02-29 missing from the date dimension"
        );
    }

    #[test]
    fn test_resolution_error_conversion() {
        let err: StarloadError =
            ResolutionError::new("sales", "T1", ResolutionFailure::MissingReference).into();
        assert!(matches!(err, StarloadError::Resolution(_)));
        assert!(!err.is_structural());
    }

    #[test]
    fn test_structural_errors() {
        assert!(StarloadError::ConstraintViolation("dup".to_string()).is_structural());
        assert!(StarloadError::source_unavailable("json", "missing").is_structural());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: StarloadError = io_err.into();
        assert!(matches!(err, StarloadError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: StarloadError = toml_err.into();
        assert!(matches!(err, StarloadError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
