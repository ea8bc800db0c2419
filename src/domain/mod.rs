//! Domain models and types for Starload.
//!
//! The domain layer provides:
//! - **Identifiers** ([`BusinessKey`], [`TransactionKey`], [`SurrogateKey`])
//! - **Dimension models** ([`SourceEntity`], [`DimensionVersion`], [`NewVersion`])
//! - **Fact models** ([`TransactionLine`], [`FactRecord`])
//! - **Calendar rows** ([`CalendarDay`])
//! - **Error types** ([`StarloadError`], [`ResolutionError`]) and the [`Result`] alias
//!
//! ```rust
//! use starload::domain::{Attributes, AttributeValue, BusinessKey, SourceEntity};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut attributes = Attributes::new();
//! attributes.insert("name".to_string(), AttributeValue::from("John Doe"));
//! let entity = SourceEntity::new(BusinessKey::new("1")?, attributes);
//! assert_eq!(entity.business_key.as_str(), "1");
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod calendar;
pub mod dimension;
pub mod errors;
pub mod fact;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use attributes::{attribute_or_null, AttributeValue, Attributes};
pub use calendar::CalendarDay;
pub use dimension::{check_history, open_expiry, DimensionVersion, NewVersion, SourceEntity};
pub use errors::{ResolutionError, ResolutionFailure, StarloadError};
pub use fact::{date_key, FactRecord, TransactionLine};
pub use ids::{BusinessKey, SurrogateKey, TransactionKey};
pub use result::Result;
