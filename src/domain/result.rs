//! Result type alias for Starload
//!
//! This module provides a convenient Result type alias that uses
//! [`StarloadError`] as the error type.

use super::errors::StarloadError;

/// Result type alias for Starload operations
///
/// # Examples
///
/// ```
/// use starload::domain::result::Result;
/// use starload::domain::errors::StarloadError;
///
/// fn load() -> Result<u64> {
///     Ok(3)
/// }
///
/// fn failing() -> Result<()> {
///     Err(StarloadError::Validation("Invalid input".to_string()))
/// }
///
/// assert_eq!(load().unwrap(), 3);
/// assert!(failing().is_err());
/// ```
pub type Result<T> = std::result::Result<T, StarloadError>;
