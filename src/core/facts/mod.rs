//! Fact resolution and loading
//!
//! - [`loader`] - anti-join, resolve and insert pending lines
//! - [`measures`] - sales, cost and profit derivation
//! - [`resolver`] - business key to surrogate key lookup

pub mod loader;
pub mod measures;
pub mod resolver;

pub use loader::{FactLoader, FactOutcome};
pub use measures::{round_cents, MeasurePolicy, Measures};
pub use resolver::{DimensionIndex, KeyResolver};
