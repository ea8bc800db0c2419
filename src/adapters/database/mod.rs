//! Store abstraction layer
//!
//! Runs only see the [`SourceReader`], [`Warehouse`] and [`UnitOfWork`]
//! traits; the factory picks the implementation from configuration.

pub mod factory;
pub mod traits;

pub use factory::{create_source, create_source_and_warehouse, create_warehouse};
pub use traits::{SourceReader, TableStats, UnitOfWork, Warehouse};
