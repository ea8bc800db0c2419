//! Source and warehouse integrations
//!
//! - [`database`] - store traits and the configuration-driven factory
//! - [`json`] - JSON directory source
//! - [`memory`] - in-process source and warehouse
//! - [`postgresql`] - PostgreSQL staging source and star-schema warehouse
//!
//! The load pipeline only talks to the traits in [`database::traits`], so
//! tests swap in the memory implementations:
//!
//! ```rust
//! use starload::adapters::database::Warehouse;
//! use starload::adapters::memory::MemoryWarehouse;
//!
//! # async fn example() -> starload::domain::Result<()> {
//! let warehouse = MemoryWarehouse::new();
//! let uow = warehouse.begin().await?;
//! uow.rollback().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod json;
pub mod memory;
pub mod postgresql;
