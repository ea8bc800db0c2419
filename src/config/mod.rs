//! Configuration management for Starload.
//!
//! Starload reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `STARLOAD_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every section, including SQL identifiers
//!
//! # Example Configuration
//!
//! ```toml
//! [source]
//! kind = "postgresql"
//!
//! [warehouse]
//! target = "postgresql"
//!
//! [warehouse.postgresql]
//! connection_string = "${STARLOAD_DW_URL}"
//! advisory_lock_key = 7241
//!
//! [load]
//! resolution = "as_of_load"
//!
//! [[dimensions]]
//! name = "customer"
//! table = "dw.dim_customer"
//! tracked_attributes = ["name", "city"]
//!
//! [dimensions.staging]
//! table = "staging.customers"
//! business_key_column = "customer_id"
//! ```
//!
//! ```rust,no_run
//! use starload::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("starload.toml")?;
//! for dimension in &config.dimensions {
//!     println!("{} -> {}", dimension.name, dimension.table);
//! }
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, CalendarConfig, DimensionConfig, DimensionReference,
    DimensionStagingConfig, Environment, FactConfig, FactStagingConfig, JsonSourceConfig,
    LoadConfig, LoggingConfig, MeasuresConfig, PostgreSQLConfig, ResolutionMode, SourceConfig,
    SourceKind, StarloadConfig, WarehouseConfig, WarehouseTarget,
};
pub use secret::{secret_string, SecretString, SecretValue};
