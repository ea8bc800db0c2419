//! Source and warehouse factory
//!
//! Builds the configured [`SourceReader`] and [`Warehouse`] implementations.
//! When both sides are PostgreSQL and the source has no connection of its
//! own, they share one connection pool.

use crate::adapters::database::traits::{SourceReader, Warehouse};
use crate::adapters::json::JsonDirectorySource;
use crate::adapters::memory::MemoryWarehouse;
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLSource, PostgreSQLWarehouse};
use crate::config::{PostgreSQLConfig, SourceKind, StarloadConfig, WarehouseTarget};
use crate::domain::{Result, StarloadError};
use std::sync::Arc;

fn postgresql_client(config: &PostgreSQLConfig) -> Result<Arc<PostgreSQLClient>> {
    Ok(Arc::new(PostgreSQLClient::new(config.clone())?))
}

fn missing(section: &str) -> StarloadError {
    StarloadError::Configuration(format!("{} configuration is required", section))
}

/// Create the warehouse named by `warehouse.target`
///
/// # Errors
///
/// Returns an error if the target's configuration section is missing or the
/// client cannot be created.
pub fn create_warehouse(config: &StarloadConfig) -> Result<Arc<dyn Warehouse>> {
    match config.warehouse.target {
        WarehouseTarget::PostgreSQL => {
            let pg_config = config
                .warehouse
                .postgresql
                .as_ref()
                .ok_or_else(|| missing("warehouse.postgresql"))?;

            tracing::info!("Creating PostgreSQL warehouse");
            Ok(Arc::new(PostgreSQLWarehouse::new(postgresql_client(pg_config)?)))
        }
        WarehouseTarget::Memory => {
            tracing::info!("Creating in-memory warehouse");
            Ok(Arc::new(MemoryWarehouse::new()))
        }
    }
}

/// Create the source reader named by `source.kind`
///
/// # Errors
///
/// Returns an error if the kind's configuration section is missing or the
/// client cannot be created.
pub fn create_source(config: &StarloadConfig) -> Result<Arc<dyn SourceReader>> {
    match config.source.kind {
        SourceKind::Json => {
            let json = config.source.json.as_ref().ok_or_else(|| missing("source.json"))?;

            tracing::info!(directory = %json.directory, "Creating JSON directory source");
            Ok(Arc::new(JsonDirectorySource::new(json)))
        }
        SourceKind::PostgreSQL => {
            let pg_config = config
                .source_postgresql()
                .ok_or_else(|| missing("source.postgresql"))?;

            tracing::info!("Creating PostgreSQL staging source");
            Ok(Arc::new(PostgreSQLSource::new(postgresql_client(pg_config)?)))
        }
    }
}

/// Create both sides of a run, sharing a pool where possible
///
/// # Errors
///
/// Returns an error if either side cannot be created.
pub fn create_source_and_warehouse(
    config: &StarloadConfig,
) -> Result<(Arc<dyn SourceReader>, Arc<dyn Warehouse>)> {
    let shared = matches!(
        (config.source.kind, config.warehouse.target),
        (SourceKind::PostgreSQL, WarehouseTarget::PostgreSQL)
    ) && config.source.postgresql.is_none();

    if !shared {
        return Ok((create_source(config)?, create_warehouse(config)?));
    }

    let pg_config = config
        .warehouse
        .postgresql
        .as_ref()
        .ok_or_else(|| missing("warehouse.postgresql"))?;

    tracing::info!("Creating PostgreSQL source and warehouse on a shared pool");
    let client = postgresql_client(pg_config)?;
    Ok((
        Arc::new(PostgreSQLSource::new(client.clone())) as Arc<dyn SourceReader>,
        Arc::new(PostgreSQLWarehouse::new(client)) as Arc<dyn Warehouse>,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_memory_warehouse_with_json_source() {
        let config = parse_config(
            r#"
[source]
kind = "json"

[source.json]
directory = "/tmp/starload"

[warehouse]
target = "memory"
"#,
        )
        .unwrap();

        let (source, warehouse) = create_source_and_warehouse(&config).unwrap();
        assert_eq!(source.source_name(), "json:/tmp/starload");
        assert_eq!(warehouse.warehouse_name(), "memory");
    }

    #[test]
    fn test_missing_section_is_configuration_error() {
        let config = parse_config(
            r#"
[source]
kind = "json"

[warehouse]
target = "memory"
"#,
        )
        .unwrap();

        assert!(matches!(
            create_source(&config),
            Err(StarloadError::Configuration(_))
        ));
    }

    #[test]
    fn test_postgresql_pair_shares_pool() {
        let config = parse_config(
            r#"
[source]
kind = "postgresql"

[warehouse]
target = "postgresql"

[warehouse.postgresql]
connection_string = "postgresql://etl:pw@localhost:5432/dw"
ssl_mode = "disable"
"#,
        )
        .unwrap();

        let (source, warehouse) = create_source_and_warehouse(&config).unwrap();
        assert_eq!(source.source_name(), warehouse.warehouse_name());
        assert!(!warehouse.warehouse_name().contains("pw@"));
    }
}
