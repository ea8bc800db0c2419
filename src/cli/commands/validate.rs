//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Starload configuration file.

use crate::adapters::postgresql::client::redact_connection_string;
use crate::config::{load_config, PostgreSQLConfig, StarloadConfig};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        match config.validate() {
            Ok(()) => {
                println!("✅ Configuration is valid");
                println!();
                Self::print_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }

    fn print_summary(config: &StarloadConfig) {
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);

        println!("  Source: {:?}", config.source.kind);
        if let Some(ref json) = config.source.json {
            println!("  Source Directory: {}", json.directory);
        }
        if let Some(ref pg) = config.source.postgresql {
            Self::print_postgresql("Source", pg);
        }

        println!("  Warehouse: {:?}", config.warehouse.target);
        if let Some(ref pg) = config.warehouse.postgresql {
            Self::print_postgresql("Warehouse", pg);
        }

        println!("  Resolution: {}", config.load.resolution);
        println!("  Strict: {}", config.load.strict);
        println!(
            "  Measures: cost_ratio = {}, margin_ratio = {}",
            config.measures.cost_ratio, config.measures.margin_ratio
        );
        println!(
            "  Calendar: {} ({})",
            config.calendar.table,
            if config.calendar.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        for dimension in &config.dimensions {
            println!(
                "  Dimension {}: {} (tracked: {:?}, passive: {:?})",
                dimension.name,
                dimension.table,
                dimension.tracked_attributes,
                dimension.passive_attributes
            );
        }
        for fact in &config.facts {
            let references: Vec<&str> =
                fact.dimensions.iter().map(|r| r.dimension.as_str()).collect();
            println!("  Fact {}: {} (references: {:?})", fact.name, fact.table, references);
        }
        println!();
    }

    fn print_postgresql(label: &str, pg: &PostgreSQLConfig) {
        println!(
            "  {label} Connection: {}",
            redact_connection_string(pg.connection_string.expose_secret().as_str())
        );
        println!("  {label} Max Connections: {}", pg.max_connections);
        println!("  {label} SSL Mode: {}", pg.ssl_mode);
    }
}
