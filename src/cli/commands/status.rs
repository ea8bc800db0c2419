//! Status command implementation
//!
//! This module implements the `status` command for displaying row counts of
//! every configured warehouse table.

use crate::adapters::database::create_warehouse;
use crate::config::load_config;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show the named dimension or fact
    #[arg(long)]
    pub table: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking warehouse status");

        println!("📊 Warehouse Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let warehouse = match create_warehouse(&config) {
            Ok(w) => w,
            Err(e) => {
                println!("❌ Failed to create warehouse client");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        if let Err(e) = warehouse.test_connection().await {
            println!("❌ Failed to connect to warehouse");
            println!("   Error: {e}");
            return Ok(4);
        }

        let stats = match warehouse.table_stats(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to read table statistics");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let filtered: Vec<_> = stats
            .iter()
            .filter(|s| self.table.as_ref().map_or(true, |name| &s.name == name))
            .collect();

        if filtered.is_empty() {
            println!("No tables match the specified filter.");
            return Ok(0);
        }

        println!("Warehouse: {}", warehouse.warehouse_name());
        println!();
        println!(
            "{:<20} {:<40} {:>12} {:>12}",
            "Name", "Table", "Rows", "Current"
        );
        println!("{}", "-".repeat(87));

        for stat in filtered {
            let current = stat
                .current_rows
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<20} {:<40} {:>12} {:>12}",
                stat.name, stat.table, stat.total_rows, current
            );
        }

        println!();
        Ok(0)
    }
}
