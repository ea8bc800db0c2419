//! History command implementation
//!
//! This module implements the `history` command, which prints every version
//! of one business key and checks that the history is well formed.

use crate::adapters::database::create_warehouse;
use crate::config::load_config;
use crate::domain::{check_history, BusinessKey, DimensionVersion};
use clap::Args;

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Dimension name as configured in [[dimensions]]
    pub dimension: String,

    /// Business key of the entity
    pub business_key: String,

    /// Print the versions as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryArgs {
    /// Execute the history command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            dimension = %self.dimension,
            business_key = %self.business_key,
            "Reading dimension history"
        );

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let Some(dimension) = config.dimension(&self.dimension) else {
            println!("❌ Unknown dimension: {}", self.dimension);
            return Ok(2);
        };

        let business_key = match BusinessKey::new(self.business_key.as_str()) {
            Ok(k) => k,
            Err(e) => {
                println!("❌ Invalid business key: {e}");
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

        let history = match warehouse.history(dimension, &business_key).await {
            Ok(h) => h,
            Err(e) => {
                println!("❌ Failed to read history");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&history)?);
            return Ok(0);
        }

        println!("📜 History of {} '{}'", dimension.name, business_key);
        println!();

        if history.is_empty() {
            println!("No versions found.");
            return Ok(0);
        }

        println!(
            "{:<8} {:<12} {:<12} {:<12} {:<8} Attributes",
            "Version", "Key", "Effective", "Expiry", "Current"
        );
        println!("{}", "-".repeat(80));
        for version in &history {
            println!("{}", Self::format_row(version));
        }
        println!();

        match check_history(&history) {
            Ok(()) => {
                println!("✅ {} version(s), history is consistent", history.len());
                Ok(0)
            }
            Err(detail) => {
                tracing::warn!(
                    dimension = %dimension.name,
                    business_key = %business_key,
                    detail = %detail,
                    "Inconsistent dimension history"
                );
                println!("⚠️  History is inconsistent: {detail}");
                Ok(3)
            }
        }
    }

    fn format_row(version: &DimensionVersion) -> String {
        let attributes = version
            .attributes
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{:<8} {:<12} {:<12} {:<12} {:<8} {}",
            version.version,
            version.surrogate_key.to_string(),
            version.effective_date,
            version.expiry_date,
            if version.is_current { "yes" } else { "no" },
            attributes
        )
    }
}
