//! Run command implementation
//!
//! This module implements the `run` command: one full load of every
//! configured dimension and fact table.

use crate::config::{load_config, ResolutionMode, StarloadConfig};
use crate::core::run::{RunCoordinator, RunStatus, RunSummary};
use crate::domain::StarloadError;
use clap::Args;
use std::io::{self, Write};
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run every step, then roll back instead of committing
    #[arg(long)]
    pub dry_run: bool,

    /// Abort the run on the first unresolved fact line
    #[arg(long)]
    pub strict: bool,

    /// Override the resolution mode (as_of_load or as_of_transaction)
    #[arg(long, value_name = "MODE")]
    pub resolution: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Err(message) = self.apply_overrides(&mut config) {
            tracing::error!(error = %message, "Invalid command line override");
            eprintln!("{message}");
            return Ok(2);
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.application.dry_run {
            tracing::info!("Dry run mode enabled - every write will be rolled back");
            println!("🔍 DRY RUN MODE - No changes will be committed to the warehouse");
            println!();
        }

        if !self.yes && !config.application.dry_run && !Self::confirm(&config)? {
            println!("Run cancelled.");
            return Ok(0);
        }

        let coordinator = match RunCoordinator::new(config) {
            Ok(c) => c.with_shutdown_signal(shutdown_signal),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create run coordinator");
                eprintln!("Failed to initialize run: {e}");
                return Ok(match e {
                    StarloadError::Configuration(_) => 2,
                    _ => 4,
                });
            }
        };

        println!("🚀 Starting run...");
        println!();

        let summary = coordinator.execute_run().await;
        Self::print_summary(&summary);
        Ok(summary.exit_code())
    }

    /// Applies command line flags on top of the loaded configuration
    fn apply_overrides(&self, config: &mut StarloadConfig) -> Result<(), String> {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if self.strict {
            tracing::info!("Enabling strict mode from CLI");
            config.load.strict = true;
        }

        if let Some(mode) = &self.resolution {
            let mode: ResolutionMode = mode.parse()?;
            tracing::info!(resolution = %mode, "Overriding resolution mode from CLI");
            config.load.resolution = mode;
        }

        Ok(())
    }

    fn confirm(config: &StarloadConfig) -> anyhow::Result<bool> {
        println!("Run Configuration:");
        println!("  Source: {:?}", config.source.kind);
        println!("  Warehouse: {:?}", config.warehouse.target);
        println!("  Resolution: {}", config.load.resolution);
        println!("  Strict: {}", config.load.strict);
        println!(
            "  Dimensions: {}",
            config
                .dimensions
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  Facts: {}",
            config
                .facts
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
        print!("Proceed with run? [y/N]: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("y"))
    }

    fn print_summary(summary: &RunSummary) {
        println!();
        println!("📊 Run Summary:");
        println!("  Run ID: {}", summary.run_id);
        println!("  Run Date: {}", summary.run_date);
        println!("  Status: {}", summary.status);
        println!("  Committed: {}", summary.committed);
        println!("  Calendar Days Inserted: {}", summary.calendar_days_inserted);

        for dimension in &summary.dimensions {
            println!(
                "  Dimension {}: {} new, {} changed, {} unchanged",
                dimension.dimension,
                dimension.new_entities,
                dimension.versions_closed,
                dimension.unchanged
            );
        }

        for fact in &summary.facts {
            println!(
                "  Fact {}: {} pending, {} inserted, {} already loaded, {} duplicates, {} skipped",
                fact.fact,
                fact.pending,
                fact.inserted,
                fact.already_loaded,
                fact.duplicates_in_batch,
                fact.skipped()
            );
        }
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        let errors: Vec<_> = summary
            .facts
            .iter()
            .flat_map(|f| f.resolution_errors.iter())
            .collect();
        if !errors.is_empty() {
            println!("⚠️  Resolution errors:");
            for error in errors.iter().take(10) {
                println!("  - {error}");
            }
            if errors.len() > 10 {
                println!("  ... and {} more", errors.len() - 10);
            }
            println!();
        }

        match summary.status {
            RunStatus::Success if summary.dry_run => {
                println!("✅ Dry run completed, all writes rolled back")
            }
            RunStatus::Success => println!("✅ Run completed successfully!"),
            RunStatus::PartialSuccess => {
                println!("⚠️  Run completed, some fact lines were skipped")
            }
            RunStatus::Aborted => {
                if let Some(failure) = &summary.failure {
                    println!("❌ Run aborted at {}: {}", failure.step, failure.message);
                }
                println!("   No changes were committed.");
            }
            RunStatus::Interrupted => {
                println!("⚠️  Run interrupted, no changes were committed.");
                println!("   Run the same command again to load from scratch.");
            }
        }
    }
}
