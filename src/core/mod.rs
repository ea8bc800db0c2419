//! Core load pipeline
//!
//! # Modules
//!
//! - [`calendar`] - date dimension generation
//! - [`facts`] - surrogate key resolution and incremental fact loads
//! - [`run`] - run orchestration and summaries
//! - [`scd`] - Type-2 change detection and version management
//!
//! # Run Workflow
//!
//! 1. **Read**: take every dimension snapshot and pending fact feed
//! 2. **Begin**: open the run's single unit of work
//! 3. **Calendar**: append missing days of the required date range
//! 4. **Dimensions**: classify each snapshot and write new versions
//! 5. **Facts**: anti-join, resolve and insert pending lines
//! 6. **Commit**: publish everything, or roll back on failure
//!
//! # Example
//!
//! ```rust,no_run
//! use starload::config::load_config;
//! use starload::core::run::RunCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("starload.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = RunCoordinator::new(config)?.with_shutdown_signal(shutdown_rx);
//! let summary = coordinator.execute_run().await;
//!
//! println!("Status: {}", summary.status);
//! println!("Versions inserted: {}", summary.versions_inserted());
//! println!("Facts inserted: {}", summary.facts_inserted());
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod facts;
pub mod run;
pub mod scd;
