// Starload - Incremental star schema loader
// Copyright (c) 2025 Starload Contributors
// Licensed under the MIT License

//! # Starload - Incremental star schema loader
//!
//! Starload periodically moves data from operational staging tables into a
//! dimensional warehouse. Every run keeps a Type-2 version history for each
//! dimension entity and appends each sale line to the fact table exactly once.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Versioning** dimension entities with non-overlapping validity windows
//! - **Appending** only new fact lines, resolved to surrogate keys
//! - **Generating** the date dimension for every day a fact needs
//! - **Committing** a whole run atomically, or not at all
//!
//! ## Architecture
//!
//! Starload follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Load pipeline (SCD versioning, fact loading, calendar, runs)
//! - [`adapters`] - Sources and warehouses (PostgreSQL, JSON, memory)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use starload::config::load_config;
//! use starload::core::run::RunCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("starload.toml")?;
//!     let coordinator = RunCoordinator::new(config)?;
//!
//!     let summary = coordinator.execute_run().await;
//!     println!("{}: {} facts inserted", summary.status, summary.facts_inserted());
//!     std::process::exit(summary.exit_code());
//! }
//! ```
//!
//! ## Type-2 Versioning
//!
//! A change to a tracked attribute closes the current version the day before
//! the change and opens a new one. Untracked and passive attributes never
//! create versions:
//!
//! ```rust
//! use starload::core::scd::{classify, ChangeKind};
//! use starload::domain::{AttributeValue, Attributes, BusinessKey, SourceEntity};
//!
//! let mut attributes = Attributes::new();
//! attributes.insert("name".to_string(), AttributeValue::from("John Doe"));
//! let entity = SourceEntity::new(BusinessKey::new("1").unwrap(), attributes);
//!
//! let tracked = vec!["name".to_string()];
//! assert_eq!(classify(&entity, None, &tracked), ChangeKind::New);
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`], whose error is
//! [`domain::StarloadError`]. Fact lines that cannot be resolved are collected
//! as [`domain::ResolutionError`]s in the run summary instead of aborting the
//! run, unless strict mode is on.
//!
//! ## Logging
//!
//! Starload uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! tracing::info!(dimension = "customer", versions_inserted = 2, "Dimension applied");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
