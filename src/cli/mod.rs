//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Starload using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Starload - star schema loader with Type-2 dimension history
#[derive(Parser, Debug)]
#[command(name = "starload")]
#[command(version, about, long_about = None)]
#[command(author = "Starload Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "starload.toml", env = "STARLOAD_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "STARLOAD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load dimensions and facts from the configured source into the warehouse
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show row counts of every configured table
    Status(commands::status::StatusArgs),

    /// Show the version history of one business key
    History(commands::history::HistoryArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
