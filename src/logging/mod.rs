//! Logging and observability
//!
//! Structured logging through `tracing`, plus a handful of macros that keep
//! field names consistent across the run pipeline.
//!
//! ```no_run
//! use starload::logging::init_logging;
//! use starload::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//! tracing::info!(dimension = "customer", "Loading dimension");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of a run
///
/// ```no_run
/// use starload::log_run_start;
///
/// let run_id = uuid::Uuid::new_v4();
/// let run_date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// log_run_start!(run_id, run_date, false);
/// ```
#[macro_export]
macro_rules! log_run_start {
    ($run_id:expr, $run_date:expr, $dry_run:expr) => {
        tracing::info!(
            run_id = %$run_id,
            run_date = %$run_date,
            dry_run = $dry_run,
            "Starting run"
        );
    };
}

/// Log the end of a run
#[macro_export]
macro_rules! log_run_complete {
    ($run_id:expr, $status:expr, $duration:expr) => {
        tracing::info!(
            run_id = %$run_id,
            status = %$status,
            duration_ms = $duration.as_millis() as u64,
            "Run completed"
        );
    };
}

/// Log the versioning outcome of one dimension
#[macro_export]
macro_rules! log_dimension_applied {
    ($dimension:expr, $outcome:expr) => {
        tracing::info!(
            dimension = %$dimension,
            new_entities = $outcome.new_entities,
            versions_closed = $outcome.versions_closed,
            versions_inserted = $outcome.versions_inserted,
            unchanged = $outcome.unchanged,
            "Dimension applied"
        );
    };
}

/// Log an error with context
///
/// ```no_run
/// use starload::log_error_with_context;
/// use starload::domain::StarloadError;
///
/// let error = StarloadError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = %$context,
            "Error occurred"
        );
    };
}
