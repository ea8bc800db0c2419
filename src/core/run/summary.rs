//! Run summary and reporting

use crate::core::facts::FactOutcome;
use crate::core::scd::DimensionOutcome;
use crate::domain::StarloadError;
use chrono::NaiveDate;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every step succeeded and no fact line was skipped
    Success,
    /// Every step succeeded but some fact lines could not be resolved
    PartialSuccess,
    /// A structural error rolled the run back
    Aborted,
    /// A shutdown signal rolled the run back
    Interrupted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialSuccess => write!(f, "partial_success"),
            RunStatus::Aborted => write!(f, "aborted"),
            RunStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Step of the run pipeline, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStep {
    /// Reading the named dimension or fact feed
    ReadSource(String),
    Begin,
    Calendar,
    Dimension(String),
    Fact(String),
    Commit,
}

impl fmt::Display for RunStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStep::ReadSource(name) => write!(f, "read source '{name}'"),
            RunStep::Begin => write!(f, "begin unit of work"),
            RunStep::Calendar => write!(f, "calendar"),
            RunStep::Dimension(name) => write!(f, "dimension '{name}'"),
            RunStep::Fact(name) => write!(f, "fact '{name}'"),
            RunStep::Commit => write!(f, "commit"),
        }
    }
}

/// Cause of an incomplete run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    /// Step that failed, or that was next when the run was interrupted
    pub step: RunStep,
    pub message: String,
    /// Process exit code for this failure
    pub exit_code: i32,
}

impl RunFailure {
    pub fn from_error(step: RunStep, error: &StarloadError) -> Self {
        let exit_code = match error {
            StarloadError::Configuration(_) => 2,
            StarloadError::Connection(_) => 4,
            StarloadError::Io(_) | StarloadError::Other(_) => 5,
            _ => 3,
        };
        Self {
            step,
            message: error.to_string(),
            exit_code,
        }
    }

    pub fn interrupted(step: RunStep) -> Self {
        Self {
            step,
            message: "shutdown signal received".to_string(),
            exit_code: 130,
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,

    /// As-of date used for entities without their own
    pub run_date: NaiveDate,

    pub status: RunStatus,

    pub dry_run: bool,

    /// Whether the unit of work was committed
    pub committed: bool,

    pub calendar_days_inserted: u64,

    pub dimensions: Vec<DimensionOutcome>,

    pub facts: Vec<FactOutcome>,

    pub failure: Option<RunFailure>,

    pub duration: Duration,
}

impl RunSummary {
    pub fn new(run_id: Uuid, run_date: NaiveDate, dry_run: bool) -> Self {
        Self {
            run_id,
            run_date,
            status: RunStatus::Success,
            dry_run,
            committed: false,
            calendar_days_inserted: 0,
            dimensions: Vec::new(),
            facts: Vec::new(),
            failure: None,
            duration: Duration::ZERO,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Records a failure and marks the run aborted or interrupted
    pub fn fail(&mut self, failure: RunFailure) {
        self.status = if failure.exit_code == 130 {
            RunStatus::Interrupted
        } else {
            RunStatus::Aborted
        };
        self.committed = false;
        self.failure = Some(failure);
    }

    /// Settles the status of a run that completed every step
    pub fn complete(&mut self, committed: bool) {
        self.committed = committed;
        self.status = if self.resolution_error_count() > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    pub fn versions_inserted(&self) -> usize {
        self.dimensions.iter().map(|d| d.versions_inserted).sum()
    }

    pub fn versions_closed(&self) -> usize {
        self.dimensions.iter().map(|d| d.versions_closed).sum()
    }

    pub fn facts_inserted(&self) -> u64 {
        self.facts.iter().map(|f| f.inserted).sum()
    }

    pub fn resolution_error_count(&self) -> usize {
        self.facts.iter().map(FactOutcome::skipped).sum()
    }

    /// Process exit code for this run
    ///
    /// `0` success or partial success, `2` configuration, `3` aborted,
    /// `4` connection, `5` fatal, `130` interrupted. Skipped fact lines are
    /// reported in the status and counts, not in the exit code.
    pub fn exit_code(&self) -> i32 {
        match (&self.status, &self.failure) {
            (RunStatus::Success | RunStatus::PartialSuccess, _) => 0,
            (RunStatus::Interrupted, _) => 130,
            (RunStatus::Aborted, Some(failure)) => failure.exit_code,
            (RunStatus::Aborted, None) => 3,
        }
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            status = %self.status,
            dry_run = self.dry_run,
            committed = self.committed,
            calendar_days_inserted = self.calendar_days_inserted,
            versions_inserted = self.versions_inserted(),
            versions_closed = self.versions_closed(),
            facts_inserted = self.facts_inserted(),
            resolution_errors = self.resolution_error_count(),
            duration_secs = self.duration.as_secs(),
            "Run summary"
        );

        for fact in &self.facts {
            for error in &fact.resolution_errors {
                tracing::warn!(fact = %fact.fact, error = %error, "Resolution error");
            }
        }

        if let Some(ref failure) = self.failure {
            tracing::error!(step = %failure.step, message = %failure.message, "Run did not complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResolutionError, ResolutionFailure};
    use test_case::test_case;

    fn summary() -> RunSummary {
        RunSummary::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            false,
        )
    }

    #[test]
    fn test_complete_without_errors_is_success() {
        let mut summary = summary();
        summary.complete(true);
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_resolution_errors_make_partial_success() {
        let mut summary = summary();
        summary.facts.push(FactOutcome {
            fact: "sales".to_string(),
            resolution_errors: vec![ResolutionError::new(
                "sales",
                "T101",
                ResolutionFailure::NoCurrentVersion,
            )],
            ..Default::default()
        });
        summary.complete(true);
        assert_eq!(summary.status, RunStatus::PartialSuccess);
        assert!(summary.committed);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test_case(StarloadError::Configuration("bad".into()), 2 ; "configuration")]
    #[test_case(StarloadError::source_unavailable("json", "missing"), 3 ; "source unavailable")]
    #[test_case(StarloadError::invariant("customer", "1", "detail"), 3 ; "invariant")]
    #[test_case(StarloadError::Connection("refused".into()), 4 ; "connection")]
    #[test_case(StarloadError::Io("disk".into()), 5 ; "fatal")]
    fn test_failure_exit_codes(error: StarloadError, expected: i32) {
        let mut summary = summary();
        summary.fail(RunFailure::from_error(RunStep::Begin, &error));
        assert_eq!(summary.status, RunStatus::Aborted);
        assert_eq!(summary.exit_code(), expected);
    }

    #[test]
    fn test_interrupted() {
        let mut summary = summary();
        summary.fail(RunFailure::interrupted(RunStep::Calendar));
        assert_eq!(summary.status, RunStatus::Interrupted);
        assert_eq!(summary.exit_code(), 130);
        assert!(!summary.committed);
    }
}
