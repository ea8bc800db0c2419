//! Run orchestration
//!
//! - [`coordinator`] - executes one run end to end
//! - [`summary`] - run status, failures and counts

pub mod coordinator;
pub mod summary;

pub use coordinator::RunCoordinator;
pub use summary::{RunFailure, RunStatus, RunStep, RunSummary};
