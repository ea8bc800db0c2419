//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod history;
pub mod init;
pub mod run;
pub mod status;
pub mod validate;
