//! In-process source and warehouse implementations

pub mod source;
pub mod warehouse;

pub use source::MemorySource;
pub use warehouse::{MemoryState, MemoryWarehouse};
