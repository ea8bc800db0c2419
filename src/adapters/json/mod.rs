//! JSON file source feeds

pub mod source;

pub use source::JsonDirectorySource;
