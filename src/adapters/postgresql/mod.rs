//! PostgreSQL warehouse and staging source

pub mod client;
pub mod models;
pub mod queries;
pub mod source;
pub mod warehouse;

pub use client::PostgreSQLClient;
pub use source::PostgreSQLSource;
pub use warehouse::PostgreSQLWarehouse;
