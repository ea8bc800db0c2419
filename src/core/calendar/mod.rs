//! Date dimension

pub mod generator;

pub use generator::{ensure_calendar, missing_days, required_range, CalendarDays};
