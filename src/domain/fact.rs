//! Fact models
//!
//! A [`TransactionLine`] is a pending line from the source carrying business
//! keys; a [`FactRecord`] is the resolved row written to the fact table.

use super::ids::{BusinessKey, SurrogateKey, TransactionKey};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pending transaction line awaiting fact load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLine {
    /// Natural key of the originating transaction
    pub natural_key: TransactionKey,

    /// Business key per referenced dimension name; a missing entry is a missing reference
    #[serde(default)]
    pub dimension_keys: BTreeMap<String, BusinessKey>,

    pub quantity: i64,

    pub unit_price: f64,

    /// Fractional discount in `[0, 1]`
    #[serde(default)]
    pub discount: f64,

    pub transaction_date: NaiveDate,
}

/// A fully resolved fact row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub natural_key: TransactionKey,

    /// Surrogate key per referenced dimension name
    pub dimension_keys: BTreeMap<String, SurrogateKey>,

    /// `yyyymmdd` key of the transaction date in the date dimension
    pub date_key: i32,

    pub transaction_date: NaiveDate,
    pub quantity: i64,
    pub unit_price: f64,
    pub discount: f64,
    pub sales_amount: f64,
    pub cost_amount: f64,
    pub profit_amount: f64,
}

/// `yyyymmdd` integer key of a calendar date
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}
