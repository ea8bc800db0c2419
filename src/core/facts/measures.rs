//! Derived fact measures

use crate::config::MeasuresConfig;
use crate::domain::{ResolutionFailure, TransactionLine};

/// Derived amounts of one fact row, rounded to cents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measures {
    pub sales_amount: f64,
    pub cost_amount: f64,
    pub profit_amount: f64,
}

/// Cost and margin split applied to sales amounts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurePolicy {
    cost_ratio: f64,
    margin_ratio: f64,
}

impl MeasurePolicy {
    pub fn new(cost_ratio: f64, margin_ratio: f64) -> Self {
        Self {
            cost_ratio,
            margin_ratio,
        }
    }

    pub fn from_config(config: &MeasuresConfig) -> Self {
        Self::new(config.cost_ratio, config.margin_ratio)
    }

    /// Computes sales, cost and profit for a line
    ///
    /// `sales = quantity * unit_price * (1 - discount)`; cost and profit are
    /// taken from the rounded sales amount.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionFailure::InvalidMeasures`] if the discount is
    /// outside `[0, 1]` or the price or result is not finite.
    pub fn derive(&self, line: &TransactionLine) -> Result<Measures, ResolutionFailure> {
        if !(0.0..=1.0).contains(&line.discount) {
            return Err(ResolutionFailure::InvalidMeasures(format!(
                "discount {} outside [0, 1]",
                line.discount
            )));
        }
        if !line.unit_price.is_finite() {
            return Err(ResolutionFailure::InvalidMeasures(format!(
                "unit price {} is not finite",
                line.unit_price
            )));
        }

        let sales = round_cents(line.quantity as f64 * line.unit_price * (1.0 - line.discount));
        if !sales.is_finite() {
            return Err(ResolutionFailure::InvalidMeasures(
                "sales amount overflows".to_string(),
            ));
        }

        Ok(Measures {
            sales_amount: sales,
            cost_amount: round_cents(sales * self.cost_ratio),
            profit_amount: round_cents(sales * self.margin_ratio),
        })
    }
}

impl Default for MeasurePolicy {
    fn default() -> Self {
        Self::from_config(&MeasuresConfig::default())
    }
}

/// Rounds half away from zero to two decimals
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
