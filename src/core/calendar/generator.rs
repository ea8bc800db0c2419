//! Date dimension generator
//!
//! [`CalendarDays`] is a lazy, restartable sequence over an inclusive date
//! range. [`ensure_calendar`] filters it against the dates already present and
//! appends only the gaps, so repeated runs never duplicate a day.

use crate::adapters::database::traits::UnitOfWork;
use crate::config::CalendarConfig;
use crate::domain::{CalendarDay, Result, StarloadError};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// One [`CalendarDay`] per date of `[start, end]`
#[derive(Debug, Clone)]
pub struct CalendarDays {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl CalendarDays {
    /// # Errors
    ///
    /// Returns a configuration error if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(StarloadError::Configuration(format!(
                "calendar range starts ({start}) after it ends ({end})"
            )));
        }
        Ok(Self {
            next: Some(start),
            end,
        })
    }
}

impl Iterator for CalendarDays {
    type Item = CalendarDay;

    fn next(&mut self) -> Option<CalendarDay> {
        let date = self.next.filter(|d| *d <= self.end)?;
        self.next = date.succ_opt();
        Some(CalendarDay::from_date(date))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .filter(|d| *d <= self.end)
            .map(|d| (self.end - d).num_days() as usize + 1)
            .unwrap_or(0);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CalendarDays {}

/// Days of `days` whose date is not in `existing`
pub fn missing_days<'a>(
    days: CalendarDays,
    existing: &'a BTreeSet<NaiveDate>,
) -> impl Iterator<Item = CalendarDay> + 'a {
    days.filter(move |day| !existing.contains(&day.date))
}

/// Range that must be present before facts load
///
/// The configured range widened to cover `transaction_dates`, or `None` when
/// neither is set.
pub fn required_range(
    config: &CalendarConfig,
    transaction_dates: impl IntoIterator<Item = NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    let configured = config.start_date.zip(config.end_date);

    let pending = transaction_dates
        .into_iter()
        .fold(None, |range: Option<(NaiveDate, NaiveDate)>, date| match range {
            None => Some((date, date)),
            Some((lo, hi)) => Some((lo.min(date), hi.max(date))),
        });

    match (configured, pending) {
        (Some((s1, e1)), Some((s2, e2))) => Some((s1.min(s2), e1.max(e2))),
        (range, None) | (None, range) => range,
    }
}

/// Appends every missing day of the required range
///
/// # Returns
///
/// The number of calendar rows inserted.
pub async fn ensure_calendar(
    uow: &mut dyn UnitOfWork,
    config: &CalendarConfig,
    transaction_dates: impl IntoIterator<Item = NaiveDate>,
) -> Result<u64> {
    let Some((start, end)) = required_range(config, transaction_dates) else {
        tracing::debug!("No calendar range to ensure");
        return Ok(0);
    };

    let days = CalendarDays::new(start, end)?;
    let existing = uow.existing_calendar_dates(config, start, end).await?;
    if existing.len() == days.len() {
        tracing::debug!(%start, %end, "Calendar already complete");
        return Ok(0);
    }

    let missing: Vec<CalendarDay> = missing_days(days, &existing).collect();
    let inserted = uow.insert_calendar_days(config, &missing).await?;
    tracing::info!(%start, %end, inserted, "Calendar days appended");
    Ok(inserted)
}
