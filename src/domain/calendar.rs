//! Date dimension row model

use super::fact::date_key;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One row of the date dimension, derived entirely from its date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date_key: i32,
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub month_name: String,
    /// ISO 8601 week number
    pub week_of_year: u32,
    pub day_of_month: u32,
    /// ISO day of week, Monday = 1
    pub day_of_week: u32,
    pub day_name: String,
    pub is_weekend: bool,
}

impl CalendarDay {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month();
        let weekday = date.weekday();

        Self {
            date_key: date_key(date),
            date,
            year: date.year(),
            quarter: (month - 1) / 3 + 1,
            month,
            month_name: MONTH_NAMES[(month - 1) as usize].to_string(),
            week_of_year: date.iso_week().week(),
            day_of_month: date.day(),
            day_of_week: weekday.number_from_monday(),
            day_name: day_name(weekday).to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_calendar_day_fields() {
        let day = CalendarDay::from_date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(day.date_key, 20240229);
        assert_eq!(day.year, 2024);
        assert_eq!(day.quarter, 1);
        assert_eq!(day.month_name, "February");
        assert_eq!(day.day_of_month, 29);
        assert_eq!(day.day_name, "Thursday");
        assert_eq!(day.day_of_week, 4);
        assert!(!day.is_weekend);
    }

    #[test_case(2024, 1, 1, 1 ; "january is q1")]
    #[test_case(2024, 4, 1, 2 ; "april is q2")]
    #[test_case(2024, 9, 30, 3 ; "september is q3")]
    #[test_case(2024, 12, 31, 4 ; "december is q4")]
    fn test_quarter(y: i32, m: u32, d: u32, quarter: u32) {
        let day = CalendarDay::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(day.quarter, quarter);
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2021-01-03 is a Sunday that belongs to ISO week 53 of 2020
        let day = CalendarDay::from_date(NaiveDate::from_ymd_opt(2021, 1, 3).unwrap());
        assert_eq!(day.week_of_year, 53);
        assert_eq!(day.day_of_week, 7);
        assert!(day.is_weekend);
    }
}
