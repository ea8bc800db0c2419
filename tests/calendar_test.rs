//! Integration tests for date dimension generation

use chrono::{Datelike, NaiveDate};
use starload::adapters::database::Warehouse;
use starload::adapters::memory::MemoryWarehouse;
use starload::config::CalendarConfig;
use starload::core::calendar::{ensure_calendar, CalendarDays};
use starload::domain::CalendarDay;
use test_case::test_case;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn configured(start: NaiveDate, end: NaiveDate) -> CalendarConfig {
    CalendarConfig {
        start_date: Some(start),
        end_date: Some(end),
        ..CalendarConfig::default()
    }
}

#[test_case(2023, 365 ; "common year")]
#[test_case(2024, 366 ; "leap year")]
fn test_full_year_has_every_day(year: i32, expected: usize) {
    let days: Vec<CalendarDay> = CalendarDays::new(date(year, 1, 1), date(year, 12, 31))
        .unwrap()
        .collect();

    assert_eq!(days.len(), expected);
    assert!(days.windows(2).all(|w| w[0].date.succ_opt() == Some(w[1].date)));
    assert!(days.windows(2).all(|w| w[0].date_key < w[1].date_key));
    assert_eq!(days.iter().filter(|d| d.quarter == 4).count(), 92);
}

#[test]
fn test_weekends_in_a_week() {
    // 2024-03-04 is a Monday
    let days: Vec<CalendarDay> = CalendarDays::new(date(2024, 3, 4), date(2024, 3, 10))
        .unwrap()
        .collect();

    let weekend: Vec<&str> = days
        .iter()
        .filter(|d| d.is_weekend)
        .map(|d| d.day_name.as_str())
        .collect();
    assert_eq!(weekend, vec!["Saturday", "Sunday"]);
    assert!(days.iter().all(|d| d.week_of_year == 10));
    assert_eq!(
        days.iter().map(|d| d.day_of_week).collect::<Vec<_>>(),
        (1..=7).collect::<Vec<u32>>()
    );
}

#[test]
fn test_iterator_is_lazy_over_wide_ranges() {
    let mut days = CalendarDays::new(date(1900, 1, 1), date(9999, 12, 31)).unwrap();
    assert!(days.len() > 2_900_000);

    let first = days.next().unwrap();
    assert_eq!(first.date_key, 19000101);
    assert_eq!(days.nth(365).map(|d| d.date.year()), Some(1901));
}

#[tokio::test]
async fn test_configured_range_is_materialized_once() {
    let warehouse = MemoryWarehouse::new();
    let config = configured(date(2024, 1, 1), date(2024, 1, 31));

    let mut uow = warehouse.begin().await.unwrap();
    let inserted = ensure_calendar(uow.as_mut(), &config, Vec::<NaiveDate>::new())
        .await
        .unwrap();
    uow.commit().await.unwrap();
    assert_eq!(inserted, 31);

    let mut uow = warehouse.begin().await.unwrap();
    let inserted = ensure_calendar(uow.as_mut(), &config, Vec::<NaiveDate>::new())
        .await
        .unwrap();
    uow.commit().await.unwrap();
    assert_eq!(inserted, 0);

    assert_eq!(warehouse.snapshot().await.calendar_len("dim_date"), 31);
}

#[tokio::test]
async fn test_pending_dates_extend_configured_range() {
    let warehouse = MemoryWarehouse::new();
    let config = configured(date(2024, 1, 1), date(2024, 1, 31));

    let mut uow = warehouse.begin().await.unwrap();
    let inserted = ensure_calendar(uow.as_mut(), &config, [date(2024, 2, 2)])
        .await
        .unwrap();
    uow.commit().await.unwrap();

    assert_eq!(inserted, 33);
}

#[tokio::test]
async fn test_rolled_back_calendar_is_not_persisted() {
    let warehouse = MemoryWarehouse::new();
    let config = CalendarConfig::default();

    let mut uow = warehouse.begin().await.unwrap();
    ensure_calendar(uow.as_mut(), &config, [date(2024, 5, 1), date(2024, 5, 10)])
        .await
        .unwrap();
    uow.rollback().await.unwrap();

    assert_eq!(warehouse.snapshot().await.calendar_len("dim_date"), 0);
}
