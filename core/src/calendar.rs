//! Calendar helpers: business days, month periods, trend interpolation.
//!
//! RULE: Sundays and catalog holidays are closed days. No generator
//! emits a daily row for a closed day.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// First day of the baseline → target interpolation window.
pub const TREND_START: (i32, u32, u32) = (2020, 1, 1);
/// Last day of the baseline → target interpolation window.
pub const TREND_END: (i32, u32, u32) = (2025, 12, 31);

pub fn is_business_day(date: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> bool {
    date.weekday() != Weekday::Sun && !holidays.contains(&date)
}

pub fn is_saturday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sat
}

/// Every business day in `[start, end]`, ascending.
pub fn business_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d, holidays))
        .collect()
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// First-of-month dates from the month of `start` through the month of `end`.
pub fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut cursor = first_of_month(start);
    while cursor <= end {
        months.push(cursor);
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    months
}

/// (year, month) of the month before.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

pub fn quarter(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Whole and fractional years between two dates (negative if `to` < `from`).
pub fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / 365.25
}

/// Position of `date` inside the trend window, clamped to [0, 1].
pub fn trend_progress(date: NaiveDate) -> f64 {
    let (sy, sm, sd) = TREND_START;
    let (ey, em, ed) = TREND_END;
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(sy, sm, sd),
        NaiveDate::from_ymd_opt(ey, em, ed),
    ) else {
        return 0.0;
    };
    let span = (end - start).num_days() as f64;
    ((date - start).num_days() as f64 / span).clamp(0.0, 1.0)
}

/// Linear interpolation between a baseline and a target along the trend window.
pub fn interpolate(date: NaiveDate, baseline: f64, target: f64) -> f64 {
    baseline + (target - baseline) * trend_progress(date)
}

/// Count of open weekdays, open Saturdays and holidays in a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthMix {
    pub weekdays: u32,
    pub saturdays: u32,
    pub holidays: u32,
}

impl MonthMix {
    pub fn for_month(month_start: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> Self {
        let end = last_of_month(month_start);
        let mut mix = MonthMix { weekdays: 0, saturdays: 0, holidays: 0 };
        for day in month_start.iter_days().take_while(|d| *d <= end) {
            if holidays.contains(&day) {
                mix.holidays += 1;
            } else if day.weekday() == Weekday::Sat {
                mix.saturdays += 1;
            } else if day.weekday() != Weekday::Sun {
                mix.weekdays += 1;
            }
        }
        mix
    }

    /// Weighted open days, a Saturday counting as half a day.
    pub fn effective_days(&self) -> f64 {
        self.weekdays as f64 + 0.5 * self.saturdays as f64
    }
}

/// Month-of-year demand profile: January and December slow, late
/// summer busy with back-to-school checkups.
pub fn seasonal_profile(month: u32) -> f64 {
    match month {
        1 => 0.92,
        2 => 0.95,
        3 => 1.02,
        4 => 1.00,
        5 => 1.01,
        6 => 1.04,
        7 => 1.03,
        8 => 1.08,
        9 => 1.02,
        10 => 1.00,
        11 => 0.97,
        12 => 0.90,
        _ => 1.0,
    }
}

/// Seasonal revenue multiplier for a month: the month-of-year profile
/// scaled by how many effective open days the month has against a
/// typical 23.5-day month.
pub fn seasonal_factor(month_start: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> f64 {
    let mix = MonthMix::for_month(month_start, holidays);
    seasonal_profile(month_start.month()) * (mix.effective_days() / 23.5)
}
