//! Shared primitive types used across every generator.

use chrono::NaiveDate;

/// Stable catalog identifier of a practice location, e.g. `LOC001`.
pub type LocationId = String;

/// Stable identifier of a synthetic patient, e.g. `P00042`.
pub type PatientId = String;

/// Stable identifier of any other entity (visit, provider, staff, plan).
pub type EntityId = String;

/// Key of the per-day aggregation index.
pub type DayKey = (LocationId, NaiveDate);

/// Key of the per-month aggregation indices: (location, year, month).
pub type MonthKey = (LocationId, i32, u32);

/// Round a money amount to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round a ratio to four decimal places.
pub fn round_ratio(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
