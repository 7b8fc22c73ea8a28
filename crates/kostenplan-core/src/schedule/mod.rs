//! Synthetic quarter buckets for liquidity planning.
//!
//! A quarter here is a planning bucket of exactly three calendar months
//! anchored to the project start date, not a fiscal-reporting period.
//! Generation is pure and deterministic: identical inputs always yield the
//! identical sequence.
//!
//! # Invariants
//!
//! - Quarters are contiguous and non-overlapping: quarter *i* ends exactly
//!   one day before quarter *i+1* starts
//! - `quarter_count == ceil(duration_months / 3)`

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Practical bounds for the total project duration in months.
pub const MIN_DURATION_MONTHS: u32 = 1;
/// Upper bound for the total project duration in months.
pub const MAX_DURATION_MONTHS: u32 = 120;
/// Upper bound for the planning-phase duration in months.
pub const MAX_PLANNING_MONTHS: u32 = 24;

/// Fallback total duration when the configured value is out of range.
pub const DEFAULT_DURATION_MONTHS: u32 = 24;
/// Fallback planning duration when the configured value is out of range.
pub const DEFAULT_PLANNING_MONTHS: u32 = 6;

/// One synthetic three-month planning bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quarter {
    /// Sequential position in the generated sequence, 0-based.
    pub index: usize,
    /// Stable identifier, e.g. `"Q3.2025"`.
    pub id: String,
    /// Display label, e.g. `"Q3 2025"`.
    pub label: String,
    /// First day of the bucket.
    pub start: NaiveDate,
    /// Last day of the bucket, one day before the next bucket starts.
    pub end: NaiveDate,
    /// Calendar year of the start date.
    pub year: i32,
    /// Calendar quarter (1-4) of the start date.
    pub quarter_of_year: u32,
}

/// Time configuration for a liquidity plan.
///
/// Constructed through [`TimeConfig::new`], which sanitizes out-of-range
/// durations to the module defaults instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Project start date.
    pub start_date: NaiveDate,
    /// Total project duration in months, within `1..=120`.
    pub total_duration_months: u32,
    /// Planning-phase duration in months, within `1..=24`.
    pub planning_duration_months: u32,
}

impl TimeConfig {
    /// Creates a sanitized time configuration.
    ///
    /// Durations outside their practical ranges fall back to
    /// [`DEFAULT_DURATION_MONTHS`] and [`DEFAULT_PLANNING_MONTHS`]; a
    /// warning is logged, mirroring the degrade-to-default input contract.
    #[must_use]
    pub fn new(start_date: NaiveDate, total_duration_months: u32, planning_duration_months: u32) -> Self {
        let total = if (MIN_DURATION_MONTHS..=MAX_DURATION_MONTHS).contains(&total_duration_months) {
            total_duration_months
        } else {
            tracing::warn!(
                total_duration_months,
                fallback = DEFAULT_DURATION_MONTHS,
                "total duration out of range, using default"
            );
            DEFAULT_DURATION_MONTHS
        };
        let planning = if (MIN_DURATION_MONTHS..=MAX_PLANNING_MONTHS).contains(&planning_duration_months) {
            planning_duration_months
        } else {
            tracing::warn!(
                planning_duration_months,
                fallback = DEFAULT_PLANNING_MONTHS,
                "planning duration out of range, using default"
            );
            DEFAULT_PLANNING_MONTHS
        };
        Self {
            start_date,
            total_duration_months: total,
            planning_duration_months: planning,
        }
    }

    /// Number of quarters the total duration spans.
    #[must_use]
    pub const fn quarter_count(&self) -> u32 {
        self.total_duration_months.div_ceil(3)
    }

    /// Number of quarters the planning phase spans.
    #[must_use]
    pub const fn planning_quarter_count(&self) -> u32 {
        self.planning_duration_months.div_ceil(3)
    }
}

/// Adds calendar months with day-of-month clamping (Jan 31 + 3 months is
/// Apr 30). Saturates at the calendar boundary, which is unreachable for
/// the supported duration range.
fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Generates the contiguous quarter sequence for a project.
///
/// `quarter_count = ceil(duration_months / 3)`; quarter *i* starts at
/// `start + 3*i` calendar months and ends one day before quarter *i+1*
/// would start. Pure: no side effects, deterministic output.
#[must_use]
pub fn generate_quarters(start: NaiveDate, duration_months: u32) -> Vec<Quarter> {
    let count = duration_months.div_ceil(3);
    let mut quarters = Vec::with_capacity(count as usize);
    for i in 0..count {
        let quarter_start = add_months(start, i * 3);
        let next_start = add_months(start, (i + 1) * 3);
        let quarter_end = next_start.pred_opt().unwrap_or(next_start);

        let year = quarter_start.year();
        let quarter_of_year = quarter_start.month0() / 3 + 1;

        quarters.push(Quarter {
            index: i as usize,
            id: format!("Q{quarter_of_year}.{year}"),
            label: format!("Q{quarter_of_year} {year}"),
            start: quarter_start,
            end: quarter_end,
            year,
            quarter_of_year,
        });
    }
    quarters
}
