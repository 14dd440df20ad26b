//! Effective-date primitives
//!
//! Reference data (prices, conditions, discounts, groups) is effective-dated
//! and carries an explicit lifecycle state. Every check takes an explicit
//! as-of date so adjudication is reproducible for past service dates; nothing
//! in this module reads the wall clock except [`Timezone::today`].

use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to temporal values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must not be after end {end}")]
    InvalidPeriod {
        start: String,
        end: String,
    },

    #[error("Unknown period type: {0}")]
    UnknownPeriodType(String),

    #[error("Unknown lifecycle state: {0}")]
    UnknownLifecycle(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Jurisdiction timezone used to decide what "today" means
///
/// Wraps chrono_tz::Tz with string serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Parses an IANA timezone name such as `Asia/Tehran`
    pub fn parse(name: &str) -> Result<Self, TemporalError> {
        Tz::from_str(name)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(name.to_string()))
    }

    /// Current calendar date in this timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timezone::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Inclusive date range during which a record is effective
///
/// `to = None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePeriod {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl EffectivePeriod {
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self, TemporalError> {
        if let Some(to) = to {
            if from > to {
                return Err(TemporalError::InvalidPeriod {
                    start: from.to_string(),
                    end: to.to_string(),
                });
            }
        }
        Ok(Self { from, to })
    }

    /// Open-ended period starting at `from`
    pub fn starting(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    /// True if `date` falls within the period, both ends inclusive
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.map_or(true, |to| date <= to)
    }

    pub fn overlaps(&self, other: &EffectivePeriod) -> bool {
        let self_end = self.to.unwrap_or(NaiveDate::MAX);
        let other_end = other.to.unwrap_or(NaiveDate::MAX);
        self.from <= other_end && other.from <= self_end
    }
}

/// Lifecycle state of administrator-maintained reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Being authored, never applied
    Draft,
    /// Applied when the effective period covers the as-of date
    Active,
    /// No longer applied, kept for audit
    Retired,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Draft => "draft",
            Lifecycle::Active => "active",
            Lifecycle::Retired => "retired",
        }
    }
}

impl FromStr for Lifecycle {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Lifecycle::Draft),
            "active" => Ok(Lifecycle::Active),
            "retired" => Ok(Lifecycle::Retired),
            other => Err(TemporalError::UnknownLifecycle(other.to_string())),
        }
    }
}

/// The explicit "active and effective" predicate used by every resolver
pub fn is_in_force(lifecycle: Lifecycle, period: &EffectivePeriod, as_of: NaiveDate) -> bool {
    lifecycle == Lifecycle::Active && period.contains(as_of)
}

/// Age in whole years on the given date
///
/// Returns `None` when `on` precedes `birth_date`.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> Option<u32> {
    on.years_since(birth_date)
}

/// Inclusive calendar window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Smallest window covering both
    pub fn union(&self, other: &DateWindow) -> DateWindow {
        DateWindow {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Calendar period used by usage caps
///
/// The window is always the calendar period containing the service date;
/// weeks are ISO weeks starting on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 4] = [
        PeriodType::Daily,
        PeriodType::Weekly,
        PeriodType::Monthly,
        PeriodType::Yearly,
    ];

    /// The calendar window of this period type containing `date`
    pub fn window(&self, date: NaiveDate) -> DateWindow {
        match self {
            PeriodType::Daily => DateWindow { start: date, end: date },
            PeriodType::Weekly => {
                let offset = u64::from(date.weekday().num_days_from_monday());
                let start = date.checked_sub_days(Days::new(offset)).unwrap_or(date);
                let end = start.checked_add_days(Days::new(6)).unwrap_or(date);
                DateWindow { start, end }
            }
            PeriodType::Monthly => {
                let start = date.with_day(1).unwrap_or(date);
                let end = start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(date);
                DateWindow { start, end }
            }
            PeriodType::Yearly => {
                let start = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
                let end = NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date);
                DateWindow { start, end }
            }
        }
    }

    /// Window covering every period type around `date`
    ///
    /// Usage history loaded for this window is sufficient to evaluate any cap.
    pub fn covering_window(date: NaiveDate) -> DateWindow {
        PeriodType::ALL
            .iter()
            .map(|p| p.window(date))
            .fold(DateWindow { start: date, end: date }, |acc, w| acc.union(&w))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Yearly => "yearly",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PeriodType::Daily),
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            "yearly" => Ok(PeriodType::Yearly),
            other => Err(TemporalError::UnknownPeriodType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_effective_period_is_inclusive() {
        let period = EffectivePeriod::new(date(2024, 1, 1), Some(date(2024, 6, 30))).unwrap();
        assert!(period.contains(date(2024, 1, 1)));
        assert!(period.contains(date(2024, 6, 30)));
        assert!(!period.contains(date(2024, 7, 1)));
    }

    #[test]
    fn test_monthly_window_handles_february() {
        let window = PeriodType::Monthly.window(date(2024, 2, 14));
        assert_eq!(window.start, date(2024, 2, 1));
        assert_eq!(window.end, date(2024, 2, 29));
    }

    #[test]
    fn test_weekly_window_starts_monday() {
        // 2024-03-14 is a Thursday
        let window = PeriodType::Weekly.window(date(2024, 3, 14));
        assert_eq!(window.start, date(2024, 3, 11));
        assert_eq!(window.end, date(2024, 3, 17));
    }

    #[test]
    fn test_covering_window_spans_year_boundary_week() {
        // 2025-01-01 is a Wednesday, its ISO week starts 2024-12-30
        let window = PeriodType::covering_window(date(2025, 1, 1));
        assert_eq!(window.start, date(2024, 12, 30));
        assert_eq!(window.end, date(2025, 12, 31));
    }

    #[test]
    fn test_in_force_requires_active_state() {
        let period = EffectivePeriod::starting(date(2024, 1, 1));
        assert!(is_in_force(Lifecycle::Active, &period, date(2024, 5, 1)));
        assert!(!is_in_force(Lifecycle::Draft, &period, date(2024, 5, 1)));
        assert!(!is_in_force(Lifecycle::Retired, &period, date(2024, 5, 1)));
        assert!(!is_in_force(Lifecycle::Active, &period, date(2023, 12, 31)));
    }
}
