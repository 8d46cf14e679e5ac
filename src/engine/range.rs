//! Human-readable zoom ranges ("Prior Day", "5d", "3m", ...).

use chrono::{DateTime, Months, TimeDelta, Utc};
use chrono_tz::Tz;
use std::convert::Infallible;
use std::str::FromStr;

use crate::domain::calendar::{localize, start_of_day};
use crate::domain::{RateSeries, TimePoint};

/// Labels offered to the user, in display order.
pub const RANGE_PRESETS: [&str; 12] = [
    "Prior Day", "1d", "5d", "1w", "1m", "3m", "6m", "1y", "3y", "5y", "10y", "All",
];

pub const DEFAULT_RANGE: &str = "Prior Day";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeLabel {
    /// The full calendar day before the reference day.
    PriorDay,
    Days(u32),
    Weeks(u32),
    /// Calendar months, clamped at month end.
    Months(u32),
    /// Calendar years, clamped at month end (Feb 29th).
    Years(u32),
    All,
}

impl RangeLabel {
    /// Parse a label; anything unrecognized means the whole series.
    pub fn parse(label: &str) -> Self {
        let norm = label.trim().to_ascii_lowercase();
        match norm.as_str() {
            "prior day" | "prior_day" | "prior-day" | "priorday" => return RangeLabel::PriorDay,
            "all" | "" => return RangeLabel::All,
            _ => {}
        }

        let Some(unit) = norm.chars().last() else {
            return RangeLabel::All;
        };
        let Ok(n) = norm[..norm.len() - unit.len_utf8()].trim().parse::<u32>() else {
            return RangeLabel::All;
        };
        match unit {
            'd' => RangeLabel::Days(n),
            'w' => RangeLabel::Weeks(n),
            'm' => RangeLabel::Months(n),
            'y' => RangeLabel::Years(n),
            _ => RangeLabel::All,
        }
    }

    /// Inclusive `[start, end]` window relative to `reference`.
    ///
    /// `None` means unbounded. Calendar days are read in `zone`.
    pub fn window(&self, reference: TimePoint, zone: Tz) -> Option<(TimePoint, TimePoint)> {
        let local = reference.with_timezone(&zone).naive_local();
        let start = match *self {
            RangeLabel::All => return None,
            RangeLabel::PriorDay => {
                let end = start_of_day(reference, zone);
                let start = start_of_day(end - TimeDelta::hours(12), zone);
                return Some((start, end));
            }
            RangeLabel::Days(n) => TimeDelta::try_days(i64::from(n))
                .and_then(|d| reference.checked_sub_signed(d)),
            RangeLabel::Weeks(n) => TimeDelta::try_weeks(i64::from(n))
                .and_then(|d| reference.checked_sub_signed(d)),
            RangeLabel::Months(n) => local
                .checked_sub_months(Months::new(n))
                .and_then(|d| localize(d, zone)),
            RangeLabel::Years(n) => n
                .checked_mul(12)
                .and_then(|m| local.checked_sub_months(Months::new(m)))
                .and_then(|d| localize(d, zone)),
        };
        Some((start.unwrap_or(DateTime::<Utc>::MIN_UTC), reference))
    }
}

impl FromStr for RangeLabel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl std::fmt::Display for RangeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeLabel::PriorDay => write!(f, "Prior Day"),
            RangeLabel::Days(n) => write!(f, "{}d", n),
            RangeLabel::Weeks(n) => write!(f, "{}w", n),
            RangeLabel::Months(n) => write!(f, "{}m", n),
            RangeLabel::Years(n) => write!(f, "{}y", n),
            RangeLabel::All => write!(f, "All"),
        }
    }
}

/// Sub-series inside the label's window, with UTC calendar days.
///
/// `reference` defaults to the series' last timestamp, so the result only
/// depends on the data.
pub fn filter_range<V: Clone>(
    series: &RateSeries<V>,
    label: &RangeLabel,
    reference: Option<TimePoint>,
) -> RateSeries<V> {
    filter_range_in(series, label, reference, Tz::UTC)
}

pub fn filter_range_in<V: Clone>(
    series: &RateSeries<V>,
    label: &RangeLabel,
    reference: Option<TimePoint>,
    zone: Tz,
) -> RateSeries<V> {
    let Some(reference) = reference.or_else(|| series.end()) else {
        return RateSeries::empty();
    };
    match label.window(reference, zone) {
        Some((start, end)) => series.window(start, end),
        None => series.clone(),
    }
}
