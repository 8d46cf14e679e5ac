//! Merge daily, minute and tick feeds into one gap-free series.
//!
//! Every feed is sampled onto a shared fixed-step grid spanning whole
//! calendar days, then each slot takes its value from the most granular feed
//! that covers it (tick > minute > daily). The choice is made per slot, so
//! the source can change from one slot to the next.
//!
//! Coverage per feed:
//! - daily: from the first daily sample to the end of the calendar day of
//!   the last one (an end-of-day level holds for the rest of that day). When
//!   a finer feed reports later than the last daily sample on that same day,
//!   daily coverage stops at the finer feed's last sample instead;
//! - minute / tick: from the first sample through the last sample, never
//!   extrapolated beyond it.

use chrono::TimeDelta;
use chrono_tz::Tz;
use std::collections::BTreeSet;
use thiserror::Error;

use super::forward_fill::{grid_slots, Horizon, StepCursor};
use crate::domain::calendar::{start_of_day, start_of_next_day};
use crate::domain::{
    CurrencyCode, CurrencyRates, Feed, Granularity, KeyedSeries, RateSeries, SeriesPoint,
    TimePoint,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnifyError {
    #[error("resolution must be positive, got {0}")]
    InvalidResolution(TimeDelta),
}

pub fn default_resolution() -> TimeDelta {
    TimeDelta::minutes(1)
}

/// Unify three scalar (or identically shaped) series with UTC calendar days.
pub fn unify<V: Clone>(
    daily: &RateSeries<V>,
    minute: &RateSeries<V>,
    tick: &RateSeries<V>,
    resolution: TimeDelta,
) -> Result<RateSeries<V>, UnifyError> {
    let unifier = Unifier::new(resolution)?;
    Ok(unifier.unify_feeds(&[
        &Feed::new(Granularity::Daily, daily.clone()),
        &Feed::new(Granularity::Minute, minute.clone()),
        &Feed::new(Granularity::Tick, tick.clone()),
    ]))
}

#[derive(Debug, Clone, Copy)]
pub struct Unifier {
    resolution: TimeDelta,
    zone: Tz,
}

impl Unifier {
    pub fn new(resolution: TimeDelta) -> Result<Self, UnifyError> {
        if resolution <= TimeDelta::zero() {
            return Err(UnifyError::InvalidResolution(resolution));
        }
        Ok(Self {
            resolution,
            zone: Tz::UTC,
        })
    }

    /// Zone whose calendar days bound the grid and the daily coverage.
    pub fn with_zone(mut self, zone: Tz) -> Self {
        self.zone = zone;
        self
    }

    pub fn resolution(&self) -> TimeDelta {
        self.resolution
    }

    /// Unify feeds of any granularity; empty feeds are ignored.
    ///
    /// Feeds sharing a granularity rank in the order given.
    pub fn unify_feeds<V: Clone>(&self, feeds: &[&Feed<V>]) -> RateSeries<V> {
        let Some((start, end)) = self.span(feeds.iter().map(|f| &f.series)) else {
            return RateSeries::empty();
        };

        let finer_end = latest_intraday(feeds.iter().copied());
        let mut cursors = self.ranked_cursors(feeds, finer_end);
        let points = grid_slots(start, end, self.resolution)
            .filter_map(|slot| {
                cursors
                    .iter_mut()
                    .find_map(|c| c.value_at(slot))
                    .map(|v| SeriesPoint::new(slot, v.clone()))
            })
            .collect();
        RateSeries::from_sorted_unchecked(points)
    }

    /// Unify currency-keyed feeds one currency at a time on a shared grid.
    ///
    /// A slot is kept only once every currency seen in any feed has a value
    /// there, so all output points carry the same key set.
    pub fn unify_keyed(&self, feeds: &[&Feed<CurrencyRates>]) -> KeyedSeries {
        self.unify_keyed_with(feeds, |_, rates| Some(rates.clone()))
    }

    /// Like [`Unifier::unify_keyed`], but hands each complete slot to `f`
    /// instead of storing it. Only the values `f` returns are kept.
    pub fn unify_keyed_with<T>(
        &self,
        feeds: &[&Feed<CurrencyRates>],
        mut f: impl FnMut(TimePoint, &CurrencyRates) -> Option<T>,
    ) -> RateSeries<T> {
        let currencies: BTreeSet<CurrencyCode> = feeds
            .iter()
            .flat_map(|f| f.series.currencies())
            .collect();
        if currencies.is_empty() {
            return RateSeries::empty();
        }
        let Some((start, end)) = self.span(feeds.iter().map(|f| &f.series)) else {
            return RateSeries::empty();
        };
        let finer_end = latest_intraday(feeds.iter().copied());

        let columns: Vec<(CurrencyCode, Vec<Feed<f64>>)> = currencies
            .into_iter()
            .map(|code| {
                let per_currency = feeds
                    .iter()
                    .map(|f| Feed::new(f.granularity, f.series.column(&code)))
                    .collect();
                (code, per_currency)
            })
            .collect();
        let mut cursors: Vec<(CurrencyCode, Vec<StepCursor<'_, f64>>)> = columns
            .iter()
            .map(|(code, per_currency)| {
                let refs: Vec<&Feed<f64>> = per_currency.iter().collect();
                (*code, self.ranked_cursors(&refs, finer_end))
            })
            .collect();

        let mut rates = CurrencyRates::new();
        let points = grid_slots(start, end, self.resolution)
            .filter_map(|slot| {
                for (code, ranked) in cursors.iter_mut() {
                    let value = ranked.iter_mut().find_map(|c| c.value_at(slot))?;
                    rates.insert(*code, *value);
                }
                f(slot, &rates).map(|v| SeriesPoint::new(slot, v))
            })
            .collect();
        RateSeries::from_sorted_unchecked(points)
    }

    /// Whole-day `[start, end)` bounds over the union of the non-empty series.
    fn span<'a, V: 'a>(
        &self,
        series: impl Iterator<Item = &'a RateSeries<V>>,
    ) -> Option<(TimePoint, TimePoint)> {
        let mut span: Option<(TimePoint, TimePoint)> = None;
        for s in series {
            let (Some(first), Some(last)) = (s.start(), s.end()) else {
                continue;
            };
            span = Some(match span {
                Some((lo, hi)) => (lo.min(first), hi.max(last)),
                None => (first, last),
            });
        }
        let (lo, hi) = span?;
        Some((start_of_day(lo, self.zone), start_of_next_day(hi, self.zone)))
    }

    /// One cursor per non-empty feed, most granular first.
    fn ranked_cursors<'a, V>(
        &self,
        feeds: &[&'a Feed<V>],
        finer_end: Option<TimePoint>,
    ) -> Vec<StepCursor<'a, V>> {
        let mut ranked: Vec<&'a Feed<V>> = feeds
            .iter()
            .copied()
            .filter(|f| !f.series.is_empty())
            .collect();
        ranked.sort_by(|a, b| b.granularity.cmp(&a.granularity));
        ranked
            .into_iter()
            .map(|f| StepCursor::new(&f.series, self.horizon(f, finer_end)))
            .collect()
    }

    fn horizon<V>(&self, feed: &Feed<V>, finer_end: Option<TimePoint>) -> Horizon {
        let (Granularity::Daily, Some(last)) = (feed.granularity, feed.series.end()) else {
            return Horizon::LastSample;
        };
        let day_end = start_of_next_day(last, self.zone);
        match finer_end {
            Some(t) if t > last && t < day_end => Horizon::Through(t),
            _ => Horizon::Until(day_end),
        }
    }
}

/// Last sample across the minute and tick feeds.
fn latest_intraday<'a, V: 'a>(feeds: impl Iterator<Item = &'a Feed<V>>) -> Option<TimePoint> {
    feeds
        .filter(|f| f.granularity > Granularity::Daily)
        .filter_map(|f| f.series.end())
        .max()
}
