//! Time-ordered rate series.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{CurrencyCode, Granularity, TimePoint};

/// Per-currency exchange rates observed at one instant.
pub type CurrencyRates = BTreeMap<CurrencyCode, f64>;

/// A scalar price series (basket price or single-feed price).
pub type PriceSeries = RateSeries<f64>;

/// A currency-keyed rate series.
pub type KeyedSeries = RateSeries<CurrencyRates>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint<V> {
    pub time: TimePoint,
    pub value: V,
}

impl<V> SeriesPoint<V> {
    pub fn new(time: TimePoint, value: V) -> Self {
        Self { time, value }
    }
}

/// Points sorted ascending by time with unique timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSeries<V> {
    points: Vec<SeriesPoint<V>>,
}

impl<V> RateSeries<V> {
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a series from points in any order.
    ///
    /// Sorting is stable, so when a timestamp repeats the point that came
    /// last in the input is the one kept.
    pub fn from_points(mut points: Vec<SeriesPoint<V>>) -> Self {
        points.sort_by_key(|p| p.time);
        let mut deduped: Vec<SeriesPoint<V>> = Vec::with_capacity(points.len());
        for p in points {
            match deduped.last_mut() {
                Some(last) if last.time == p.time => *last = p,
                _ => deduped.push(p),
            }
        }
        Self { points: deduped }
    }

    /// Wrap points the caller guarantees to be strictly ascending.
    pub(crate) fn from_sorted_unchecked(points: Vec<SeriesPoint<V>>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].time < w[1].time));
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SeriesPoint<V>] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeriesPoint<V>> {
        self.points.iter()
    }

    pub fn into_points(self) -> Vec<SeriesPoint<V>> {
        self.points
    }

    pub fn first(&self) -> Option<&SeriesPoint<V>> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&SeriesPoint<V>> {
        self.points.last()
    }

    pub fn start(&self) -> Option<TimePoint> {
        self.first().map(|p| p.time)
    }

    pub fn end(&self) -> Option<TimePoint> {
        self.last().map(|p| p.time)
    }

    /// Latest point at or before `t`.
    pub fn at_or_before(&self, t: TimePoint) -> Option<&SeriesPoint<V>> {
        let idx = self.points.partition_point(|p| p.time <= t);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// Points with `start <= time <= end`.
    pub fn slice_inclusive(&self, start: TimePoint, end: TimePoint) -> &[SeriesPoint<V>] {
        if start > end {
            return &[];
        }
        let lo = self.points.partition_point(|p| p.time < start);
        let hi = self.points.partition_point(|p| p.time <= end);
        &self.points[lo..hi]
    }
}

impl<V: Clone> RateSeries<V> {
    pub fn window(&self, start: TimePoint, end: TimePoint) -> Self {
        Self {
            points: self.slice_inclusive(start, end).to_vec(),
        }
    }
}

impl<V> RateSeries<Option<V>> {
    /// Drop absent points, keeping the rest in order.
    pub fn drop_gaps(self) -> RateSeries<V> {
        RateSeries {
            points: self
                .points
                .into_iter()
                .filter_map(|p| p.value.map(|v| SeriesPoint::new(p.time, v)))
                .collect(),
        }
    }
}

impl KeyedSeries {
    /// Every currency that appears in at least one point.
    pub fn currencies(&self) -> BTreeSet<CurrencyCode> {
        self.points
            .iter()
            .flat_map(|p| p.value.keys().copied())
            .collect()
    }

    /// Scalar series of one currency, skipping points that lack it.
    pub fn column(&self, code: &CurrencyCode) -> PriceSeries {
        RateSeries {
            points: self
                .points
                .iter()
                .filter_map(|p| p.value.get(code).map(|v| SeriesPoint::new(p.time, *v)))
                .collect(),
        }
    }
}

impl<V> Default for RateSeries<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> IntoIterator for RateSeries<V> {
    type Item = SeriesPoint<V>;
    type IntoIter = std::vec::IntoIter<SeriesPoint<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a RateSeries<V> {
    type Item = &'a SeriesPoint<V>;
    type IntoIter = std::slice::Iter<'a, SeriesPoint<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<V> FromIterator<SeriesPoint<V>> for RateSeries<V> {
    fn from_iter<I: IntoIterator<Item = SeriesPoint<V>>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

/// A rate series tagged with the granularity of the feed it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed<V> {
    pub granularity: Granularity,
    pub series: RateSeries<V>,
}

impl<V> Feed<V> {
    pub fn new(granularity: Granularity, series: RateSeries<V>) -> Self {
        Self {
            granularity,
            series,
        }
    }

    pub fn empty(granularity: Granularity) -> Self {
        Self::new(granularity, RateSeries::empty())
    }
}
