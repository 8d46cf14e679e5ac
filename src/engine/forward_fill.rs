//! Step-function sampling of a sparse series onto a fixed grid.

use chrono::TimeDelta;

use crate::domain::{RateSeries, SeriesPoint, TimePoint};

/// How long a feed's last sample keeps being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Up to and including the last sample's own timestamp.
    LastSample,
    /// Up to, but excluding, the given instant.
    Until(TimePoint),
    /// Up to and including the given instant.
    Through(TimePoint),
}

/// Lazily yields slots `start, start + step, ...` strictly before `end`.
///
/// `step` must be positive.
pub fn grid_slots(
    start: TimePoint,
    end: TimePoint,
    step: TimeDelta,
) -> impl Iterator<Item = TimePoint> {
    debug_assert!(step > TimeDelta::zero());
    std::iter::successors(Some(start), move |t| t.checked_add_signed(step))
        .take_while(move |t| *t < end)
}

pub fn build_grid(start: TimePoint, end: TimePoint, step: TimeDelta) -> Vec<TimePoint> {
    grid_slots(start, end, step).collect()
}

/// Walks a sorted series alongside an ascending sequence of slots,
/// reporting the last known value at each one.
#[derive(Debug, Clone)]
pub struct StepCursor<'a, V> {
    points: &'a [SeriesPoint<V>],
    seen: usize,
    horizon: Horizon,
}

impl<'a, V> StepCursor<'a, V> {
    pub fn new(series: &'a RateSeries<V>, horizon: Horizon) -> Self {
        Self {
            points: series.points(),
            seen: 0,
            horizon,
        }
    }

    /// Value in force at `slot`.
    ///
    /// Slots must be queried in ascending order; skipping slots is fine.
    /// `None` before the first sample and past the horizon.
    pub fn value_at(&mut self, slot: TimePoint) -> Option<&'a V> {
        while self.seen < self.points.len() && self.points[self.seen].time <= slot {
            self.seen += 1;
        }
        let latest = &self.points[self.seen.checked_sub(1)?];
        let covered = match self.horizon {
            Horizon::LastSample => slot <= self.points[self.points.len() - 1].time,
            Horizon::Until(end) => slot < end,
            Horizon::Through(end) => slot <= end,
        };
        covered.then_some(&latest.value)
    }
}

/// Value of `series` at each grid slot, carrying the last known value
/// forward.
///
/// A slot before the first sample is `None`, as is any slot past `horizon`.
/// `grid` must be ascending.
pub fn forward_fill<V: Clone>(
    series: &RateSeries<V>,
    grid: &[TimePoint],
    horizon: Horizon,
) -> Vec<Option<V>> {
    let mut cursor = StepCursor::new(series, horizon);
    grid.iter()
        .map(|&slot| cursor.value_at(slot).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> TimePoint {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_build_grid_excludes_end() {
        let grid = build_grid(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T00:03:00Z"),
            TimeDelta::minutes(1),
        );
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[2], ts("2024-01-01T00:02:00Z"));
    }

    #[test]
    fn test_fail_closed_before_first_sample() {
        let series = RateSeries::from_points(vec![
            SeriesPoint::new(ts("2024-01-01T00:02:00Z"), 1.0),
            SeriesPoint::new(ts("2024-01-01T00:04:30Z"), 2.0),
        ]);
        let grid = build_grid(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T00:07:00Z"),
            TimeDelta::minutes(1),
        );

        let filled = forward_fill(&series, &grid, Horizon::LastSample);
        assert_eq!(
            filled,
            vec![None, None, Some(1.0), Some(1.0), Some(1.0), None, None]
        );
    }

    #[test]
    fn test_until_horizon_carries_past_last_sample() {
        let series = RateSeries::from_points(vec![SeriesPoint::new(
            ts("2024-01-01T00:00:00Z"),
            5.0,
        )]);
        let grid = build_grid(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T00:04:00Z"),
            TimeDelta::minutes(1),
        );

        let filled = forward_fill(
            &series,
            &grid,
            Horizon::Until(ts("2024-01-01T00:03:00Z")),
        );
        assert_eq!(filled, vec![Some(5.0), Some(5.0), Some(5.0), None]);
    }

    #[test]
    fn test_through_horizon_is_inclusive() {
        let series = RateSeries::from_points(vec![SeriesPoint::new(
            ts("2024-01-01T00:00:00Z"),
            5.0,
        )]);
        let grid = build_grid(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T00:04:00Z"),
            TimeDelta::minutes(1),
        );

        let filled = forward_fill(
            &series,
            &grid,
            Horizon::Through(ts("2024-01-01T00:02:00Z")),
        );
        assert_eq!(filled, vec![Some(5.0), Some(5.0), Some(5.0), None]);
    }

    #[test]
    fn test_sub_slot_samples_take_latest() {
        let series = RateSeries::from_points(vec![
            SeriesPoint::new(ts("2024-01-01T00:00:10Z"), 1.0),
            SeriesPoint::new(ts("2024-01-01T00:00:40Z"), 2.0),
            SeriesPoint::new(ts("2024-01-01T00:01:00Z"), 3.0),
        ]);
        let grid = build_grid(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T00:02:00Z"),
            TimeDelta::minutes(1),
        );
        assert_eq!(
            forward_fill(&series, &grid, Horizon::LastSample),
            vec![None, Some(3.0)]
        );
    }

    #[test]
    fn test_empty_series_is_all_none() {
        let series: RateSeries<f64> = RateSeries::empty();
        let grid = vec![ts("2024-01-01T00:00:00Z")];
        assert_eq!(forward_fill(&series, &grid, Horizon::LastSample), vec![None]);
    }
}
