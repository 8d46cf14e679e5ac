use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;
use wpu_basket::engine::{filter_range, unify, RangeLabel, RANGE_PRESETS};
use wpu_basket::{PriceSeries, SeriesPoint, TimePoint};

const DAYS: i64 = 3;
const STEP_SECS: i64 = 300;

fn base() -> TimePoint {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn at(secs: i64) -> TimePoint {
    base() + TimeDelta::seconds(secs)
}

/// One sample per day at midnight, so daily data spans the whole window.
fn arb_daily() -> impl Strategy<Value = PriceSeries> {
    proptest::collection::vec(100.0f64..200.0, DAYS as usize).prop_map(|values| {
        PriceSeries::from_points(
            values
                .into_iter()
                .enumerate()
                .map(|(day, v)| SeriesPoint::new(at(day as i64 * 86_400), v))
                .collect(),
        )
    })
}

fn arb_sparse(
    max_len: usize,
    granule_secs: i64,
    values: std::ops::Range<f64>,
) -> impl Strategy<Value = PriceSeries> {
    proptest::collection::vec((0..DAYS * 86_400 / granule_secs, values), 0..max_len).prop_map(
        move |samples| {
            PriceSeries::from_points(
                samples
                    .into_iter()
                    .map(|(k, v)| SeriesPoint::new(at(k * granule_secs), v))
                    .collect(),
            )
        },
    )
}

fn covers(series: &PriceSeries, slot: DateTime<Utc>) -> Option<f64> {
    let (first, last) = (series.start()?, series.end()?);
    if slot < first || slot > last {
        return None;
    }
    series.at_or_before(slot).map(|p| p.value)
}

proptest! {
    #[test]
    fn finer_granularity_wins_where_it_covers(
        daily in arb_daily(),
        minute in arb_sparse(40, 60, 200.0..300.0),
        tick in arb_sparse(40, 1, 300.0..400.0),
    ) {
        let unified = unify(&daily, &minute, &tick, TimeDelta::seconds(STEP_SECS)).unwrap();

        for p in unified.iter() {
            let expected = covers(&tick, p.time)
                .or_else(|| covers(&minute, p.time))
                .or_else(|| daily.at_or_before(p.time).map(|d| d.value));
            prop_assert_eq!(Some(p.value), expected, "slot {}", p.time);
        }
    }

    #[test]
    fn no_gaps_once_daily_data_starts(
        daily in arb_daily(),
        minute in arb_sparse(40, 60, 200.0..300.0),
        tick in arb_sparse(40, 1, 300.0..400.0),
    ) {
        let unified = unify(&daily, &minute, &tick, TimeDelta::seconds(STEP_SECS)).unwrap();

        // A finer feed reporting after the last daily sample ends the series.
        let last_daily = at((DAYS - 1) * 86_400);
        let expected = match minute.end().max(tick.end()) {
            Some(t) if t > last_daily => (t - base()).num_seconds() / STEP_SECS + 1,
            _ => DAYS * 86_400 / STEP_SECS,
        };
        prop_assert_eq!(unified.len() as i64, expected);
        prop_assert_eq!(unified.start(), Some(base()));
        for pair in unified.points().windows(2) {
            prop_assert_eq!(pair[1].time - pair[0].time, TimeDelta::seconds(STEP_SECS));
        }
    }

    #[test]
    fn filtering_is_idempotent(
        series in arb_sparse(200, 60, 1.0..2.0),
        label in prop::sample::select(RANGE_PRESETS.to_vec()),
    ) {
        let label = RangeLabel::parse(label);
        let reference = series.end();
        let once = filter_range(&series, &label, reference);
        let twice = filter_range(&once, &label, reference);
        prop_assert_eq!(once, twice);
    }
}
