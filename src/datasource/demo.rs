//! Synthetic single-series dataset for trying the service without files.
//!
//! Each feed is a seeded random walk around 100, so the same `(end, seed)`
//! always produces the same bytes.

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeDelta, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FeedKind, FeedSource, LoadError};
use crate::domain::calendar::start_of_day;
use crate::domain::TimePoint;

const DAILY_POINTS: i64 = 365 * 10;
const MINUTE_POINTS: i64 = 5 * 24 * 60;
const TICK_POINTS: i64 = 24 * 60 * 10;
const TICK_SPACING_SECS: i64 = 6;

const BASE_PRICE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct DemoFeedSource {
    end: TimePoint,
    seed: u64,
}

impl DemoFeedSource {
    pub fn new(end: TimePoint, seed: u64) -> Self {
        Self { end, seed }
    }

    /// Dataset ending now.
    pub fn ending_now() -> Self {
        Self::new(Utc::now(), 42)
    }

    pub fn end(&self) -> TimePoint {
        self.end
    }

    /// CSV bytes for one feed; `None` for the weight table.
    pub fn render(&self, feed: FeedKind) -> Result<Option<Vec<u8>>, LoadError> {
        let (last, count, spacing, volatility, salt) = match feed {
            FeedKind::Daily => (
                start_of_day(self.end, Tz::UTC),
                DAILY_POINTS,
                TimeDelta::days(1),
                0.1,
                1,
            ),
            FeedKind::Minute => (self.end, MINUTE_POINTS, TimeDelta::minutes(1), 0.01, 2),
            FeedKind::Tick => (
                self.end,
                TICK_POINTS,
                TimeDelta::seconds(TICK_SPACING_SECS),
                0.005,
                3,
            ),
            FeedKind::Weights => return Ok(None),
        };

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_mul(31).wrapping_add(salt));
        let mut writer = csv::Writer::from_writer(Vec::new());
        let csv_err = |e: csv::Error| LoadError::Csv {
            feed,
            message: e.to_string(),
        };

        writer.write_record(["timestamp", "price"]).map_err(csv_err)?;
        let mut price = BASE_PRICE;
        for i in (0..count).rev() {
            let t = last - spacing * i as i32;
            price += rng.random_range(-1.0..1.0) * volatility;
            let rounded = (price * 10_000.0).round() / 10_000.0;
            writer
                .write_record([
                    t.to_rfc3339_opts(SecondsFormat::Secs, true),
                    rounded.to_string(),
                ])
                .map_err(csv_err)?;
        }

        writer.into_inner().map(Some).map_err(|e| LoadError::Csv {
            feed,
            message: e.error().to_string(),
        })
    }
}

#[async_trait]
impl FeedSource for DemoFeedSource {
    async fn fetch(&self, feed: FeedKind) -> Result<Option<Vec<u8>>, LoadError> {
        self.render(feed)
    }
}
