//! Feed sources and CSV loaders for the daily, minute, tick and weight inputs.

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::Granularity;

pub mod csv_feed;
pub mod demo;
pub mod file;
pub mod mock;

pub use csv_feed::{
    parse_price_feed, parse_rate_feed, parse_tick_feed, parse_tick_quotes, parse_timestamp,
    parse_weights, pivot_quotes, TickQuote, TIMESTAMP_COLUMNS,
};
pub use demo::DemoFeedSource;
pub use file::FileFeedSource;
pub use mock::StaticFeedSource;

/// The four raw inputs the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Daily,
    Minute,
    Tick,
    Weights,
}

impl FeedKind {
    pub const ALL: [FeedKind; 4] = [
        FeedKind::Daily,
        FeedKind::Minute,
        FeedKind::Tick,
        FeedKind::Weights,
    ];

    /// Granularity of a rate feed; `None` for the weight table.
    pub fn granularity(&self) -> Option<Granularity> {
        match self {
            FeedKind::Daily => Some(Granularity::Daily),
            FeedKind::Minute => Some(Granularity::Minute),
            FeedKind::Tick => Some(Granularity::Tick),
            FeedKind::Weights => None,
        }
    }
}

impl From<Granularity> for FeedKind {
    fn from(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Daily => FeedKind::Daily,
            Granularity::Minute => FeedKind::Minute,
            Granularity::Tick => FeedKind::Tick,
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Daily => write!(f, "daily"),
            FeedKind::Minute => write!(f, "minute"),
            FeedKind::Tick => write!(f, "tick"),
            FeedKind::Weights => write!(f, "weights"),
        }
    }
}

/// Where raw feed bytes come from.
///
/// A source answers `Ok(None)` for a feed it does not provide; that is not an
/// error, the feed is simply treated as empty.
#[async_trait]
pub trait FeedSource: Send + Sync + fmt::Debug {
    async fn fetch(&self, feed: FeedKind) -> Result<Option<Vec<u8>>, LoadError>;
}

/// Failure to load one feed. Never fatal to the other feeds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("{feed} feed: no timestamp column found (searched for {})", .searched.join(", "))]
    MissingColumn { feed: FeedKind, searched: Vec<String> },
    #[error("{feed} feed: no price column found")]
    MissingPriceColumn { feed: FeedKind },
    #[error("{feed} feed: csv error: {message}")]
    Csv { feed: FeedKind, message: String },
    #[error("{feed} feed: cannot read {path}: {message}")]
    Io {
        feed: FeedKind,
        path: String,
        message: String,
    },
}

impl LoadError {
    pub fn feed(&self) -> FeedKind {
        match self {
            LoadError::MissingColumn { feed, .. }
            | LoadError::MissingPriceColumn { feed }
            | LoadError::Csv { feed, .. }
            | LoadError::Io { feed, .. } => *feed,
        }
    }
}

/// Parsing knobs shared by every loader.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Zone attached to timestamps written without an offset.
    pub zone: Tz,
    /// How many leading rows may precede the header row.
    pub header_scan_rows: usize,
    /// Single-series fallback when there is no `price` column.
    pub preferred_column: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            zone: Tz::UTC,
            header_scan_rows: 5,
            preferred_column: "USD=".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display_names_feed_and_columns() {
        let err = LoadError::MissingColumn {
            feed: FeedKind::Minute,
            searched: vec!["date".to_string(), "timestamp".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "minute feed: no timestamp column found (searched for date, timestamp)"
        );
        assert_eq!(err.feed(), FeedKind::Minute);
    }

    #[test]
    fn test_feed_kind_granularity() {
        assert_eq!(FeedKind::Tick.granularity(), Some(Granularity::Tick));
        assert_eq!(FeedKind::Weights.granularity(), None);
    }
}
