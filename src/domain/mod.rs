//! Domain types for the WPU basket.
//!
//! This module provides:
//! - Primitives: TimePoint, CurrencyCode, Granularity, Side
//! - Time-ordered rate series and granularity-tagged feeds
//! - Weight tables with as-of lookup and the checked basket currency set
//! - Lossless ledger amounts
//! - Calendar-day helpers for a business zone

pub mod amount;
pub mod basket;
pub mod calendar;
pub mod primitives;
pub mod series;
pub mod weights;

pub use amount::Amount;
pub use basket::Basket;
pub use primitives::{CurrencyCode, CurrencyCodeError, Granularity, Side, TimePoint};
pub use series::{CurrencyRates, Feed, KeyedSeries, PriceSeries, RateSeries, SeriesPoint};
pub use weights::{WeightRow, WeightTable};
