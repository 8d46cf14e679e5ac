//! Load -> unify -> price wiring.
//!
//! Builds the immutable [`MarketData`] the HTTP layer serves. A feed that
//! fails to load is reported as a [`FeedDiagnostic`] and treated as empty;
//! it never takes the other feeds down with it.

use chrono::TimeDelta;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::datasource::{
    parse_price_feed, parse_rate_feed, parse_tick_feed, parse_weights, FeedKind, FeedSource,
    LoadError, LoadOptions,
};
use crate::domain::{
    Basket, CurrencyCode, CurrencyRates, Feed, Granularity, PriceSeries, TimePoint, WeightTable,
};
use crate::engine::{default_resolution, BasketPricer, Unifier, UnifyError};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub load: LoadOptions,
    pub resolution: TimeDelta,
    /// Overrides the basket otherwise taken from the weight table.
    pub basket: Option<Basket>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            load: LoadOptions::default(),
            resolution: default_resolution(),
            basket: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Unify(#[from] UnifyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One price column per feed.
    Single,
    /// Per-currency feeds priced against a weight table.
    Basket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedDiagnostic {
    pub feed: FeedKind,
    pub message: String,
}

impl From<&LoadError> for FeedDiagnostic {
    fn from(err: &LoadError) -> Self {
        Self {
            feed: err.feed(),
            message: err.to_string(),
        }
    }
}

/// Dataset summary shown alongside the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub mode: Mode,
    pub range_start: Option<TimePoint>,
    pub range_end: Option<TimePoint>,
    pub samples: usize,
    pub latest_price: Option<f64>,
    pub currencies: Vec<CurrencyCode>,
    pub diagnostics: Vec<FeedDiagnostic>,
}

/// The priced series plus everything learned while building it.
#[derive(Debug, Clone)]
pub struct MarketData {
    mode: Mode,
    prices: PriceSeries,
    currencies: Vec<CurrencyCode>,
    diagnostics: Vec<FeedDiagnostic>,
}

impl MarketData {
    pub fn new(mode: Mode, prices: PriceSeries) -> Self {
        Self {
            mode,
            prices,
            currencies: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    pub fn diagnostics(&self) -> &[FeedDiagnostic] {
        &self.diagnostics
    }

    pub fn currencies(&self) -> &[CurrencyCode] {
        &self.currencies
    }

    /// Price of the most recent sample; trades execute at this price.
    pub fn latest_price(&self) -> Option<f64> {
        self.prices.last().map(|p| p.value)
    }

    pub fn summary(&self) -> DataSummary {
        DataSummary {
            mode: self.mode,
            range_start: self.prices.start(),
            range_end: self.prices.end(),
            samples: self.prices.len(),
            latest_price: self.latest_price(),
            currencies: self.currencies.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Raw bytes per feed, plus diagnostics for the feeds that failed.
struct Fetched {
    bytes: BTreeMap<FeedKind, Vec<u8>>,
    failed: Vec<FeedKind>,
    diagnostics: Vec<FeedDiagnostic>,
}

impl Fetched {
    fn get(&self, feed: FeedKind) -> Option<&[u8]> {
        self.bytes.get(&feed).map(Vec::as_slice)
    }

    fn record(&mut self, err: &LoadError) {
        warn!(feed = %err.feed(), error = %err, "feed failed to load");
        self.diagnostics.push(FeedDiagnostic::from(err));
    }
}

pub struct Pipeline;

impl Pipeline {
    pub async fn build(
        source: &dyn FeedSource,
        options: &PipelineOptions,
    ) -> Result<MarketData, PipelineError> {
        let unifier = Unifier::new(options.resolution)?.with_zone(options.load.zone);
        let mut fetched = Self::fetch_all(source).await;

        let weights_configured = fetched.get(FeedKind::Weights).is_some()
            || fetched.failed.contains(&FeedKind::Weights);
        let mut market = if weights_configured {
            Self::build_basket(&mut fetched, &unifier, options)
        } else {
            Self::build_single(&mut fetched, &unifier, &options.load)
        };
        market.diagnostics = fetched.diagnostics;

        info!(
            mode = ?market.mode,
            samples = market.prices.len(),
            start = ?market.prices.start(),
            end = ?market.prices.end(),
            diagnostics = market.diagnostics.len(),
            "market data built"
        );
        Ok(market)
    }

    async fn fetch_all(source: &dyn FeedSource) -> Fetched {
        let results = join_all(FeedKind::ALL.iter().map(|&feed| source.fetch(feed))).await;

        let mut fetched = Fetched {
            bytes: BTreeMap::new(),
            failed: Vec::new(),
            diagnostics: Vec::new(),
        };
        for (feed, result) in FeedKind::ALL.into_iter().zip(results) {
            match result {
                Ok(Some(bytes)) => {
                    fetched.bytes.insert(feed, bytes);
                }
                Ok(None) => {}
                Err(e) => {
                    fetched.record(&e);
                    fetched.failed.push(feed);
                }
            }
        }
        fetched
    }

    fn build_single(fetched: &mut Fetched, unifier: &Unifier, opts: &LoadOptions) -> MarketData {
        let feeds: Vec<Feed<f64>> = [Granularity::Daily, Granularity::Minute, Granularity::Tick]
            .into_iter()
            .map(|g| {
                let Some(bytes) = fetched.get(FeedKind::from(g)) else {
                    return Feed::empty(g);
                };
                parse_price_feed(bytes, g, opts).unwrap_or_else(|e| {
                    fetched.record(&e);
                    Feed::empty(g)
                })
            })
            .collect();
        let refs: Vec<&Feed<f64>> = feeds.iter().collect();

        MarketData::new(Mode::Single, unifier.unify_feeds(&refs))
    }

    fn build_basket(
        fetched: &mut Fetched,
        unifier: &Unifier,
        options: &PipelineOptions,
    ) -> MarketData {
        let opts = &options.load;
        let parsed = fetched
            .get(FeedKind::Weights)
            .map(|bytes| parse_weights(bytes, opts));
        let weights = match parsed {
            Some(Ok(table)) if !table.is_empty() => table,
            Some(Ok(_)) => {
                let err = LoadError::Csv {
                    feed: FeedKind::Weights,
                    message: "weight table has no rows".to_string(),
                };
                fetched.record(&err);
                WeightTable::default()
            }
            Some(Err(e)) => {
                fetched.record(&e);
                WeightTable::default()
            }
            None => WeightTable::default(),
        };
        if weights.is_empty() {
            return MarketData::new(Mode::Basket, PriceSeries::empty());
        }

        let basket = options
            .basket
            .clone()
            .unwrap_or_else(|| Basket::from_weights(&weights));

        let feeds: Vec<Feed<CurrencyRates>> =
            [Granularity::Daily, Granularity::Minute, Granularity::Tick]
                .into_iter()
                .map(|g| {
                    let Some(bytes) = fetched.get(FeedKind::from(g)) else {
                        return Feed::empty(g);
                    };
                    let parsed = match g {
                        Granularity::Tick => parse_tick_feed(bytes, &basket, opts),
                        _ => parse_rate_feed(bytes, g, &basket, opts),
                    };
                    parsed.unwrap_or_else(|e| {
                        fetched.record(&e);
                        Feed::empty(g)
                    })
                })
                .collect();
        let refs: Vec<&Feed<CurrencyRates>> = feeds.iter().collect();
        let pricer = BasketPricer::new(&weights)
            .with_currencies(options.basket.as_ref().map(Basket::currencies))
            .with_zone(opts.zone);
        let prices = unifier.unify_keyed_with(&refs, |time, rates| pricer.price_at(time, rates));

        let mut market = MarketData::new(Mode::Basket, prices);
        market.currencies = basket.currencies().iter().copied().collect();
        market
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::StaticFeedSource;

    #[tokio::test]
    async fn test_no_feeds_builds_empty_single_series() {
        let market = Pipeline::build(&StaticFeedSource::new(), &PipelineOptions::default())
            .await
            .unwrap();
        assert_eq!(market.mode(), Mode::Single);
        assert!(market.prices().is_empty());
        assert_eq!(market.latest_price(), None);
        assert!(market.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_resolution_is_rejected() {
        let options = PipelineOptions {
            resolution: TimeDelta::zero(),
            ..PipelineOptions::default()
        };
        let err = Pipeline::build(&StaticFeedSource::new(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Unify(_)));
    }

    #[tokio::test]
    async fn test_unusable_weights_leave_prices_empty() {
        let source = StaticFeedSource::new()
            .with_feed(FeedKind::Daily, "date,USD\n2024-01-01,1.1\n")
            .with_feed(FeedKind::Weights, "date,USD\n");
        let market = Pipeline::build(&source, &PipelineOptions::default())
            .await
            .unwrap();
        assert_eq!(market.mode(), Mode::Basket);
        assert!(market.prices().is_empty());
        assert_eq!(market.diagnostics().len(), 1);
        assert_eq!(market.diagnostics()[0].feed, FeedKind::Weights);
    }
}
