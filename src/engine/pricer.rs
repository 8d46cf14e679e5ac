//! Composite basket price from per-currency rates and as-of weights.

use chrono_tz::Tz;
use std::collections::BTreeSet;

use crate::domain::calendar::local_date;
use crate::domain::{
    CurrencyCode, CurrencyRates, KeyedSeries, RateSeries, SeriesPoint, TimePoint, WeightRow,
    WeightTable,
};

/// Price every point of `rates` against the weight row in force on its UTC
/// calendar date.
///
/// See [`BasketPricer`] for gap semantics.
pub fn price_basket(
    rates: &KeyedSeries,
    weights: &WeightTable,
    currencies: Option<&BTreeSet<CurrencyCode>>,
) -> RateSeries<Option<f64>> {
    BasketPricer::new(weights)
        .with_currencies(currencies)
        .price(rates)
}

/// Computes `sum(rate[c] * weight[c] / 100)` per timestamp.
///
/// The sum runs over every currency named anywhere in the weight table
/// unless narrowed with [`BasketPricer::with_currencies`]. The result is
/// `None` (a gap, never zero) when no weight row is effective yet, or when a
/// summed currency is missing from either the rates or the weight row. Rates
/// are used exactly as given; nothing is forward-filled.
#[derive(Debug, Clone)]
pub struct BasketPricer<'a> {
    weights: &'a WeightTable,
    currencies: BTreeSet<CurrencyCode>,
    zone: Tz,
}

impl<'a> BasketPricer<'a> {
    pub fn new(weights: &'a WeightTable) -> Self {
        Self {
            weights,
            currencies: weights.currencies(),
            zone: Tz::UTC,
        }
    }

    /// Restrict the sum to these currencies; `None` keeps the whole table's.
    pub fn with_currencies(mut self, currencies: Option<&BTreeSet<CurrencyCode>>) -> Self {
        if let Some(set) = currencies {
            self.currencies = set.clone();
        }
        self
    }

    /// Zone in which a timestamp's calendar date is read for the weight lookup.
    pub fn with_zone(mut self, zone: Tz) -> Self {
        self.zone = zone;
        self
    }

    pub fn price(&self, rates: &KeyedSeries) -> RateSeries<Option<f64>> {
        let points = rates
            .iter()
            .map(|p| SeriesPoint::new(p.time, self.price_at(p.time, &p.value)))
            .collect();
        RateSeries::from_sorted_unchecked(points)
    }

    /// Basket value of `rates` observed at `time`.
    pub fn price_at(&self, time: TimePoint, rates: &CurrencyRates) -> Option<f64> {
        let row = self.weights.as_of(local_date(time, self.zone))?;
        self.price_point(rates, row)
    }

    pub fn price_point(&self, rates: &CurrencyRates, row: &WeightRow) -> Option<f64> {
        let mut total = 0.0;
        for code in &self.currencies {
            let rate = rates.get(code)?;
            let weight = row.weights.get(code)?;
            total += rate * weight / 100.0;
        }
        (!self.currencies.is_empty()).then_some(total)
    }
}
