//! The checked set of currencies allowed in the basket.

use std::collections::BTreeSet;

use super::{CurrencyCode, WeightTable};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Basket {
    currencies: BTreeSet<CurrencyCode>,
}

impl Basket {
    pub fn new(currencies: impl IntoIterator<Item = CurrencyCode>) -> Self {
        Self {
            currencies: currencies.into_iter().collect(),
        }
    }

    /// The basket described by every currency the weight table mentions.
    pub fn from_weights(weights: &WeightTable) -> Self {
        Self {
            currencies: weights.currencies(),
        }
    }

    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.currencies.contains(code)
    }

    /// Resolve a raw column header to a basket currency.
    ///
    /// Headers that are not currency codes, or name a currency outside the
    /// basket, yield `None`.
    pub fn admit(&self, header: &str) -> Option<CurrencyCode> {
        CurrencyCode::parse(header)
            .ok()
            .filter(|code| self.contains(code))
    }

    pub fn currencies(&self) -> &BTreeSet<CurrencyCode> {
        &self.currencies
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}
