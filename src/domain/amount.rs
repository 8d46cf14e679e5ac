//! Lossless ledger amounts backed by rust_decimal.
//!
//! Cash, holdings and execution prices in the paper-trading ledger use this
//! type so that repeated buys and sells never accumulate float drift. Market
//! data stays `f64`; prices cross over through [`Amount::from_price`].

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places kept when a float market price is turned into an amount.
pub const PRICE_SCALE: u32 = 8;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    pub fn zero() -> Self {
        Amount(Decimal::ZERO)
    }

    /// Convert a float market price, rounded to [`PRICE_SCALE`] places.
    ///
    /// Returns `None` for NaN, infinities and values outside the decimal range.
    pub fn from_price(price: f64) -> Option<Self> {
        if !price.is_finite() {
            return None;
        }
        Decimal::from_f64(price).map(|d| Amount(d.round_dp(PRICE_SCALE).normalize()))
    }

    /// Overflow-checked product, used for trade cost and position value.
    pub fn checked_mul(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_mul(rhs.0).map(Amount)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    /// Canonical text form: trailing zeros removed, never exponent notation.
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Amount)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}
