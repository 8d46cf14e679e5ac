use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Amount, Side, TimePoint};

/// Ledger entries shown in a portfolio view.
pub const RECENT_ENTRIES: usize = 10;

/// One executed market order and the balances right after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub timestamp: TimePoint,
    pub side: Side,
    pub amount: Amount,
    pub price: Amount,
    pub cash_after: Amount,
    pub holdings_after: Amount,
}

/// Why an order was refused. A refused order changes nothing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TradeError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Amount),
    #[error("insufficient cash: order costs {cost}, cash is {cash}")]
    InsufficientCash { cost: Amount, cash: Amount },
    #[error("insufficient holdings: selling {amount}, holding {holdings}")]
    InsufficientHoldings { amount: Amount, holdings: Amount },
    #[error("no price available")]
    NoPrice,
    #[error("order value out of range")]
    Overflow,
}

/// Point-in-time view of a session at the latest price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub session_id: Uuid,
    pub latest_price: Option<Amount>,
    pub holdings: Amount,
    pub cash: Amount,
    /// `None` while no price is available.
    pub position_value: Option<Amount>,
    pub total_equity: Option<Amount>,
    /// Most recent first.
    pub recent_trades: Vec<LedgerEntry>,
}

/// One user's isolated paper-trading state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: Uuid,
    cash: Amount,
    holdings: Amount,
    ledger: Vec<LedgerEntry>,
}

impl Session {
    pub fn new(id: Uuid, starting_cash: Amount) -> Self {
        Self {
            id,
            cash: starting_cash,
            holdings: Amount::zero(),
            ledger: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cash(&self) -> Amount {
        self.cash
    }

    pub fn holdings(&self) -> Amount {
        self.holdings
    }

    /// Every entry, oldest first.
    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    /// Execute a market order for `amount` units at `price`.
    ///
    /// Either the whole order executes or the session is left untouched.
    pub fn execute(
        &mut self,
        side: Side,
        amount: Amount,
        price: Option<f64>,
        at: TimePoint,
    ) -> Result<LedgerEntry, TradeError> {
        if !amount.is_positive() {
            return Err(TradeError::InvalidAmount(amount));
        }
        let price = price
            .and_then(Amount::from_price)
            .ok_or(TradeError::NoPrice)?;
        let value = amount.checked_mul(price).ok_or(TradeError::Overflow)?;

        let (cash, holdings) = match side {
            Side::Buy => {
                if value > self.cash {
                    return Err(TradeError::InsufficientCash {
                        cost: value,
                        cash: self.cash,
                    });
                }
                (self.cash - value, self.holdings + amount)
            }
            Side::Sell => {
                if amount > self.holdings {
                    return Err(TradeError::InsufficientHoldings {
                        amount,
                        holdings: self.holdings,
                    });
                }
                (self.cash + value, self.holdings - amount)
            }
        };

        self.cash = cash;
        self.holdings = holdings;
        let entry = LedgerEntry {
            timestamp: at,
            side,
            amount,
            price,
            cash_after: cash,
            holdings_after: holdings,
        };
        self.ledger.push(entry);
        Ok(entry)
    }

    pub fn portfolio(&self, latest_price: Option<f64>) -> Portfolio {
        let latest_price = latest_price.and_then(Amount::from_price);
        let position_value = latest_price.and_then(|p| self.holdings.checked_mul(p));
        Portfolio {
            session_id: self.id,
            latest_price,
            holdings: self.holdings,
            cash: self.cash,
            position_value,
            total_equity: position_value.map(|v| self.cash + v),
            recent_trades: self
                .ledger
                .iter()
                .rev()
                .take(RECENT_ENTRIES)
                .copied()
                .collect(),
        }
    }
}
