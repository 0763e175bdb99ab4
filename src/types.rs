//! Core types for the range buyer

use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Quote asset every pair is denominated in
pub const QUOTE_ASSET: &str = "USDT";

/// Invalid trade parameters supplied by a caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("currency must be a non-empty alphanumeric asset code, got {0:?}")]
    InvalidCurrency(String),
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: Decimal },
    #[error("bottom ({bottom}) must be below top ({top})")]
    InvertedBounds { bottom: Decimal, top: Decimal },
}

/// Base asset paired with the fixed quote asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TradingPair {
    base: String,
}

impl TradingPair {
    /// Build a pair from user input such as "btc" or " ETH "
    pub fn new(base: &str) -> Result<Self, ParamsError> {
        let base = base.trim();
        if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ParamsError::InvalidCurrency(base.to_string()));
        }

        Ok(Self {
            base: base.to_ascii_uppercase(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &'static str {
        QUOTE_ASSET
    }

    /// Exchange symbol, e.g. BTCUSDT
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, QUOTE_ASSET)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Spend amount and price band for one watch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyParams {
    amount: Decimal,
    top: Decimal,
    bottom: Decimal,
}

impl StrategyParams {
    /// Validates that every value is positive and that `bottom < top`.
    pub fn new(amount: Decimal, top: Decimal, bottom: Decimal) -> Result<Self, ParamsError> {
        for (field, value) in [("amount", amount), ("top", top), ("bottom", bottom)] {
            if value <= Decimal::ZERO {
                return Err(ParamsError::NotPositive { field, value });
            }
        }

        if bottom >= top {
            return Err(ParamsError::InvertedBounds { bottom, top });
        }

        Ok(Self { amount, top, bottom })
    }

    /// Quote currency to spend
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn top(&self) -> Decimal {
        self.top
    }

    pub fn bottom(&self) -> Decimal {
        self.bottom
    }
}

/// Which side of the band was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryHit {
    Bottom,
    Top,
}

impl BoundaryHit {
    /// Decide whether `price` leaves the band.
    ///
    /// Bottom is evaluated first, so a price that satisfies both conditions
    /// (only possible when `bottom >= top`) reports `Bottom`.
    pub fn evaluate(price: Decimal, top: Decimal, bottom: Decimal) -> Option<Self> {
        if price <= bottom {
            Some(BoundaryHit::Bottom)
        } else if price >= top {
            Some(BoundaryHit::Top)
        } else {
            None
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            BoundaryHit::Bottom => "Bottom boundary reached",
            BoundaryHit::Top => "Top boundary reached",
        }
    }
}

impl fmt::Display for BoundaryHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryHit::Bottom => write!(f, "Bottom"),
            BoundaryHit::Top => write!(f, "Top"),
        }
    }
}

/// Movement of a sample relative to the previous one (display only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    First,
    Up,
    Down,
    Unchanged,
}

impl PriceDirection {
    pub fn between(previous: Option<Decimal>, current: Decimal) -> Self {
        match previous {
            None => PriceDirection::First,
            Some(prev) if current > prev => PriceDirection::Up,
            Some(prev) if current < prev => PriceDirection::Down,
            Some(_) => PriceDirection::Unchanged,
        }
    }
}

/// One observation of the price feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSample {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn now(price: Decimal) -> Self {
        Self {
            price,
            observed_at: Utc::now(),
        }
    }
}

/// Order side as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Exchange confirmation of a placed order.
///
/// Field names follow the Binance spot REST payload, including its
/// `cummulativeQuoteQty` spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub symbol: String,
    pub order_id: u64,
    #[serde(default)]
    pub client_order_id: String,
    /// Present on order placement responses, absent on order queries
    #[serde(default)]
    pub transact_time: Option<i64>,
    /// Present on order queries
    #[serde(default)]
    pub update_time: Option<i64>,
    pub executed_qty: Decimal,
    #[serde(rename = "cummulativeQuoteQty")]
    pub cumulative_quote_qty: Decimal,
    pub status: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: Side,
}

impl OrderResult {
    /// Average fill price, `None` when nothing was executed
    pub fn average_price(&self) -> Option<Decimal> {
        if self.executed_qty.is_zero() {
            None
        } else {
            Some(self.cumulative_quote_qty / self.executed_qty)
        }
    }

    /// Transaction time in milliseconds since the epoch
    pub fn time_ms(&self) -> Option<i64> {
        self.transact_time.or(self.update_time)
    }

    /// Transaction time rendered in local time, e.g. 2024-05-01 13:45:10
    pub fn time_display(&self) -> String {
        self.time_ms()
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Free balance per asset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountBalances {
    free: HashMap<String, Decimal>,
}

impl AccountBalances {
    pub fn new(free: HashMap<String, Decimal>) -> Self {
        Self { free }
    }

    /// Free balance of `asset`, zero if the account holds none
    pub fn free(&self, asset: &str) -> Decimal {
        self.free.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.free.contains_key(asset)
    }
}
