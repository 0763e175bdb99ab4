//! Scripted in-memory exchange
//!
//! Replays a fixed price sequence, fills market buys at the current price
//! and records every call so tests can assert on exactly what was sent.

use super::{errors::ExchangeError, Exchange};
use crate::types::{AccountBalances, OrderResult, Side};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Base quantity precision used for simulated fills
const QTY_DP: u32 = 8;

/// An order as it was handed to the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub symbol: String,
    pub quote_qty: Decimal,
    pub client_order_id: String,
    /// Number of price samples served before the submission
    pub after_samples: usize,
}

#[derive(Default)]
struct SimState {
    prices: VecDeque<Decimal>,
    last_price: Option<Decimal>,
    samples_served: usize,
    feed_failure: Option<(usize, ExchangeError)>,
    order_failure: Option<(ExchangeError, bool)>,
    balance_failure: Option<ExchangeError>,
    balances: HashMap<String, Decimal>,
    submitted: Vec<SubmittedOrder>,
    filled: Vec<OrderResult>,
    balance_requests: usize,
    order_lookups: usize,
    next_order_id: u64,
}

/// Exchange double driven by a price script
#[derive(Default)]
pub struct SimulatedExchange {
    state: Mutex<SimState>,
}

impl SimulatedExchange {
    /// Serve `prices` in order; once exhausted the last price repeats
    pub fn with_prices(prices: impl IntoIterator<Item = Decimal>) -> Self {
        Self {
            state: Mutex::new(SimState {
                prices: prices.into_iter().collect(),
                next_order_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Seed a free balance
    pub fn with_balance(mut self, asset: &str, free: Decimal) -> Self {
        self.state.get_mut().balances.insert(asset.to_string(), free);
        self
    }

    /// Fail the price feed once `after` samples have been served
    pub fn with_feed_failure(mut self, after: usize, err: ExchangeError) -> Self {
        self.state.get_mut().feed_failure = Some((after, err));
        self
    }

    /// Fail order submission with `err`. When `accepted` is true the order is
    /// still booked, as if the response was lost after the matching engine
    /// took it.
    pub fn with_order_failure(mut self, err: ExchangeError, accepted: bool) -> Self {
        self.state.get_mut().order_failure = Some((err, accepted));
        self
    }

    /// Fail every account lookup with `err`
    pub fn with_balance_failure(mut self, err: ExchangeError) -> Self {
        self.state.get_mut().balance_failure = Some(err);
        self
    }

    pub async fn submitted_orders(&self) -> Vec<SubmittedOrder> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn filled_orders(&self) -> Vec<OrderResult> {
        self.state.lock().await.filled.clone()
    }

    pub async fn samples_served(&self) -> usize {
        self.state.lock().await.samples_served
    }

    pub async fn balance_requests(&self) -> usize {
        self.state.lock().await.balance_requests
    }

    pub async fn order_lookups(&self) -> usize {
        self.state.lock().await.order_lookups
    }
}

impl Exchange for SimulatedExchange {
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock().await;

        if let Some((after, err)) = &state.feed_failure {
            if state.samples_served >= *after {
                return Err(err.clone());
            }
        }

        let price = match state.prices.pop_front() {
            Some(p) => p,
            None => state
                .last_price
                .ok_or_else(|| ExchangeError::InvalidSymbol(format!("no price script for {}", symbol)))?,
        };

        state.last_price = Some(price);
        state.samples_served += 1;
        Ok(price)
    }

    async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_qty: Decimal,
        client_order_id: &str,
    ) -> Result<OrderResult, ExchangeError> {
        let mut state = self.state.lock().await;

        let after_samples = state.samples_served;
        state.submitted.push(SubmittedOrder {
            symbol: symbol.to_string(),
            quote_qty,
            client_order_id: client_order_id.to_string(),
            after_samples,
        });

        let price = state
            .last_price
            .ok_or_else(|| ExchangeError::OrderRejected("no market price".to_string()))?;

        let executed_qty = (quote_qty / price).round_dp_with_strategy(QTY_DP, RoundingStrategy::ToZero);
        let order = OrderResult {
            symbol: symbol.to_string(),
            order_id: state.next_order_id,
            client_order_id: client_order_id.to_string(),
            transact_time: Some(chrono::Utc::now().timestamp_millis()),
            update_time: None,
            executed_qty,
            cumulative_quote_qty: executed_qty * price,
            status: "FILLED".to_string(),
            order_type: "MARKET".to_string(),
            side: Side::Buy,
        };
        state.next_order_id += 1;

        match state.order_failure.clone() {
            Some((err, accepted)) => {
                if accepted {
                    state.filled.push(order);
                }
                Err(err)
            }
            None => {
                state.filled.push(order.clone());
                Ok(order)
            }
        }
    }

    async fn query_order(&self, symbol: &str, client_order_id: &str) -> Result<OrderResult, ExchangeError> {
        let mut state = self.state.lock().await;
        state.order_lookups += 1;

        state
            .filled
            .iter()
            .find(|o| o.symbol == symbol && o.client_order_id == client_order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound("Order does not exist.".to_string()))
    }

    async fn account_balances(&self) -> Result<AccountBalances, ExchangeError> {
        let mut state = self.state.lock().await;
        state.balance_requests += 1;
        if let Some(err) = &state.balance_failure {
            return Err(err.clone());
        }
        Ok(AccountBalances::new(state.balances.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_script_then_repeat_last() {
        let sim = SimulatedExchange::with_prices([dec!(1), dec!(2)]);
        assert_eq!(sim.ticker_price("X").await.unwrap(), dec!(1));
        assert_eq!(sim.ticker_price("X").await.unwrap(), dec!(2));
        assert_eq!(sim.ticker_price("X").await.unwrap(), dec!(2));
        assert_eq!(sim.samples_served().await, 3);
    }

    #[tokio::test]
    async fn test_fill_sized_by_quote() {
        let sim = SimulatedExchange::with_prices([dec!(48900)]);
        sim.ticker_price("BTCUSDT").await.unwrap();
        let order = sim.market_buy_quote("BTCUSDT", dec!(100), "rb-1").await.unwrap();

        assert_eq!(order.executed_qty, dec!(0.00204498));
        assert!((dec!(100) / dec!(48900) - order.executed_qty).abs() < dec!(0.00000001));
        assert_eq!(order.average_price(), Some(dec!(48900)));
    }

    #[tokio::test]
    async fn test_lost_response_is_still_booked() {
        let sim = SimulatedExchange::with_prices([dec!(10)])
            .with_order_failure(ExchangeError::Network("Request timed out".to_string()), true);
        sim.ticker_price("ETHUSDT").await.unwrap();

        assert!(sim.market_buy_quote("ETHUSDT", dec!(5), "rb-2").await.is_err());
        let found = sim.query_order("ETHUSDT", "rb-2").await.unwrap();
        assert_eq!(found.client_order_id, "rb-2");
    }
}
