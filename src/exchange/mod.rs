//! Exchange connectivity
//!
//! `Exchange` is the seam between the watcher/service code and a concrete
//! venue. `BinanceClient` talks to the Binance spot testnet over signed REST;
//! `SimulatedExchange` replays a scripted price feed for tests and dry runs.

pub mod binance;
pub mod errors;
pub mod sim;

pub use binance::BinanceClient;
pub use errors::ExchangeError;
pub use sim::SimulatedExchange;

use crate::types::{AccountBalances, OrderResult};
use rust_decimal::Decimal;
use std::future::Future;

/// Operations the range buyer needs from an exchange session
pub trait Exchange: Send + Sync + 'static {
    /// Latest traded price for `symbol`
    fn ticker_price(&self, symbol: &str) -> impl Future<Output = Result<Decimal, ExchangeError>> + Send;

    /// Place a market buy spending `quote_qty` of the quote asset
    fn market_buy_quote(
        &self,
        symbol: &str,
        quote_qty: Decimal,
        client_order_id: &str,
    ) -> impl Future<Output = Result<OrderResult, ExchangeError>> + Send;

    /// Look up an order by the client order id it was submitted with
    fn query_order(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> impl Future<Output = Result<OrderResult, ExchangeError>> + Send;

    /// Free balances of the account
    fn account_balances(&self) -> impl Future<Output = Result<AccountBalances, ExchangeError>> + Send;
}

/// Fresh client order id, unique per submission (Binance allows up to 36 chars)
pub fn new_client_order_id() -> String {
    format!("rb-{}", uuid::Uuid::new_v4().simple())
        .chars()
        .take(36)
        .collect()
}
