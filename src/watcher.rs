//! Boundary watcher
//!
//! Polls the price of one pair at a fixed interval and places exactly one
//! market buy, sized by quote amount, the first time the price is at or below
//! the bottom bound or at or above the top bound.
//!
//! ```text
//! Watching --(price <= bottom | price >= top)--> Executing --> Done
//!     |                                              |
//!     +------------(feed error)-------> Failed <-----+ (order error)
//! ```

use crate::exchange::{new_client_order_id, Exchange, ExchangeError};
use crate::report::OrderReport;
use crate::types::{BoundaryHit, PriceDirection, PriceSample, StrategyParams, TradingPair};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default delay between price checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a single watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchState {
    Watching,
    Executing,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatchError {
    #[error("price feed failed: {0}")]
    Feed(ExchangeError),
    #[error("order submission failed: {0}")]
    Order(ExchangeError),
    #[error("order {client_order_id} is unconfirmed: submission failed ({submit}), lookup failed ({lookup})")]
    OrderUnconfirmed {
        client_order_id: String,
        submit: ExchangeError,
        lookup: ExchangeError,
    },
    #[error("watch cancelled before any order was placed")]
    Cancelled,
}

/// One observed sample, as handed to observers
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub sample: PriceSample,
    pub direction: PriceDirection,
    /// 1-based sample counter
    pub count: u64,
    pub top: Decimal,
    pub bottom: Decimal,
}

/// Progress callbacks. All methods default to no-ops.
pub trait WatchObserver: Send {
    fn on_start(&mut self, _pair: &TradingPair, _params: &StrategyParams) {}
    fn on_tick(&mut self, _tick: &Tick) {}
    fn on_state(&mut self, _state: WatchState) {}
    fn on_executed(&mut self, _report: &OrderReport) {}
    fn on_failed(&mut self, _error: &WatchError) {}

    /// Polled before every price check
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Called once, right before the order is submitted. Returning false
    /// abandons the watch with `WatchError::Cancelled` and no order.
    fn claim_execution(&mut self) -> bool {
        true
    }
}

/// Observer that ignores everything
pub struct NoopObserver;

impl WatchObserver for NoopObserver {}

/// Watches one pair against one band
pub struct BoundaryWatcher<E> {
    exchange: Arc<E>,
    interval: Duration,
}

impl<E: Exchange> BoundaryWatcher<E> {
    pub fn new(exchange: Arc<E>, interval: Duration) -> Self {
        Self { exchange, interval }
    }

    /// Run until an order is placed or the exchange fails.
    ///
    /// Runs indefinitely while the price stays strictly inside the band.
    pub async fn run<O: WatchObserver>(
        &self,
        pair: &TradingPair,
        params: &StrategyParams,
        observer: &mut O,
    ) -> Result<OrderReport, WatchError> {
        let symbol = pair.symbol();
        info!(
            "Watching {} (top {}, bottom {}, spend {} {})",
            symbol,
            params.top(),
            params.bottom(),
            params.amount(),
            pair.quote()
        );
        observer.on_start(pair, params);
        observer.on_state(WatchState::Watching);

        let mut last_price: Option<Decimal> = None;
        let mut count: u64 = 0;

        loop {
            if observer.is_cancelled() {
                return Err(fail(observer, WatchError::Cancelled));
            }

            let price = match self.exchange.ticker_price(&symbol).await {
                Ok(price) => price,
                Err(e) => return Err(fail(observer, WatchError::Feed(e))),
            };
            count += 1;

            let tick = Tick {
                sample: PriceSample::now(price),
                direction: PriceDirection::between(last_price, price),
                count,
                top: params.top(),
                bottom: params.bottom(),
            };
            debug!("{} sample #{}: {} ({:?})", symbol, count, price, tick.direction);
            observer.on_tick(&tick);
            last_price = Some(price);

            if let Some(hit) = BoundaryHit::evaluate(price, params.top(), params.bottom()) {
                info!("{} at {}: {}", symbol, price, hit.reason());
                if !observer.claim_execution() {
                    return Err(fail(observer, WatchError::Cancelled));
                }
                observer.on_state(WatchState::Executing);

                return match self.execute(&symbol, params.amount(), hit, price).await {
                    Ok(report) => {
                        observer.on_state(WatchState::Done);
                        observer.on_executed(&report);
                        Ok(report)
                    }
                    Err(e) => Err(fail(observer, e)),
                };
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Submit the single market buy, reconciling by client order id when the
    /// submission outcome is unknown.
    async fn execute(
        &self,
        symbol: &str,
        amount: Decimal,
        hit: BoundaryHit,
        trigger_price: Decimal,
    ) -> Result<OrderReport, WatchError> {
        let client_order_id = new_client_order_id();

        match self.exchange.market_buy_quote(symbol, amount, &client_order_id).await {
            Ok(order) => {
                info!("Order {} filled {} {}", order.order_id, order.executed_qty, symbol);
                Ok(OrderReport::new(&order, hit, trigger_price, false))
            }
            Err(submit) if submit.is_ambiguous() => {
                warn!(
                    "Order submission for {} ended ambiguously ({}), checking {}",
                    symbol, submit, client_order_id
                );

                match self.exchange.query_order(symbol, &client_order_id).await {
                    Ok(order) => {
                        info!("Order {} confirmed by lookup", order.order_id);
                        Ok(OrderReport::new(&order, hit, trigger_price, true))
                    }
                    Err(lookup) => Err(WatchError::OrderUnconfirmed {
                        client_order_id,
                        submit,
                        lookup,
                    }),
                }
            }
            Err(e) => Err(WatchError::Order(e)),
        }
    }
}

fn fail<O: WatchObserver>(observer: &mut O, error: WatchError) -> WatchError {
    warn!("Watch aborted: {}", error);
    observer.on_state(WatchState::Failed);
    observer.on_failed(&error);
    error
}
