//! Range Buy Bot Library
//!
//! Watches a Binance spot testnet pair and places one market buy, sized in
//! USDT, the first time the price leaves a `[bottom, top]` band.
//!
//! The same watcher drives two front ends:
//!
//! 1. **CLI** (`range-buy-bot`): balance lookup or a foreground watch with a
//!    live status line.
//! 2. **HTTP service** (`range-buy-server`): balance lookup and background
//!    trade jobs that can be polled and cancelled.

pub mod api;
pub mod cli;
pub mod config;
pub mod exchange;
pub mod report;
pub mod services;
pub mod types;
pub mod watcher;

pub use config::Config;
pub use exchange::{BinanceClient, Exchange, ExchangeError, SimulatedExchange};
pub use report::OrderReport;
pub use types::{AccountBalances, BoundaryHit, OrderResult, StrategyParams, TradingPair};
pub use watcher::{BoundaryWatcher, WatchError, WatchObserver};
