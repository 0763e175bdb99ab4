//! Background services for the HTTP facade

pub mod trade_registry;

pub use trade_registry::{RegistryError, TradeRegistry, TradeState, TradeStatus, EXECUTED_MESSAGE};
