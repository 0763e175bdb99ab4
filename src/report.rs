//! Console and JSON presentation of watcher progress and results

use crate::types::{AccountBalances, BoundaryHit, OrderResult, PriceDirection, Side, StrategyParams, TradingPair};
use crate::watcher::{Tick, WatchError, WatchObserver, WatchState};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// Final report of an executed trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReport {
    pub symbol: String,
    pub order_type: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub executed_qty: Decimal,
    /// Cumulative quote spent divided by executed quantity
    #[serde(with = "rust_decimal::serde::float_option")]
    pub average_price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    pub time: String,
    pub order_id: u64,
    pub client_order_id: String,
    pub status: String,
    pub boundary: BoundaryHit,
    pub reason: String,
    /// Sample that triggered execution
    #[serde(with = "rust_decimal::serde::float")]
    pub trigger_price: Decimal,
    /// True when the order was confirmed by lookup after a failed submission
    pub reconciled: bool,
}

impl OrderReport {
    pub fn new(order: &OrderResult, boundary: BoundaryHit, trigger_price: Decimal, reconciled: bool) -> Self {
        Self {
            symbol: order.symbol.clone(),
            order_type: order.order_type.clone(),
            side: order.side,
            executed_qty: order.executed_qty,
            average_price: order.average_price(),
            total_cost: order.cumulative_quote_qty,
            time: order.time_display(),
            order_id: order.order_id,
            client_order_id: order.client_order_id.clone(),
            status: order.status.clone(),
            boundary,
            reason: boundary.reason().to_string(),
            trigger_price,
            reconciled,
        }
    }
}

impl fmt::Display for OrderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "TRADE EXECUTED ON TESTNET")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Symbol: {}", self.symbol)?;
        writeln!(f, "Type: {}", self.order_type)?;
        writeln!(f, "Side: {}", self.side)?;
        writeln!(f, "Quantity: {}", self.executed_qty)?;
        match self.average_price {
            Some(price) => writeln!(f, "Price: ${:.2}", price.round_dp(2))?,
            None => writeln!(f, "Price: n/a (nothing executed)")?,
        }
        writeln!(f, "Total cost: ${}", self.total_cost)?;
        writeln!(f, "Reason: {}", self.reason)?;
        writeln!(f, "Boundary hit: {}", self.boundary)?;
        writeln!(f, "Time: {}", self.time)?;
        writeln!(f, "Order ID: {}", self.order_id)?;
        if self.reconciled {
            writeln!(f, "Note: confirmed by order lookup after the submission reply was lost")?;
        }
        write!(f, "{}", rule)
    }
}

/// Quote balance block for `--show-balance`
pub fn balance_summary(balances: &AccountBalances, asset: &str) -> String {
    let title = format!("Account Balance ({}):", asset);
    let rule = "=".repeat(title.len());

    let line = if balances.contains(asset) {
        format!("{}: {:.2}", asset, balances.free(asset).round_dp(2))
    } else {
        format!("No {} balance found.", asset)
    };

    format!("{}\n{}\n{}\n{}", title, rule, line, rule)
}

/// Strategy parameter banner printed before the watch starts
pub fn strategy_banner(pair: &TradingPair, params: &StrategyParams) -> String {
    format!(
        "Strategy parameters:\nTrading Pair: {}\nAmount to spend: ${}\nTop boundary: ${}\nBottom boundary: ${}",
        pair,
        params.amount(),
        params.top(),
        params.bottom()
    )
}

/// One status line; green when the price rose, red when it fell
pub fn status_line(tick: &Tick) -> String {
    let current = format!("${:.2}", tick.sample.price.round_dp(2));
    let current = match tick.direction {
        PriceDirection::Up => current.green().to_string(),
        PriceDirection::Down => current.red().to_string(),
        PriceDirection::First | PriceDirection::Unchanged => current,
    };

    format!(
        "Top: ${:.2} | Current: {} | Bottom: ${:.2}",
        tick.top.round_dp(2),
        current,
        tick.bottom.round_dp(2)
    )
}

/// Renders watcher progress on stdout, rewriting a single status line
#[derive(Default)]
pub struct ConsoleObserver;

impl WatchObserver for ConsoleObserver {
    fn on_start(&mut self, pair: &TradingPair, params: &StrategyParams) {
        println!(
            "\nWatching {} with boundaries: Top ${:.2}, Bottom ${:.2}",
            pair,
            params.top().round_dp(2),
            params.bottom().round_dp(2)
        );
        println!("{}", "=".repeat(50));
    }

    fn on_tick(&mut self, tick: &Tick) {
        print!("{}\r", status_line(tick));
        std::io::stdout().flush().ok();
    }

    fn on_state(&mut self, state: WatchState) {
        if state == WatchState::Executing {
            println!("\nBoundary reached, placing market buy...");
        }
    }

    fn on_executed(&mut self, report: &OrderReport) {
        println!("\n{}\n", report);
    }

    fn on_failed(&mut self, error: &WatchError) {
        println!("\n{} {}", "An error occurred:".red(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceSample;
    use rust_decimal_macros::dec;

    fn order() -> OrderResult {
        OrderResult {
            symbol: "BTCUSDT".to_string(),
            order_id: 42,
            client_order_id: "rb-1".to_string(),
            transact_time: Some(1_700_000_000_000),
            update_time: None,
            executed_qty: dec!(0.002),
            cumulative_quote_qty: dec!(97.8),
            status: "FILLED".to_string(),
            order_type: "MARKET".to_string(),
            side: Side::Buy,
        }
    }

    #[test]
    fn test_report_average_price() {
        let report = OrderReport::new(&order(), BoundaryHit::Bottom, dec!(48900), false);
        assert_eq!(report.average_price, Some(dec!(48900)));
        assert_eq!(report.total_cost, dec!(97.8));
        assert_eq!(report.reason, "Bottom boundary reached");

        let text = report.to_string();
        assert!(text.contains("Price: $48900.00"));
        assert!(text.contains("Boundary hit: Bottom"));
        assert!(text.contains("Order ID: 42"));
        assert!(!text.contains("Note:"));
    }

    #[test]
    fn test_report_json_uses_numbers() {
        let report = OrderReport::new(&order(), BoundaryHit::Top, dec!(50100), true);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["boundary"], "top");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["total_cost"], serde_json::json!(97.8));
        assert_eq!(json["reconciled"], true);
    }

    #[test]
    fn test_balance_summary() {
        let mut free = std::collections::HashMap::new();
        free.insert("USDT".to_string(), dec!(10000.456));
        let text = balance_summary(&AccountBalances::new(free), "USDT");
        assert!(text.contains("USDT: 10000.46"));

        let text = balance_summary(&AccountBalances::default(), "USDT");
        assert!(text.contains("No USDT balance found."));
    }

    #[test]
    fn test_status_line_plain_on_first_sample() {
        colored::control::set_override(false);
        let tick = Tick {
            sample: PriceSample::now(dec!(49500.123)),
            direction: PriceDirection::First,
            count: 1,
            top: dec!(50000),
            bottom: dec!(49000),
        };
        assert_eq!(
            status_line(&tick),
            "Top: $50000.00 | Current: $49500.12 | Bottom: $49000.00"
        );
    }
}
