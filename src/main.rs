//! Range Buy Bot CLI
//!
//! Shows the testnet USDT balance or watches a pair until its price leaves a
//! band, then market-buys once.

use clap::{CommandFactory, Parser};
use range_buy_bot::cli::{Action, Cli, EXIT_CONFIG, EXIT_EXCHANGE, EXIT_USAGE};
use range_buy_bot::exchange::Exchange;
use range_buy_bot::report::{balance_summary, strategy_banner, ConsoleObserver};
use range_buy_bot::types::{StrategyParams, TradingPair, QUOTE_ASSET};
use range_buy_bot::{BinanceClient, BoundaryWatcher, Config};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Flags are checked before any session is opened
    let action = match cli.action() {
        Ok(action) => action,
        Err(e) => {
            Cli::command().print_help().ok();
            eprintln!("\nError: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let client = match BinanceClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_EXCHANGE);
        }
    };
    debug!("Session ready against {}", config.base_url);

    match action {
        Action::ShowBalance => match client.account_balances().await {
            Ok(balances) => {
                println!("\n{}\n", balance_summary(&balances, QUOTE_ASSET));
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_EXCHANGE)
            }
        },
        Action::Trade { pair, params } => run_trade(client, &config, pair, params).await,
    }
}

async fn run_trade(
    client: Arc<BinanceClient>,
    config: &Config,
    pair: TradingPair,
    params: StrategyParams,
) -> ExitCode {
    println!("\n{}", strategy_banner(&pair, &params));
    println!("\nStarting price monitoring... (Press Ctrl+C to stop)");

    let watcher = BoundaryWatcher::new(client, config.poll_interval());
    let mut observer = ConsoleObserver;

    tokio::select! {
        result = watcher.run(&pair, &params, &mut observer) => match result {
            Ok(report) => {
                debug!("Order {} filled {} {}", report.order_id, report.executed_qty, pair.base());
                ExitCode::SUCCESS
            }
            // already rendered by the observer
            Err(e) => {
                debug!("Watch ended: {:?}", e);
                ExitCode::from(EXIT_EXCHANGE)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nMonitoring stopped by user.");
            ExitCode::SUCCESS
        }
    }
}
