//! Command-line surface
//!
//! Flag parsing and validation only; nothing here touches the network, so an
//! incomplete invocation is rejected before any session exists.

use crate::types::{ParamsError, StrategyParams, TradingPair};
use clap::Parser;
use rust_decimal::Decimal;
use thiserror::Error;

/// Watch failed or the exchange rejected a call
pub const EXIT_EXCHANGE: u8 = 1;
/// Missing or invalid flags
pub const EXIT_USAGE: u8 = 2;
/// Missing credentials or bad environment
pub const EXIT_CONFIG: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "range-buy-bot")]
#[command(about = "Binance Testnet Tool: buy once when price leaves a band")]
#[command(version)]
pub struct Cli {
    /// Display account balance
    #[arg(long)]
    pub show_balance: bool,

    /// Base currency (e.g., BTC, ETH)
    #[arg(long)]
    pub currency: Option<String>,

    /// Amount in USDT to buy
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Upper price boundary
    #[arg(long)]
    pub top: Option<Decimal>,

    /// Lower price boundary
    #[arg(long)]
    pub bottom: Option<Decimal>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// What a valid invocation asks for
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ShowBalance,
    Trade {
        pair: TradingPair,
        params: StrategyParams,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("For trading strategy, all of --currency, --amount, --top, and --bottom must be provided.")]
    Incomplete,
    #[error(transparent)]
    Params(#[from] ParamsError),
}

impl Cli {
    /// `--show-balance` wins over trade flags
    pub fn action(&self) -> Result<Action, UsageError> {
        if self.show_balance {
            return Ok(Action::ShowBalance);
        }

        match (&self.currency, self.amount, self.top, self.bottom) {
            (Some(currency), Some(amount), Some(top), Some(bottom)) => Ok(Action::Trade {
                pair: TradingPair::new(currency)?,
                params: StrategyParams::new(amount, top, bottom)?,
            }),
            _ => Err(UsageError::Incomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("range-buy-bot").chain(args.iter().copied())).unwrap()
    }

    const FULL: [&str; 8] = [
        "--currency", "btc", "--amount", "100", "--top", "50000", "--bottom", "49000",
    ];

    #[test]
    fn test_full_trade_flags() {
        let action = parse(&FULL).action().unwrap();
        assert_eq!(
            action,
            Action::Trade {
                pair: TradingPair::new("BTC").unwrap(),
                params: StrategyParams::new(dec!(100), dec!(50000), dec!(49000)).unwrap(),
            }
        );
    }

    #[test]
    fn test_each_missing_flag_is_usage_error() {
        for skip in (0..FULL.len()).step_by(2) {
            let args: Vec<&str> = FULL
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip && *i != skip + 1)
                .map(|(_, a)| *a)
                .collect();
            assert_eq!(parse(&args).action(), Err(UsageError::Incomplete), "without {}", FULL[skip]);
        }
    }

    #[test]
    fn test_no_flags_is_usage_error() {
        assert_eq!(parse(&[]).action(), Err(UsageError::Incomplete));
    }

    #[test]
    fn test_show_balance() {
        assert_eq!(parse(&["--show-balance"]).action(), Ok(Action::ShowBalance));
        assert_eq!(parse(&["--show-balance", "--currency", "eth"]).action(), Ok(Action::ShowBalance));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let err = parse(&[
            "--currency", "btc", "--amount", "100", "--top", "49000", "--bottom", "50000",
        ])
        .action()
        .unwrap_err();
        assert!(matches!(err, UsageError::Params(ParamsError::InvertedBounds { .. })));
    }

    #[test]
    fn test_non_numeric_amount_fails_parsing() {
        let result = Cli::try_parse_from(["range-buy-bot", "--amount", "lots"]);
        assert!(result.is_err());
    }
}
