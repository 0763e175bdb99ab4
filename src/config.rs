//! Configuration management for the range buyer

use crate::watcher::DEFAULT_POLL_INTERVAL;
use reqwest::Url;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Binance spot testnet REST endpoint
pub const TESTNET_BASE_URL: &str = "https://testnet.binance.vision";

pub const API_KEY_VAR: &str = "BINANCE_TESTNET_API_KEY";
pub const API_SECRET_VAR: &str = "BINANCE_TESTNET_SECRET_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("BINANCE_TESTNET_API_KEY and BINANCE_TESTNET_SECRET_KEY must be set in the environment.")]
    MissingCredentials,
    #[error("{name} has an invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("refusing to trade against {0}: only the testnet or a loopback mock is allowed")]
    LiveEndpoint(String),
}

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Testnet API key
    pub api_key: String,

    /// Testnet API secret
    pub api_secret: String,

    /// REST base URL, the testnet unless pointed at a local mock
    pub base_url: String,

    /// Delay between price checks in milliseconds
    pub poll_interval_ms: u64,

    /// Validity window for signed requests
    pub recv_window_ms: u64,

    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,

    /// Address the HTTP service binds to
    pub server_addr: SocketAddr,

    /// Browser origin allowed by CORS
    pub cors_origin: String,

    /// Cap on concurrently running watchers in the HTTP service
    pub max_active_trades: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        let (api_key, api_secret) = match (var(API_KEY_VAR), var(API_SECRET_VAR)) {
            (Some(key), Some(secret)) => (key, secret),
            _ => return Err(ConfigError::MissingCredentials),
        };

        let base_url = var("BINANCE_BASE_URL").unwrap_or_else(|| TESTNET_BASE_URL.to_string());
        if !is_sandbox_url(&base_url) {
            return Err(ConfigError::LiveEndpoint(base_url));
        }

        let poll_interval_ms = parse_or(
            var("POLL_INTERVAL_MS"),
            "POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?;
        let recv_window_ms = parse_or(var("RECV_WINDOW_MS"), "RECV_WINDOW_MS", 5000)?;
        let http_timeout_secs = parse_or(var("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 10)?;
        let max_active_trades = parse_or(var("MAX_ACTIVE_TRADES"), "MAX_ACTIVE_TRADES", 16)?;

        let server_addr = parse_or(
            var("SERVER_ADDR"),
            "SERVER_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8000)),
        )?;

        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        if max_active_trades == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_ACTIVE_TRADES",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            api_key,
            api_secret,
            base_url,
            poll_interval_ms,
            recv_window_ms,
            http_timeout_secs,
            server_addr,
            cors_origin,
            max_active_trades,
        })
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

/// Testnet hosts or loopback mocks only. The host is taken from the parsed
/// URL, and URLs carrying credentials are refused outright.
fn is_sandbox_url(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if !matches!(parsed.scheme(), "http" | "https")
        || !parsed.username().is_empty()
        || parsed.password().is_some()
    {
        return false;
    }

    match parsed.host_str() {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            host.split('.').any(|label| label == "testnet")
                || host == "localhost"
                || host == "127.0.0.1"
                || host == "[::1]"
        }
        None => false,
    }
}
