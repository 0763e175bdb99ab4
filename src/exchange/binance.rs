//! Binance spot REST client (testnet)
//!
//! Signed endpoints carry `timestamp` and `recvWindow` and are authenticated
//! with an HMAC-SHA256 signature of the query string, hex encoded, plus the
//! `X-MBX-APIKEY` header.

use super::{errors::ExchangeError, Exchange};
use crate::config::Config;
use crate::types::{AccountBalances, OrderResult};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// `GET /api/v3/ticker/price` payload
#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

/// `GET /api/v3/account` payload, only the part we read
#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: Decimal,
}

/// Authenticated session against the Binance spot REST API
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

impl BinanceClient {
    pub fn new(config: &Config) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!("Exchange session targets {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            recv_window_ms: config.recv_window_ms,
        })
    }

    /// Unsigned GET for market data endpoints
    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}?{}", self.base_url, path, encode_query(params));
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::from_network_error(&e))?;

        parse_response(response).await
    }

    /// Signed request for account and trade endpoints
    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));

        let query = encode_query(&params);
        let signature = sign(&self.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!("{} {}{}", method, self.base_url, path);

        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::from_network_error(&e))?;

        parse_response(response).await
    }
}

impl Exchange for BinanceClient {
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let ticker: TickerPrice = self
            .public_get("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Ok(ticker.price)
    }

    async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_qty: Decimal,
        client_order_id: &str,
    ) -> Result<OrderResult, ExchangeError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("side", "BUY".to_string()),
            ("type", "MARKET".to_string()),
            ("quoteOrderQty", quote_qty.normalize().to_string()),
            ("newClientOrderId", client_order_id.to_string()),
            ("newOrderRespType", "RESULT".to_string()),
        ];

        info!("Submitting market buy: {} for {} quote ({})", symbol, quote_qty, client_order_id);
        self.signed_request(Method::POST, "/api/v3/order", params).await
    }

    async fn query_order(&self, symbol: &str, client_order_id: &str) -> Result<OrderResult, ExchangeError> {
        let params = vec![
            ("symbol", symbol.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        self.signed_request(Method::GET, "/api/v3/order", params).await
    }

    async fn account_balances(&self) -> Result<AccountBalances, ExchangeError> {
        let account: AccountInfo = self
            .signed_request(Method::GET, "/api/v3/account", Vec::new())
            .await?;

        let free: HashMap<String, Decimal> = account
            .balances
            .into_iter()
            .map(|b| (b.asset, b.free))
            .collect();

        Ok(AccountBalances::new(free))
    }
}

/// Turn a non-success status into an `ExchangeError`, otherwise decode the body
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::from_network_error(&e))?;

    if !status.is_success() {
        return Err(ExchangeError::from_response(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| ExchangeError::Decode(e.to_string()))
}

/// `k1=v1&k2=v2` with percent-encoded values, in the given order
fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex encoded HMAC-SHA256 of `payload` keyed with the API secret
fn sign(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthenticationFailed(format!("Invalid HMAC key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
