//! Exchange API Error Differentiation
//!
//! Parses Binance REST error responses (`{"code": -2010, "msg": "..."}`) into
//! structured types so callers can tell rejections from transport failures.

use serde::Deserialize;
use thiserror::Error;

/// Structured exchange API error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    /// Request weight or order rate exceeded (HTTP 418/429, code -1003/-1015)
    #[error("Rate limited by exchange: {0}")]
    RateLimited(String),
    /// API key, signature or timestamp rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    /// Not enough quote asset to cover the order
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    /// Symbol is unknown to the exchange
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
    /// Order was rejected for another business reason
    #[error("Order rejected: {0}")]
    OrderRejected(String),
    /// Order lookup found nothing
    #[error("Order does not exist: {0}")]
    OrderNotFound(String),
    /// Network/connection error (timeout, DNS, etc.)
    #[error("Network error: {0}")]
    Network(String),
    /// Response body did not match the expected shape
    #[error("Failed to decode exchange response: {0}")]
    Decode(String),
    /// Unknown error with status code and body
    #[error("Exchange API error {status} (code {code:?}): {msg}")]
    Unknown {
        status: u16,
        code: Option<i64>,
        msg: String,
    },
}

/// Binance error response format
#[derive(Debug, Deserialize)]
struct BinanceErrorResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

impl ExchangeError {
    /// Parse an exchange API response into a structured error
    pub fn from_response(status: u16, body: &str) -> Self {
        let (code, msg) = match serde_json::from_str::<BinanceErrorResponse>(body) {
            Ok(parsed) => (parsed.code, parsed.msg.unwrap_or_else(|| body.to_string())),
            Err(_) => (None, body.to_string()),
        };

        let msg_lower = msg.to_lowercase();

        // Rate limiting
        if status == 429 || status == 418 || matches!(code, Some(-1003) | Some(-1015)) {
            return ExchangeError::RateLimited(msg);
        }

        // Authentication (-1021 timestamp outside recvWindow, -1022 bad signature, -2014/-2015 bad key)
        if status == 401
            || status == 403
            || matches!(code, Some(-1021) | Some(-1022) | Some(-2014) | Some(-2015))
        {
            return ExchangeError::AuthenticationFailed(msg);
        }

        if code == Some(-1121) || msg_lower.contains("invalid symbol") {
            return ExchangeError::InvalidSymbol(msg);
        }

        if code == Some(-2013) || msg_lower.contains("order does not exist") {
            return ExchangeError::OrderNotFound(msg);
        }

        if msg_lower.contains("insufficient balance") {
            return ExchangeError::InsufficientBalance(msg);
        }

        // -1013 filter failure, -2010 NEW_ORDER_REJECTED and the -11xx parameter family
        if matches!(code, Some(-1013) | Some(-2010))
            || (status == 400 && code.is_some_and(|c| (-1199..=-1100).contains(&c)))
        {
            return ExchangeError::OrderRejected(msg);
        }

        ExchangeError::Unknown { status, code, msg }
    }

    /// Parse a network/reqwest error
    pub fn from_network_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ExchangeError::Network("Connection failed".to_string())
        } else if err.is_decode() {
            ExchangeError::Decode(err.to_string())
        } else {
            ExchangeError::Network(err.to_string())
        }
    }

    /// Whether a failed order submission may still have reached the matching
    /// engine. Only these errors warrant a lookup before reporting failure.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            ExchangeError::Network(_) | ExchangeError::Decode(_) => true,
            // -1006/-1007: execution status unknown, whatever the HTTP status
            ExchangeError::Unknown { status, code, .. } => {
                *status >= 500 || matches!(code, Some(-1006) | Some(-1007))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited() {
        let err = ExchangeError::from_response(429, r#"{"code":-1003,"msg":"Too many requests."}"#);
        assert!(matches!(err, ExchangeError::RateLimited(_)));
        assert!(!err.is_ambiguous());
    }

    #[test]
    fn test_bad_signature() {
        let err = ExchangeError::from_response(
            400,
            r#"{"code":-1022,"msg":"Signature for this request is not valid."}"#,
        );
        assert!(matches!(err, ExchangeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_invalid_symbol() {
        let err = ExchangeError::from_response(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#);
        assert_eq!(err, ExchangeError::InvalidSymbol("Invalid symbol.".to_string()));
    }

    #[test]
    fn test_insufficient_balance() {
        let err = ExchangeError::from_response(
            400,
            r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#,
        );
        assert!(matches!(err, ExchangeError::InsufficientBalance(_)));
        assert!(!err.is_ambiguous());
    }

    #[test]
    fn test_order_rejected() {
        let err = ExchangeError::from_response(400, r#"{"code":-1013,"msg":"Filter failure: NOTIONAL"}"#);
        assert_eq!(err, ExchangeError::OrderRejected("Filter failure: NOTIONAL".to_string()));
        assert!(!err.is_ambiguous());

        let err = ExchangeError::from_response(400, r#"{"code":-2010,"msg":"Market is closed."}"#);
        assert!(matches!(err, ExchangeError::OrderRejected(_)));
    }

    #[test]
    fn test_execution_status_unknown_is_ambiguous() {
        for (status, body) in [
            (400, r#"{"code":-1007,"msg":"Timeout waiting for response from backend server. Send status unknown; execution status unknown."}"#),
            (408, r#"{"code":-1007,"msg":"Timeout waiting for response from backend server. Send status unknown; execution status unknown."}"#),
            (400, r#"{"code":-1006,"msg":"An unexpected response was received from the message bus. Execution status unknown."}"#),
        ] {
            let err = ExchangeError::from_response(status, body);
            assert!(matches!(err, ExchangeError::Unknown { .. }), "{err:?}");
            assert!(err.is_ambiguous(), "{err:?}");
        }

        let definite = ExchangeError::from_response(400, r#"{"code":-1000,"msg":"An unknown error occurred."}"#);
        assert!(!definite.is_ambiguous());
    }

    #[test]
    fn test_order_not_found() {
        let err = ExchangeError::from_response(400, r#"{"code":-2013,"msg":"Order does not exist."}"#);
        assert!(matches!(err, ExchangeError::OrderNotFound(_)));
    }

    #[test]
    fn test_server_error_is_ambiguous() {
        let err = ExchangeError::from_response(503, "Service Unavailable");
        assert!(matches!(err, ExchangeError::Unknown { status: 503, code: None, .. }));
        assert!(err.is_ambiguous());
        assert!(ExchangeError::Network("Request timed out".to_string()).is_ambiguous());
    }
}
