//! Balance API endpoint

use super::{error, ApiError};
use crate::api::server::AppState;
use crate::exchange::Exchange;
use crate::types::QUOTE_ASSET;
use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Free quote-asset balance, zero when the account holds none
pub async fn get_balance<E: Exchange>(
    State(state): State<AppState<E>>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balances = state.exchange.account_balances().await.map_err(|e| {
        warn!("Balance lookup failed: {}", e);
        error(StatusCode::BAD_GATEWAY, e)
    })?;

    let balance = balances.free(QUOTE_ASSET);
    debug!("{} balance: {}", QUOTE_ASSET, balance);

    Ok(Json(BalanceResponse { balance }))
}

#[cfg(test)]
mod tests {
    use crate::api::server::tests::{body_json, test_app};
    use crate::exchange::{ExchangeError, SimulatedExchange};
    use axum::{body::Body, http::Request, http::StatusCode};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn request() -> Request<Body> {
        Request::builder().uri("/balance").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_balance_reports_quote_asset() {
        let sim = SimulatedExchange::with_prices([dec!(1)])
            .with_balance("USDT", dec!(10000.5))
            .with_balance("BTC", dec!(1));
        let response = test_app(Arc::new(sim)).oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "balance": 10000.5 }));
    }

    #[tokio::test]
    async fn test_balance_without_quote_asset_is_zero() {
        let sim = SimulatedExchange::with_prices([dec!(1)]).with_balance("BTC", dec!(1));
        let response = test_app(Arc::new(sim)).oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["balance"], serde_json::json!(0.0));
    }

    #[tokio::test]
    async fn test_balance_failure_is_bad_gateway() {
        let sim = SimulatedExchange::with_prices([dec!(1)])
            .with_balance_failure(ExchangeError::AuthenticationFailed("Invalid API-key".to_string()));
        let response = test_app(Arc::new(sim)).oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("Invalid API-key"));
    }
}
