//! Trade API endpoints
//!
//! `POST /trade` only validates and registers the job; the watch itself runs
//! in the background and is followed through `GET /trade/:id`.

use super::{error, ApiError};
use crate::api::server::AppState;
use crate::exchange::Exchange;
use crate::services::{RegistryError, TradeStatus};
use crate::types::{StrategyParams, TradingPair};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Start trade request
#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub top: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub bottom: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TradeStarted {
    pub message: String,
    pub trade_id: Uuid,
    pub symbol: String,
}

fn registry_error(e: RegistryError) -> ApiError {
    let status = match e {
        RegistryError::AtCapacity(_) => StatusCode::TOO_MANY_REQUESTS,
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::NotCancellable { .. } => StatusCode::CONFLICT,
    };
    error(status, e)
}

/// Validate the request and start a background boundary watch
pub async fn start_trade<E: Exchange>(
    State(state): State<AppState<E>>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TradeStarted>), ApiError> {
    let Json(req) = payload.map_err(|e| error(StatusCode::BAD_REQUEST, e.body_text()))?;

    let pair = TradingPair::new(&req.currency).map_err(|e| error(StatusCode::BAD_REQUEST, e))?;
    let params = StrategyParams::new(req.amount, req.top, req.bottom)
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;

    let status = state
        .trades
        .start(state.exchange.clone(), state.poll_interval, pair, params)
        .await
        .map_err(registry_error)?;

    info!(
        "Accepted trade {} on {}: ${} between ${} and ${}",
        status.trade_id, status.symbol, status.amount, status.bottom, status.top
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(TradeStarted {
            message: "Trade started".to_string(),
            trade_id: status.trade_id,
            symbol: status.symbol,
        }),
    ))
}

pub async fn get_trade<E: Exchange>(
    State(state): State<AppState<E>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TradeStatus>, ApiError> {
    state
        .trades
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| registry_error(RegistryError::NotFound(id)))
}

/// Cancel a trade that is still watching
pub async fn cancel_trade<E: Exchange>(
    State(state): State<AppState<E>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TradeStatus>, ApiError> {
    state.trades.cancel(id).await.map(Json).map_err(registry_error)
}

pub async fn list_trades<E: Exchange>(State(state): State<AppState<E>>) -> Json<Vec<TradeStatus>> {
    Json(state.trades.list().await)
}

#[cfg(test)]
mod tests {
    use crate::api::server::tests::{body_json, test_app};
    use crate::exchange::SimulatedExchange;
    use crate::services::EXECUTED_MESSAGE;
    use axum::{body::Body, http::Request, http::StatusCode, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn post_trade(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/trade")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }

    #[tokio::test(start_paused = true)]
    async fn test_trade_executes_in_background() {
        let sim = Arc::new(SimulatedExchange::with_prices([dec!(49500), dec!(49400), dec!(48900)]));
        let app = test_app(sim.clone());

        let (status, started) = send(
            &app,
            post_trade(json!({ "currency": "btc", "amount": 100, "top": 50000, "bottom": 49000 })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(started["message"], "Trade started");
        assert_eq!(started["symbol"], "BTCUSDT");

        let uri = format!("/trade/{}", started["trade_id"].as_str().unwrap());
        let mut trade = Value::Null;
        for _ in 0..30 {
            let (status, body) = send(&app, get(&uri)).await;
            assert_eq!(status, StatusCode::OK);
            trade = body;
            if trade["state"] != "watching" && trade["state"] != "executing" {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        assert_eq!(trade["state"], "executed");
        assert_eq!(trade["message"], EXECUTED_MESSAGE);
        assert_eq!(trade["order"]["boundary"], "bottom");
        assert_eq!(trade["order"]["reason"], "Bottom boundary reached");

        let orders = sim.submitted_orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].after_samples, 3);
        assert_eq!(orders[0].quote_qty, dec!(100));

        let (_, all) = send(&app, get("/trades")).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected() {
        let sim = Arc::new(SimulatedExchange::with_prices([dec!(49500)]));
        let app = test_app(sim.clone());

        let cases = [
            json!({ "currency": "btc", "amount": 0, "top": 50000, "bottom": 49000 }),
            json!({ "currency": "btc", "amount": 100, "top": 49000, "bottom": 50000 }),
            json!({ "currency": "b-t-c", "amount": 100, "top": 50000, "bottom": 49000 }),
            json!({ "currency": "btc", "amount": 100 }),
        ];
        for body in cases {
            let (status, error) = send(&app, post_trade(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert!(error["detail"].is_string());
        }

        assert_eq!(sim.samples_served().await, 0);
        assert!(sim.submitted_orders().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_then_conflict() {
        let sim = Arc::new(SimulatedExchange::with_prices([dec!(49500)]));
        let app = test_app(sim.clone());

        let (_, started) = send(
            &app,
            post_trade(json!({ "currency": "eth", "amount": 50, "top": 50000, "bottom": 49000 })),
        )
        .await;
        let uri = format!("/trade/{}", started["trade_id"].as_str().unwrap());
        let delete = || Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();

        let (status, body) = send(&app, delete()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "cancelled");

        let (status, _) = send(&app, delete()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sim.submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_trade_is_not_found() {
        let app = test_app(Arc::new(SimulatedExchange::with_prices([dec!(1)])));
        let (status, body) = send(&app, get(&format!("/trade/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("not found"));
    }
}
