//! Axum server setup and configuration

use crate::api::routes;
use crate::exchange::Exchange;
use crate::services::TradeRegistry;
use crate::Config;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared application state
pub struct AppState<E> {
    /// One authenticated session shared by every request and trade job
    pub exchange: Arc<E>,
    pub trades: TradeRegistry,
    pub poll_interval: Duration,
    pub cors_origin: String,
}

// Derive would require `E: Clone`; only the Arc is cloned.
impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            exchange: self.exchange.clone(),
            trades: self.trades.clone(),
            poll_interval: self.poll_interval,
            cors_origin: self.cors_origin.clone(),
        }
    }
}

impl<E: Exchange> AppState<E> {
    pub fn new(exchange: Arc<E>, config: &Config) -> Self {
        Self {
            exchange,
            trades: TradeRegistry::new(config.max_active_trades),
            poll_interval: config.poll_interval(),
            cors_origin: config.cors_origin.clone(),
        }
    }
}

/// Create the Axum application with all routes
pub fn create_app<E: Exchange>(state: AppState<E>) -> Router {
    // Credentials rule out wildcards, so methods and headers mirror the request
    let mut cors = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match HeaderValue::from_str(&state.cors_origin) {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!("Ignoring invalid CORS origin {:?}", state.cors_origin),
    }

    Router::new()
        .route("/balance", get(routes::balance::get_balance::<E>))
        .route("/trade", post(routes::trade::start_trade::<E>))
        .route(
            "/trade/:id",
            get(routes::trade::get_trade::<E>).delete(routes::trade::cancel_trade::<E>),
        )
        .route("/trades", get(routes::trade::list_trades::<E>))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exchange::SimulatedExchange;
    use axum::{body::Body, http::Request, http::StatusCode, response::Response};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    pub(crate) fn test_app(exchange: Arc<SimulatedExchange>) -> Router {
        create_app(AppState {
            exchange,
            trades: TradeRegistry::new(4),
            poll_interval: Duration::from_secs(1),
            cors_origin: "http://localhost:3000".to_string(),
        })
    }

    pub(crate) async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::new(SimulatedExchange::with_prices([dec!(1)])));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let app = test_app(Arc::new(SimulatedExchange::with_prices([dec!(1)])));
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/trade")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-methods"], "POST");
    }
}
