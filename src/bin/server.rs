//! Range Buy Bot Web Server
//!
//! HTTP facade over the boundary watcher: balance lookup and background trades.

use anyhow::{Context, Result};
use range_buy_bot::api::{create_app, AppState};
use range_buy_bot::{BinanceClient, Config};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Default to warn with info for this crate. Override with RUST_LOG.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,range_buy_bot=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║       RANGE BUY BOT - WEB SERVER                             ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Exchange: {:<49} ║", config.base_url);
    println!("║  Poll interval: {:<44} ║", format!("{} ms", config.poll_interval_ms));
    println!("║  Max active trades: {:<40} ║", config.max_active_trades);
    println!("║  CORS origin: {:<46} ║", config.cors_origin);
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // One signed session for every request and trade job
    info!("Initializing exchange session...");
    let client = Arc::new(BinanceClient::new(&config)?);
    let state = AppState::new(client, &config);

    let app = create_app(state);

    let listener = TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("binding {}", config.server_addr))?;
    info!("Server listening on http://{}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Cannot listen for Ctrl+C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
