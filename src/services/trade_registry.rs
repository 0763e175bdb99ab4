//! Background trade jobs
//!
//! Each accepted trade runs its boundary watcher on its own tokio task. The
//! task publishes progress into a `watch` channel, so status queries never
//! wait on the watcher and a slow watch never holds a request open.

use crate::exchange::Exchange;
use crate::report::OrderReport;
use crate::types::{StrategyParams, TradingPair};
use crate::watcher::{BoundaryWatcher, Tick, WatchError, WatchObserver};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Finished jobs kept for status queries
const HISTORY_LIMIT: usize = 256;

pub const EXECUTED_MESSAGE: &str = "Trade executed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeState {
    Watching,
    Executing,
    Executed,
    Failed,
    Cancelled,
}

impl TradeState {
    pub fn is_active(&self) -> bool {
        matches!(self, TradeState::Watching | TradeState::Executing)
    }
}

/// Snapshot of one trade job
#[derive(Debug, Clone, Serialize)]
pub struct TradeStatus {
    pub trade_id: Uuid,
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub top: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub bottom: Decimal,
    pub state: TradeState,
    pub ticks: u64,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub last_price: Option<Decimal>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub order: Option<OrderReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{0} trades are already being watched, try again later")]
    AtCapacity(usize),
    #[error("trade {0} not found")]
    NotFound(Uuid),
    #[error("trade {id} is already {state:?}")]
    NotCancellable { id: Uuid, state: TradeState },
}

/// Publishes watcher progress into a job's status channel
struct JobObserver {
    tx: watch::Sender<TradeStatus>,
}

impl WatchObserver for JobObserver {
    fn on_tick(&mut self, tick: &Tick) {
        self.tx.send_modify(|s| {
            s.ticks = tick.count;
            s.last_price = Some(tick.sample.price);
        });
    }

    fn on_executed(&mut self, report: &OrderReport) {
        self.tx.send_modify(|s| {
            s.state = TradeState::Executed;
            s.message = Some(EXECUTED_MESSAGE.to_string());
            s.order = Some(report.clone());
            s.finished_at = Some(Utc::now());
        });
    }

    fn on_failed(&mut self, error: &WatchError) {
        self.tx.send_if_modified(|s| {
            if s.state == TradeState::Cancelled {
                return false;
            }
            s.state = TradeState::Failed;
            s.error = Some(error.to_string());
            s.finished_at = Some(Utc::now());
            true
        });
    }

    fn is_cancelled(&self) -> bool {
        self.tx.borrow().state == TradeState::Cancelled
    }

    fn claim_execution(&mut self) -> bool {
        // atomic with respect to `TradeRegistry::cancel`
        self.tx.send_if_modified(|s| {
            if s.state != TradeState::Watching {
                return false;
            }
            s.state = TradeState::Executing;
            true
        })
    }
}

struct TradeJob {
    status: watch::Receiver<TradeStatus>,
    control: watch::Sender<TradeStatus>,
}

/// All trade jobs of this process
#[derive(Clone)]
pub struct TradeRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, TradeJob>>>,
    max_active: usize,
}

impl TradeRegistry {
    pub fn new(max_active: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            max_active,
        }
    }

    /// Spawn a watcher for `pair`/`params` and return its initial status
    pub async fn start<E: Exchange>(
        &self,
        exchange: Arc<E>,
        interval: Duration,
        pair: TradingPair,
        params: StrategyParams,
    ) -> Result<TradeStatus, RegistryError> {
        let mut jobs = self.jobs.write().await;

        let active = jobs.values().filter(|j| j.status.borrow().state.is_active()).count();
        if active >= self.max_active {
            warn!("Rejecting trade on {}: {} watchers active", pair, active);
            return Err(RegistryError::AtCapacity(self.max_active));
        }

        prune_history(&mut jobs);

        let trade_id = Uuid::new_v4();
        let status = TradeStatus {
            trade_id,
            symbol: pair.symbol(),
            amount: params.amount(),
            top: params.top(),
            bottom: params.bottom(),
            state: TradeState::Watching,
            ticks: 0,
            last_price: None,
            started_at: Utc::now(),
            finished_at: None,
            message: None,
            order: None,
            error: None,
        };

        let (tx, rx) = watch::channel(status.clone());
        let mut observer = JobObserver { tx: tx.clone() };

        let handle = tokio::spawn(async move {
            let watcher = BoundaryWatcher::new(exchange, interval);
            match watcher.run(&pair, &params, &mut observer).await {
                Ok(report) => info!("Trade {} executed: order {}", trade_id, report.order_id),
                Err(WatchError::Cancelled) => info!("Trade {} cancelled", trade_id),
                Err(e) => warn!("Trade {} failed: {}", trade_id, e),
            }
        });

        // A panicked watcher never reports; release its slot here
        let supervisor = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("Trade {} watcher task died: {}", trade_id, e);
                mark_aborted(&supervisor, format!("watcher task died: {}", e));
            }
        });

        jobs.insert(trade_id, TradeJob { status: rx, control: tx });
        info!("Trade {} started on {}", trade_id, status.symbol);

        Ok(status)
    }

    pub async fn get(&self, trade_id: Uuid) -> Option<TradeStatus> {
        let jobs = self.jobs.read().await;
        jobs.get(&trade_id).map(|j| j.status.borrow().clone())
    }

    /// All jobs, oldest first
    pub async fn list(&self) -> Vec<TradeStatus> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<TradeStatus> = jobs.values().map(|j| j.status.borrow().clone()).collect();
        all.sort_by_key(|s| s.started_at);
        all
    }

    /// Stop a job that has not started executing yet. The watcher notices on
    /// its next tick; no order is placed after a successful cancel.
    pub async fn cancel(&self, trade_id: Uuid) -> Result<TradeStatus, RegistryError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&trade_id).ok_or(RegistryError::NotFound(trade_id))?;

        let mut current = None;
        let cancelled = job.control.send_if_modified(|s| {
            current = Some(s.state);
            if s.state != TradeState::Watching {
                return false;
            }
            s.state = TradeState::Cancelled;
            s.finished_at = Some(Utc::now());
            true
        });

        if !cancelled {
            let state = current.unwrap_or(TradeState::Failed);
            return Err(RegistryError::NotCancellable { id: trade_id, state });
        }

        info!("Trade {} cancel requested", trade_id);
        let status = job.status.borrow().clone();
        Ok(status)
    }
}

/// Fail a job that is still active without going through its watcher
fn mark_aborted(tx: &watch::Sender<TradeStatus>, reason: String) {
    tx.send_if_modified(|s| {
        if !s.state.is_active() {
            return false;
        }
        s.state = TradeState::Failed;
        s.error = Some(reason);
        s.finished_at = Some(Utc::now());
        true
    });
}

/// Drop the oldest finished jobs beyond the history limit
fn prune_history(jobs: &mut HashMap<Uuid, TradeJob>) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .iter()
        .filter_map(|(id, j)| {
            let status = j.status.borrow();
            let finished = !status.state.is_active();
            let started_at = status.started_at;
            finished.then_some((started_at, *id))
        })
        .collect();

    if finished.len() < HISTORY_LIMIT {
        return;
    }

    finished.sort();
    let excess = finished.len() + 1 - HISTORY_LIMIT;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}
