//! Picks Screener Library
//!
//! Batch screening service: fetches fundamentals for a list of stock
//! symbols through a multi-source fallback pipeline, scores them with an
//! LLM call, and delivers a ranked report.
//!
//! # Architecture
//!
//! ```text
//! symbols ──► Orchestrator ──► Chunk Processor (×N, parallel)
//!                                   │
//!                                   ▼
//!                        Fundamentals Fetcher
//!                  (yahoo → alphavantage → fmp → synthetic)
//!                                   │
//!                                   ▼
//!             Aggregator ──► Scoring Bridge ──► Report ──► Mail
//! ```
//!
//! # Key Behaviors
//!
//! - **Fallback chain**: every symbol yields exactly one record; synthetic
//!   placeholder data is the last resort, never an absence.
//! - **Bounded everything**: per-call timeouts plus a wall-clock budget on
//!   the distributed join keep the run inside the platform's execution
//!   ceiling.
//! - **Best-effort completion**: only an empty input aborts a run.

#![warn(clippy::all)]

pub mod data;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod runner;
pub mod scheduler;
pub mod scoring;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::limit::RequestBodyLimitLayer;

use picks_common::config::Config;
use picks_common::Error;

use crate::data::SymbolRequest;
use crate::report::RunReport;
use crate::runner::{RunSummary, ScreenRunner};
use crate::scheduler::RunScheduler;

/// The most recent completed run, kept for the trigger API.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LatestRun {
    pub summary: RunSummary,
    pub report: RunReport,
}

/// Screener service state.
pub struct ScreenerState {
    /// Configuration
    pub config: Config,
    /// Run driver
    runner: ScreenRunner,
    /// Overlapping-run guard
    running: AtomicBool,
    /// Most recent completed run
    latest: RwLock<Option<LatestRun>>,
}

impl ScreenerState {
    /// Create service state from config.
    pub fn new(config: Config) -> Self {
        let runner = ScreenRunner::new(config.clone());
        Self {
            config,
            runner,
            running: AtomicBool::new(false),
            latest: RwLock::new(None),
        }
    }

    /// Execute one screening run, rejecting overlap.
    pub async fn execute(&self, requests: Vec<SymbolRequest>) -> picks_common::Result<RunSummary> {
        if requests.is_empty() {
            return Err(Error::InvalidInput(
                "No symbols supplied, nothing to process".to_string(),
            ));
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::RateLimited(
                "A screening run is already in progress".to_string(),
            ));
        }

        let result = self.runner.run(requests).await;
        self.running.store(false, Ordering::SeqCst);

        let (summary, report) = result.map_err(|e| Error::Internal(format!("{:#}", e)))?;

        *self.latest.write().await = Some(LatestRun {
            summary: summary.clone(),
            report,
        });

        Ok(summary)
    }

    /// The most recent completed run, if any.
    pub async fn latest(&self) -> Option<LatestRun> {
        self.latest.read().await.clone()
    }
}

/// Main screener service.
pub struct ScreenerService {
    state: Arc<ScreenerState>,
}

impl ScreenerService {
    /// Create a new screener service.
    pub fn new(config: Config) -> Self {
        let state = Arc::new(ScreenerState::new(config));
        Self { state }
    }

    /// One-shot mode: run a single payload and return its summary.
    pub async fn run_once(
        &self,
        requests: Vec<SymbolRequest>,
    ) -> picks_common::Result<RunSummary> {
        self.state.execute(requests).await
    }

    /// Start the trigger API and, if enabled, the run scheduler.
    pub async fn start(self) -> Result<()> {
        // Start the cron scheduler
        if self.state.config.schedule.enabled {
            let scheduler_state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = RunScheduler::new(scheduler_state).start().await {
                    tracing::error!(error = %e, "Run scheduler failed");
                }
            });
        }

        // Build HTTP routes
        let app = Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/screen", post(routes::screen))
            .route("/api/v1/runs/latest", get(routes::latest_run))
            // Symbol payloads are small; anything larger is malformed.
            .layer(RequestBodyLimitLayer::new(4 * 1024 * 1024))
            .with_state(self.state.clone());

        let addr = self.state.config.bind_address();
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
