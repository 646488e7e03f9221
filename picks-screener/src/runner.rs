//! End-to-end screening runs.
//!
//! The serverless-handler equivalent: validate input, fetch fundamentals
//! through the chunked pipeline, filter, score, rank, and deliver the
//! report. Every stage past input validation degrades instead of failing,
//! so a run always ends with a best-effort result set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use picks_common::config::Config;

use crate::data::{
    AlphaVantageAdapter, FmpAdapter, FundamentalsFetcher, FundamentalsProvider, RateLimiter,
    SymbolRequest, SyntheticGenerator, YahooAdapter,
};
use crate::pipeline::{
    ChunkStore, ExecutionMode, Orchestrator, OrchestratorConfig, ProvenanceBreakdown,
};
use crate::report::{MailClient, RunReport};
use crate::scoring::ScoringBridge;

// ============================================================================
// Run Summary
// ============================================================================

/// Outcome of one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: String,
    /// Execution mode used
    pub mode: ExecutionMode,
    /// Symbols requested
    pub requested: usize,
    /// Records produced (exactly one per unique symbol)
    pub records: usize,
    /// Real vs synthetic data split
    pub breakdown: ProvenanceBreakdown,
    /// Records that survived the pre-scoring filter
    pub candidates: usize,
    /// Candidates that received a score
    pub scored: usize,
    /// Picks in the final report
    pub picks: usize,
    /// Chunks substituted after crash or budget exhaustion
    pub substituted_chunks: usize,
    /// Whether the report email went out
    pub emailed: bool,
    /// Wall-clock duration
    pub duration_secs: f64,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

// ============================================================================
// Screen Runner
// ============================================================================

/// Owns the long-lived collaborators and drives individual runs.
pub struct ScreenRunner {
    config: Config,
    store: Arc<ChunkStore>,
    scoring: ScoringBridge,
    mailer: MailClient,
}

impl ScreenRunner {
    /// Create a runner from config.
    pub fn new(config: Config) -> Self {
        let store = Arc::new(ChunkStore::new(config.work_dir()));
        let scoring = ScoringBridge::from_config(&config);
        let mailer = MailClient::new(&config);

        Self {
            config,
            store,
            scoring,
            mailer,
        }
    }

    /// Assemble the provider chain from config. Providers without
    /// credentials are skipped, not errors.
    fn build_providers(&self) -> Vec<Arc<dyn FundamentalsProvider>> {
        let mut providers: Vec<Arc<dyn FundamentalsProvider>> = Vec::new();

        if let Some(yahoo) = YahooAdapter::from_config(&self.config) {
            providers.push(Arc::new(yahoo));
        }
        if let Some(alpha_vantage) = AlphaVantageAdapter::from_config(&self.config) {
            providers.push(Arc::new(alpha_vantage));
        }
        if let Some(fmp) = FmpAdapter::from_config(&self.config) {
            providers.push(Arc::new(fmp));
        }

        providers
    }

    /// Execute one screening run.
    ///
    /// The only fatal error is an empty input; every failure past that
    /// degrades instead of aborting.
    pub async fn run(&self, requests: Vec<SymbolRequest>) -> Result<(RunSummary, RunReport)> {
        if requests.is_empty() {
            bail!("No symbols supplied, nothing to process");
        }

        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        // Per-run shared state: the rate limiter and the synthetic seed are
        // scoped to this run and passed explicitly to every worker.
        let limiter = Arc::new(RateLimiter::new());
        let fetcher = Arc::new(FundamentalsFetcher::new(
            self.build_providers(),
            Arc::clone(&limiter),
            Duration::from_secs(self.config.screener.provider_timeout_secs),
            SyntheticGenerator::new(&run_id),
        ));

        info!(
            run_id = %run_id,
            symbols = requests.len(),
            providers = ?fetcher.provider_names(),
            "Starting screening run"
        );

        let orchestrator = Orchestrator::new(
            OrchestratorConfig::from(&self.config.screener),
            fetcher,
            Arc::clone(&self.store),
        );
        let outcome = orchestrator.run(&run_id, &requests).await?;
        let breakdown = ProvenanceBreakdown::of(&outcome.records);

        for (provider, stats) in limiter.stats().await {
            debug!(
                run_id = %run_id,
                provider = %provider,
                calls = stats.calls,
                wait_ms = stats.total_wait.as_millis() as u64,
                "Provider call accounting"
            );
        }

        // Pre-scoring filter: drop symbols without a positive known P/E.
        let candidates: Vec<_> = if self.config.screener.require_positive_pe {
            outcome
                .records
                .iter()
                .filter(|r| r.has_positive_pe())
                .cloned()
                .collect()
        } else {
            outcome.records.clone()
        };
        if candidates.len() < outcome.records.len() {
            info!(
                run_id = %run_id,
                dropped = outcome.records.len() - candidates.len(),
                "Filtered candidates without a positive P/E"
            );
        }

        let scored = self.scoring.score_all(&candidates).await;

        let report = RunReport::new(
            run_id.clone(),
            scored,
            self.config.scoring.top_n,
            outcome.records.len(),
            breakdown.clone(),
        );

        let emailed = match self.mailer.send_report(&report).await {
            Ok(()) => self.mailer.is_enabled(),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Report delivery failed");
                false
            }
        };

        let summary = RunSummary {
            run_id: run_id.clone(),
            mode: outcome.mode,
            requested: requests.len(),
            records: outcome.records.len(),
            breakdown,
            candidates: candidates.len(),
            scored: report.total_scored,
            picks: report.picks.len(),
            substituted_chunks: outcome.substituted_chunks.len(),
            emailed,
            duration_secs: started.elapsed().as_secs_f64(),
            completed_at: Utc::now(),
        };

        info!(
            run_id = %run_id,
            mode = %summary.mode,
            records = summary.records,
            real = summary.breakdown.real,
            synthetic = summary.breakdown.synthetic,
            picks = summary.picks,
            emailed = summary.emailed,
            duration_secs = format!("{:.1}", summary.duration_secs),
            "Screening run finished"
        );

        Ok((summary, report))
    }
}

// ============================================================================
// Tests
// ============================================================================
