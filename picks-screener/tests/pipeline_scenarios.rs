//! Integration tests for the chunked fetch pipeline.
//!
//! Exercises the orchestrator end to end with mock providers: sequential
//! and distributed coverage, fallback collapse to synthetic data, and
//! budget-bounded completion when a chunk stalls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use picks_common::config::Config;
use picks_screener::data::{
    FundamentalsFetcher, FundamentalsProvider, Indicator, IndicatorSet, ProviderError,
    RateLimiter, SymbolRequest, SyntheticGenerator,
};
use picks_screener::pipeline::{
    ChunkStore, ExecutionMode, Orchestrator, OrchestratorConfig, ProvenanceBreakdown,
};
use picks_screener::runner::ScreenRunner;

// ============================================================================
// Mock Providers
// ============================================================================

/// Mock provider that succeeds instantly, except for symbols carrying a
/// configured prefix, which hang until aborted.
struct MockProvider {
    name: &'static str,
    priority: u8,
    hang_prefix: Option<&'static str>,
    calls: AtomicU32,
}

impl MockProvider {
    fn instant(name: &'static str, priority: u8) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            hang_prefix: None,
            calls: AtomicU32::new(0),
        })
    }

    fn hanging_on(name: &'static str, priority: u8, prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            hang_prefix: Some(prefix),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl FundamentalsProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn try_fetch(
        &self,
        request: &SymbolRequest,
    ) -> Result<Option<IndicatorSet>, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(prefix) = self.hang_prefix {
            if request.symbol.starts_with(prefix) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        Ok(Some(
            IndicatorSet::unknown()
                .with(Indicator::PeRatio, 20.0)
                .with(Indicator::Eps, 4.2),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn requests(n: usize) -> Vec<SymbolRequest> {
    (0..n)
        .map(|i| SymbolRequest::new(format!("SYM{:03}", i), "Unknown"))
        .collect()
}

fn orchestrator_with(
    providers: Vec<Arc<dyn FundamentalsProvider>>,
    config: OrchestratorConfig,
    dir: &tempfile::TempDir,
    call_timeout: Duration,
) -> Orchestrator {
    let fetcher = Arc::new(FundamentalsFetcher::new(
        providers,
        Arc::new(RateLimiter::with_jitter(Duration::ZERO)),
        call_timeout,
        SyntheticGenerator::from_seed(1234),
    ));
    Orchestrator::new(config, fetcher, Arc::new(ChunkStore::new(dir.path())))
}

// ============================================================================
// Scenario A: small input, nothing configured
// ============================================================================

#[tokio::test]
async fn scenario_a_unconfigured_providers_yield_synthetic_sequential_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.providers.yahoo.enabled = false;
    config.screener.work_dir = Some(dir.path().display().to_string());
    config.screener.require_positive_pe = false;

    let runner = ScreenRunner::new(config);
    let input = vec![
        SymbolRequest::new("AAPL", "Information Technology"),
        SymbolRequest::new("KO", "Consumer Staples"),
        SymbolRequest::new("JPM", "Financials"),
    ];

    let (summary, _report) = runner.run(input).await.unwrap();

    assert_eq!(summary.mode, ExecutionMode::Sequential);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.breakdown.synthetic, 3);
    assert_eq!(summary.breakdown.real, 0);
    assert_eq!(summary.substituted_chunks, 0);
}

// ============================================================================
// Scenario B: distributed coverage
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn scenario_b_distributed_run_covers_every_symbol_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig {
        chunk_size: 50,
        max_workers: 8,
        sequential_threshold: 100,
        chunk_wait_budget: Duration::from_secs(30),
    };
    let orch = orchestrator_with(
        vec![MockProvider::instant("mock", 1) as Arc<dyn FundamentalsProvider>],
        config,
        &dir,
        Duration::from_secs(5),
    );

    let input = requests(150);
    let outcome = orch.run("scenario-b", &input).await.unwrap();

    assert_eq!(outcome.mode, ExecutionMode::Distributed);
    assert_eq!(outcome.chunk_count, 3);
    assert_eq!(outcome.records.len(), 150);
    assert!(outcome.substituted_chunks.is_empty());

    let symbols: HashSet<&str> = outcome.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols.len(), 150);

    let breakdown = ProvenanceBreakdown::of(&outcome.records);
    assert_eq!(breakdown.real, 150);
    assert_eq!(breakdown.by_provider["mock"], 150);
}

// ============================================================================
// Scenario C: a stalled chunk misses the wait budget
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn scenario_c_stalled_chunk_is_substituted_and_the_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig {
        chunk_size: 50,
        max_workers: 8,
        sequential_threshold: 100,
        chunk_wait_budget: Duration::from_millis(800),
    };

    // SYM050..SYM059 land in chunk 1 (SYM050..SYM099) and hang there,
    // stalling that whole chunk. The per-call timeout is far above the
    // wait budget, so only the budget can save the run.
    let provider = MockProvider::hanging_on("mock", 1, "SYM05");

    let orch = orchestrator_with(
        vec![provider as Arc<dyn FundamentalsProvider>],
        config,
        &dir,
        Duration::from_secs(3600),
    );

    let input = requests(150);
    let started = std::time::Instant::now();
    let outcome = orch.run("scenario-c", &input).await.unwrap();

    // The run finished near the budget, not the hang duration.
    assert!(started.elapsed() < Duration::from_secs(10));

    // Every symbol is still represented.
    assert_eq!(outcome.records.len(), 150);
    let symbols: HashSet<&str> = outcome.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols.len(), 150);

    // Only the stalled chunk was substituted; its 50 symbols are synthetic.
    assert_eq!(outcome.substituted_chunks, vec![1]);
    for record in &outcome.records {
        if record.symbol.starts_with("SYM05") {
            assert!(record.is_synthetic(), "{} should be synthetic", record.symbol);
        }
    }

    let breakdown = ProvenanceBreakdown::of(&outcome.records);
    assert_eq!(breakdown.synthetic, 50);
    assert_eq!(breakdown.real, 100);
}

// ============================================================================
// Mode selection and intermediate storage
// ============================================================================

#[tokio::test]
async fn threshold_boundary_runs_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let config = OrchestratorConfig {
        chunk_size: 10,
        max_workers: 4,
        sequential_threshold: 20,
        chunk_wait_budget: Duration::from_secs(30),
    };
    let orch = orchestrator_with(
        vec![MockProvider::instant("mock", 1) as Arc<dyn FundamentalsProvider>],
        config,
        &dir,
        Duration::from_secs(5),
    );

    let outcome = orch.run("boundary", &requests(20)).await.unwrap();
    assert_eq!(outcome.mode, ExecutionMode::Sequential);
    assert_eq!(outcome.chunk_count, 1);

    let outcome = orch.run("over-boundary", &requests(21)).await.unwrap();
    assert_eq!(outcome.mode, ExecutionMode::Distributed);
    assert_eq!(outcome.chunk_count, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn distributed_run_cleans_up_intermediate_storage() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ChunkStore::new(dir.path()));
    let fetcher = Arc::new(FundamentalsFetcher::new(
        vec![MockProvider::instant("mock", 1) as Arc<dyn FundamentalsProvider>],
        Arc::new(RateLimiter::with_jitter(Duration::ZERO)),
        Duration::from_secs(5),
        SyntheticGenerator::from_seed(9),
    ));
    let config = OrchestratorConfig {
        chunk_size: 5,
        max_workers: 4,
        sequential_threshold: 4,
        chunk_wait_budget: Duration::from_secs(30),
    };
    let orch = Orchestrator::new(config, fetcher, Arc::clone(&store));

    let outcome = orch.run("cleanup", &requests(12)).await.unwrap();
    assert_eq!(outcome.records.len(), 12);

    // The aggregator removed the whole run directory.
    assert!(!store.run_dir("cleanup").exists());
}

// ============================================================================
// Fallback ordering across real provider shapes
// ============================================================================

/// Provider that always fails, tracking how often it was consulted.
struct FailingProvider {
    priority: u8,
    calls: AtomicU32,
}

#[async_trait]
impl FundamentalsProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn try_fetch(
        &self,
        _request: &SymbolRequest,
    ) -> Result<Option<IndicatorSet>, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(ProviderError::Network("unreachable".into()))
    }
}

#[tokio::test]
async fn failing_primary_falls_through_to_backup_for_every_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(FailingProvider {
        priority: 1,
        calls: AtomicU32::new(0),
    });
    let backup = MockProvider::instant("backup", 2);

    let orch = orchestrator_with(
        vec![
            failing.clone() as Arc<dyn FundamentalsProvider>,
            backup.clone(),
        ],
        OrchestratorConfig::default(),
        &dir,
        Duration::from_secs(5),
    );

    let outcome = orch.run("fallback", &requests(8)).await.unwrap();

    let breakdown = ProvenanceBreakdown::of(&outcome.records);
    assert_eq!(breakdown.real, 8);
    assert_eq!(breakdown.by_provider["backup"], 8);
    // The primary was consulted for every symbol before falling through.
    assert_eq!(failing.calls.load(Ordering::Relaxed), 8);
}
