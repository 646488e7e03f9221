//! Pipeline orchestration: mode selection, chunk dispatch, bounded waits.
//!
//! Small inputs run as a single sequential pass; larger ones are
//! partitioned and dispatched as independent tasks whose results are also
//! persisted to the chunk store. A wall-clock budget bounds the distributed
//! join: chunks that miss it get synthetic substitute records so the run
//! always produces one record per input symbol, no matter what.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::aggregator::Aggregator;
use super::chunk::{partition, Chunk, ChunkResult, ChunkStatus};
use super::processor::ChunkProcessor;
use super::store::ChunkStore;
use crate::data::{FundamentalsFetcher, FundamentalsRecord, SymbolRequest};

// ============================================================================
// Execution Mode
// ============================================================================

/// How a run's input is executed. Selected once per run, never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One processor over the whole input, no partitioning
    Sequential,
    /// Partitioned into chunks dispatched as independent tasks
    Distributed,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Distributed => f.write_str("distributed"),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum symbols per chunk in distributed mode
    pub chunk_size: usize,
    /// Concurrent fetch workers per chunk
    pub max_workers: usize,
    /// Input sizes at or below this run sequentially
    pub sequential_threshold: usize,
    /// Wall-clock budget for all distributed chunks to complete
    pub chunk_wait_budget: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            max_workers: 8,
            sequential_threshold: 100,
            chunk_wait_budget: Duration::from_secs(240),
        }
    }
}

impl From<&picks_common::config::ScreenerConfig> for OrchestratorConfig {
    fn from(config: &picks_common::config::ScreenerConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_workers: config.max_workers,
            sequential_threshold: config.sequential_threshold,
            chunk_wait_budget: Duration::from_secs(config.chunk_wait_budget_secs),
        }
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Merged output of one orchestrated fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The mode the run used
    pub mode: ExecutionMode,
    /// One record per input symbol, deduplicated
    pub records: Vec<FundamentalsRecord>,
    /// Number of chunks dispatched
    pub chunk_count: usize,
    /// Chunks that crashed or missed the wait budget and were substituted
    pub substituted_chunks: Vec<usize>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives one fetch run end to end: partition, dispatch, bounded join,
/// substitution, aggregation.
pub struct Orchestrator {
    config: OrchestratorConfig,
    fetcher: Arc<FundamentalsFetcher>,
    store: Arc<ChunkStore>,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        fetcher: Arc<FundamentalsFetcher>,
        store: Arc<ChunkStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
        }
    }

    /// Pick the execution mode for an input size. Inputs at the threshold
    /// run sequentially.
    pub fn select_mode(&self, input_len: usize) -> ExecutionMode {
        if input_len <= self.config.sequential_threshold {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Distributed
        }
    }

    /// Run the whole fetch for one input.
    ///
    /// The only fatal error is an empty input; everything else degrades to
    /// partial or synthetic records.
    pub async fn run(
        &self,
        run_id: &str,
        requests: &[SymbolRequest],
    ) -> Result<FetchOutcome> {
        if requests.is_empty() {
            bail!("No symbols supplied, nothing to process");
        }

        let mode = self.select_mode(requests.len());
        info!(
            run_id,
            mode = %mode,
            symbols = requests.len(),
            "Starting fundamentals fetch"
        );

        let (chunks, results) = match mode {
            ExecutionMode::Sequential => {
                let chunk = Chunk {
                    index: 0,
                    requests: requests.to_vec(),
                };
                let processor =
                    ChunkProcessor::new(Arc::clone(&self.fetcher), self.config.max_workers);
                let result = processor.process(&chunk).await;
                (vec![chunk], vec![result])
            }
            ExecutionMode::Distributed => {
                let chunks = partition(requests, self.config.chunk_size);
                let results = self.run_distributed(run_id, &chunks).await;
                (chunks, results)
            }
        };

        // Substitute synthetic records for chunks that crashed, errored, or
        // missed the budget, so every input symbol is still represented.
        let mut by_index: HashMap<usize, ChunkResult> = results
            .into_iter()
            .filter(|r| r.is_complete())
            .map(|r| (r.chunk_index, r))
            .collect();

        let mut substituted_chunks = Vec::new();
        let mut chunk_results = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            match by_index.remove(&chunk.index) {
                Some(result) => chunk_results.push(result),
                None => {
                    warn!(
                        run_id,
                        chunk = chunk.index,
                        symbols = chunk.requests.len(),
                        "Chunk did not complete, substituting synthetic records"
                    );
                    substituted_chunks.push(chunk.index);
                    chunk_results.push(self.substitute(chunk));
                }
            }
        }

        let chunk_count = chunks.len();
        let aggregator = Aggregator::new(Arc::clone(&self.store));
        let records = aggregator.merge(run_id, chunk_results).await;

        info!(
            run_id,
            records = records.len(),
            chunks = chunk_count,
            substituted = substituted_chunks.len(),
            "Fundamentals fetch finished"
        );

        Ok(FetchOutcome {
            mode,
            records,
            chunk_count,
            substituted_chunks,
        })
    }

    /// Dispatch every chunk as an independent task and join with a budget.
    ///
    /// Each task persists its result to the chunk store before returning
    /// it, honoring the intermediate-storage contract. Tasks still pending
    /// when the budget expires are aborted; their chunks are substituted by
    /// the caller.
    async fn run_distributed(&self, run_id: &str, chunks: &[Chunk]) -> Vec<ChunkResult> {
        let mut join_set = JoinSet::new();
        for chunk in chunks {
            let processor =
                ChunkProcessor::new(Arc::clone(&self.fetcher), self.config.max_workers);
            let store = Arc::clone(&self.store);
            let run_id = run_id.to_string();
            let chunk = chunk.clone();

            join_set.spawn(async move {
                let result = processor.process(&chunk).await;
                if let Err(e) = store.write(&run_id, &result).await {
                    warn!(
                        run_id = %run_id,
                        chunk = chunk.index,
                        error = %e,
                        "Failed to persist chunk result"
                    );
                }
                result
            });
        }

        let deadline = tokio::time::Instant::now() + self.config.chunk_wait_budget;
        let mut results = Vec::with_capacity(chunks.len());
        loop {
            tokio::select! {
                joined = join_set.join_next() => match joined {
                    None => break,
                    Some(Ok(result)) => results.push(result),
                    Some(Err(e)) => {
                        warn!(run_id, error = %e, "Chunk task crashed");
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        run_id,
                        pending = join_set.len(),
                        budget_secs = self.config.chunk_wait_budget.as_secs(),
                        "Chunk wait budget exhausted, abandoning unfinished chunks"
                    );
                    join_set.abort_all();
                    // Drain so no aborted task races the storage cleanup;
                    // tasks that finished right at the deadline still count.
                    while let Some(joined) = join_set.join_next().await {
                        if let Ok(result) = joined {
                            results.push(result);
                        }
                    }
                    break;
                }
            }
        }
        results
    }

    /// Build a substitute result for a chunk that never completed.
    fn substitute(&self, chunk: &Chunk) -> ChunkResult {
        let records = chunk
            .requests
            .iter()
            .map(|request| self.fetcher.synthetic().record(request))
            .collect();

        ChunkResult {
            chunk_index: chunk.index,
            records,
            status: ChunkStatus::Error,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::rate_limiter::RateLimiter;
    use crate::data::SyntheticGenerator;

    fn orchestrator(config: OrchestratorConfig, dir: &tempfile::TempDir) -> Orchestrator {
        let fetcher = Arc::new(FundamentalsFetcher::new(
            Vec::new(),
            Arc::new(RateLimiter::with_jitter(Duration::ZERO)),
            Duration::from_millis(100),
            SyntheticGenerator::from_seed(11),
        ));
        Orchestrator::new(config, fetcher, Arc::new(ChunkStore::new(dir.path())))
    }

    fn requests(n: usize) -> Vec<SymbolRequest> {
        (0..n)
            .map(|i| SymbolRequest::new(format!("SYM{}", i), "Unknown"))
            .collect()
    }

    #[test]
    fn test_mode_boundary_is_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(OrchestratorConfig::default(), &dir);

        assert_eq!(orch.select_mode(1), ExecutionMode::Sequential);
        assert_eq!(orch.select_mode(100), ExecutionMode::Sequential);
        assert_eq!(orch.select_mode(101), ExecutionMode::Distributed);
    }

    #[tokio::test]
    async fn test_empty_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(OrchestratorConfig::default(), &dir);
        assert!(orch.run("run-a", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_sequential_run_covers_input() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(OrchestratorConfig::default(), &dir);

        let outcome = orch.run("run-a", &requests(10)).await.unwrap();
        assert_eq!(outcome.mode, ExecutionMode::Sequential);
        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(outcome.records.len(), 10);
        assert!(outcome.substituted_chunks.is_empty());
    }

    #[tokio::test]
    async fn test_distributed_run_covers_input_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig {
            chunk_size: 5,
            sequential_threshold: 4,
            ..OrchestratorConfig::default()
        };
        let orch = orchestrator(config, &dir);

        let outcome = orch.run("run-b", &requests(12)).await.unwrap();
        assert_eq!(outcome.mode, ExecutionMode::Distributed);
        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.records.len(), 12);

        // Intermediate artifacts are gone after aggregation.
        assert!(!orch.store.exists("run-b", 0).await);
        assert!(!orch.store.run_dir("run-b").exists());
    }
}
