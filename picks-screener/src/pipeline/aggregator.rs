//! Chunk-result aggregation.
//!
//! Merges all chunk results into the final record sequence, dedupes by
//! symbol, and removes the run's intermediate storage. Cleanup runs on
//! success and failure paths alike.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::chunk::ChunkResult;
use super::store::ChunkStore;
use crate::data::{FundamentalsRecord, Provenance};

// ============================================================================
// Provenance Breakdown
// ============================================================================

/// How many records came from real providers vs the synthetic fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceBreakdown {
    /// Records backed by a real provider
    pub real: usize,
    /// Records generated by the synthetic fallback
    pub synthetic: usize,
    /// Real records per provider name
    pub by_provider: BTreeMap<String, usize>,
}

impl ProvenanceBreakdown {
    /// Tally a record sequence.
    pub fn of(records: &[FundamentalsRecord]) -> Self {
        let mut breakdown = Self::default();
        for record in records {
            match &record.provenance {
                Provenance::Real(provider) => {
                    breakdown.real += 1;
                    *breakdown.by_provider.entry(provider.clone()).or_insert(0) += 1;
                }
                Provenance::Synthetic => breakdown.synthetic += 1,
            }
        }
        breakdown
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Merges chunk results and owns intermediate-storage cleanup.
pub struct Aggregator {
    store: Arc<ChunkStore>,
}

impl Aggregator {
    /// Create an aggregator over the given store.
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store }
    }

    /// Merge all chunk results into one record sequence.
    ///
    /// Results may arrive in any order; they are sorted by chunk index
    /// before concatenation so the merge is deterministic, and duplicate
    /// symbols are dropped, first occurrence wins (the partition invariant
    /// makes duplicates impossible, but the merge stays defensive). The
    /// run's backing storage is removed unconditionally.
    pub async fn merge(
        &self,
        run_id: &str,
        mut chunk_results: Vec<ChunkResult>,
    ) -> Vec<FundamentalsRecord> {
        chunk_results.sort_by_key(|r| r.chunk_index);

        let mut seen: HashSet<String> = HashSet::new();
        let mut merged = Vec::new();
        for result in chunk_results {
            for record in result.records {
                if seen.insert(record.symbol.clone()) {
                    merged.push(record);
                } else {
                    debug!(symbol = %record.symbol, "Duplicate symbol dropped in merge");
                }
            }
        }

        if let Err(e) = self.store.remove_run(run_id).await {
            warn!(run_id, error = %e, "Failed to remove run artifacts");
        }

        merged
    }
}

// ============================================================================
// Tests
// ============================================================================
