//! Chunk processor: bounded concurrent fetch over one chunk.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::chunk::{Chunk, ChunkResult, ChunkStatus};
use crate::data::FundamentalsFetcher;

/// Runs the fetcher across a chunk with a bounded worker pool.
///
/// Completion order within the chunk is irrelevant; the aggregator dedupes
/// by symbol regardless. A single symbol never blocks others beyond
/// rate-limiter delay and pool saturation.
pub struct ChunkProcessor {
    fetcher: Arc<FundamentalsFetcher>,
    max_workers: usize,
}

impl ChunkProcessor {
    /// Create a processor with the given worker bound.
    pub fn new(fetcher: Arc<FundamentalsFetcher>, max_workers: usize) -> Self {
        Self {
            fetcher,
            max_workers: max_workers.max(1),
        }
    }

    /// Process one chunk. Per-symbol failures never abort the chunk; the
    /// chunk errors only when the input itself is malformed.
    pub async fn process(&self, chunk: &Chunk) -> ChunkResult {
        if chunk.requests.is_empty() {
            warn!(chunk = chunk.index, "Refusing to process empty chunk");
            return ChunkResult {
                chunk_index: chunk.index,
                records: Vec::new(),
                status: ChunkStatus::Error,
            };
        }

        debug!(
            chunk = chunk.index,
            symbols = chunk.requests.len(),
            workers = self.max_workers,
            "Processing chunk"
        );

        let records = stream::iter(chunk.requests.iter().cloned())
            .map(|request| async move { self.fetcher.fetch(&request).await })
            .buffer_unordered(self.max_workers)
            .collect::<Vec<_>>()
            .await;

        ChunkResult {
            chunk_index: chunk.index,
            records,
            status: ChunkStatus::Complete,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
