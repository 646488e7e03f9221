//! Chunk types and input partitioning.

use serde::{Deserialize, Serialize};

use crate::data::{FundamentalsRecord, SymbolRequest};

/// An ordered sub-sequence of the input, the unit of distributed work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the partition (chunk *i* holds input positions
    /// `[i * chunk_size, (i + 1) * chunk_size)`)
    pub index: usize,
    /// The requests, in input order
    pub requests: Vec<SymbolRequest>,
}

/// Outcome classification of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// The processor ran the whole chunk
    Complete,
    /// The processor could not run (malformed input) or the chunk was
    /// substituted after a crash or budget exhaustion
    Error,
}

/// Result of processing one chunk; written once, read once, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Which chunk this belongs to
    pub chunk_index: usize,
    /// One record per request; completion order, not input order
    pub records: Vec<FundamentalsRecord>,
    /// Chunk outcome
    pub status: ChunkStatus,
}

impl ChunkResult {
    /// Whether the processor ran the chunk to completion.
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, ChunkStatus::Complete)
    }
}

/// Partition the input into ordered chunks of at most `chunk_size`.
///
/// Covers every request exactly once, preserving input order within and
/// across chunks, whether or not `chunk_size` divides the input evenly.
pub fn partition(requests: &[SymbolRequest], chunk_size: usize) -> Vec<Chunk> {
    let size = chunk_size.max(1);
    requests
        .chunks(size)
        .enumerate()
        .map(|(index, window)| Chunk {
            index,
            requests: window.to_vec(),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
