//! LLM buy-scoring for screened candidates.
//!
//! The pipeline treats scoring as an opaque function over fundamentals:
//! candidates go in, a 1-10 buy score with brief reasons comes out. The
//! bridge batches candidates per call and degrades gracefully when the
//! scoring backend is unconfigured or misbehaves.

pub mod bridge;

use serde::{Deserialize, Serialize};

pub use bridge::{ScoringBridge, ScoringBridgeConfig};

/// A scored screening candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredStock {
    /// Ticker symbol
    pub symbol: String,
    /// Sector label
    pub sector: String,
    /// Buy score, 0-10 (10 = strongest buy; 0 = unscored)
    pub buy_score: u8,
    /// Brief reasons supporting the score
    pub reasons: Vec<String>,
}
