//! The chunked execution pipeline.
//!
//! Splits the input symbol list into bounded chunks, runs each chunk's
//! fetches through a worker pool (locally or as independent tasks), stores
//! intermediate results, and merges everything back into a single record
//! set under a hard wall-clock budget.

pub mod aggregator;
pub mod chunk;
pub mod orchestrator;
pub mod processor;
pub mod store;

pub use aggregator::{Aggregator, ProvenanceBreakdown};
pub use chunk::{partition, Chunk, ChunkResult, ChunkStatus};
pub use orchestrator::{ExecutionMode, FetchOutcome, Orchestrator, OrchestratorConfig};
pub use processor::ChunkProcessor;
pub use store::ChunkStore;
