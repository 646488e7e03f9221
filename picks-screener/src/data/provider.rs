//! Provider abstraction for multi-source fundamentals data.
//!
//! Defines the `FundamentalsProvider` trait that all data sources implement,
//! enabling the fetcher's priority-ordered fallback chain.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::{IndicatorSet, SymbolRequest};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
///
/// Every variant falls through the chain; the distinction exists for
/// logging and for quota-aware pacing decisions.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication error (invalid key, expired)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rate limit exceeded
    #[error("Rate limited")]
    RateLimited {
        /// Suggested wait before retrying, when the provider says
        retry_after_secs: Option<u64>,
    },

    /// Response arrived but could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Data not available for the requested symbol
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Check if the error is transient (worth retrying on a later run).
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Fundamentals Provider Trait
// ============================================================================

/// Trait for fundamentals data sources.
///
/// All sources (Yahoo, Alpha Vantage, FMP) implement this trait so the
/// fetcher can iterate a prioritized list without knowing any adapter's
/// wire shape.
///
/// `Ok(None)` means the provider answered but yielded nothing usable for
/// this symbol; both that and `Err(_)` make the fetcher fall through to the
/// next source.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Provider name (e.g. "yahoo", "alphavantage")
    fn name(&self) -> &'static str;

    /// Chain position (lower = tried earlier)
    fn priority(&self) -> u8;

    /// Minimum spacing between calls to this provider
    fn min_interval(&self) -> Duration;

    /// Attempt to fetch the indicator set for one symbol.
    async fn try_fetch(
        &self,
        request: &SymbolRequest,
    ) -> Result<Option<IndicatorSet>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
