//! The fallback-chain fundamentals fetcher.
//!
//! Walks a prioritized list of providers until one yields usable data,
//! pacing every attempt through the shared rate limiter and bounding every
//! call with a timeout. When the whole chain falls through, the synthetic
//! generator produces the record of last resort, so `fetch` never fails.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::provider::FundamentalsProvider;
use super::rate_limiter::SharedRateLimiter;
use super::synthetic::SyntheticGenerator;
use super::{FetchStatus, FundamentalsRecord, Provenance, SymbolRequest};

/// Fallback-chain fetcher shared by all workers of a run.
pub struct FundamentalsFetcher {
    /// Providers in attempt order (lowest priority value first)
    providers: Vec<Arc<dyn FundamentalsProvider>>,
    limiter: SharedRateLimiter,
    call_timeout: Duration,
    synthetic: SyntheticGenerator,
}

impl FundamentalsFetcher {
    /// Create a fetcher over the given providers.
    ///
    /// Providers are sorted by priority at construction; an empty list is
    /// valid and collapses every fetch straight to synthetic data.
    pub fn new(
        mut providers: Vec<Arc<dyn FundamentalsProvider>>,
        limiter: SharedRateLimiter,
        call_timeout: Duration,
        synthetic: SyntheticGenerator,
    ) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self {
            providers,
            limiter,
            call_timeout,
            synthetic,
        }
    }

    /// The run's synthetic generator (used for chunk-level substitution).
    pub const fn synthetic(&self) -> &SyntheticGenerator {
        &self.synthetic
    }

    /// Names of the configured providers, in attempt order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch fundamentals for one symbol. Always returns a record.
    pub async fn fetch(&self, request: &SymbolRequest) -> FundamentalsRecord {
        for provider in &self.providers {
            // Every attempt consumes a quota slot, success or not.
            self.limiter
                .throttle(provider.name(), provider.min_interval())
                .await;

            let attempt =
                tokio::time::timeout(self.call_timeout, provider.try_fetch(request)).await;

            match attempt {
                Err(_) => {
                    debug!(
                        provider = provider.name(),
                        symbol = %request.symbol,
                        timeout_ms = self.call_timeout.as_millis() as u64,
                        "Provider call timed out, falling through"
                    );
                }
                Ok(Err(e)) => {
                    // Expected steady state for the keyless primary from
                    // sandboxed egress; an informational fallback event.
                    debug!(
                        provider = provider.name(),
                        symbol = %request.symbol,
                        error = %e,
                        "Provider attempt failed, falling through"
                    );
                }
                Ok(Ok(None)) => {
                    debug!(
                        provider = provider.name(),
                        symbol = %request.symbol,
                        "Provider yielded no usable fields, falling through"
                    );
                }
                Ok(Ok(Some(indicators))) => {
                    let status = if indicators.is_complete() {
                        FetchStatus::Ok
                    } else {
                        FetchStatus::Partial
                    };
                    return FundamentalsRecord {
                        symbol: request.symbol.clone(),
                        sector: request.sector.clone(),
                        indicators,
                        provenance: Provenance::Real(provider.name().to_string()),
                        status,
                    };
                }
            }
        }

        info!(
            symbol = %request.symbol,
            "All providers fell through, generating synthetic fallback"
        );
        self.synthetic.record(request)
    }
}

// ============================================================================
// Tests
// ============================================================================
