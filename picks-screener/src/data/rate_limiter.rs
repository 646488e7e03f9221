//! Per-provider rate limiter for API request pacing.
//!
//! Enforces a fixed minimum spacing between calls to each provider, plus a
//! small random jitter so parallel workers never burst in lockstep. The
//! fixed-delay design trades throughput for guaranteed quota compliance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

/// Call accounting for one provider within a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderCallStats {
    /// Attempts made (every attempt consumes a slot, success or not)
    pub calls: u64,
    /// Total time spent waiting for slots
    pub total_wait: Duration,
}

/// Mutable pacing state for one provider.
///
/// Guarded by its own mutex so the read-check-reserve step is atomic even
/// with many concurrent workers; pacing one provider never blocks another.
#[derive(Debug, Default)]
struct ProviderRateState {
    /// Earliest instant the next call may be issued
    next_slot: Option<Instant>,
    stats: ProviderCallStats,
}

/// Per-provider minimum-interval rate limiter.
///
/// Shared across all workers of a run; constructed once per run and passed
/// explicitly, never ambient state.
#[derive(Debug)]
pub struct RateLimiter {
    /// Upper bound for the random jitter added to every wait
    jitter_max: Duration,
    states: std::sync::Mutex<HashMap<String, Arc<Mutex<ProviderRateState>>>>,
}

impl RateLimiter {
    /// Create a limiter with the default jitter bound (500ms).
    pub fn new() -> Self {
        Self::with_jitter(Duration::from_millis(500))
    }

    /// Create a limiter with a custom jitter bound. Zero disables jitter.
    pub fn with_jitter(jitter_max: Duration) -> Self {
        Self {
            jitter_max,
            states: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Block until a call slot for `provider` is free, then reserve the
    /// next one.
    ///
    /// The check-and-reserve happens atomically under the provider's lock;
    /// the sleep happens outside it, so workers queue for slots without
    /// serializing their actual network calls. Returns the time waited.
    pub async fn throttle(&self, provider: &str, min_interval: Duration) -> Duration {
        let state = self.state_for(provider);

        let wait = {
            let mut state = state.lock().await;
            let now = Instant::now();

            let base = match state.next_slot {
                Some(slot) if slot > now => slot - now,
                _ => Duration::ZERO,
            };
            let wait = base + self.jitter();

            // Reserve: the slot after ours opens min_interval later,
            // whether or not the call succeeds.
            state.next_slot = Some(now + wait + min_interval);
            state.stats.calls += 1;
            state.stats.total_wait += wait;
            wait
        };

        if !wait.is_zero() {
            debug!(
                provider,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for call slot"
            );
            tokio::time::sleep(wait).await;
        }

        wait
    }

    /// Call accounting per provider, for the run summary.
    pub async fn stats(&self) -> HashMap<String, ProviderCallStats> {
        let entries: Vec<(String, Arc<Mutex<ProviderRateState>>)> = {
            let states = self.states.lock().expect("rate limiter state poisoned");
            states
                .iter()
                .map(|(name, state)| (name.clone(), Arc::clone(state)))
                .collect()
        };

        let mut out = HashMap::with_capacity(entries.len());
        for (name, state) in entries {
            let state = state.lock().await;
            out.insert(name, state.stats);
        }
        out
    }

    fn state_for(&self, provider: &str) -> Arc<Mutex<ProviderRateState>> {
        let mut states = self.states.lock().expect("rate limiter state poisoned");
        Arc::clone(
            states
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ProviderRateState::default()))),
        )
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.jitter_max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared rate limiter that can be cloned across workers.
pub type SharedRateLimiter = Arc<RateLimiter>;

// ============================================================================
// Tests
// ============================================================================
