//! Synthetic fallback data for symbols no real provider could serve.
//!
//! Values are drawn from plausible per-indicator ranges and seeded by
//! (run, symbol, sector), so repeated fetches for one symbol within a run
//! agree while runs differ. The records are clearly tagged so downstream
//! consumers never mistake them for real data.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FetchStatus, FundamentalsRecord, Indicator, IndicatorSet, Provenance, SymbolRequest};

/// Generator for placeholder fundamentals.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticGenerator {
    run_seed: u64,
}

impl SyntheticGenerator {
    /// Create a generator seeded by the run identifier.
    pub fn new(run_id: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        run_id.hash(&mut hasher);
        Self {
            run_seed: hasher.finish(),
        }
    }

    /// Create a generator from a raw seed (tests).
    pub const fn from_seed(run_seed: u64) -> Self {
        Self { run_seed }
    }

    /// Generate the complete indicator set for one symbol.
    pub fn generate(&self, request: &SymbolRequest) -> IndicatorSet {
        let mut hasher = DefaultHasher::new();
        self.run_seed.hash(&mut hasher);
        request.symbol.hash(&mut hasher);
        request.sector.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let mut set = IndicatorSet::unknown();
        for &indicator in &Indicator::ALL {
            set.set(indicator, Some(sample(&mut rng, indicator)));
        }
        set
    }

    /// Build the record of last resort for one symbol.
    pub fn record(&self, request: &SymbolRequest) -> FundamentalsRecord {
        FundamentalsRecord {
            symbol: request.symbol.clone(),
            sector: request.sector.clone(),
            indicators: self.generate(request),
            provenance: Provenance::Synthetic,
            status: FetchStatus::Partial,
        }
    }
}

/// Draw one indicator from its plausible range.
fn sample(rng: &mut StdRng, indicator: Indicator) -> f64 {
    let value: f64 = match indicator {
        Indicator::RevenueGrowth => rng.gen_range(-0.15..0.35),
        Indicator::Eps => rng.gen_range(0.5..15.0),
        Indicator::NetProfitMargin => rng.gen_range(0.02..0.30),
        Indicator::OperatingMargin => rng.gen_range(0.04..0.35),
        Indicator::ReturnOnEquity => rng.gen_range(0.05..0.30),
        Indicator::EarningsGrowth => rng.gen_range(-0.25..0.45),
        Indicator::FreeCashFlow => rng.gen_range(2e8..4e10),
        Indicator::OperatingCashFlow => rng.gen_range(5e8..6e10),
        Indicator::DebtToEquity => rng.gen_range(10.0..220.0),
        Indicator::CurrentRatio => rng.gen_range(0.8..3.5),
        Indicator::PeRatio => rng.gen_range(8.0..45.0),
        Indicator::PegRatio => rng.gen_range(0.5..3.5),
        Indicator::PbRatio => rng.gen_range(1.0..12.0),
        Indicator::DividendYield => rng.gen_range(0.0..0.05),
    };
    // Keep placeholder output tidy in prompts and reports.
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// Tests
// ============================================================================
