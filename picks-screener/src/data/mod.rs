//! Data layer for multi-source fundamentals retrieval.
//!
//! Defines the domain model (symbol requests, the fixed indicator set,
//! provenance-tagged fundamentals records) and hosts the provider adapters,
//! the rate limiter, and the fallback-chain fetcher.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod alpha_vantage;
pub mod fetcher;
pub mod fmp;
pub mod provider;
pub mod rate_limiter;
pub mod synthetic;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageAdapter;
pub use fetcher::FundamentalsFetcher;
pub use fmp::FmpAdapter;
pub use provider::{FundamentalsProvider, ProviderError};
pub use rate_limiter::{RateLimiter, SharedRateLimiter};
pub use synthetic::SyntheticGenerator;
pub use yahoo::YahooAdapter;

// ============================================================================
// Symbol Request
// ============================================================================

fn default_sector() -> String {
    "Unknown".to_string()
}

/// A single symbol to screen, with its sector label.
///
/// Uniqueness key is the ticker symbol. Created once from the input payload
/// and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRequest {
    /// Ticker symbol (e.g. "AAPL")
    #[serde(alias = "Symbol")]
    pub symbol: String,

    /// Sector label (e.g. "Information Technology")
    #[serde(alias = "Sector", default = "default_sector")]
    pub sector: String,
}

impl SymbolRequest {
    /// Create a new symbol request.
    pub fn new(symbol: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            sector: sector.into(),
        }
    }
}

// ============================================================================
// Indicators
// ============================================================================

/// The fixed set of fundamental indicators every record carries.
///
/// Providers normalize their native shapes into this set; anything a
/// provider does not expose stays [`IndicatorValue::Unknown`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Indicator {
    #[serde(rename = "Revenue Growth")]
    RevenueGrowth,
    #[serde(rename = "EPS")]
    Eps,
    #[serde(rename = "Net Profit Margin")]
    NetProfitMargin,
    #[serde(rename = "Operating Margin")]
    OperatingMargin,
    #[serde(rename = "Return on Equity")]
    ReturnOnEquity,
    #[serde(rename = "Earnings Growth Rate")]
    EarningsGrowth,
    #[serde(rename = "Free Cash Flow")]
    FreeCashFlow,
    #[serde(rename = "Operating Cash Flow")]
    OperatingCashFlow,
    #[serde(rename = "Debt-to-Equity Ratio")]
    DebtToEquity,
    #[serde(rename = "Current Ratio")]
    CurrentRatio,
    #[serde(rename = "P/E Ratio")]
    PeRatio,
    #[serde(rename = "PEG Ratio")]
    PegRatio,
    #[serde(rename = "P/B Ratio")]
    PbRatio,
    #[serde(rename = "Dividend Yield")]
    DividendYield,
}

impl Indicator {
    /// All indicators, in report order.
    pub const ALL: [Indicator; 14] = [
        Self::RevenueGrowth,
        Self::Eps,
        Self::NetProfitMargin,
        Self::OperatingMargin,
        Self::ReturnOnEquity,
        Self::EarningsGrowth,
        Self::FreeCashFlow,
        Self::OperatingCashFlow,
        Self::DebtToEquity,
        Self::CurrentRatio,
        Self::PeRatio,
        Self::PegRatio,
        Self::PbRatio,
        Self::DividendYield,
    ];

    /// Human-readable label, as used in reports and scoring prompts.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::RevenueGrowth => "Revenue Growth",
            Self::Eps => "EPS",
            Self::NetProfitMargin => "Net Profit Margin",
            Self::OperatingMargin => "Operating Margin",
            Self::ReturnOnEquity => "Return on Equity",
            Self::EarningsGrowth => "Earnings Growth Rate",
            Self::FreeCashFlow => "Free Cash Flow",
            Self::OperatingCashFlow => "Operating Cash Flow",
            Self::DebtToEquity => "Debt-to-Equity Ratio",
            Self::CurrentRatio => "Current Ratio",
            Self::PeRatio => "P/E Ratio",
            Self::PegRatio => "PEG Ratio",
            Self::PbRatio => "P/B Ratio",
            Self::DividendYield => "Dividend Yield",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single indicator value: a known number, or the explicit unknown
/// sentinel. Serialized as a nullable number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum IndicatorValue {
    Known(f64),
    Unknown,
}

impl IndicatorValue {
    /// The known value, if any.
    pub const fn known(self) -> Option<f64> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    /// Whether a real value is present.
    pub const fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl From<Option<f64>> for IndicatorValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Known(v),
            _ => Self::Unknown,
        }
    }
}

impl From<IndicatorValue> for Option<f64> {
    fn from(value: IndicatorValue) -> Self {
        value.known()
    }
}

impl fmt::Display for IndicatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{}", v),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// The complete indicator mapping for one symbol.
///
/// Always contains every [`Indicator`]; missing data is represented by the
/// unknown sentinel, never by an absent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Indicator, IndicatorValue>",
    into = "BTreeMap<Indicator, IndicatorValue>"
)]
pub struct IndicatorSet {
    values: BTreeMap<Indicator, IndicatorValue>,
}

impl IndicatorSet {
    /// A set with every indicator unknown.
    pub fn unknown() -> Self {
        Self {
            values: Indicator::ALL
                .iter()
                .map(|&i| (i, IndicatorValue::Unknown))
                .collect(),
        }
    }

    /// Set one indicator from an optional raw value.
    pub fn set(&mut self, indicator: Indicator, value: Option<f64>) {
        self.values.insert(indicator, IndicatorValue::from(value));
    }

    /// Builder-style variant of [`Self::set`] with a known value.
    #[must_use]
    pub fn with(mut self, indicator: Indicator, value: f64) -> Self {
        self.set(indicator, Some(value));
        self
    }

    /// Get one indicator value.
    pub fn get(&self, indicator: Indicator) -> IndicatorValue {
        self.values
            .get(&indicator)
            .copied()
            .unwrap_or(IndicatorValue::Unknown)
    }

    /// Number of known values.
    pub fn known_count(&self) -> usize {
        self.values.values().filter(|v| v.is_known()).count()
    }

    /// A set is usable when at least one real value was obtained.
    pub fn is_usable(&self) -> bool {
        self.known_count() > 0
    }

    /// Whether every indicator is known.
    pub fn is_complete(&self) -> bool {
        self.known_count() == Indicator::ALL.len()
    }

    /// Iterate in report order.
    pub fn iter(&self) -> impl Iterator<Item = (Indicator, IndicatorValue)> + '_ {
        Indicator::ALL.iter().map(|&i| (i, self.get(i)))
    }
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::unknown()
    }
}

impl From<BTreeMap<Indicator, IndicatorValue>> for IndicatorSet {
    fn from(mut values: BTreeMap<Indicator, IndicatorValue>) -> Self {
        // Re-establish completeness after deserialization.
        for &indicator in &Indicator::ALL {
            values.entry(indicator).or_insert(IndicatorValue::Unknown);
        }
        Self { values }
    }
}

impl From<IndicatorSet> for BTreeMap<Indicator, IndicatorValue> {
    fn from(set: IndicatorSet) -> Self {
        set.values
    }
}

// ============================================================================
// Provenance & Status
// ============================================================================

/// Where a record's data came from.
///
/// Serialized as `real:<provider>` or `synthetic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Provenance {
    /// Data obtained from a real provider
    Real(String),
    /// Placeholder data generated after every provider failed
    Synthetic,
}

impl Provenance {
    /// Whether the record carries real provider data.
    pub const fn is_real(&self) -> bool {
        matches!(self, Self::Real(_))
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(provider) => write!(f, "real:{}", provider),
            Self::Synthetic => f.write_str("synthetic"),
        }
    }
}

impl From<Provenance> for String {
    fn from(p: Provenance) -> Self {
        p.to_string()
    }
}

impl TryFrom<String> for Provenance {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "synthetic" {
            Ok(Self::Synthetic)
        } else if let Some(provider) = value.strip_prefix("real:") {
            Ok(Self::Real(provider.to_string()))
        } else {
            Err(format!("Unknown provenance tag: {}", value))
        }
    }
}

/// Outcome classification of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Every indicator was obtained from a real provider
    Ok,
    /// Some indicators are unknown, or the data is synthetic
    Partial,
    /// A fetch that produced nothing at all; the synthetic fallback
    /// replaces it before anything downstream can observe it
    Failed,
}

// ============================================================================
// Fundamentals Record
// ============================================================================

/// Per-symbol result of the fetch pipeline.
///
/// The fetcher guarantees exactly one record per requested symbol;
/// synthetic data is the record of last resort, not an absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    /// Ticker symbol
    pub symbol: String,
    /// Sector label carried from the request
    pub sector: String,
    /// The complete indicator mapping
    pub indicators: IndicatorSet,
    /// Data origin
    pub provenance: Provenance,
    /// Fetch outcome
    pub status: FetchStatus,
}

impl FundamentalsRecord {
    /// Whether this record holds placeholder data.
    pub const fn is_synthetic(&self) -> bool {
        matches!(self.provenance, Provenance::Synthetic)
    }

    /// The known P/E ratio, if any.
    pub fn pe_ratio(&self) -> Option<f64> {
        self.indicators.get(Indicator::PeRatio).known()
    }

    /// Whether the record has a known, positive P/E ratio.
    pub fn has_positive_pe(&self) -> bool {
        self.pe_ratio().is_some_and(|pe| pe > 0.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
