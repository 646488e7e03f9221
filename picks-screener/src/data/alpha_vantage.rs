//! Alpha Vantage company overview adapter, the keyed secondary source.
//!
//! # API Documentation
//! <https://www.alphavantage.co/documentation/#company-overview>
//!
//! # Rate Limits
//! - Free tier: 5 requests/minute, 500/day
//! - The published per-minute quota amortizes to 12s between calls; the
//!   adapter paces at a fixed 12s by default rather than bucketing, so a
//!   run can never trip the quota.
//!
//! Skipped entirely when no API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{FundamentalsProvider, ProviderError};
use super::{Indicator, IndicatorSet, SymbolRequest};

// ============================================================================
// Constants
// ============================================================================

/// Alpha Vantage API base URL
const ALPHA_VANTAGE_API_BASE: &str = "https://www.alphavantage.co";

/// Query endpoint (function selected via query string)
const QUERY_ENDPOINT: &str = "/query";

/// Default spacing between calls: 5/min quota, amortized
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(12);

// ============================================================================
// Wire Format
// ============================================================================

/// OVERVIEW response. Every numeric field arrives as a string; unknown
/// tickers produce an empty object; quota rejections arrive as HTTP 200
/// with a "Note" or "Information" field.
#[derive(Debug, Default, Deserialize)]
struct OverviewResponse {
    #[serde(rename = "Symbol", default)]
    symbol: Option<String>,
    #[serde(rename = "EPS", default)]
    eps: Option<String>,
    #[serde(rename = "PERatio", default)]
    pe_ratio: Option<String>,
    #[serde(rename = "PEGRatio", default)]
    peg_ratio: Option<String>,
    #[serde(rename = "PriceToBookRatio", default)]
    price_to_book: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM", default)]
    return_on_equity: Option<String>,
    #[serde(rename = "ProfitMargin", default)]
    profit_margin: Option<String>,
    #[serde(rename = "OperatingMarginTTM", default)]
    operating_margin: Option<String>,
    #[serde(rename = "QuarterlyRevenueGrowthYOY", default)]
    revenue_growth: Option<String>,
    #[serde(rename = "QuarterlyEarningsGrowthYOY", default)]
    earnings_growth: Option<String>,
    #[serde(rename = "DividendYield", default)]
    dividend_yield: Option<String>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

/// Parse one of Alpha Vantage's stringly-typed numbers.
/// "None", "-", and empty strings all mean "not exposed".
fn parse_num(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .and_then(|s| s.parse().ok())
}

// ============================================================================
// Alpha Vantage Adapter
// ============================================================================

/// Keyed secondary adapter over the Alpha Vantage OVERVIEW API.
pub struct AlphaVantageAdapter {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
}

impl AlphaVantageAdapter {
    /// Create the adapter with default pacing.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, ALPHA_VANTAGE_API_BASE, timeout, DEFAULT_MIN_INTERVAL)
    }

    /// Create with a custom base URL (tests) and pacing.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            client,
            base_url: base_url.into(),
            min_interval,
        }
    }

    /// Create from config; `None` when no API key is configured.
    pub fn from_config(config: &picks_common::config::Config) -> Option<Self> {
        let api_key = config.alpha_vantage_api_key()?;
        let min_interval = config
            .providers
            .alpha_vantage
            .min_interval_secs
            .map_or(DEFAULT_MIN_INTERVAL, Duration::from_secs);

        Some(Self::with_base_url(
            api_key,
            ALPHA_VANTAGE_API_BASE,
            Duration::from_secs(config.screener.provider_timeout_secs),
            min_interval,
        ))
    }

    async fn fetch_overview(&self, symbol: &str) -> Result<OverviewResponse, ProviderError> {
        let url = format!(
            "{}{}?function=OVERVIEW&symbol={}&apikey={}",
            self.base_url, QUERY_ENDPOINT, symbol, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        let overview: OverviewResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        // Quota rejections come back as 200 with an advisory field.
        if overview.note.is_some() || overview.information.is_some() {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(60),
            });
        }
        if let Some(message) = overview.error_message {
            return Err(ProviderError::DataNotAvailable(message));
        }

        Ok(overview)
    }
}

#[async_trait]
impl FundamentalsProvider for AlphaVantageAdapter {
    fn name(&self) -> &'static str {
        "alphavantage"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn try_fetch(
        &self,
        request: &SymbolRequest,
    ) -> Result<Option<IndicatorSet>, ProviderError> {
        let overview = self.fetch_overview(&request.symbol).await?;

        // Unknown tickers produce an empty object.
        if overview.symbol.is_none() {
            return Ok(None);
        }

        let mut set = IndicatorSet::unknown();
        set.set(Indicator::RevenueGrowth, parse_num(&overview.revenue_growth));
        set.set(Indicator::Eps, parse_num(&overview.eps));
        set.set(Indicator::NetProfitMargin, parse_num(&overview.profit_margin));
        set.set(
            Indicator::OperatingMargin,
            parse_num(&overview.operating_margin),
        );
        set.set(
            Indicator::ReturnOnEquity,
            parse_num(&overview.return_on_equity),
        );
        set.set(
            Indicator::EarningsGrowth,
            parse_num(&overview.earnings_growth),
        );
        set.set(Indicator::PeRatio, parse_num(&overview.pe_ratio));
        set.set(Indicator::PegRatio, parse_num(&overview.peg_ratio));
        set.set(Indicator::PbRatio, parse_num(&overview.price_to_book));
        set.set(Indicator::DividendYield, parse_num(&overview.dividend_yield));

        Ok(set.is_usable().then_some(set))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> AlphaVantageAdapter {
        AlphaVantageAdapter::with_base_url(
            "demo",
            server.uri(),
            Duration::from_secs(5),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn test_parse_num_sentinels() {
        assert_eq!(parse_num(&Some("12.5".to_string())), Some(12.5));
        assert_eq!(parse_num(&Some("None".to_string())), None);
        assert_eq!(parse_num(&Some("-".to_string())), None);
        assert_eq!(parse_num(&Some(String::new())), None);
        assert_eq!(parse_num(&None), None);
    }

    #[tokio::test]
    async fn test_maps_overview_to_indicators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "OVERVIEW"))
            .and(query_param("symbol", "IBM"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Symbol": "IBM",
                "EPS": "9.08",
                "PERatio": "21.3",
                "PEGRatio": "1.8",
                "ProfitMargin": "0.132",
                "DividendYield": "0.0352",
                "PriceToBookRatio": "None"
            })))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("IBM", "Information Technology");
        let set = adapter(&server).try_fetch(&request).await.unwrap().unwrap();

        assert_eq!(set.get(Indicator::Eps).known(), Some(9.08));
        assert_eq!(set.get(Indicator::PeRatio).known(), Some(21.3));
        // "None" and unexposed fields stay unknown; never fabricated.
        assert!(!set.get(Indicator::PbRatio).is_known());
        assert!(!set.get(Indicator::FreeCashFlow).is_known());
        assert!(!set.get(Indicator::CurrentRatio).is_known());
    }

    #[tokio::test]
    async fn test_quota_note_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 5 requests per minute."
            })))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("IBM", "Information Technology");
        let err = adapter(&server).try_fetch(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_empty_object_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("NOPE", "Unknown");
        let result = adapter(&server).try_fetch(&request).await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = picks_common::config::Config::default();
        assert!(AlphaVantageAdapter::from_config(&config).is_none());

        let mut config = picks_common::config::Config::default();
        config.providers.alpha_vantage.api_key = Some("key".to_string());
        let adapter = AlphaVantageAdapter::from_config(&config).unwrap();
        assert_eq!(adapter.min_interval(), DEFAULT_MIN_INTERVAL);
    }
}
