//! Financial Modeling Prep ratios adapter, the keyed tertiary source.
//!
//! # API Documentation
//! <https://site.financialmodelingprep.com/developer/docs#ratios-ttm>
//!
//! Serves trailing-twelve-month valuation and quality ratios. Growth and
//! cash-flow magnitudes are not part of this endpoint and stay unknown.
//! Skipped entirely when no API key is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{FundamentalsProvider, ProviderError};
use super::{Indicator, IndicatorSet, SymbolRequest};

// ============================================================================
// Constants
// ============================================================================

/// FMP API base URL
const FMP_API_BASE: &str = "https://financialmodelingprep.com";

/// TTM ratios endpoint
const RATIOS_TTM_ENDPOINT: &str = "/api/v3/ratios-ttm";

/// Default spacing between calls
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RatiosTtm {
    #[serde(rename = "peRatioTTM", default)]
    pe_ratio: Option<f64>,
    #[serde(rename = "pegRatioTTM", default)]
    peg_ratio: Option<f64>,
    #[serde(rename = "priceToBookRatioTTM", default)]
    price_to_book: Option<f64>,
    #[serde(rename = "currentRatioTTM", default)]
    current_ratio: Option<f64>,
    #[serde(rename = "debtEquityRatioTTM", default)]
    debt_to_equity: Option<f64>,
    #[serde(rename = "dividendYielTTM", alias = "dividendYieldTTM", default)]
    dividend_yield: Option<f64>,
    #[serde(rename = "netProfitMarginTTM", default)]
    net_profit_margin: Option<f64>,
    #[serde(rename = "operatingProfitMarginTTM", default)]
    operating_margin: Option<f64>,
    #[serde(rename = "returnOnEquityTTM", default)]
    return_on_equity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FmpErrorBody {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

// ============================================================================
// FMP Adapter
// ============================================================================

/// Keyed tertiary adapter over the FMP ratios-ttm API.
pub struct FmpAdapter {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
}

impl FmpAdapter {
    /// Create the adapter with default pacing.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(api_key, FMP_API_BASE, timeout, DEFAULT_MIN_INTERVAL)
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
        let api_key = config.fmp_api_key()?;
        let min_interval = config
            .providers
            .fmp
            .min_interval_secs
            .map_or(DEFAULT_MIN_INTERVAL, Duration::from_secs);

        Some(Self::with_base_url(
            api_key,
            FMP_API_BASE,
            Duration::from_secs(config.screener.provider_timeout_secs),
            min_interval,
        ))
    }

    async fn fetch_ratios(&self, symbol: &str) -> Result<Option<RatiosTtm>, ProviderError> {
        let url = format!(
            "{}{}/{}?apikey={}",
            self.base_url, RATIOS_TTM_ENDPOINT, symbol, self.api_key
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
        if status.as_u16() == 401 || status.as_u16() == 403 {
            // FMP reports key problems with a JSON body as well.
            let detail = response
                .json::<FmpErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error_message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ProviderError::Auth(detail));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        let mut rows: Vec<RatiosTtm> = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok((!rows.is_empty()).then(|| rows.remove(0)))
    }
}

#[async_trait]
impl FundamentalsProvider for FmpAdapter {
    fn name(&self) -> &'static str {
        "fmp"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn try_fetch(
        &self,
        request: &SymbolRequest,
    ) -> Result<Option<IndicatorSet>, ProviderError> {
        let Some(ratios) = self.fetch_ratios(&request.symbol).await? else {
            return Ok(None);
        };

        let mut set = IndicatorSet::unknown();
        set.set(Indicator::NetProfitMargin, ratios.net_profit_margin);
        set.set(Indicator::OperatingMargin, ratios.operating_margin);
        set.set(Indicator::ReturnOnEquity, ratios.return_on_equity);
        set.set(Indicator::DebtToEquity, ratios.debt_to_equity);
        set.set(Indicator::CurrentRatio, ratios.current_ratio);
        set.set(Indicator::PeRatio, ratios.pe_ratio);
        set.set(Indicator::PegRatio, ratios.peg_ratio);
        set.set(Indicator::PbRatio, ratios.price_to_book);
        set.set(Indicator::DividendYield, ratios.dividend_yield);

        Ok(set.is_usable().then_some(set))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> FmpAdapter {
        FmpAdapter::with_base_url(
            "demo",
            server.uri(),
            Duration::from_secs(5),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_maps_ratios_to_indicators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ratios-ttm/KO"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "peRatioTTM": 24.7,
                "priceToBookRatioTTM": 9.9,
                "currentRatioTTM": 1.13,
                "debtEquityRatioTTM": 1.62,
                "netProfitMarginTTM": 0.227,
                "returnOnEquityTTM": 0.40
            }])))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("KO", "Consumer Staples");
        let set = adapter(&server).try_fetch(&request).await.unwrap().unwrap();

        assert_eq!(set.get(Indicator::PeRatio).known(), Some(24.7));
        assert_eq!(set.get(Indicator::CurrentRatio).known(), Some(1.13));
        // Not part of this endpoint; stays unknown.
        assert!(!set.get(Indicator::Eps).is_known());
        assert!(!set.get(Indicator::RevenueGrowth).is_known());
    }

    #[tokio::test]
    async fn test_empty_array_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("NOPE", "Unknown");
        let result = adapter(&server).try_fetch(&request).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "Error Message": "Invalid API KEY."
            })))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("KO", "Consumer Staples");
        let err = adapter(&server).try_fetch(&request).await.unwrap_err();
        match err {
            ProviderError::Auth(detail) => assert!(detail.contains("Invalid API KEY")),
            other => panic!("expected Auth error, got {:?}", other),
        }
    }
}
