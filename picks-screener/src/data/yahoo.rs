//! Yahoo Finance quoteSummary adapter, the keyless primary source.
//!
//! # Notes
//! - No credentials required; relies on the public quoteSummary endpoint.
//! - From datacenter egress this endpoint rejects a large share of calls
//!   (consent/crumb gating), so failures here are the normal case and are
//!   logged as fallback events by the fetcher, never as errors.
//!
//! # Coverage
//! Richest of the three sources when it answers: 14/14 indicators.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{FundamentalsProvider, ProviderError};
use super::{Indicator, IndicatorSet, SymbolRequest};

// ============================================================================
// Constants
// ============================================================================

/// Yahoo Finance API base URL
const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

/// quoteSummary endpoint
const QUOTE_SUMMARY_ENDPOINT: &str = "/v10/finance/quoteSummary";

/// Modules holding all indicators we map
const MODULES: &str = "financialData,defaultKeyStatistics,summaryDetail";

/// Browser-like user agent; the endpoint rejects the reqwest default.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Default spacing between calls
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// Wire Format
// ============================================================================

/// Yahoo wraps every numeric field as `{"raw": 1.23, "fmt": "1.23"}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryResult {
    #[serde(rename = "financialData", default)]
    financial_data: Option<FinancialData>,
    #[serde(rename = "defaultKeyStatistics", default)]
    key_statistics: Option<KeyStatistics>,
    #[serde(rename = "summaryDetail", default)]
    summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct FinancialData {
    #[serde(rename = "revenueGrowth", default)]
    revenue_growth: Option<RawValue>,
    #[serde(rename = "profitMargins", default)]
    profit_margins: Option<RawValue>,
    #[serde(rename = "operatingMargins", default)]
    operating_margins: Option<RawValue>,
    #[serde(rename = "returnOnEquity", default)]
    return_on_equity: Option<RawValue>,
    #[serde(rename = "freeCashflow", default)]
    free_cashflow: Option<RawValue>,
    #[serde(rename = "operatingCashflow", default)]
    operating_cashflow: Option<RawValue>,
    #[serde(rename = "debtToEquity", default)]
    debt_to_equity: Option<RawValue>,
    #[serde(rename = "currentRatio", default)]
    current_ratio: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct KeyStatistics {
    #[serde(rename = "trailingEps", default)]
    trailing_eps: Option<RawValue>,
    #[serde(rename = "pegRatio", default)]
    peg_ratio: Option<RawValue>,
    #[serde(rename = "priceToBook", default)]
    price_to_book: Option<RawValue>,
    #[serde(rename = "earningsQuarterlyGrowth", default)]
    earnings_quarterly_growth: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryDetail {
    #[serde(rename = "trailingPE", default)]
    trailing_pe: Option<RawValue>,
    #[serde(rename = "dividendYield", default)]
    dividend_yield: Option<RawValue>,
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Keyless primary adapter over the Yahoo quoteSummary API.
pub struct YahooAdapter {
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
}

impl YahooAdapter {
    /// Create the adapter with default pacing.
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(YAHOO_API_BASE, timeout, DEFAULT_MIN_INTERVAL)
    }

    /// Create with a custom base URL (tests) and pacing.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            min_interval,
        }
    }

    /// Create from config; `None` when the provider is disabled.
    pub fn from_config(config: &picks_common::config::Config) -> Option<Self> {
        let yahoo = &config.providers.yahoo;
        if !yahoo.enabled {
            return None;
        }
        Some(Self::with_base_url(
            YAHOO_API_BASE,
            Duration::from_secs(config.screener.provider_timeout_secs),
            Duration::from_millis(yahoo.min_interval_ms),
        ))
    }

    async fn fetch_summary(&self, symbol: &str) -> Result<QuoteSummaryResult, ProviderError> {
        let url = format!(
            "{}{}/{}?modules={}",
            self.base_url, QUOTE_SUMMARY_ENDPOINT, symbol, MODULES
        );

        let response = self.client.get(&url).send().await.map_err(to_network_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: None,
            });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        let envelope: QuoteSummaryEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        envelope
            .quote_summary
            .result
            .and_then(|mut results| (!results.is_empty()).then(|| results.remove(0)))
            .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))
    }
}

fn to_network_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Network(e.to_string())
}

#[async_trait]
impl FundamentalsProvider for YahooAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn try_fetch(
        &self,
        request: &SymbolRequest,
    ) -> Result<Option<IndicatorSet>, ProviderError> {
        let summary = self.fetch_summary(&request.symbol).await?;

        let financial = summary.financial_data.unwrap_or_default();
        let stats = summary.key_statistics.unwrap_or_default();
        let detail = summary.summary_detail.unwrap_or_default();

        let mut set = IndicatorSet::unknown();
        set.set(Indicator::RevenueGrowth, raw(&financial.revenue_growth));
        set.set(Indicator::Eps, raw(&stats.trailing_eps));
        set.set(Indicator::NetProfitMargin, raw(&financial.profit_margins));
        set.set(Indicator::OperatingMargin, raw(&financial.operating_margins));
        set.set(Indicator::ReturnOnEquity, raw(&financial.return_on_equity));
        set.set(
            Indicator::EarningsGrowth,
            raw(&stats.earnings_quarterly_growth),
        );
        set.set(Indicator::FreeCashFlow, raw(&financial.free_cashflow));
        set.set(Indicator::OperatingCashFlow, raw(&financial.operating_cashflow));
        set.set(Indicator::DebtToEquity, raw(&financial.debt_to_equity));
        set.set(Indicator::CurrentRatio, raw(&financial.current_ratio));
        set.set(Indicator::PeRatio, raw(&detail.trailing_pe));
        set.set(Indicator::PegRatio, raw(&stats.peg_ratio));
        set.set(Indicator::PbRatio, raw(&stats.price_to_book));
        set.set(Indicator::DividendYield, raw(&detail.dividend_yield));

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

    fn adapter(server: &MockServer) -> YahooAdapter {
        YahooAdapter::with_base_url(
            server.uri(),
            Duration::from_secs(5),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_maps_quote_summary_to_indicators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "quoteSummary": {
                    "result": [{
                        "financialData": {
                            "revenueGrowth": {"raw": 0.081, "fmt": "8.10%"},
                            "profitMargins": {"raw": 0.253},
                            "debtToEquity": {"raw": 176.3},
                            "currentRatio": {"raw": 0.98}
                        },
                        "defaultKeyStatistics": {
                            "trailingEps": {"raw": 6.42},
                            "pegRatio": {"raw": 2.1}
                        },
                        "summaryDetail": {
                            "trailingPE": {"raw": 29.4},
                            "dividendYield": {"raw": 0.0052}
                        }
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("AAPL", "Information Technology");
        let set = adapter(&server).try_fetch(&request).await.unwrap().unwrap();

        assert_eq!(set.get(Indicator::PeRatio).known(), Some(29.4));
        assert_eq!(set.get(Indicator::Eps).known(), Some(6.42));
        assert_eq!(set.get(Indicator::RevenueGrowth).known(), Some(0.081));
        // Fields the payload lacked stay unknown.
        assert!(!set.get(Indicator::FreeCashFlow).is_known());
        assert_eq!(set.known_count(), 8);
    }

    #[tokio::test]
    async fn test_empty_result_is_data_not_available() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "quoteSummary": {"result": [], "error": null}
            })))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("NOPE", "Unknown");
        let err = adapter(&server).try_fetch(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::DataNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("AAPL", "Information Technology");
        let err = adapter(&server).try_fetch(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[tokio::test]
    async fn test_all_null_fields_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "quoteSummary": {
                    "result": [{"financialData": {}, "defaultKeyStatistics": {}, "summaryDetail": {}}],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let request = SymbolRequest::new("SHELL", "Unknown");
        let result = adapter(&server).try_fetch(&request).await.unwrap();
        assert!(result.is_none());
    }
}
