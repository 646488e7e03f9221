//! Bridge to the OpenAI-compatible scoring backend.
//!
//! Sends batches of fundamentals to the chat-completions API and parses the
//! JSON object out of the reply. Replies are treated as untrusted: the JSON
//! block is extracted by pattern, per-symbol entries are parsed tolerantly,
//! and a failed batch is skipped rather than failing the run.

use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ScoredStock;
use crate::data::FundamentalsRecord;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the scoring bridge.
#[derive(Debug, Clone)]
pub struct ScoringBridgeConfig {
    /// OpenAI-compatible API base (e.g. `https://api.openai.com/v1`)
    pub endpoint: String,
    /// API key; `None` disables scoring
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Symbols per scoring call
    pub batch_size: usize,
    /// Maximum retries per call
    pub max_retries: u32,
    /// Backoff between retries
    pub retry_backoff: Duration,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ScoringBridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            batch_size: 20,
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&picks_common::config::ScoringConfig> for ScoringBridgeConfig {
    fn from(config: &picks_common::config::ScoringConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

// ============================================================================
// Scoring Bridge
// ============================================================================

/// Client for the scoring backend.
pub struct ScoringBridge {
    config: ScoringBridgeConfig,
    client: reqwest::Client,
    json_block: Regex,
}

impl ScoringBridge {
    /// Create a new bridge with the given configuration.
    pub fn new(config: ScoringBridgeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            json_block: Regex::new(r"\{[\s\S]+\}").expect("valid regex"),
        }
    }

    /// Create from config.
    pub fn from_config(config: &picks_common::config::Config) -> Self {
        Self::new(ScoringBridgeConfig::from(&config.scoring))
    }

    /// Whether a scoring backend is configured.
    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Score every candidate, batch by batch.
    ///
    /// With no backend configured the candidates pass through unscored
    /// (score 0) so the run still completes. A batch whose call or parse
    /// fails is skipped; symbols the reply omits are skipped too.
    pub async fn score_all(&self, records: &[FundamentalsRecord]) -> Vec<ScoredStock> {
        if !self.is_enabled() {
            warn!(
                candidates = records.len(),
                "No scoring API key configured, passing candidates through unscored"
            );
            return records
                .iter()
                .map(|record| ScoredStock {
                    symbol: record.symbol.clone(),
                    sector: record.sector.clone(),
                    buy_score: 0,
                    reasons: vec!["Scoring backend not configured".to_string()],
                })
                .collect();
        }

        let mut scored = Vec::new();
        for (batch_index, batch) in records.chunks(self.config.batch_size).enumerate() {
            match self.score_batch(batch).await {
                Ok(mut batch_scored) => {
                    debug!(
                        batch = batch_index,
                        submitted = batch.len(),
                        scored = batch_scored.len(),
                        "Scored batch"
                    );
                    scored.append(&mut batch_scored);
                }
                Err(e) => {
                    warn!(
                        batch = batch_index,
                        symbols = batch.len(),
                        error = %e,
                        "Scoring batch failed, skipping"
                    );
                }
            }
        }

        info!(
            candidates = records.len(),
            scored = scored.len(),
            "Scoring finished"
        );
        scored
    }

    /// Score one batch of candidates.
    pub async fn score_batch(&self, records: &[FundamentalsRecord]) -> Result<Vec<ScoredStock>> {
        let prompt = build_prompt(records);
        let reply = self.send_request(&prompt).await?;
        self.parse_scores(records, &reply)
    }

    /// Send a request with retry logic.
    async fn send_request(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.endpoint);

        let mut last_error = None;
        for attempt in 1..=self.config.max_retries + 1 {
            match self.try_send(&url, prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.config.max_retries + 1,
                        error = %e,
                        "Scoring request failed, retrying..."
                    );
                    last_error = Some(e);

                    if attempt <= self.config.max_retries {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }

    /// Try to send a single request.
    async fn try_send(&self, url: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach scoring backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Scoring backend error: HTTP {} - {}", status, error_text);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse scoring backend response")?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Scoring backend returned no choices")
    }

    /// Parse the per-symbol scores out of a reply.
    fn parse_scores(
        &self,
        records: &[FundamentalsRecord],
        reply: &str,
    ) -> Result<Vec<ScoredStock>> {
        let block = self
            .json_block
            .find(reply)
            .context("No JSON object in scoring reply")?;

        let parsed: serde_json::Value =
            serde_json::from_str(block.as_str()).context("Invalid JSON in scoring reply")?;
        let entries = parsed
            .as_object()
            .context("Scoring reply is not a JSON object")?;

        let mut scored = Vec::new();
        for record in records {
            let Some(entry) = entries.get(&record.symbol) else {
                debug!(symbol = %record.symbol, "Symbol missing from scoring reply");
                continue;
            };

            let buy_score = entry
                .get("BuyScore")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 10.0)
                .round() as u8;
            let reasons = entry
                .get("ReasonsToBuy")
                .and_then(serde_json::Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();

            scored.push(ScoredStock {
                symbol: record.symbol.clone(),
                sector: record.sector.clone(),
                buy_score,
                reasons,
            });
        }

        Ok(scored)
    }
}

// ============================================================================
// Prompt Construction
// ============================================================================

/// Build the scoring prompt for one batch.
fn build_prompt(records: &[FundamentalsRecord]) -> String {
    let mut block = String::new();
    for record in records {
        block.push_str(&format_fundamentals(record));
        block.push('\n');
    }

    format!(
        r#"You are a financial analyst assistant. Based on the following stock data, evaluate each stock using the fundamental indicators provided. For each stock, assign a "BuyScore" from 1-10 (where 10 is the strongest buy) and provide 2-3 key "ReasonsToBuy" as an array.

Return your analysis as a JSON object with this exact structure:
{{
  "SYMBOL1": {{"BuyScore": X, "ReasonsToBuy": ["reason1", "reason2"]}},
  "SYMBOL2": {{"BuyScore": Y, "ReasonsToBuy": ["reason1", "reason2"]}}
}}

{block}
Return only the JSON object."#
    )
}

/// Render one symbol's indicator block.
fn format_fundamentals(record: &FundamentalsRecord) -> String {
    let mut out = format!("{}:\n", record.symbol);
    for (indicator, value) in record.indicators.iter() {
        out.push_str(&format!("  {}: {}\n", indicator, value));
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FetchStatus, Indicator, IndicatorSet, Provenance};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(symbol: &str, pe: f64) -> FundamentalsRecord {
        FundamentalsRecord {
            symbol: symbol.to_string(),
            sector: "Information Technology".to_string(),
            indicators: IndicatorSet::unknown().with(Indicator::PeRatio, pe),
            provenance: Provenance::Real("yahoo".to_string()),
            status: FetchStatus::Partial,
        }
    }

    fn bridge_for(server: &MockServer) -> ScoringBridge {
        ScoringBridge::new(ScoringBridgeConfig {
            endpoint: server.uri(),
            api_key: Some("test-key".to_string()),
            max_retries: 0,
            ..ScoringBridgeConfig::default()
        })
    }

    #[test]
    fn test_prompt_contains_symbols_and_unknowns() {
        let prompt = build_prompt(&[record("AAPL", 29.4)]);
        assert!(prompt.contains("AAPL:"));
        assert!(prompt.contains("P/E Ratio: 29.4"));
        assert!(prompt.contains("EPS: unknown"));
        assert!(prompt.contains("Return only the JSON object."));
    }

    #[test]
    fn test_parse_scores_tolerates_noise_and_clamps() {
        let bridge = ScoringBridge::new(ScoringBridgeConfig::default());
        let records = vec![record("AAPL", 29.4), record("MSFT", 33.0)];

        // Fenced reply, one symbol missing a reasons array, one over-range score.
        let reply = r#"Here is the analysis:
```json
{"AAPL": {"BuyScore": 99, "ReasonsToBuy": ["strong margins", "cash generation"]}, "MSFT": {"BuyScore": 7}}
```"#;

        let scored = bridge.parse_scores(&records, reply).unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].buy_score, 10);
        assert_eq!(scored[0].reasons.len(), 2);
        assert_eq!(scored[1].buy_score, 7);
        assert!(scored[1].reasons.is_empty());
    }

    #[test]
    fn test_parse_scores_skips_missing_symbols() {
        let bridge = ScoringBridge::new(ScoringBridgeConfig::default());
        let records = vec![record("AAPL", 29.4), record("KO", 24.0)];

        let reply = r#"{"AAPL": {"BuyScore": 8, "ReasonsToBuy": ["a"]}}"#;
        let scored = bridge.parse_scores(&records, reply).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].symbol, "AAPL");
    }

    #[test]
    fn test_parse_scores_rejects_replies_without_json() {
        let bridge = ScoringBridge::new(ScoringBridgeConfig::default());
        let records = vec![record("AAPL", 29.4)];
        assert!(bridge.parse_scores(&records, "I cannot help with that.").is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_bridge_passes_through_unscored() {
        let bridge = ScoringBridge::new(ScoringBridgeConfig::default());
        assert!(!bridge.is_enabled());

        let scored = bridge.score_all(&[record("AAPL", 29.4)]).await;
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].buy_score, 0);
    }

    #[tokio::test]
    async fn test_score_batch_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"AAPL\": {\"BuyScore\": 9, \"ReasonsToBuy\": [\"durable moat\"]}}"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let scored = bridge_for(&server)
            .score_batch(&[record("AAPL", 29.4)])
            .await
            .unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].buy_score, 9);
        assert_eq!(scored[0].reasons, vec!["durable moat".to_string()]);
    }

    #[tokio::test]
    async fn test_backend_error_fails_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = bridge_for(&server).score_batch(&[record("AAPL", 29.4)]).await;
        assert!(result.is_err());
    }
}
