//! Configuration for the Picks services.
//!
//! Layered loading: built-in defaults, then an optional YAML config file,
//! then environment variable overrides. A missing provider credential means
//! that provider is skipped at runtime, never an error.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Get the configuration directory (`~/.picks`).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map_or_else(|| PathBuf::from(".picks"), |home| home.join(".picks"))
}

/// Get the configuration file path.
///
/// The `PICKS_CONFIG` environment variable overrides the default location.
pub fn config_path() -> PathBuf {
    std::env::var("PICKS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.yaml"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4460
}

/// HTTP trigger surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_chunk_size() -> usize {
    50
}

fn default_max_workers() -> usize {
    8
}

fn default_sequential_threshold() -> usize {
    100
}

fn default_chunk_wait_budget_secs() -> u64 {
    240
}

fn default_provider_timeout_secs() -> u64 {
    8
}

fn default_true() -> bool {
    true
}

/// Screening pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Maximum symbols per chunk in distributed mode
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Concurrent fetch workers per chunk
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Input sizes at or below this run in a single sequential pass
    #[serde(default = "default_sequential_threshold")]
    pub sequential_threshold: usize,

    /// Wall-clock budget for all distributed chunks to complete
    #[serde(default = "default_chunk_wait_budget_secs")]
    pub chunk_wait_budget_secs: u64,

    /// Per-provider-call timeout
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Directory for intermediate chunk artifacts.
    /// Defaults to a `picks` directory under the system temp dir.
    #[serde(default)]
    pub work_dir: Option<String>,

    /// Exclude symbols without a positive known P/E from scoring and the
    /// final report
    #[serde(default = "default_true")]
    pub require_positive_pe: bool,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: default_max_workers(),
            sequential_threshold: default_sequential_threshold(),
            chunk_wait_budget_secs: default_chunk_wait_budget_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            work_dir: None,
            require_positive_pe: default_true(),
        }
    }
}

fn default_yahoo_min_interval_ms() -> u64 {
    250
}

/// Configuration for the keyless primary provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooConfig {
    /// Whether the provider participates in the fallback chain
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum spacing between calls, in milliseconds
    #[serde(default = "default_yahoo_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            min_interval_ms: default_yahoo_min_interval_ms(),
        }
    }
}

/// Configuration for an API-key-gated provider.
///
/// A `None` api_key disables the provider; it is skipped, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyedProviderConfig {
    /// API key; absent means the provider is skipped
    #[serde(default)]
    pub api_key: Option<String>,

    /// Minimum spacing between calls, in seconds
    #[serde(default)]
    pub min_interval_secs: Option<u64>,
}

/// Data provider credentials and pacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Primary: keyless quote-summary source
    #[serde(default)]
    pub yahoo: YahooConfig,

    /// Secondary: Alpha Vantage company overview (key required)
    #[serde(default)]
    pub alpha_vantage: KeyedProviderConfig,

    /// Tertiary: Financial Modeling Prep ratios (key required)
    #[serde(default)]
    pub fmp: KeyedProviderConfig,
}

fn default_scoring_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_scoring_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_score_batch_size() -> usize {
    20
}

fn default_top_n() -> usize {
    25
}

fn default_scoring_retries() -> u32 {
    2
}

fn default_scoring_timeout_secs() -> u64 {
    60
}

/// LLM scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// OpenAI-compatible API base (e.g. `https://api.openai.com/v1`)
    #[serde(default = "default_scoring_endpoint")]
    pub endpoint: String,

    /// API key; absent means scoring is skipped and candidates pass
    /// through unscored
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_scoring_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Symbols per scoring call
    #[serde(default = "default_score_batch_size")]
    pub batch_size: usize,

    /// Picks kept in the final report
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Retries per scoring call
    #[serde(default = "default_scoring_retries")]
    pub max_retries: u32,

    /// Request timeout
    #[serde(default = "default_scoring_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scoring_endpoint(),
            api_key: None,
            model: default_scoring_model(),
            temperature: default_temperature(),
            batch_size: default_score_batch_size(),
            top_n: default_top_n(),
            max_retries: default_scoring_retries(),
            timeout_secs: default_scoring_timeout_secs(),
        }
    }
}

fn default_mail_retries() -> u32 {
    3
}

fn default_mail_timeout_secs() -> u64 {
    30
}

/// Report delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Mail relay endpoint; absent disables delivery
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Recipient address; absent disables delivery
    #[serde(default)]
    pub recipient: Option<String>,

    /// Send retries
    #[serde(default = "default_mail_retries")]
    pub retry_count: u32,

    /// Request timeout
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            recipient: None,
            retry_count: default_mail_retries(),
            timeout_secs: default_mail_timeout_secs(),
        }
    }
}

fn default_schedule_cron() -> String {
    // Friday 21:30 UTC, after the US close
    "0 30 21 * * Fri *".to_string()
}

/// Scheduled run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether scheduled runs are active
    #[serde(default)]
    pub enabled: bool,

    /// Cron expression (with seconds field)
    #[serde(default = "default_schedule_cron")]
    pub cron: String,

    /// CSV file of `Symbol,Sector` rows defining the scheduled universe
    #[serde(default)]
    pub universe_file: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: default_schedule_cron(),
            universe_file: None,
        }
    }
}

/// Root configuration for the Picks services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// HTTP trigger surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Screening pipeline
    #[serde(default)]
    pub screener: ScreenerConfig,

    /// Data provider credentials and pacing
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// LLM scoring
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Report delivery
    #[serde(default)]
    pub email: EmailConfig,

    /// Scheduled runs
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from the default path with env overrides.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::info!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path (no env overrides).
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PICKS_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("PICKS_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(port) = std::env::var("PICKS_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(dir) = std::env::var("PICKS_WORK_DIR") {
            self.screener.work_dir = Some(dir);
        }
        if let Ok(key) = std::env::var("ALPHAVANTAGE_API_KEY") {
            self.providers.alpha_vantage.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("FMP_API_KEY") {
            self.providers.fmp.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.scoring.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("PICKS_SCORING_ENDPOINT") {
            self.scoring.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("PICKS_SCORING_MODEL") {
            self.scoring.model = model;
        }
        if let Ok(endpoint) = std::env::var("PICKS_MAIL_ENDPOINT") {
            self.email.endpoint = Some(endpoint);
        }
        if let Ok(recipient) = std::env::var("EMAIL_RECIPIENT") {
            self.email.recipient = Some(recipient);
        }
    }

    // =========================================================================
    // Convenience accessors
    // =========================================================================

    /// Directory for intermediate chunk artifacts.
    pub fn work_dir(&self) -> PathBuf {
        self.screener
            .work_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("picks"))
    }

    /// Alpha Vantage API key, if configured.
    pub fn alpha_vantage_api_key(&self) -> Option<&str> {
        self.providers.alpha_vantage.api_key.as_deref()
    }

    /// Financial Modeling Prep API key, if configured.
    pub fn fmp_api_key(&self) -> Option<&str> {
        self.providers.fmp.api_key.as_deref()
    }

    /// Bind address for the trigger API.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
