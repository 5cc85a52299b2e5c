use crate::models::Frequency;
use crate::normalizer::DEFAULT_LOOKBACK_PERIODS;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

/// Market-data provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_quote_url")]
    pub quote_url: String,

    #[serde(default = "default_timeseries_url")]
    pub timeseries_url: String,

    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,

    #[serde(default = "default_crumb_url")]
    pub crumb_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Per-query defaults, overridable from the command line
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_lookback_periods")]
    pub lookback_periods: usize,

    #[serde(default)]
    pub frequency: Frequency,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_quote_url() -> String {
    "https://query2.finance.yahoo.com/v10/finance/quoteSummary".to_string()
}
fn default_timeseries_url() -> String {
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries".to_string()
}
fn default_cookie_url() -> String {
    "https://fc.yahoo.com".to_string()
}
fn default_crumb_url() -> String {
    "https://query1.finance.yahoo.com/v1/test/getcrumb".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}
fn default_lookback_periods() -> usize {
    DEFAULT_LOOKBACK_PERIODS
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SNAPSHOT").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Reject values no query could run with.
    pub fn validate(&self) -> Result<()> {
        if self.query.lookback_periods == 0 {
            bail!("query.lookback_periods must be at least 1");
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            timeseries_url: default_timeseries_url(),
            cookie_url: default_cookie_url(),
            crumb_url: default_crumb_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            lookback_periods: default_lookback_periods(),
            frequency: Frequency::Annual,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            query: QueryConfig::default(),
        }
    }
}
