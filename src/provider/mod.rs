pub mod http_client;
pub mod parsers;

#[cfg(test)]
mod test_server;

use crate::config::ProviderConfig;
use crate::models::{FinancialStatement, Frequency, StatementKind, TickerProfile};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use self::http_client::HttpClient;
use self::parsers::{parse_quote_summary, parse_timeseries, timeseries_keys};

const QUOTE_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData";

/// Timeseries lower bound (2000-01-01); the endpoint needs an explicit window.
const TIMESERIES_START: i64 = 946_684_800;

/// Trimmed crumb, or `None` for empty bodies, HTML pages and messages.
pub fn valid_crumb(raw: &str) -> Option<&str> {
    let crumb = raw.trim();
    if crumb.is_empty() || crumb.contains('<') || crumb.contains(char::is_whitespace) {
        None
    } else {
        Some(crumb)
    }
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable market-data collaborator.
///
/// One call yields the three statement tables and the company metadata. A
/// statement that cannot be fetched is `None`; `Err` means the symbol itself
/// could not be resolved and is treated by callers as a total failure.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_profile(&self, symbol: &str, frequency: Frequency) -> Result<TickerProfile>;
}

// ── Yahoo Finance ─────────────────────────────────────────────────────────────

pub struct YahooProvider {
    client: HttpClient,
    config: ProviderConfig,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            config: config.clone(),
        })
    }

    /// Obtain a crumb token; quoteSummary rejects requests without one.
    async fn crumb(&self) -> Result<String> {
        self.client.touch(&self.config.cookie_url).await;

        let crumb = self
            .client
            .get_text(&self.config.crumb_url)
            .await
            .context("Failed to obtain crumb")?;
        match valid_crumb(&crumb) {
            Some(c) => Ok(c.to_string()),
            None => bail!("Provider returned an unusable crumb"),
        }
    }

    fn quote_url(&self, symbol: &str, crumb: &str) -> Result<Url> {
        let base = format!("{}/{}", self.config.quote_url.trim_end_matches('/'), symbol);
        Url::parse_with_params(&base, &[("modules", QUOTE_MODULES), ("crumb", crumb)])
            .with_context(|| format!("Invalid quote URL {}", base))
    }

    fn timeseries_url(&self, symbol: &str, kind: StatementKind, frequency: Frequency) -> Result<Url> {
        let prefix = frequency.key_prefix();
        let types = timeseries_keys(kind)
            .iter()
            .map(|k| format!("{}{}", prefix, k))
            .collect::<Vec<_>>()
            .join(",");
        let period2 = Utc::now().timestamp().to_string();
        let period1 = TIMESERIES_START.to_string();

        let base = format!("{}/{}", self.config.timeseries_url.trim_end_matches('/'), symbol);
        Url::parse_with_params(
            &base,
            &[
                ("symbol", symbol),
                ("type", types.as_str()),
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
            ],
        )
        .with_context(|| format!("Invalid timeseries URL {}", base))
    }

    async fn fetch_statement(
        &self,
        symbol: &str,
        kind: StatementKind,
        frequency: Frequency,
    ) -> Result<Option<FinancialStatement>> {
        let url = self.timeseries_url(symbol, kind, frequency)?;
        let body = self
            .client
            .get_json(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch {} for {}", kind, symbol))?;

        let stmt = parse_timeseries(&body, kind, frequency)?;
        match &stmt {
            Some(s) => debug!(
                "{}: {} has {} rows x {} periods",
                symbol,
                kind,
                s.rows.len(),
                s.periods.len()
            ),
            None => warn!("{}: provider returned no {} data", symbol, kind),
        }
        Ok(stmt)
    }

    /// A failed statement request is a gap in the profile, not a failed profile.
    async fn statement_or_gap(
        &self,
        symbol: &str,
        kind: StatementKind,
        frequency: Frequency,
    ) -> Option<FinancialStatement> {
        match self.fetch_statement(symbol, kind, frequency).await {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!("{}: {} unavailable: {:#}", symbol, kind, e);
                None
            }
        }
    }
}

#[async_trait]
impl MarketDataSource for YahooProvider {
    async fn fetch_profile(&self, symbol: &str, frequency: Frequency) -> Result<TickerProfile> {
        info!("Fetching {} profile for {}", frequency.key_prefix(), symbol);

        let crumb = self.crumb().await?;

        let url = self.quote_url(symbol, &crumb)?;
        let body = self
            .client
            .get_json(url.as_str())
            .await
            .with_context(|| format!("Failed to fetch quote summary for {}", symbol))?;
        let metrics = parse_quote_summary(&body, symbol)?;

        Ok(TickerProfile {
            income_statement: self
                .statement_or_gap(symbol, StatementKind::IncomeStatement, frequency)
                .await,
            balance_sheet: self
                .statement_or_gap(symbol, StatementKind::BalanceSheet, frequency)
                .await,
            cash_flow: self
                .statement_or_gap(symbol, StatementKind::CashFlow, frequency)
                .await,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::Gap;
    use crate::normalizer::Normalizer;
    use serde_json::json;
    use super::test_server::TestServer;

    fn provider() -> YahooProvider {
        YahooProvider::new(&ProviderConfig::default()).unwrap()
    }

    fn series(key: &str) -> String {
        json!({
            "timeseries": {
                "result": [{
                    "meta": { "symbol": ["AAPL"], "type": [key] },
                    key: [
                        { "asOfDate": "2024-09-30", "reportedValue": { "raw": 100.0 } },
                        { "asOfDate": "2023-09-30", "reportedValue": { "raw": 90.0 } }
                    ]
                }],
                "error": null
            }
        })
        .to_string()
    }

    fn quote_summary() -> String {
        json!({
            "quoteSummary": {
                "result": [{
                    "price": { "marketCap": { "raw": 1.0e9 }, "regularMarketPrice": { "raw": 10.0 } },
                    "defaultKeyStatistics": { "sharesOutstanding": { "raw": 1.0e8 } }
                }],
                "error": null
            }
        })
        .to_string()
    }

    /// Yahoo stand-in; statements whose key appears in `failing` answer 500.
    async fn yahoo_stub(failing: &'static [&'static str]) -> (TestServer, YahooProvider) {
        let server = TestServer::start(move |_, target| {
            if target.starts_with("/cookie") {
                (404, String::new())
            } else if target.starts_with("/crumb") {
                (200, "abc123".to_string())
            } else if target.starts_with("/quote/") {
                (200, quote_summary())
            } else if failing.iter().any(|k| target.contains(k)) {
                (500, "{}".to_string())
            } else if target.contains("annualTotalRevenue") {
                (200, series("annualTotalRevenue"))
            } else if target.contains("annualTotalAssets") {
                (200, series("annualTotalAssets"))
            } else {
                (200, series("annualFreeCashFlow"))
            }
        })
        .await;

        let config = ProviderConfig {
            quote_url: format!("{}/quote", server.base),
            timeseries_url: format!("{}/ts", server.base),
            cookie_url: format!("{}/cookie", server.base),
            crumb_url: format!("{}/crumb", server.base),
            timeout_secs: 5,
            request_delay_ms: 0,
            jitter_ms: 0,
            max_retries: 0,
            retry_backoff_ms: 1,
            ..ProviderConfig::default()
        };
        let provider = YahooProvider::new(&config).unwrap();
        (server, provider)
    }

    #[test]
    fn test_valid_crumb() {
        assert_eq!(valid_crumb("abc/def.123\n"), Some("abc/def.123"));
        assert_eq!(valid_crumb("  "), None);
        assert_eq!(valid_crumb(""), None);
        assert_eq!(valid_crumb("<html><body>Too Many Requests</body></html>"), None);
        assert_eq!(valid_crumb("Too Many Requests"), None);
    }

    #[test]
    fn test_quote_url() {
        let url = provider().quote_url("SAP.DE", "abc/def").unwrap();
        assert_eq!(url.path(), "/v10/finance/quoteSummary/SAP.DE");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("modules".into(), QUOTE_MODULES.into())));
        assert!(query.contains(&("crumb".into(), "abc/def".into())));
    }

    #[test]
    fn test_timeseries_url_prefixes_keys() {
        let url = provider()
            .timeseries_url("AAPL", StatementKind::CashFlow, Frequency::Quarterly)
            .unwrap();
        let types = url
            .query_pairs()
            .find(|(k, _)| k == "type")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(types.split(',').all(|t| t.starts_with("quarterly")));
        assert!(types.contains("quarterlyFreeCashFlow"));
        assert!(types.contains("quarterlyStockBasedCompensation"));
    }

    #[tokio::test]
    async fn test_profile_with_all_statements() {
        let (_server, provider) = yahoo_stub(&[]).await;
        let profile = provider.fetch_profile("AAPL", Frequency::Annual).await.unwrap();

        assert!(profile.income_statement.unwrap().has_row("Total Revenue"));
        assert!(profile.balance_sheet.unwrap().has_row("Total Assets"));
        assert!(profile.cash_flow.unwrap().has_row("Free Cash Flow"));
        assert_eq!(profile.metrics.shares_outstanding, Some(1.0e8));
    }

    #[tokio::test]
    async fn test_failed_statement_request_is_a_gap() {
        let (_server, provider) = yahoo_stub(&["annualFreeCashFlow"]).await;

        let profile = provider.fetch_profile("AAPL", Frequency::Annual).await.unwrap();
        assert!(profile.income_statement.is_some());
        assert!(profile.balance_sheet.is_some());
        assert!(profile.cash_flow.is_none());

        let result = Normalizer::new(provider).fetch("AAPL", 4).await.unwrap();
        assert!(result.income_statement.is_some());
        assert!(result.cash_flow.is_none());
        assert!(result.diagnostics.iter().any(|d| d.gap
            == Gap::MissingStatement {
                kind: StatementKind::CashFlow
            }));
    }

    #[tokio::test]
    async fn test_every_statement_failing_is_total_failure() {
        let (_server, provider) = yahoo_stub(&[
            "annualTotalRevenue",
            "annualTotalAssets",
            "annualFreeCashFlow",
        ])
        .await;

        let err = Normalizer::new(provider).fetch("AAPL", 4).await.unwrap_err();
        assert!(matches!(err, FetchError::NoStatementData { .. }));
    }

    #[tokio::test]
    async fn test_bad_crumb_fails_profile() {
        let server = TestServer::start(|_, _| (200, "<html>consent</html>".to_string())).await;
        let config = ProviderConfig {
            cookie_url: format!("{}/cookie", server.base),
            crumb_url: format!("{}/crumb", server.base),
            request_delay_ms: 0,
            jitter_ms: 0,
            max_retries: 0,
            ..ProviderConfig::default()
        };
        let provider = YahooProvider::new(&config).unwrap();

        let err = provider.fetch_profile("AAPL", Frequency::Annual).await.unwrap_err();
        assert!(err.to_string().contains("unusable crumb"));
    }
}
