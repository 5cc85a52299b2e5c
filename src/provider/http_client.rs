use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

#[derive(Debug, Error)]
enum RequestError {
    #[error("HTTP {0}")]
    Throttled(StatusCode),

    #[error("HTTP error {0}")]
    Status(StatusCode),

    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RequestError {
    fn is_retryable(&self) -> bool {
        matches!(self, RequestError::Throttled(_) | RequestError::Transport(_))
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: ProviderConfig,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Crumb requests only succeed once the consent cookie is set
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// GET a URL and ignore the outcome; only the cookies it sets matter.
    pub async fn touch(&self, url: &str) {
        match self.inner.get(url).send().await {
            Ok(resp) => debug!("GET {} -> {}", url, resp.status()),
            Err(e) => debug!("GET {} failed: {}", url, e),
        }
    }

    /// Fetch a URL as text with rate-limiting and retry.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.polite_delay().await;

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_backoff_ms)
            .map(jitter)
            .take(self.config.max_retries as usize);

        let mut attempt = 0u32;
        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                self.get_once(url, attempt)
            },
            |e: &RequestError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{} on {}, retrying", e, url);
                }
                retry
            },
        )
        .await
        .with_context(|| format!("All retries exhausted for {}", url))
    }

    /// Fetch a URL and decode the body as JSON.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let text = self.get_text(url).await?;
        serde_json::from_str(&text).with_context(|| format!("Malformed JSON from {}", url))
    }

    async fn get_once(&self, url: &str, attempt: u32) -> std::result::Result<String, RequestError> {
        debug!("GET {} (attempt {})", url, attempt);

        let resp = self.inner.get(url).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp.text().await?)
        } else if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            Err(RequestError::Throttled(status))
        } else {
            Err(RequestError::Status(status))
        }
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let total = Duration::from_millis(self.config.request_delay_ms)
            + jitter(Duration::from_millis(self.config.jitter_ms));
        sleep(total).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_server::TestServer;

    fn fast_config(max_retries: u32) -> ProviderConfig {
        ProviderConfig {
            timeout_secs: 5,
            request_delay_ms: 0,
            jitter_ms: 0,
            max_retries,
            retry_backoff_ms: 1,
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(RequestError::Throttled(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!RequestError::Status(StatusCode::NOT_FOUND).is_retryable());
    }

    #[tokio::test]
    async fn test_retries_after_503() {
        let server = TestServer::start(|n, _| match n {
            0 => (503, "busy".to_string()),
            _ => (200, "ok".to_string()),
        })
        .await;
        let client = HttpClient::new(&fast_config(3)).unwrap();

        let body = client.get_text(&format!("{}/data", server.base)).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn test_not_found_fails_without_retry() {
        let server = TestServer::start(|_, _| (404, "{}".to_string())).await;
        let client = HttpClient::new(&fast_config(3)).unwrap();

        let err = client.get_text(&format!("{}/data", server.base)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("404"));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_throttling_is_bounded_by_max_retries() {
        let server = TestServer::start(|_, _| (429, String::new())).await;
        let client = HttpClient::new(&fast_config(2)).unwrap();

        let err = client.get_text(&format!("{}/data", server.base)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("429"));
        // First attempt plus two retries.
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn test_get_json_rejects_malformed_body() {
        let server = TestServer::start(|_, _| (200, "<html>".to_string())).await;
        let client = HttpClient::new(&fast_config(0)).unwrap();

        let err = client.get_json(&format!("{}/data", server.base)).await.unwrap_err();
        assert!(err.to_string().contains("Malformed JSON"));
    }
}
