use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Retrieves pages over HTTP and parses them into a navigable document.
///
/// One client is shared by the whole run. There are no retries: the caller
/// decides whether a failure skips an article or ends a source.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(IngestError::Client)?;
        Ok(Self { client })
    }

    /// Builds a fetcher from the `[fetch]` config section.
    pub fn from_config(config: &common::FetchConfig) -> Result<Self> {
        Self::new(config.timeout_seconds(), config.user_agent())
    }

    /// Downloads the raw HTML of `url`.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| IngestError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| IngestError::Fetch {
            url: url.to_string(),
            source,
        })?;
        debug!("fetcher: {} returned {} bytes", url, body.len());
        Ok(body)
    }

    /// Downloads `url` and parses it. The document is built after the last await,
    /// so callers can keep it without holding it across suspension points.
    pub async fn fetch(&self, url: &str) -> Result<Html> {
        let body = self.fetch_text(url).await?;
        Ok(Html::parse_document(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    #[tokio::test]
    async fn fetch_parses_document_and_sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .match_header("user-agent", common::DEFAULT_USER_AGENT)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><h1>Olá</h1></body></html>")
            .create_async()
            .await;

        let fetcher = PageFetcher::new(15, common::DEFAULT_USER_AGENT).unwrap();
        let doc = fetcher.fetch(&format!("{}/page", server.url())).await.unwrap();
        let h1 = Selector::parse("h1").unwrap();
        let text: String = doc.select(&h1).next().unwrap().text().collect();
        assert_eq!(text, "Olá");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = PageFetcher::new(15, common::DEFAULT_USER_AGENT).unwrap();
        let url = format!("{}/missing", server.url());
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(err.is_fetch());
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains(&url));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let fetcher = PageFetcher::new(2, common::DEFAULT_USER_AGENT).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch { .. }));
    }

    #[test]
    fn invalid_user_agent_is_a_client_error() {
        let err = PageFetcher::new(15, "bad\nagent").unwrap_err();
        assert!(matches!(err, IngestError::Client(_)));
        assert!(!err.is_fetch());
        assert!(err.to_string().starts_with("failed to build HTTP client"));
    }
}
