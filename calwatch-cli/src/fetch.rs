//! Fetching calendar documents.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Source of raw calendar text for a URL.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("calwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let url = http_url(url)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch calendar from '{url}'"))?
            .error_for_status()
            .with_context(|| format!("Server rejected request for '{url}'"))?;

        response
            .text()
            .await
            .context("Failed to decode response body")
    }
}

/// `webcal://` is a hint for calendar apps; the document itself is served over HTTPS.
fn http_url(url: &Url) -> Result<Url> {
    match url.scheme() {
        "webcal" | "webcals" => {
            let rest = &url.as_str()[url.scheme().len()..];
            Url::parse(&format!("https{rest}"))
                .with_context(|| format!("Invalid webcal URL '{url}'"))
        }
        _ => Ok(url.clone()),
    }
}
