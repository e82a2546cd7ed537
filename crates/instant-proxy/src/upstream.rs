use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use url::Url;

use crate::types::ProxyResponse;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The live network behind the cache.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `path_and_query` and buffer the whole response.
    async fn fetch(&self, path_and_query: &str) -> Result<ProxyResponse>;
}

/// Headers that describe the connection rather than the content.
pub fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "content-length"
    )
}

pub struct HttpUpstream {
    client: Client,
    base: Url,
}

impl HttpUpstream {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("Invalid upstream URL {}", base))?;
        // No client-wide timeout: forwarded event streams stay open.
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn url_for(&self, path_and_query: &str) -> Result<Url> {
        self.base
            .join(path_and_query)
            .with_context(|| format!("Invalid request path {}", path_and_query))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, path_and_query: &str) -> Result<ProxyResponse> {
        let url = self.url_for(path_and_query)?;
        let response = self
            .client
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?
            .to_vec();

        Ok(ProxyResponse::new(status, headers, body))
    }
}

/// Fetch an asset for caching. Unlike [`Upstream::fetch`], a non-success
/// status is an error.
pub async fn fetch_asset(upstream: &dyn Upstream, path_and_query: &str) -> Result<ProxyResponse> {
    let response = upstream.fetch(path_and_query).await?;
    if !response.is_success() {
        return Err(anyhow!(
            "Fetching {} returned status {}",
            path_and_query,
            response.status
        ));
    }
    Ok(response)
}
