use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::protocol::{PackagePage, PackagesResponse, ResultRow, RESULTS_PER_PACKAGE};

/// Read-only endpoints serving the stored results of a finished query.
#[async_trait]
pub trait ResultsApi: Send + Sync {
    async fn page(&self, query_id: &str, page: usize) -> Result<Vec<ResultRow>>;

    async fn package_page(&self, query_id: &str, page: usize) -> Result<Vec<PackagePage>>;

    async fn packages(&self, query_id: &str) -> Result<Vec<String>>;
}

pub fn page_path(query_id: &str, page: usize) -> String {
    format!("results/{}/page_{}.json", query_id, page)
}

pub fn package_page_path(query_id: &str, page: usize) -> String {
    format!(
        "results/{}/perpackage_{}_page_{}.json",
        query_id, RESULTS_PER_PACKAGE, page
    )
}

pub fn packages_path(query_id: &str) -> String {
    format!("results/{}/packages.json", query_id)
}

/// `ResultsApi` over HTTP.
pub struct HttpResultsApi {
    client: Client,
    base: Url,
}

impl HttpResultsApi {
    pub fn new(base: Url) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, base })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("Invalid results path {}", path))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url.path(), status));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url.path()))
    }
}

#[async_trait]
impl ResultsApi for HttpResultsApi {
    async fn page(&self, query_id: &str, page: usize) -> Result<Vec<ResultRow>> {
        self.get_json(&page_path(query_id, page)).await
    }

    async fn package_page(&self, query_id: &str, page: usize) -> Result<Vec<PackagePage>> {
        self.get_json(&package_page_path(query_id, page)).await
    }

    async fn packages(&self, query_id: &str) -> Result<Vec<String>> {
        let response: PackagesResponse = self.get_json(&packages_path(query_id)).await?;
        Ok(response.packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(page_path("q1", 3), "results/q1/page_3.json");
        assert_eq!(
            package_page_path("q1", 0),
            "results/q1/perpackage_2_page_0.json"
        );
        assert_eq!(packages_path("q1"), "results/q1/packages.json");
    }
}
