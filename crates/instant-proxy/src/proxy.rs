//! Install, activate and fetch interception for the versioned asset cache.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::escape::{extract_query, render_placeholder};
use crate::manifest::CacheManifest;
use crate::storage::CacheStorage;
use crate::types::{FetchOutcome, ProxyResponse};
use crate::upstream::{fetch_asset, Upstream};

/// Path of the search page answered from the placeholder.
pub const SEARCH_PATH: &str = "/search";

pub struct CacheProxy {
    manifest: CacheManifest,
    storage: Arc<dyn CacheStorage>,
    upstream: Arc<dyn Upstream>,
}

impl CacheProxy {
    pub fn new(
        manifest: CacheManifest,
        storage: Arc<dyn CacheStorage>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            manifest,
            storage,
            upstream,
        }
    }

    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Populate the current namespace with every manifest asset. Nothing is
    /// stored unless all fetches succeed.
    pub async fn on_install(&self) -> Result<usize> {
        let namespace = self.manifest.namespace();
        info!(
            namespace = %namespace,
            assets = self.manifest.assets.len(),
            "Installing asset cache"
        );

        let fetches = self.manifest.assets.iter().map(|asset| async move {
            let response = fetch_asset(self.upstream.as_ref(), asset).await?;
            Ok::<_, anyhow::Error>((asset.clone(), response))
        });
        let entries = try_join_all(fetches)
            .await
            .context("Asset cache installation failed")?;

        self.storage.put_all(&namespace, &entries)?;
        info!(namespace = %namespace, "Asset cache installed");
        Ok(entries.len())
    }

    /// Delete every namespace that does not belong to the current version.
    /// Returns the deleted namespaces.
    pub fn on_activate(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .storage
            .namespaces()?
            .into_iter()
            .filter(|namespace| !self.manifest.is_current(namespace))
            .collect();

        for namespace in &stale {
            self.storage.delete(namespace)?;
            info!(namespace = %namespace, "Deleted stale asset cache");
        }
        Ok(stale)
    }

    /// Decide how to answer a request. `query` excludes the leading `?`.
    pub async fn on_fetch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
    ) -> Result<FetchOutcome> {
        if method != Method::GET {
            return Ok(FetchOutcome::PassThrough);
        }

        let key = match query {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };

        if self.manifest.contains(&key) {
            if let Some(response) = self.cached(&key) {
                return Ok(FetchOutcome::Cached(response));
            }
            warn!(key = %key, "Manifest asset missing from cache, fetching");
            return Ok(FetchOutcome::Network(self.upstream.fetch(&key).await?));
        }

        if path == SEARCH_PATH {
            let Some(placeholder) = self.cached(&self.manifest.placeholder) else {
                debug!("Placeholder not cached, fetching search page");
                return Ok(FetchOutcome::Network(self.upstream.fetch(&key).await?));
            };
            if query.and_then(extract_query).is_none() {
                return Ok(FetchOutcome::Placeholder(placeholder));
            }
            return Ok(FetchOutcome::Placeholder(substitute(placeholder, query)));
        }

        Ok(FetchOutcome::PassThrough)
    }

    fn cached(&self, key: &str) -> Option<ProxyResponse> {
        match self.storage.lookup(&self.manifest.namespace(), key) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed");
                None
            }
        }
    }
}

fn substitute(placeholder: ProxyResponse, query: Option<&str>) -> ProxyResponse {
    let template = String::from_utf8_lossy(&placeholder.body);
    let body = render_placeholder(&template, query).into_bytes();
    let headers = placeholder
        .headers
        .into_iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("content-length"))
        .collect();
    ProxyResponse {
        status: placeholder.status,
        headers,
        body,
        stored_at: placeholder.stored_at,
    }
}
