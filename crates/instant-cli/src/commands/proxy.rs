use std::sync::Arc;

use anyhow::{Context, Result};
use instant_proxy::{
    start_server, AppState, CacheManifest, CacheProxy, CacheStorage, HttpUpstream,
    MemoryCacheStorage, ProxyConfig, RedbCacheStorage,
};
use tracing::{info, warn};

fn open_storage(config: &ProxyConfig) -> Result<Arc<dyn CacheStorage>> {
    let db_path = config.expanded_db_path();
    let storage = RedbCacheStorage::open(&db_path)
        .context(format!("Failed to open cache database: {:?}", db_path))?;
    Ok(Arc::new(storage))
}

/// Wire the proxy to its storage and upstream.
fn build(
    config: &ProxyConfig,
    storage: Arc<dyn CacheStorage>,
) -> Result<(CacheProxy, Arc<HttpUpstream>)> {
    let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
    let proxy = CacheProxy::new(CacheManifest::from_config(config), storage, upstream.clone());
    Ok((proxy, upstream))
}

pub async fn run_serve(
    config: &ProxyConfig,
    host: Option<String>,
    port: Option<u16>,
    memory: bool,
) -> Result<()> {
    let storage: Arc<dyn CacheStorage> = if memory {
        Arc::new(MemoryCacheStorage::new())
    } else {
        open_storage(config)?
    };
    let (proxy, upstream) = build(config, storage)?;

    // Activation only runs once the new version is complete.
    match proxy.on_install().await {
        Ok(count) => {
            info!(assets = count, "Asset cache ready");
            proxy.on_activate()?;
        }
        Err(e) => warn!(error = %format!("{:#}", e), "Serving without a complete asset cache"),
    }

    let state = AppState {
        proxy: Arc::new(proxy),
        upstream,
    };
    let host = host.unwrap_or_else(|| config.host.clone());
    let port = port.unwrap_or(config.port);
    start_server(state, &host, port).await
}

pub async fn run_install(config: &ProxyConfig) -> Result<()> {
    let (proxy, _) = build(config, open_storage(config)?)?;
    let count = proxy.on_install().await?;
    println!(
        "Cached {} assets in {}",
        count,
        proxy.manifest().namespace()
    );
    Ok(())
}

pub fn run_activate(config: &ProxyConfig) -> Result<()> {
    let (proxy, _) = build(config, open_storage(config)?)?;
    let deleted = proxy.on_activate()?;
    if deleted.is_empty() {
        println!("No stale cache versions");
    }
    for namespace in deleted {
        println!("Deleted {}", namespace);
    }
    Ok(())
}
