use std::sync::Arc;

use anyhow::{anyhow, Result};
use instant_runtime::pagination::{parse_location, url_for};
use instant_runtime::{
    DefaultTransportFactory, HttpResultsApi, MemoryHistory, QuerySession, SessionState,
};
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::view::TerminalView;

pub async fn run_search(config: &Config, term: &str, page: usize, per_package: bool) -> Result<()> {
    let base = config.server.base_url()?;
    run_session(config, base.clone(), url_for(&base, term, page, per_package)).await
}

pub async fn run_open(config: &Config, location: &str) -> Result<()> {
    let base = config.server.base_url()?;
    let location = resolve_location(&base, location)?;
    run_session(config, base, location).await
}

/// Accept either an absolute URL or a path relative to the server.
fn resolve_location(base: &Url, location: &str) -> Result<Url> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(location)?,
        Err(e) => return Err(anyhow!("Invalid URL {}: {}", location, e)),
    };
    if parse_location(base, &url).is_none() {
        anyhow::bail!("{} does not name a search query", location);
    }
    Ok(url)
}

async fn run_session(config: &Config, base: Url, location: Url) -> Result<()> {
    info!(location = %location, "Opening search");

    let api = Arc::new(HttpResultsApi::new(base.clone())?);
    let transports = Arc::new(DefaultTransportFactory::new(
        base.clone(),
        config.transport.clone(),
    ));
    let view = TerminalView::new(base.clone(), std::io::stdout(), std::io::stderr());
    let mut session = QuerySession::new(
        config.session.clone(),
        base,
        api,
        transports,
        view,
        MemoryHistory::new(location),
    );

    if !session.boot() {
        anyhow::bail!("Location does not name a search query");
    }

    tokio::select! {
        result = session.run_until_complete() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            return Ok(());
        }
    }

    session.view_mut().finish()?;
    if session.state() == SessionState::Errored {
        anyhow::bail!("Query for {:?} failed", session.term());
    }
    info!(
        term = %session.term(),
        results = session.result_count(),
        "Query complete"
    );
    Ok(())
}
