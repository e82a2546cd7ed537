use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::proxy::CacheProxy;
use crate::types::{ErrorResponse, FetchOutcome, HealthResponse, ProxyResponse};
use crate::upstream::{is_hop_by_hop, HttpUpstream};

/// Largest request body forwarded upstream.
const MAX_FORWARD_BODY: usize = 2 * 1024 * 1024;

/// Response header naming how the proxy answered.
pub const CACHE_HEADER: &str = "x-instant-cache";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<CacheProxy>,
    /// Target for requests the cache does not answer.
    pub upstream: Arc<HttpUpstream>,
}

/// Create the Axum router: `/health` plus interception of everything else.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the proxy server
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!(addr = %addr, "Starting cache proxy");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Cache proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_version: state.proxy.manifest().version.clone(),
    })
}

async fn handle_request(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    match state.proxy.on_fetch(&method, &path, query.as_deref()).await {
        Ok(FetchOutcome::Cached(response)) => to_response(response, "hit"),
        Ok(FetchOutcome::Placeholder(response)) => to_response(response, "placeholder"),
        Ok(FetchOutcome::Network(response)) => to_response(response, "miss"),
        Ok(FetchOutcome::PassThrough) => forward(&state.upstream, req).await,
        Err(e) => {
            warn!(path = %path, error = %e, "Intercepted request failed");
            bad_gateway(format!("{:#}", e))
        }
    }
}

fn bad_gateway(error: String) -> Response {
    (StatusCode::BAD_GATEWAY, Json(ErrorResponse { error })).into_response()
}

fn to_response(response: ProxyResponse, source: &'static str) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers.insert(CACHE_HEADER, HeaderValue::from_static(source));

    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

/// Stream a request through to the upstream unchanged.
async fn forward(upstream: &HttpUpstream, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let url = match upstream.url_for(path_and_query) {
        Ok(url) => url,
        Err(e) => return bad_gateway(e.to_string()),
    };
    let body = match to_bytes(body, MAX_FORWARD_BODY).await {
        Ok(body) => body,
        Err(e) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    };

    let mut headers = parts.headers;
    headers.remove(axum::http::header::HOST);
    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name.as_str()))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(name);
    }

    let response = match upstream
        .client()
        .request(parts.method, url.clone())
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %url, error = %e, "Upstream request failed");
            return bad_gateway(format!("Upstream request failed: {}", e));
        }
    };

    let status = response.status();
    let mut out_headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if !is_hop_by_hop(name.as_str()) {
            out_headers.append(name.clone(), value.clone());
        }
    }

    let mut out = Response::new(Body::from_stream(response.bytes_stream()));
    *out.status_mut() = status;
    *out.headers_mut() = out_headers;
    out
}
