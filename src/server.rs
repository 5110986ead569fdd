//! HTTP front that routes every request through the cache worker.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use reqwest::Url;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::fetch::{Fetcher, is_forwardable_header};
use crate::response::FetchRequest;
use crate::storage::CacheStorage;
use crate::worker::{CacheWorker, FetchOutcome, FetchSource};

/// Path answered by the front itself rather than proxied.
pub const HEALTH_PATH: &str = "/_zephyr/health";

/// Response header telling clients which tier answered.
pub const SOURCE_HEADER: &str = "x-zephyr-cache";

type SharedWorker<S, F> = Arc<CacheWorker<S, F>>;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    state: String,
}

async fn health<S, F>(State(worker): State<SharedWorker<S, F>>) -> impl IntoResponse
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        state: worker.state().to_string(),
    })
}

/// Maps an incoming path onto the origin. Never changes scheme or host.
fn upstream_url(origin: &Url, uri: &Uri) -> Url {
    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

async fn intercept<S, F>(
    State(worker): State<SharedWorker<S, F>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let url = upstream_url(worker.origin(), &uri);
    let request = FetchRequest::new(method, url, headers, body);

    match worker.handle_fetch(&request).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => {
            log::error!("{} {} failed: {e}", request.method, request.url);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

fn outcome_response(outcome: FetchOutcome) -> Response {
    let FetchOutcome { source, response } = outcome;
    let Ok(status) = StatusCode::from_u16(response.status) else {
        log::error!("{} answered with invalid status {}", response.url, response.status);
        return StatusCode::BAD_GATEWAY.into_response();
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in response
        .headers
        .iter()
        .filter(|(name, _)| is_forwardable_header(name))
    {
        builder = builder.header(name, value);
    }
    let tier = match source {
        FetchSource::Cache => "hit",
        FetchSource::Network => "miss",
    };

    builder
        .header(SOURCE_HEADER, tier)
        .body(Body::from(response.body))
        .unwrap_or_else(|e| {
            log::error!("Unforwardable response from {}: {e}", response.url);
            StatusCode::BAD_GATEWAY.into_response()
        })
}

/// Builds the router: the health endpoint plus a catch-all interceptor.
pub fn router<S, F>(worker: SharedWorker<S, F>) -> Router
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    Router::new()
        .route(HEALTH_PATH, get(health::<S, F>))
        .fallback(intercept::<S, F>)
        .with_state(worker)
}

/// Serves on an already-bound listener until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve_on<S, F>(
    listener: TcpListener,
    worker: SharedWorker<S, F>,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    log::info!(
        "Serving {} on http://{}",
        worker.origin(),
        listener.local_addr()?
    );
    axum::serve(listener, router(worker))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    log::info!("Server stopped");
    Ok(())
}

/// Binds to the configured address and serves until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve<S, F>(
    worker: SharedWorker<S, F>,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: CacheStorage + 'static,
    F: Fetcher + 'static,
{
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    serve_on(listener, worker, shutdown).await
}
