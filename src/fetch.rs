//! Network abstraction for testability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::response::{FetchRequest, ResponseSnapshot};

/// Performs live network requests on behalf of the worker.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Sends `request` and buffers the response.
    ///
    /// Any HTTP status counts as a response; only transport failures are errors.
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot>;
}

/// Returns false for headers that must not be copied between hops.
#[must_use]
pub fn is_forwardable_header(name: &str) -> bool {
    const SKIPPED: [&str; 11] = [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "proxy-connection",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
        "host",
        "content-length",
    ];
    !SKIPPED.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// Default fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("zephyr-cache/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect)
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot> {
        let mut headers = request.headers.clone();
        let skipped: Vec<_> = headers
            .keys()
            .filter(|name| !is_forwardable_header(name.as_str()))
            .cloned()
            .collect();
        for name in skipped {
            headers.remove(name);
        }

        log::debug!("{} {}", request.method, request.url);
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await?;

        ResponseSnapshot::from_response(response).await
    }
}
