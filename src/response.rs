//! Request and stored-response types shared by the cache and the network.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

/// An outgoing request as seen by the fetch interceptor.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers forwarded to the network on a cache miss.
    pub headers: HeaderMap,
    /// Request body, empty for `GET`.
    pub body: Bytes,
}

impl FetchRequest {
    /// Creates a bodiless `GET` request for `url`.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a request with an explicit method and body.
    #[must_use]
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// Returns the key this request would be stored under.
    #[must_use]
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

/// Normalizes a URL into a cache key. Fragments never take part in matching.
#[must_use]
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A stored (or freshly fetched) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    /// URL the response was fetched from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers in arrival order. Values that are not valid UTF-8 are dropped.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
    /// When the snapshot was written to a bucket, if it was.
    pub stored_at: Option<DateTime<Utc>>,
}

impl ResponseSnapshot {
    /// Creates a snapshot with no headers.
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
            stored_at: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for statuses in the 200-299 range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status >= 200 && self.status <= 299
    }

    /// Returns the first value of a header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Buffers a `reqwest` response into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be read.
    pub async fn from_response(response: reqwest::Response) -> crate::Result<Self> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(Self {
            url,
            status,
            headers,
            body,
            stored_at: None,
        })
    }

    /// Returns a copy stamped with the current time, ready to be stored.
    #[must_use]
    pub fn stamped(mut self) -> Self {
        self.stored_at = Some(Utc::now());
        self
    }
}
