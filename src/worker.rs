//! The cache worker: install-time pre-population and cache-first fetch interception.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt, stream};
use reqwest::{Method, Url};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::response::{FetchRequest, ResponseSnapshot, cache_key};
use crate::storage::{CacheStorage, DiskStorage};

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, not yet installed.
    Parsed,
    /// Install in progress.
    Installing,
    /// Install succeeded; waiting for activation.
    Installed,
    /// Intercepting fetches.
    Activated,
    /// Install failed. The worker never activates.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Which tier answered a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Served from the cache bucket without touching the network.
    Cache,
    /// Fetched live. Never written back.
    Network,
}

/// Result of a fetch interception.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Tier that produced the response.
    pub source: FetchSource,
    /// The response, unmodified.
    pub response: ResponseSnapshot,
}

/// Trait for receiving install progress updates.
///
/// All methods have default no-op implementations.
pub trait InstallProgress: Send + Sync {
    /// Called once the bucket is open and fetching begins.
    fn on_install_start(&self, _cache_name: &str, _assets: usize) {}

    /// Called when an asset has been fetched successfully.
    fn on_asset_fetched(&self, _url: &str, _bytes: u64) {}

    /// Called when an asset fails. The install aborts after this.
    fn on_asset_failed(&self, _url: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl InstallProgress for NoProgress {}

/// Summary of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Bucket that was populated.
    pub cache_name: String,
    /// Number of entries written.
    pub entries: usize,
    /// Total body bytes written.
    pub total_bytes: u64,
    /// Wall time from bucket open to the last write.
    pub elapsed: Duration,
}

/// Pre-caches a fixed asset list and answers requests cache-first, then network.
pub struct CacheWorker<S: CacheStorage = DiskStorage, F: Fetcher = HttpFetcher> {
    storage: S,
    fetcher: F,
    config: CacheConfig,
    origin: Url,
    state: Mutex<LifecycleState>,
}

impl<S: CacheStorage, F: Fetcher> CacheWorker<S, F> {
    /// Creates a worker in the [`LifecycleState::Parsed`] state.
    #[must_use]
    pub const fn new(storage: S, fetcher: F, config: CacheConfig, origin: Url) -> Self {
        Self {
            storage,
            fetcher,
            config,
            origin,
            state: Mutex::new(LifecycleState::Parsed),
        }
    }

    /// Returns the storage service.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the network fetcher.
    #[must_use]
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns the cache configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the origin relative URLs resolve against.
    #[must_use]
    pub const fn origin(&self) -> &Url {
        &self.origin
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn transition(
        &self,
        operation: &'static str,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return Err(Error::Lifecycle {
                operation,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    /// Opens the bucket and stores every configured asset.
    ///
    /// All assets are fetched before anything is written, so a single failure
    /// leaves the bucket exactly as it was. The worker becomes
    /// [`LifecycleState::Installed`] on success and
    /// [`LifecycleState::Redundant`] on failure. There is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless the worker is freshly created,
    /// [`Error::Config`] for a malformed asset list, and [`Error::Install`]
    /// if any asset fails to fetch or answers outside 200-299.
    pub async fn install(&self, progress: &dyn InstallProgress) -> Result<InstallReport> {
        self.transition("install", LifecycleState::Parsed, LifecycleState::Installing)?;

        match self.populate(progress).await {
            Ok(report) => {
                self.set_state(LifecycleState::Installed);
                log::info!(
                    "Installed {} entries into {} in {:?}",
                    report.entries,
                    report.cache_name,
                    report.elapsed
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(LifecycleState::Redundant);
                log::error!("Install of {} failed: {e}", self.config.cache_name);
                Err(e)
            }
        }
    }

    async fn populate(&self, progress: &dyn InstallProgress) -> Result<InstallReport> {
        let urls = self.config.resolve_assets(&self.origin)?;
        let start = Instant::now();
        let cache = self.storage.open(&self.config.cache_name).await?;
        progress.on_install_start(cache.name(), urls.len());
        log::info!("Caching {} assets into {}", urls.len(), cache.name());

        let entries: Vec<(String, ResponseSnapshot)> = stream::iter(urls)
            .map(|url| self.fetch_asset(url, progress))
            .buffered(self.config.install_concurrency)
            .try_collect()
            .await?;

        let total_bytes = entries.iter().map(|(_, r)| r.body.len() as u64).sum();
        let count = entries.len();
        cache.put_all(entries).await?;
        cache.mark_installed().await?;

        Ok(InstallReport {
            cache_name: cache.name().to_string(),
            entries: count,
            total_bytes,
            elapsed: start.elapsed(),
        })
    }

    async fn fetch_asset(
        &self,
        url: Url,
        progress: &dyn InstallProgress,
    ) -> Result<(String, ResponseSnapshot)> {
        let key = cache_key(&url);
        let result = match self.fetcher.fetch(&FetchRequest::get(url)).await {
            Ok(response) if response.is_ok() => Ok(response),
            Ok(response) => Err(Error::Status {
                url: key.clone(),
                status: response.status,
            }),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                log::debug!("Fetched {key} ({} bytes)", response.body.len());
                progress.on_asset_fetched(&key, response.body.len() as u64);
                Ok((key, response.stamped()))
            }
            Err(e) => {
                progress.on_asset_failed(&key, &e.to_string());
                Err(Error::Install {
                    url: key,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Activates an installed worker so it starts intercepting fetches.
    ///
    /// Buckets from earlier versions are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless the worker is installed.
    pub fn activate(&self) -> Result<()> {
        self.transition("activate", LifecycleState::Installed, LifecycleState::Activated)?;
        log::info!("Worker for {} activated", self.config.cache_name);
        Ok(())
    }

    /// Picks up a worker that was installed in an earlier run.
    ///
    /// If the configured bucket was populated by a completed install the
    /// worker goes straight to [`LifecycleState::Activated`] and `true` is
    /// returned. Otherwise (no bucket, or only the empty bucket a failed
    /// install leaves behind) the worker is left untouched for a normal
    /// [`install`](Self::install).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] unless the worker is freshly created, or
    /// a storage error.
    pub async fn resume(&self) -> Result<bool> {
        let state = self.state();
        if state != LifecycleState::Parsed {
            return Err(Error::Lifecycle {
                operation: "resume",
                state,
            });
        }
        if !self.storage.has(&self.config.cache_name).await? {
            return Ok(false);
        }
        let cache = self.storage.open(&self.config.cache_name).await?;
        if !cache.is_installed().await? {
            log::warn!(
                "Bucket {} was never fully installed, installing again",
                self.config.cache_name
            );
            return Ok(false);
        }
        self.transition("resume", LifecycleState::Parsed, LifecycleState::Activated)?;
        log::info!("Resumed worker for existing bucket {}", self.config.cache_name);
        Ok(true)
    }

    /// Answers a request cache-first, then network.
    ///
    /// Only `GET` requests can match. A miss performs exactly one network
    /// request and returns its outcome unmodified; the live response is never
    /// stored. Until the worker is activated every request goes to the network.
    ///
    /// # Errors
    ///
    /// Storage failures and network failures on a miss are returned as-is.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        if self.state() == LifecycleState::Activated && request.method == Method::GET {
            if let Some(response) = self.lookup(&request.cache_key()).await? {
                log::debug!("Cache hit for {}", request.url);
                return Ok(FetchOutcome {
                    source: FetchSource::Cache,
                    response,
                });
            }
        }

        log::debug!("Cache miss for {} {}", request.method, request.url);
        let response = self.fetcher.fetch(request).await?;
        Ok(FetchOutcome {
            source: FetchSource::Network,
            response,
        })
    }

    /// Resolves `path` against the origin and runs it through [`handle_fetch`](Self::handle_fetch) as a `GET`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `path` does not resolve to a URL.
    pub async fn fetch_path(&self, path: &str) -> Result<FetchOutcome> {
        let url = self
            .origin
            .join(path)
            .map_err(|e| Error::Config(format!("invalid URL {path:?}: {e}")))?;
        self.handle_fetch(&FetchRequest::get(url)).await
    }

    /// Returns the keys currently stored in the worker's bucket.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn cached_keys(&self) -> Result<Vec<String>> {
        if !self.storage.has(&self.config.cache_name).await? {
            return Ok(Vec::new());
        }
        self.storage.open(&self.config.cache_name).await?.keys().await
    }

    async fn lookup(&self, key: &str) -> Result<Option<ResponseSnapshot>> {
        if !self.storage.has(&self.config.cache_name).await? {
            return Ok(None);
        }
        self.storage
            .open(&self.config.cache_name)
            .await?
            .match_key(key)
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::config::DEFAULT_ASSETS;
    use crate::storage::{Cache, MemoryStorage};

    pub(crate) const ORIGIN: &str = "http://app.test";

    /// Answers from a fixed route table and records every request.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        routes: HashMap<String, u16>,
        unreachable: Vec<String>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn serving_defaults() -> Self {
            let mut fetcher = Self::default();
            for asset in DEFAULT_ASSETS {
                fetcher = fetcher.route(asset, 200);
            }
            fetcher
        }

        pub(crate) fn route(mut self, path: &str, status: u16) -> Self {
            self.routes.insert(format!("{ORIGIN}{path}"), status);
            self
        }

        pub(crate) fn unreachable(mut self, path: &str) -> Self {
            self.unreachable.push(format!("{ORIGIN}{path}"));
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = request.url.to_string();
            self.seen.lock().unwrap().push(url.clone());

            if self.unreachable.contains(&url) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            let status = self.routes.get(&url).copied().unwrap_or(404);
            Ok(ResponseSnapshot::new(url.clone(), status, format!("{} {url}", request.method))
                .with_header("content-type", "text/plain"))
        }
    }

    pub(crate) fn worker(fetcher: FakeFetcher) -> CacheWorker<MemoryStorage, FakeFetcher> {
        CacheWorker::new(
            MemoryStorage::new(),
            fetcher,
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        )
    }

    pub(crate) async fn active_worker() -> CacheWorker<MemoryStorage, FakeFetcher> {
        let worker = worker(FakeFetcher::serving_defaults().route("/live", 200));
        worker.install(&NoProgress).await.unwrap();
        worker.activate().unwrap();
        worker
    }

    async fn bucket<F: Fetcher>(worker: &CacheWorker<MemoryStorage, F>) -> Arc<dyn Cache> {
        worker.storage().open("zephyr-cache-v1").await.unwrap()
    }

    fn expected_keys() -> Vec<String> {
        let mut keys: Vec<String> = DEFAULT_ASSETS
            .iter()
            .map(|a| Url::parse(ORIGIN).unwrap().join(a).unwrap().to_string())
            .collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn install_stores_exactly_the_asset_list() {
        let worker = worker(FakeFetcher::serving_defaults().route("/extra", 200));
        let report = worker.install(&NoProgress).await.unwrap();

        assert_eq!(worker.state(), LifecycleState::Installed);
        assert_eq!(report.cache_name, "zephyr-cache-v1");
        assert_eq!(report.entries, 6);
        assert_eq!(worker.fetcher().calls(), 6);
        assert!(bucket(&worker).await.is_installed().await.unwrap());
        assert_eq!(bucket(&worker).await.keys().await.unwrap(), expected_keys());
    }

    #[tokio::test]
    async fn cached_urls_are_served_without_network() {
        let worker = active_worker().await;
        let before = worker.fetcher().calls();

        for asset in DEFAULT_ASSETS {
            let outcome = worker.fetch_path(asset).await.unwrap();
            assert_eq!(outcome.source, FetchSource::Cache);
            assert_eq!(outcome.response.status, 200);
            assert_eq!(outcome.response.body, format!("GET {ORIGIN}{asset}"));
        }
        assert_eq!(worker.fetcher().calls(), before);
    }

    #[tokio::test]
    async fn miss_issues_one_request_and_returns_it_unmodified() {
        let worker = active_worker().await;
        let before = worker.fetcher().calls();

        let outcome = worker.fetch_path("/dashboard?date=2024-05-01").await.unwrap();
        assert_eq!(outcome.source, FetchSource::Network);
        assert_eq!(outcome.response.status, 404);
        assert_eq!(
            outcome.response.body,
            format!("GET {ORIGIN}/dashboard?date=2024-05-01")
        );
        assert_eq!(worker.fetcher().calls(), before + 1);
    }

    #[tokio::test]
    async fn live_results_are_not_written_back() {
        let worker = active_worker().await;

        let first = worker.fetch_path("/live").await.unwrap();
        assert_eq!(first.source, FetchSource::Network);
        assert_eq!(first.response.status, 200);

        assert_eq!(bucket(&worker).await.keys().await.unwrap(), expected_keys());
        let second = worker.fetch_path("/live").await.unwrap();
        assert_eq!(second.source, FetchSource::Network);
    }

    #[tokio::test]
    async fn one_failed_asset_leaves_bucket_empty() {
        let worker = worker(FakeFetcher::serving_defaults().unreachable("/static/icon-512.png"));
        let err = worker.install(&NoProgress).await.unwrap_err();

        assert!(err.is_install_failure());
        match err {
            Error::Install { url, .. } => assert_eq!(url, format!("{ORIGIN}/static/icon-512.png")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(worker.state(), LifecycleState::Redundant);
        assert!(worker.storage().has("zephyr-cache-v1").await.unwrap());
        assert!(bucket(&worker).await.keys().await.unwrap().is_empty());
        assert!(!bucket(&worker).await.is_installed().await.unwrap());
    }

    #[tokio::test]
    async fn non_ok_asset_fails_install() {
        let worker = worker(FakeFetcher::serving_defaults().route("/04_dashboard", 500));
        let err = worker.install(&NoProgress).await.unwrap_err();

        match err {
            Error::Install { source, .. } => {
                assert!(matches!(*source, Error::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(bucket(&worker).await.keys().await.unwrap().is_empty());
        assert!(worker.activate().is_err());
    }

    #[tokio::test]
    async fn repeated_hits_are_idempotent() {
        let worker = active_worker().await;
        let first = worker.fetch_path("/login").await.unwrap();
        let second = worker.fetch_path("/login").await.unwrap();

        assert_eq!(first.response, second.response);
        assert_eq!(second.source, FetchSource::Cache);
        assert_eq!(bucket(&worker).await.keys().await.unwrap(), expected_keys());
    }

    #[tokio::test]
    async fn non_get_requests_never_match() {
        let worker = active_worker().await;
        let url = Url::parse(ORIGIN).unwrap().join("/login").unwrap();
        let request = FetchRequest::new(
            Method::POST,
            url,
            reqwest::header::HeaderMap::new(),
            bytes::Bytes::from_static(b"username=admin"),
        );

        let outcome = worker.handle_fetch(&request).await.unwrap();
        assert_eq!(outcome.source, FetchSource::Network);
        assert_eq!(outcome.response.body, format!("POST {ORIGIN}/login"));
    }

    #[tokio::test]
    async fn fragment_does_not_defeat_cache() {
        let worker = active_worker().await;
        let outcome = worker.fetch_path("/login#top").await.unwrap();
        assert_eq!(outcome.source, FetchSource::Cache);
    }

    #[tokio::test]
    async fn network_failure_on_miss_propagates() {
        let worker = worker(FakeFetcher::serving_defaults().unreachable("/offline"));
        worker.install(&NoProgress).await.unwrap();
        worker.activate().unwrap();

        let err = worker.fetch_path("/offline").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn inactive_worker_passes_through() {
        let worker = worker(FakeFetcher::serving_defaults());
        worker.install(&NoProgress).await.unwrap();

        let outcome = worker.fetch_path("/login").await.unwrap();
        assert_eq!(outcome.source, FetchSource::Network);
    }

    #[tokio::test]
    async fn lifecycle_misuse_is_rejected() {
        let worker = worker(FakeFetcher::serving_defaults());
        assert!(matches!(
            worker.activate(),
            Err(Error::Lifecycle {
                operation: "activate",
                state: LifecycleState::Parsed
            })
        ));

        worker.install(&NoProgress).await.unwrap();
        assert!(matches!(
            worker.install(&NoProgress).await,
            Err(Error::Lifecycle {
                operation: "install",
                state: LifecycleState::Installed
            })
        ));

        worker.activate().unwrap();
        assert_eq!(worker.state(), LifecycleState::Activated);
        assert!(worker.activate().is_err());
    }

    #[tokio::test]
    async fn duplicate_assets_fail_before_any_fetch() {
        let worker = CacheWorker::new(
            MemoryStorage::new(),
            FakeFetcher::serving_defaults(),
            CacheConfig::new().with_assets(["/login", "/login"]),
            Url::parse(ORIGIN).unwrap(),
        );

        assert!(matches!(
            worker.install(&NoProgress).await,
            Err(Error::Config(_))
        ));
        assert_eq!(worker.fetcher().calls(), 0);
        assert_eq!(worker.state(), LifecycleState::Redundant);
    }

    #[tokio::test]
    async fn reinstall_keeps_stale_entries() {
        let storage = MemoryStorage::new();
        let stale = storage.open("zephyr-cache-v1").await.unwrap();
        stale
            .put(
                format!("{ORIGIN}/old.css"),
                ResponseSnapshot::new("old", 200, "old"),
            )
            .await
            .unwrap();

        let worker = CacheWorker::new(
            storage,
            FakeFetcher::serving_defaults(),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        worker.install(&NoProgress).await.unwrap();
        assert_eq!(worker.cached_keys().await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn resume_activates_existing_bucket() {
        let dir = TempDir::new().unwrap();

        let first = CacheWorker::new(
            DiskStorage::new(dir.path()),
            FakeFetcher::serving_defaults(),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        assert!(!first.resume().await.unwrap());
        first.install(&NoProgress).await.unwrap();

        let second = CacheWorker::new(
            DiskStorage::new(dir.path()),
            FakeFetcher::default(),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        assert!(second.resume().await.unwrap());
        assert_eq!(second.state(), LifecycleState::Activated);

        let outcome = second.fetch_path("/static/style.css").await.unwrap();
        assert_eq!(outcome.source, FetchSource::Cache);
        assert_eq!(second.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn failed_install_is_not_resumed_after_restart() {
        let dir = TempDir::new().unwrap();

        let first = CacheWorker::new(
            DiskStorage::new(dir.path()),
            FakeFetcher::serving_defaults().unreachable("/static/icon-512.png"),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        assert!(first.install(&NoProgress).await.is_err());
        assert!(first.storage().has("zephyr-cache-v1").await.unwrap());

        let second = CacheWorker::new(
            DiskStorage::new(dir.path()),
            FakeFetcher::serving_defaults(),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        assert!(!second.resume().await.unwrap());
        assert_eq!(second.state(), LifecycleState::Parsed);

        second.install(&NoProgress).await.unwrap();
        second.activate().unwrap();
        assert_eq!(second.cached_keys().await.unwrap(), expected_keys());

        let third = CacheWorker::new(
            DiskStorage::new(dir.path()),
            FakeFetcher::default(),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        assert!(third.resume().await.unwrap());
    }

    #[tokio::test]
    async fn resume_skips_memory_bucket_without_install() {
        let storage = MemoryStorage::new();
        storage.open("zephyr-cache-v1").await.unwrap();

        let worker = CacheWorker::new(
            storage,
            FakeFetcher::serving_defaults(),
            CacheConfig::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        assert!(!worker.resume().await.unwrap());
        assert_eq!(worker.state(), LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected_before_any_fetch() {
        let worker = CacheWorker::new(
            MemoryStorage::new(),
            FakeFetcher::serving_defaults(),
            CacheConfig::default().with_install_concurrency(0),
            Url::parse(ORIGIN).unwrap(),
        );

        assert!(matches!(
            worker.install(&NoProgress).await,
            Err(Error::Config(_))
        ));
        assert_eq!(worker.fetcher().calls(), 0);
        assert!(!worker.storage().has("zephyr-cache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn progress_reports_each_asset() {
        #[derive(Default)]
        struct Recorder {
            started: Mutex<Option<(String, usize)>>,
            fetched: AtomicUsize,
            failed: Mutex<Vec<String>>,
        }

        impl InstallProgress for Recorder {
            fn on_install_start(&self, cache_name: &str, assets: usize) {
                *self.started.lock().unwrap() = Some((cache_name.to_string(), assets));
            }
            fn on_asset_fetched(&self, _url: &str, _bytes: u64) {
                self.fetched.fetch_add(1, Ordering::SeqCst);
            }
            fn on_asset_failed(&self, url: &str, _error: &str) {
                self.failed.lock().unwrap().push(url.to_string());
            }
        }

        let recorder = Recorder::default();
        let worker = worker(FakeFetcher::serving_defaults());
        worker.install(&recorder).await.unwrap();

        assert_eq!(
            *recorder.started.lock().unwrap(),
            Some(("zephyr-cache-v1".to_string(), 6))
        );
        assert_eq!(recorder.fetched.load(Ordering::SeqCst), 6);
        assert!(recorder.failed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn install_fetches_in_asset_order_when_serial() {
        let worker = CacheWorker::new(
            MemoryStorage::new(),
            FakeFetcher::serving_defaults(),
            CacheConfig::default().with_install_concurrency(1),
            Url::parse(ORIGIN).unwrap(),
        );
        worker.install(&NoProgress).await.unwrap();

        let expected: Vec<String> = DEFAULT_ASSETS.iter().map(|a| format!("{ORIGIN}{a}")).collect();
        assert_eq!(worker.fetcher().seen(), expected);
    }
}
