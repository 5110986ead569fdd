//! zephyr-cache - an offline cache worker for a web application.
//!
//! On install the worker opens a named cache bucket and stores a fixed list of
//! assets fetched from the origin; afterwards it answers requests cache-first,
//! falling back to the network without writing live results back.
//!
//! # Example
//!
//! ```no_run
//! use zephyr_cache::{CacheConfig, CacheWorker, DiskStorage, HttpFetcher, NetworkConfig, NoProgress};
//!
//! # async fn example() -> zephyr_cache::Result<()> {
//! let network = NetworkConfig::default();
//! let worker = CacheWorker::new(
//!     DiskStorage::new("/var/lib/zephyr-cache/caches"),
//!     HttpFetcher::new(&network)?,
//!     CacheConfig::default(),
//!     network.origin_url()?,
//! );
//!
//! // Pre-cache the asset list, then start intercepting
//! worker.install(&NoProgress).await?;
//! worker.activate()?;
//!
//! let outcome = worker.fetch_path("/static/style.css").await?;
//! println!("{:?} {}", outcome.source, outcome.response.status);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod response;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;
pub mod worker;

// Re-export main types for convenience
pub use config::{
    AppConfig, CacheConfig, DEFAULT_ASSETS, DEFAULT_CACHE_NAME, NetworkConfig, PathConfig,
    ServerConfig,
};
pub use error::{Error, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use response::{FetchRequest, ResponseSnapshot};
pub use storage::{Cache, CacheStorage, DiskCache, DiskStorage, MemoryCache, MemoryStorage};
pub use worker::{
    CacheWorker, FetchOutcome, FetchSource, InstallProgress, InstallReport, LifecycleState,
    NoProgress,
};
