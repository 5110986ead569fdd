//! Configuration types for the cache worker, network, storage and server.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::response::cache_key;

/// Name of the bucket the worker installs into. Bump it whenever the asset list changes.
pub const DEFAULT_CACHE_NAME: &str = "zephyr-cache-v1";

/// Assets pre-cached on install, relative to the origin.
pub const DEFAULT_ASSETS: [&str; 6] = [
    "/",
    "/login",
    "/04_dashboard",
    "/static/style.css",
    "/static/icon-192.png",
    "/static/icon-512.png",
];

/// Configuration for the cache bucket and its pre-cached assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache bucket.
    pub cache_name: String,
    /// URLs fetched and stored on install, in order.
    pub assets: Vec<String>,
    /// Number of asset fetches in flight during install.
    pub install_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            assets: DEFAULT_ASSETS.iter().map(ToString::to_string).collect(),
            install_concurrency: 4,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bucket name.
    #[must_use]
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Replaces the asset list.
    #[must_use]
    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the number of concurrent install fetches.
    #[must_use]
    pub const fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.install_concurrency = concurrency;
        self
    }

    /// Resolves every asset against `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an asset cannot be parsed, is not http(s),
    /// or resolves to the same cache key as an earlier asset, and when
    /// `install_concurrency` is zero.
    pub fn resolve_assets(&self, origin: &Url) -> Result<Vec<Url>> {
        if self.install_concurrency == 0 {
            return Err(Error::Config(
                "install_concurrency must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        self.assets
            .iter()
            .map(|asset| {
                let url = origin
                    .join(asset)
                    .map_err(|e| Error::Config(format!("invalid asset {asset:?}: {e}")))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(Error::Config(format!(
                        "asset {asset:?} must use http or https"
                    )));
                }
                if !seen.insert(cache_key(&url)) {
                    return Err(Error::Config(format!("duplicate asset {url}")));
                }
                Ok(url)
            })
            .collect()
    }
}

/// Network configuration for talking to the application origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL that relative assets and proxied paths resolve against.
    pub origin: String,
    /// Whether network fetches follow redirects.
    pub follow_redirects: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:5000".to_string(),
            follow_redirects: true,
        }
    }
}

impl NetworkConfig {
    /// Parses the configured origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin)
            .map_err(|e| Error::Config(format!("invalid origin {:?}: {e}", self.origin)))
    }
}

/// Path configuration for persistent cache storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory holding one subdirectory per cache bucket.
    pub storage_dir: PathBuf,
}

impl Default for PathConfig {
    /// Uses `STATE_DIRECTORY` (set by systemd when `StateDirectory=` is configured),
    /// falling back to `$XDG_DATA_HOME/zephyr-cache`.
    fn default() -> Self {
        let base = std::env::var("STATE_DIRECTORY").map_or_else(
            |_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("zephyr-cache")
            },
            PathBuf::from,
        );

        Self {
            storage_dir: base.join("caches"),
        }
    }
}

/// HTTP front configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cache bucket and asset list.
    pub cache: CacheConfig,
    /// Origin settings.
    pub network: NetworkConfig,
    /// Storage paths.
    pub paths: PathConfig,
    /// HTTP front settings.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zephyr-cache")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}
