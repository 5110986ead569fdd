//! In-memory cache storage. Lives as long as the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{Cache, CacheStorage, validate_bucket_name};
use crate::error::Result;
use crate::response::ResponseSnapshot;

/// A bucket held entirely in memory.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: Mutex<BTreeMap<String, ResponseSnapshot>>,
    installed: AtomicBool,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(BTreeMap::new()),
            installed: AtomicBool::new(false),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, ResponseSnapshot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &str) -> Result<Option<ResponseSnapshot>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn put_all(&self, entries: Vec<(String, ResponseSnapshot)>) -> Result<()> {
        self.entries().extend(entries);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries().remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries().keys().cloned().collect())
    }

    async fn mark_installed(&self) -> Result<()> {
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_installed(&self) -> Result<bool> {
        Ok(self.installed.load(Ordering::SeqCst))
    }
}

/// Process-local registry of [`MemoryCache`] buckets.
///
/// Clones share the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    buckets: Arc<Mutex<BTreeMap<String, Arc<MemoryCache>>>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<MemoryCache>>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        validate_bucket_name(name)?;
        let cache = Arc::clone(
            self.buckets()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryCache::new(name))),
        );
        Ok(cache as Arc<dyn Cache>)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.buckets().contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.buckets().remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.buckets().keys().cloned().collect())
    }
}
