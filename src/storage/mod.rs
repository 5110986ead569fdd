//! Named cache buckets and the storage service that owns them.
//!
//! The worker never reaches for an ambient global: a [`CacheStorage`] handle is
//! passed in explicitly and buckets are opened through it by name.

mod disk;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::response::ResponseSnapshot;

pub use disk::{DiskCache, DiskStorage};
pub use memory::{MemoryCache, MemoryStorage};

/// A single named key-value store mapping request URLs to stored responses.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the bucket name.
    fn name(&self) -> &str;

    /// Looks up a stored response by cache key.
    async fn match_key(&self, key: &str) -> Result<Option<ResponseSnapshot>>;

    /// Stores a batch of entries. Either every entry becomes visible or none does.
    async fn put_all(&self, entries: Vec<(String, ResponseSnapshot)>) -> Result<()>;

    /// Removes one entry, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Returns every stored key, sorted.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Records that a complete install populated this bucket.
    async fn mark_installed(&self) -> Result<()>;

    /// Returns whether [`mark_installed`](Self::mark_installed) has been called.
    /// An empty bucket left behind by a failed install reports `false`.
    async fn is_installed(&self) -> Result<bool>;

    /// Stores a single entry, replacing any previous one under the same key.
    async fn put(&self, key: String, response: ResponseSnapshot) -> Result<()> {
        self.put_all(vec![(key, response)]).await
    }
}

/// Registry of named buckets.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens a bucket, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>>;

    /// Returns whether a bucket with this name exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Deletes a bucket and all its entries, returning whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Returns the names of all buckets, sorted.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Checks that a bucket name is non-empty and limited to `[A-Za-z0-9._-]`.
///
/// # Errors
///
/// Returns [`Error::InvalidBucketName`] otherwise. `.` and `..` are rejected too.
pub fn validate_bucket_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidBucketName(name.to_string()))
    }
}
