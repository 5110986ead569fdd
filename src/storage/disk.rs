//! Persistent cache storage on the local file system.
//!
//! Layout: `<root>/<bucket>/<sha256(key)>.toml` holds the entry metadata and
//! `<sha256(key)>.body` the raw body. An entry is visible once its `.toml`
//! file exists; both files are written to `.tmp` siblings first and renamed
//! into place. Entries being overwritten are moved to `.bak` siblings until
//! the whole batch has landed, so a failed batch can be put back.
//! A completed install leaves an `.installed` marker in the bucket directory.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Cache, CacheStorage, validate_bucket_name};
use crate::error::Result;
use crate::response::ResponseSnapshot;

const META_EXT: &str = "toml";
const BODY_EXT: &str = "body";
const INSTALLED_MARKER: &str = ".installed";

/// Metadata persisted next to each body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    url: String,
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stored_at: Option<DateTime<Utc>>,
    headers: Vec<(String, String)>,
}

/// Paths written for one staged entry.
struct Staged {
    meta_tmp: PathBuf,
    meta: PathBuf,
    meta_bak: PathBuf,
    body_tmp: PathBuf,
    body: PathBuf,
    body_bak: PathBuf,
}

/// Renames performed while committing a batch, undone in reverse on failure.
#[derive(Default)]
struct Journal {
    moves: Vec<(PathBuf, PathBuf)>,
    backups: Vec<PathBuf>,
}

impl Journal {
    async fn rename(&mut self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await?;
        self.moves.push((from.to_path_buf(), to.to_path_buf()));
        Ok(())
    }

    /// Moves an existing entry file aside. Anything that is not a regular
    /// file is left where it is.
    async fn back_up(&mut self, path: &Path, bak: &Path) -> std::io::Result<()> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_file() => {
                self.rename(path, bak).await?;
                self.backups.push(bak.to_path_buf());
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn roll_back(self) {
        for (from, to) in self.moves.into_iter().rev() {
            if let Err(e) = tokio::fs::rename(&to, &from).await {
                log::error!(
                    "Failed to roll back {} -> {}: {e}",
                    to.display(),
                    from.display()
                );
            }
        }
    }

    async fn forget_backups(self) {
        for bak in self.backups {
            let _ = tokio::fs::remove_file(&bak).await;
        }
    }
}

fn entry_stem(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// A bucket stored as a directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    name: String,
    dir: PathBuf,
}

impl DiskCache {
    /// Returns the directory backing this bucket.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn meta_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{META_EXT}"))
    }

    fn body_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{BODY_EXT}"))
    }

    async fn stage(&self, key: &str, response: &ResponseSnapshot) -> Result<Staged> {
        let stem = entry_stem(key);
        let meta = EntryMeta {
            key: key.to_string(),
            url: response.url.clone(),
            status: response.status,
            stored_at: response.stored_at,
            headers: response.headers.clone(),
        };
        let toml_str = toml::to_string(&meta)?;

        let staged = Staged {
            meta_tmp: self.dir.join(format!("{stem}.{META_EXT}.tmp")),
            meta: self.meta_path(&stem),
            meta_bak: self.dir.join(format!("{stem}.{META_EXT}.bak")),
            body_tmp: self.dir.join(format!("{stem}.{BODY_EXT}.tmp")),
            body: self.body_path(&stem),
            body_bak: self.dir.join(format!("{stem}.{BODY_EXT}.bak")),
        };

        tokio::fs::write(&staged.body_tmp, &response.body).await?;
        tokio::fs::write(&staged.meta_tmp, toml_str).await?;
        Ok(staged)
    }

    async fn discard(staged: &[Staged]) {
        for s in staged {
            let _ = tokio::fs::remove_file(&s.body_tmp).await;
            let _ = tokio::fs::remove_file(&s.meta_tmp).await;
        }
    }

    async fn commit(staged: &[Staged], journal: &mut Journal) -> std::io::Result<()> {
        // Body before metadata, so a visible entry always has its body.
        for s in staged {
            journal.back_up(&s.meta, &s.meta_bak).await?;
            journal.back_up(&s.body, &s.body_bak).await?;
            journal.rename(&s.body_tmp, &s.body).await?;
            journal.rename(&s.meta_tmp, &s.meta).await?;
        }
        Ok(())
    }

    async fn read_meta(path: &Path) -> Result<Option<EntryMeta>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(toml::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &str) -> Result<Option<ResponseSnapshot>> {
        let stem = entry_stem(key);
        let Some(meta) = Self::read_meta(&self.meta_path(&stem)).await? else {
            return Ok(None);
        };

        let body = match tokio::fs::read(self.body_path(&stem)).await {
            Ok(body) => Bytes::from(body),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("Cache entry {key} in {} has no body, ignoring", self.name);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(ResponseSnapshot {
            url: meta.url,
            status: meta.status,
            headers: meta.headers,
            body,
            stored_at: meta.stored_at,
        }))
    }

    async fn put_all(&self, entries: Vec<(String, ResponseSnapshot)>) -> Result<()> {
        // Last write wins for a key repeated within the batch.
        let entries: BTreeMap<String, ResponseSnapshot> = entries.into_iter().collect();
        let mut staged = Vec::with_capacity(entries.len());
        for (key, response) in &entries {
            match self.stage(key, response).await {
                Ok(s) => staged.push(s),
                Err(e) => {
                    log::error!("Failed to stage {key} into {}: {e}", self.name);
                    Self::discard(&staged).await;
                    return Err(e);
                }
            }
        }

        let mut journal = Journal::default();
        match Self::commit(&staged, &mut journal).await {
            Ok(()) => {
                journal.forget_backups().await;
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to commit batch into {}: {e}", self.name);
                journal.roll_back().await;
                Self::discard(&staged).await;
                Err(e.into())
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let stem = entry_stem(key);
        let existed = match tokio::fs::remove_file(self.meta_path(&stem)).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        let _ = tokio::fs::remove_file(self.body_path(&stem)).await;
        Ok(existed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == META_EXT) {
                if let Some(meta) = Self::read_meta(&path).await? {
                    keys.push(meta.key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn mark_installed(&self) -> Result<()> {
        let marker = self.dir.join(INSTALLED_MARKER);
        let tmp = self.dir.join(format!("{INSTALLED_MARKER}.tmp"));
        tokio::fs::write(&tmp, Utc::now().to_rfc3339()).await?;
        tokio::fs::rename(&tmp, &marker).await?;
        Ok(())
    }

    async fn is_installed(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.dir.join(INSTALLED_MARKER)).await?)
    }
}

/// Registry of [`DiskCache`] buckets under a root directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        validate_bucket_name(name)?;
        let dir = self.root.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        log::debug!("Opened cache bucket {name} at {}", dir.display());
        Ok(Arc::new(DiskCache {
            name: name.to_string(),
            dir,
        }))
    }

    async fn has(&self, name: &str) -> Result<bool> {
        if validate_bucket_name(name).is_err() {
            return Ok(false);
        }
        match tokio::fs::metadata(self.root.join(name)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        if !self.has(name).await? {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(self.root.join(name)).await?;
        log::info!("Deleted cache bucket {name}");
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_bucket_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
