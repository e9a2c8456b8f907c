//! Product memory: write-once store of computed classification results.
//!
//! Entries are keyed by the normalized ingredient text. Once an entry exists it
//! is never replaced; a second insert for the same key is a silent no-op so two
//! racing requests for the same text both succeed. An entry that cannot be read
//! back (truncated or empty file) counts as absent and may be rewritten.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::types::{ClassificationResult, MemoryEntry};

/// Lookup/insert of previously computed results.
#[async_trait]
pub trait MemoryCache: Send + Sync {
    /// Find the stored entry for `key`, if any.
    async fn lookup(&self, key: &str) -> Result<Option<MemoryEntry>, StoreError>;

    /// Store `result` under `key` unless an entry already exists.
    async fn insert(&self, key: &str, result: &ClassificationResult) -> Result<(), StoreError>;
}

/// Process-local memory, used by tests and the CLI's `--no-cache` mode.
#[derive(Debug, Default)]
pub struct InMemoryMemory {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryCache for InMemoryMemory {
    async fn lookup(&self, key: &str) -> Result<Option<MemoryEntry>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn insert(&self, key: &str, result: &ClassificationResult) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry::new(key, result));
        Ok(())
    }
}

/// Disk-backed memory: one JSON file per entry.
///
/// Layout: `{cache_dir}/{hash[0:2]}/{hash}.json` where `hash` is the SHA-256 of the key.
#[derive(Debug, Clone)]
pub struct DiskMemory {
    cache_dir: PathBuf,
}

impl DiskMemory {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Default directory: ~/.vegancheck/memory
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".vegancheck").join("memory"))
            .unwrap_or_else(|| PathBuf::from("data/memory"))
    }

    /// Where the entry for `key` lives on disk.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        self.cache_dir
            .join(&hash[..2])
            .join(format!("{}.json", hash))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        fn count_json_files(dir: &std::path::Path, count: &mut usize) {
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.filter_map(|e| e.ok()) {
                    let path = entry.path();
                    if path.is_dir() {
                        count_json_files(&path, count);
                    } else if path.extension().is_some_and(|ext| ext == "json") {
                        *count += 1;
                    }
                }
            }
        }

        let mut count = 0;
        count_json_files(&self.cache_dir, &mut count);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// True when `path` holds a parseable entry, whatever key it belongs to.
fn is_intact(path: &Path) -> Result<bool, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str::<MemoryEntry>(&content).is_ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Write `contents` to a temp file beside `path`, then link it into place.
///
/// The entry becomes visible only once fully written. An existing intact entry
/// wins; an unreadable one is replaced.
fn write_entry(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Unavailable(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    let err = match tmp.persist_noclobber(path) {
        Ok(_) => return Ok(()),
        Err(err) if err.error.kind() == ErrorKind::AlreadyExists => err,
        Err(err) => return Err(err.error.into()),
    };

    if is_intact(path)? {
        tracing::debug!(path = %path.display(), "Memory entry already exists, keeping original");
        return Ok(());
    }

    tracing::warn!(path = %path.display(), "Replacing unreadable memory entry");
    err.file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl MemoryCache for DiskMemory {
    async fn lookup(&self, key: &str) -> Result<Option<MemoryEntry>, StoreError> {
        let path = self.entry_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: MemoryEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Unreadable memory entry, treating as a miss"
                );
                return Ok(None);
            }
        };
        // Guard against hash collisions.
        if entry.ingredient_text != key {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn insert(&self, key: &str, result: &ClassificationResult) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        let json = serde_json::to_string_pretty(&MemoryEntry::new(key, result))?;

        tokio::task::spawn_blocking(move || write_entry(&path, json.as_bytes()))
            .await
            .map_err(|e| StoreError::Unavailable(format!("memory write task failed: {}", e)))?
    }
}
