//! Disk-backed cache storage
//!
//! Each cache is a directory under the storage root. An entry is one file
//! named by the SHA256 of its request key, `<digest>.entry`: a single line of
//! JSON metadata, a newline, then the raw body. The file is written under a
//! temporary name and renamed into place, so readers see either the old
//! entry or the new one and concurrent writers of one key never mix.

use crate::error::{CacheError, CacheResult};
use crate::request::{RequestKey, Response};
use crate::store::{validate_cache_name, CacheEntry, CacheStorage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use uuid::Uuid;

const ENTRY_EXTENSION: &str = "entry";

/// Entry metadata stored ahead of the body
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    url: String,
    body_len: u64,
    stored_at: DateTime<Utc>,
}

/// Persistent cache storage rooted at a directory
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, name: &str) -> CacheResult<PathBuf> {
        validate_cache_name(name)?;
        Ok(self.root.join(name))
    }

    fn entry_path(dir: &Path, key: &RequestKey) -> PathBuf {
        dir.join(format!("{}.{}", key.digest(), ENTRY_EXTENSION))
    }

    async fn is_dir(path: &Path) -> CacheResult<bool> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(format!("checking {}", path.display()), e)),
        }
    }

    fn corrupt(path: &Path, reason: impl Into<String>) -> CacheError {
        CacheError::CorruptEntry {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Split an entry file into its metadata and body
    fn decode(path: &Path, content: Vec<u8>) -> CacheResult<(EntryMeta, Vec<u8>)> {
        let split = content
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| Self::corrupt(path, "missing metadata header"))?;
        let meta: EntryMeta = serde_json::from_slice(&content[..split])
            .map_err(|e| Self::corrupt(path, e.to_string()))?;
        let body = content[split + 1..].to_vec();

        if body.len() as u64 != meta.body_len {
            return Err(Self::corrupt(
                path,
                format!("expected {} bytes, found {}", meta.body_len, body.len()),
            ));
        }
        Ok((meta, body))
    }

    /// Read only the metadata line of an entry file
    async fn read_meta(path: &Path) -> CacheResult<Option<EntryMeta>> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(format!("reading {}", path.display()), e)),
        };

        let mut header = vec![];
        BufReader::new(file)
            .read_until(b'\n', &mut header)
            .await
            .map_err(|e| CacheError::io(format!("reading {}", path.display()), e))?;
        if header.last() != Some(&b'\n') {
            return Err(Self::corrupt(path, "missing metadata header"));
        }

        serde_json::from_slice(&header[..header.len() - 1])
            .map(Some)
            .map_err(|e| Self::corrupt(path, e.to_string()))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> CacheResult<()> {
        let dir = self.cache_dir(name)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("creating cache {}", dir.display()), e))
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(CacheError::io("reading storage directory", e)),
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io("reading storage entry", e))?
        {
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_cache_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Self::is_dir(&self.cache_dir(name)?).await
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let dir = self.cache_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Deleted cache directory {}", dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(format!("deleting cache {}", dir.display()), e)),
        }
    }

    async fn get(&self, name: &str, key: &RequestKey) -> CacheResult<Option<CacheEntry>> {
        let path = Self::entry_path(&self.cache_dir(name)?, key);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(format!("reading {}", path.display()), e)),
        };

        let (meta, body) = Self::decode(&path, content)?;
        Ok(Some(CacheEntry {
            key: meta.key,
            response: Response {
                status: meta.status,
                headers: meta.headers,
                body,
                url: meta.url,
            },
            stored_at: meta.stored_at,
        }))
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> CacheResult<()> {
        let dir = self.cache_dir(name)?;
        let path = Self::entry_path(&dir, key);

        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            url: response.url.clone(),
            body_len: response.body.len() as u64,
            stored_at: Utc::now(),
        };
        let mut content = serde_json::to_vec(&meta)?;
        content.push(b'\n');
        content.extend_from_slice(&response.body);

        // Written inside the cache directory, so a retired cache stays gone
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&tmp, &content).await {
            if e.kind() == ErrorKind::NotFound {
                return Err(CacheError::CacheNotFound(name.to_string()));
            }
            return Err(CacheError::io(format!("writing {}", tmp.display()), e));
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            if e.kind() == ErrorKind::NotFound {
                return Err(CacheError::CacheNotFound(name.to_string()));
            }
            return Err(CacheError::io(format!("renaming into {}", path.display()), e));
        }

        debug!("Stored {} in {} ({} bytes)", key, name, response.body.len());
        Ok(())
    }

    async fn keys(&self, name: &str) -> CacheResult<Vec<RequestKey>> {
        let dir = self.cache_dir(name)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(CacheError::io(format!("reading cache {}", dir.display()), e)),
        };

        let mut keys = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io("reading cache entry", e))?
        {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_meta(&path).await {
                Ok(Some(meta)) => keys.push(meta.key),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache entry: {}", e),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
