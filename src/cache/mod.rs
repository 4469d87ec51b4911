//! Generic three-tier read-through cache: process memory → disk → source (§4.4).

pub mod preload;

use crate::error::{CacheError, Error};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub use preload::{preload, PreloadReport};

#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    cache_fetch_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope<T> {
    metadata: CacheMetadata,
    data: T,
}

/// A value retrieved from the cache, paired with when it was last fetched
/// from source (surfaced so callers can stamp `Timetable::cache_fetch_at`).
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub data: Arc<T>,
    pub cache_fetch_at: DateTime<Utc>,
}

/// Keep only alphanumerics, `-`, `_`; two raw keys that collide after
/// sanitisation are a caller error, not something this function can detect
/// (§4.4).
pub fn safe_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// A parameterised three-tier cache for one logical entity kind (index, or
/// timetables). One instance is shared across all keys of that kind; the
/// memory tier is a single process-wide map.
pub struct ReadThroughCache<T> {
    memory: DashMap<String, Cached<T>>,
    dir: PathBuf,
}

impl<T> ReadThroughCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ReadThroughCache {
            memory: DashMap::new(),
            dir: dir.into(),
        }
    }

    fn file_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Read-through fetch keyed by `(cache_key, file_name)`. `source` is only
    /// invoked on a cache miss (or when `refresh` bypasses both tiers).
    pub async fn fetch<F, Fut>(
        &self,
        cache_key: &str,
        file_name: &str,
        refresh: bool,
        source: F,
    ) -> Result<Cached<T>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        if !refresh {
            if let Some(hit) = self.memory.get(cache_key) {
                debug!(cache_key, "memory cache hit");
                return Ok(hit.clone());
            }
            if let Some(cached) = self.read_file(file_name).await {
                self.memory.insert(cache_key.to_owned(), cached.clone());
                debug!(cache_key, "file cache hit");
                return Ok(cached);
            }
        }

        let data = source().await?;
        let cache_fetch_at = self.write_file(file_name, &data).await?;
        let cached = Cached {
            data: Arc::new(data),
            cache_fetch_at,
        };
        self.memory.insert(cache_key.to_owned(), cached.clone());
        Ok(cached)
    }

    /// A malformed or missing file is treated as absent, never as an error —
    /// the caller falls through to source (§4.4).
    async fn read_file(&self, file_name: &str) -> Option<Cached<T>> {
        let path = self.file_path(file_name);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_path_to_error::deserialize::<_, CacheEnvelope<T>>(&mut serde_json::Deserializer::from_slice(&bytes))
        {
            Ok(envelope) => Some(Cached {
                data: Arc::new(envelope.data),
                cache_fetch_at: envelope.metadata.cache_fetch_at,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed cache file, treating as absent");
                None
            }
        }
    }

    async fn write_file(&self, file_name: &str, data: &T) -> Result<DateTime<Utc>, CacheError> {
        let cache_fetch_at = Utc::now();
        let envelope = CacheEnvelope {
            metadata: CacheMetadata { cache_fetch_at },
            data,
        };
        let path = self.file_path(file_name);
        write_durable(&path, &envelope).await?;
        Ok(cache_fetch_at)
    }
}

/// Serialise to a temp file in the same directory, then rename into place,
/// so a crash mid-write never leaves a partially-written cache file (§4.4).
async fn write_durable<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Serialize {
        path: path.to_owned(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| CacheError::Write { path: path.to_owned(), source })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|source| CacheError::Write { path: path.to_owned(), source })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| CacheError::Write { path: path.to_owned(), source })?;
    Ok(())
}
