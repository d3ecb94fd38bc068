//! Artwork cache: one fetch per image key, results kept on disk.
//!
//! The cache itself is plain bookkeeping owned by the synchronizer. The
//! network fetch and file write happen in [`fetch_to_disk`], which runs as a
//! spawned task and reports back through the event channel. A key is marked
//! pending before the fetch is issued, so a second request for the same key
//! while the first is in flight does not start another fetch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::adapters::traits::{ImageRequest, ImageSource};
use crate::error::{SyncError, SyncResult};

#[derive(Debug)]
enum Entry {
    Pending,
    Resolved(PathBuf),
}

/// Outcome of a cache lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Resolved and still on disk
    Hit(String),
    /// Caller must start the fetch; the key is now pending
    Fetch,
    /// Another fetch for this key is already running
    InFlight,
    /// Cache directory unusable, no artwork at all
    Disabled,
}

#[derive(Debug)]
pub struct ArtworkCache {
    dir: Option<PathBuf>,
    entries: HashMap<String, Entry>,
}

impl ArtworkCache {
    /// Create the cache, creating `dir` if needed. If the directory cannot be
    /// created the cache stays disabled for the life of the process.
    pub fn new(dir: PathBuf) -> Self {
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                debug!("Artwork cache at {}", dir.display());
                Self {
                    dir: Some(dir),
                    entries: HashMap::new(),
                }
            }
            Err(e) => {
                let err = SyncError::CacheUnavailable(format!("{}: {}", dir.display(), e));
                warn!("{}", err);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: None,
            entries: HashMap::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn lookup(&mut self, key: &str) -> Lookup {
        if self.dir.is_none() {
            return Lookup::Disabled;
        }

        match self.entries.get(key) {
            Some(Entry::Pending) => return Lookup::InFlight,
            Some(Entry::Resolved(path)) if path.exists() => {
                if let Some(uri) = file_uri(path) {
                    return Lookup::Hit(uri);
                }
            }
            // Resolved but deleted from disk behind our back: fetch again
            Some(Entry::Resolved(_)) | None => {}
        }

        self.entries.insert(key.to_string(), Entry::Pending);
        Lookup::Fetch
    }

    /// Record a finished fetch and return the file URI on success. Failures
    /// are forgotten so the next lookup retries.
    pub fn complete(&mut self, key: &str, result: SyncResult<PathBuf>) -> Option<String> {
        match result {
            Ok(path) => {
                let uri = file_uri(&path);
                self.entries.insert(key.to_string(), Entry::Resolved(path));
                uri
            }
            Err(e) => {
                warn!("{}", e);
                self.entries.remove(key);
                None
            }
        }
    }
}

/// Fetch one image and persist it under `dir`. Returns the written path.
pub async fn fetch_to_disk(
    images: &dyn ImageSource,
    dir: &Path,
    key: &str,
    request: ImageRequest,
) -> SyncResult<PathBuf> {
    let failed = |reason: String| SyncError::ArtworkFetchFailed {
        key: key.to_string(),
        reason,
    };

    let image = images
        .fetch(key, request)
        .await
        .map_err(|e| failed(e.to_string()))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| failed(format!("create {}: {}", dir.display(), e)))?;

    let path = dir.join(file_name_for(key, &image.content_type));
    tokio::fs::write(&path, &image.data)
        .await
        .map_err(|e| failed(format!("write {}: {}", path.display(), e)))?;

    debug!(
        image_key = key,
        bytes = image.data.len(),
        "Cached artwork at {}",
        path.display()
    );
    Ok(path)
}

/// File name for an image key. Hex keeps distinct keys on distinct files.
pub fn file_name_for(key: &str, content_type: &str) -> String {
    let ext = if content_type.eq_ignore_ascii_case("image/png") {
        "png"
    } else {
        "jpg"
    };
    format!("{}.{}", hex::encode(key.as_bytes()), ext)
}

fn file_uri(path: &Path) -> Option<String> {
    url::Url::from_file_path(path).ok().map(|u| u.to_string())
}
