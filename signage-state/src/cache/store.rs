//! Snapshot storage backends

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use signage_model::DisplaySlug;
use tracing::{debug, info};

use super::CachedSnapshot;
use crate::error::CacheError;

/// Single-slot-per-display snapshot storage.
///
/// `put` overwrites; there is no history.
pub trait SnapshotStore: Send + Sync {
    fn put(&self, key: &DisplaySlug, snapshot: &CachedSnapshot) -> Result<(), CacheError>;

    /// `Ok(None)` when nothing has been stored for `key`
    fn get(&self, key: &DisplaySlug) -> Result<Option<CachedSnapshot>, CacheError>;

    fn clear(&self, key: &DisplaySlug) -> Result<(), CacheError>;
}

/// One JSON file per display: `{dir}/{slug}.json`
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store in `dir`, creating the directory if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
            info!("Created snapshot directory: {}", dir.display());
        }
        Ok(Self { dir })
    }

    /// Open a store under the platform cache directory
    pub fn in_default_location() -> Result<Self, CacheError> {
        Self::new(Self::default_dir()?)
    }

    pub fn default_dir() -> Result<PathBuf, CacheError> {
        dirs::cache_dir()
            .map(|dir| dir.join("signage-sync").join("snapshots"))
            .ok_or(CacheError::NoCacheDir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &DisplaySlug) -> Result<PathBuf, CacheError> {
        if !key.is_valid() {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn put(&self, key: &DisplaySlug, snapshot: &CachedSnapshot) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(snapshot)?;

        fs::write(&tmp, json).map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))?;

        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }

    fn get(&self, key: &DisplaySlug) -> Result<Option<CachedSnapshot>, CacheError> {
        let path = self.path_for(key)?;

        let json = match fs::read(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let snapshot = serde_json::from_slice(&json)?;
        debug!("Loaded snapshot from {}", path.display());
        Ok(Some(snapshot))
    }

    fn clear(&self, key: &DisplaySlug) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed snapshot {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }
}

/// In-process store, for tests and players without writable storage
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: Mutex<HashMap<DisplaySlug, CachedSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, key: &DisplaySlug, snapshot: &CachedSnapshot) -> Result<(), CacheError> {
        self.slots.lock().insert(key.clone(), snapshot.clone());
        Ok(())
    }

    fn get(&self, key: &DisplaySlug) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn clear(&self, key: &DisplaySlug) -> Result<(), CacheError> {
        self.slots.lock().remove(key);
        Ok(())
    }
}
