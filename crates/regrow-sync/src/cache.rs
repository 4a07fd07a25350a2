//! Local cache of the last known state.
//!
//! The cache only exists so a signed-in user sees their tree immediately
//! after a restart while the remote record is re-fetched. It is never
//! consulted for guests and never treated as the source of truth.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use regrow_progress::ProgressState;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::UserKey;

/// Format version written into the cache file.
pub const CACHE_VERSION: u32 = 1;

/// Best-effort mirror of the last settled state.
pub trait LocalCache: Send + Sync + 'static {
    /// Remember `state` as the latest for `user`.
    fn write(&self, user: &UserKey, state: &ProgressState) -> Result<()>;

    /// The last state written for `user`, if any.
    fn read(&self, user: &UserKey) -> Result<Option<ProgressState>>;
}

/// A cache that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl LocalCache for NoCache {
    fn write(&self, _user: &UserKey, _state: &ProgressState) -> Result<()> {
        Ok(())
    }

    fn read(&self, _user: &UserKey) -> Result<Option<ProgressState>> {
        Ok(None)
    }
}

/// In-process cache. Clones share entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<UserKey, ProgressState>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn write(&self, user: &UserKey, state: &ProgressState) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user.clone(), state.clone());
        Ok(())
    }

    fn read(&self, user: &UserKey) -> Result<Option<ProgressState>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(user)
            .cloned())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedProgress {
    version: u32,
    user: UserKey,
    state: ProgressState,
}

/// Single-slot JSON file cache.
///
/// Holds the state of whichever user wrote last; reads for any other user
/// miss. Writes go to a sibling temp file that is then renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCache for FileCache {
    fn write(&self, user: &UserKey, state: &ProgressState) -> Result<()> {
        let doc = CachedProgress {
            version: CACHE_VERSION,
            user: user.clone(),
            state: state.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }

    fn read(&self, user: &UserKey) -> Result<Option<ProgressState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc: CachedProgress = serde_json::from_slice(&bytes)?;
        if doc.version != CACHE_VERSION || &doc.user != user {
            return Ok(None);
        }
        Ok(Some(doc.state))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, bytes)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("regrow-cache");
    path.with_file_name(format!("{file_name}.tmp"))
}
