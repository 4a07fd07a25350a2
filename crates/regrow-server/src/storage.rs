//! Persistent progress records using RocksDB.
//!
//! One JSON document per user under `progress:{user_key}`. Records are read
//! as [`PartialProgress`] so that documents written with fewer fields still
//! load; every write stores a complete, settled [`ProgressState`].

use crate::error::{Error, Result};
use regrow_progress::{PartialProgress, ProgressState};
use rocksdb::{Options, DB};
use std::path::Path;
use tracing::debug;

/// Longest accepted user key, in bytes.
pub const MAX_USER_KEY_LEN: usize = 128;

/// Storage backend for progress records.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Get the stored record for a user.
    pub fn get_progress(&self, user: &str) -> Result<Option<PartialProgress>> {
        let key = progress_key(user)?;
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Store a complete record, replacing any existing one.
    pub fn put_progress(&self, user: &str, state: &ProgressState) -> Result<()> {
        let key = progress_key(user)?;
        let value = serde_json::to_vec(state)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Merge a partial record onto the stored one.
    ///
    /// Missing fields keep the stored value, or the account defaults when
    /// the user has no record yet. The merged state is settled and written
    /// back whole. Applying the same patch twice yields the same record.
    ///
    /// Not atomic on its own; callers serialize merges for a user.
    pub fn merge_progress(&self, user: &str, patch: PartialProgress) -> Result<ProgressState> {
        let base = match self.get_progress(user)? {
            Some(existing) => existing.resolve(&ProgressState::new_account()),
            None => ProgressState::new_account(),
        };
        let merged = patch.resolve(&base);
        self.put_progress(user, &merged)?;
        debug!(
            user,
            currency = merged.currency,
            level = merged.level,
            progress_pct = merged.progress_pct,
            "Merged progress"
        );
        Ok(merged)
    }

    /// Delete a user's record. Deleting a missing record is not an error.
    pub fn delete_progress(&self, user: &str) -> Result<()> {
        let key = progress_key(user)?;
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    /// Number of stored records.
    pub fn count_progress(&self) -> Result<usize> {
        let prefix = b"progress:";
        let mut count = 0;

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, _) = item?;
            if key.starts_with(prefix) {
                count += 1;
            } else {
                break;
            }
        }

        Ok(count)
    }
}

/// Validate a user key and build its storage key.
fn progress_key(user: &str) -> Result<String> {
    if user.trim().is_empty() {
        return Err(Error::InvalidInput("empty user key".into()));
    }
    if user.len() > MAX_USER_KEY_LEN {
        return Err(Error::InvalidInput(format!(
            "user key longer than {MAX_USER_KEY_LEN} bytes"
        )));
    }
    if user == "." || user == ".." {
        return Err(Error::InvalidInput("user key cannot be a dot segment".into()));
    }
    if user.chars().any(char::is_control) {
        return Err(Error::InvalidInput("user key contains control characters".into()));
    }
    Ok(format!("progress:{}", user))
}
