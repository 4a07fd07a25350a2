//! Remote progress store interface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regrow_progress::{PartialProgress, ProgressState};

use crate::error::{Result, StoreError};
use crate::identity::UserKey;

/// Durable per-user progress records.
///
/// `fetch` returns the record as stored, with any field possibly missing;
/// callers resolve it against their own defaults. `upsert` replaces the
/// whole record and must be idempotent.
#[async_trait]
pub trait RemoteProgressStore: Send + Sync + 'static {
    /// Fetch a user's record. `Ok(None)` means no record exists.
    async fn fetch(&self, user: &UserKey) -> Result<Option<PartialProgress>>;

    /// Create or replace a user's record.
    async fn upsert(&self, user: &UserKey, state: &ProgressState) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: HashMap<UserKey, PartialProgress>,
    upserts: Vec<(UserKey, ProgressState)>,
    fetches: Vec<UserKey>,
    latency: Duration,
    fail_fetch: bool,
    fail_upsert: bool,
}

/// In-process store, for tests and offline play.
///
/// Clones share the same records. Every call is recorded so tests can
/// assert on exactly what was fetched and written, and latency or failures
/// can be injected.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryProgressStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Seed a record, possibly with missing fields.
    pub fn insert(&self, user: &UserKey, record: PartialProgress) {
        self.lock().records.insert(user.clone(), record);
    }

    /// The stored record for `user`.
    pub fn record(&self, user: &UserKey) -> Option<PartialProgress> {
        self.lock().records.get(user).cloned()
    }

    /// Every upsert received, in order.
    pub fn upserts(&self) -> Vec<(UserKey, ProgressState)> {
        self.lock().upserts.clone()
    }

    /// Number of fetches received.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches.len()
    }

    /// Make fetches fail until turned off.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    /// Make upserts fail until turned off.
    pub fn set_fail_upsert(&self, fail: bool) {
        self.lock().fail_upsert = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteProgressStore for MemoryProgressStore {
    async fn fetch(&self, user: &UserKey) -> Result<Option<PartialProgress>> {
        self.lock().fetches.push(user.clone());
        self.simulate_latency().await;

        let inner = self.lock();
        if inner.fail_fetch {
            return Err(StoreError::Network("injected fetch failure".into()));
        }
        Ok(inner.records.get(user).cloned())
    }

    async fn upsert(&self, user: &UserKey, state: &ProgressState) -> Result<()> {
        self.simulate_latency().await;

        let mut inner = self.lock();
        inner.upserts.push((user.clone(), state.clone()));
        if inner.fail_upsert {
            return Err(StoreError::Network("injected upsert failure".into()));
        }
        inner.records.insert(user.clone(), PartialProgress::from(state));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_record_is_none() {
        let store = MemoryProgressStore::new();
        let user = UserKey::new("kim");
        assert!(store.fetch(&user).await.unwrap().is_none());
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryProgressStore::new();
        let user = UserKey::new("kim");
        let state = ProgressState::new_account();

        store.upsert(&user, &state).await.unwrap();
        let first = store.record(&user);
        store.upsert(&user, &state).await.unwrap();

        assert_eq!(store.record(&user), first);
        let fetched = store.fetch(&user).await.unwrap().unwrap();
        assert_eq!(fetched.resolve(&ProgressState::guest()), state);
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryProgressStore::new();
        let user = UserKey::new("kim");

        store.set_fail_fetch(true);
        assert!(matches!(store.fetch(&user).await, Err(StoreError::Network(_))));

        store.set_fail_upsert(true);
        assert!(store.upsert(&user, &ProgressState::guest()).await.is_err());
        assert!(store.record(&user).is_none());
        assert_eq!(store.upserts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_simulated() {
        let store = MemoryProgressStore::new().with_latency(Duration::from_millis(300));
        let started = tokio::time::Instant::now();
        store.fetch(&UserKey::new("kim")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
