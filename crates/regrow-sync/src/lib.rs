//! Regrow Sync - keeping progress in step with identity and storage
//!
//! This crate binds the progression engine to the outside world: who is
//! playing, where their record lives, and when it is written back.
//!
//! # Overview
//!
//! - **Guests** always see a fixed default and nothing they do is saved
//! - **Signed-in users** get their remote record on login; until it
//!   arrives, changes are shown but never saved
//! - **Saves** are debounced trailing-edge: the latest state is written
//!   once changes have been quiet for the configured delay
//! - **Stale loads** from a previous identity are recognised by generation
//!   and dropped
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use regrow_sync::{GameSession, Identity, MemoryProgressStore, NoCache, SyncConfig};
//!
//! # async fn demo() -> Result<(), regrow_sync::ActionError> {
//! let game = GameSession::spawn(
//!     Arc::new(MemoryProgressStore::new()),
//!     Arc::new(NoCache),
//!     SyncConfig::default(),
//! );
//!
//! game.set_identity(Identity::user("kim")).await?;
//! game.loaded().await?;
//! game.fertilize().await?;
//! game.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod identity;
pub mod schedule;
pub mod session;
pub mod store;

pub use cache::{FileCache, LocalCache, MemoryCache, NoCache};
pub use config::{SyncConfig, DEFAULT_SAVE_DELAY};
pub use coordinator::{IdentityTransition, LoadDecision, LoadOutcome, SyncCoordinator, SyncMode};
pub use error::{ActionError, Result, StoreError};
pub use http::HttpProgressStore;
pub use identity::{ActionGate, Identity, UserKey};
pub use schedule::{Debounce, ScheduledTask, Scheduler};
pub use session::{GameHandle, GameSession, Snapshot};
pub use store::{MemoryProgressStore, RemoteProgressStore};

// Re-export the engine types the session API speaks in
pub use regrow_progress::{
    Action, CycleCompleted, ProgressError, ProgressEvent, ProgressState,
};
