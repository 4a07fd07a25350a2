//! Sync Coordinator - decides when progress is loaded, shown and saved.
//!
//! The coordinator is a plain state machine. It never performs I/O itself;
//! it tells the session actor what to do and validates what comes back.
//!
//! # Modes
//!
//! - **Idle**: identity unknown, nothing loaded or saved
//! - **Guest**: anonymous, fixed default state, never persisted
//! - **Loading**: signed in, remote fetch outstanding, saves held back
//! - **Ready**: signed in, fetch settled, every change is persisted
//!
//! # Generations
//!
//! Every identity transition bumps a generation counter. A load carries the
//! generation it was started under, and its result is accepted only if
//! that generation is still the current one. This is what keeps a slow
//! fetch for a previous identity from overwriting the current state.

use regrow_progress::{PartialProgress, ProgressState};
use tracing::{debug, info, warn};

use crate::identity::{Identity, UserKey};

/// Current coordinator mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    #[default]
    Idle,
    Guest,
    Loading { generation: u64 },
    Ready,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Guest => write!(f, "Guest"),
            Self::Loading { generation } => write!(f, "Loading({generation})"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

/// What the session should do after an identity change.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityTransition {
    /// Same identity as before; nothing to do.
    Unchanged,
    /// Identity is resolving; cancel pending saves, keep state as is.
    Suspend,
    /// Show the guest default.
    ShowGuest,
    /// Fetch the user's record under `generation`.
    Load { user: UserKey, generation: u64 },
}

/// Result of a remote fetch, as reported back to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The store returned a record (fields may be missing).
    Found(PartialProgress),
    /// The store has no record for the user.
    NotFound,
    /// The fetch failed; the message is for logs only.
    Failed(String),
}

/// What the session should do with a finished load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadDecision {
    /// Install this state and mirror it into the local cache.
    Apply(ProgressState),
    /// Keep whatever default is showing.
    KeepCurrent,
    /// The load belongs to a superseded identity; drop it.
    Discard,
}

/// Binds progress lifecycle to identity lifecycle.
#[derive(Debug, Default)]
pub struct SyncCoordinator {
    identity: Identity,
    /// Set by the first identity signal, including `Unknown`.
    identity_seen: bool,
    mode: SyncMode,
    generation: u64,
    restored: bool,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity last applied.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current mode.
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a fetch is outstanding for the current identity.
    pub fn is_loading(&self) -> bool {
        matches!(self.mode(), SyncMode::Loading { .. })
    }

    /// Whether the last completed load restored a saved record.
    pub fn restored(&self) -> bool {
        self.restored
    }

    /// The user whose changes should be persisted right now, if any.
    ///
    /// Only `Ready` persists: guests never do, and a signed-in user does
    /// not until their remote record has been read.
    pub fn persist_target(&self) -> Option<&UserKey> {
        match self.mode() {
            SyncMode::Ready => self.identity.user_key(),
            _ => None,
        }
    }

    /// Apply a new identity signal.
    pub fn on_identity(&mut self, identity: Identity) -> IdentityTransition {
        if self.identity_seen && identity == self.identity {
            return IdentityTransition::Unchanged;
        }

        self.identity_seen = true;
        self.generation += 1;
        self.restored = false;
        self.identity = identity;

        let transition = match &self.identity {
            Identity::Unknown => {
                self.mode = SyncMode::Idle;
                IdentityTransition::Suspend
            }
            Identity::Anonymous => {
                self.mode = SyncMode::Guest;
                IdentityTransition::ShowGuest
            }
            Identity::Authenticated(user) => {
                self.mode = SyncMode::Loading {
                    generation: self.generation,
                };
                IdentityTransition::Load {
                    user: user.clone(),
                    generation: self.generation,
                }
            }
        };

        info!(
            identity = %self.identity,
            generation = self.generation,
            mode = %self.mode(),
            "Identity changed"
        );
        transition
    }

    /// Accept or reject a finished load.
    pub fn on_load_finished(&mut self, generation: u64, outcome: LoadOutcome) -> LoadDecision {
        if self.mode != (SyncMode::Loading { generation }) {
            debug!(
                generation,
                current = self.generation,
                "Discarding load for superseded identity"
            );
            return LoadDecision::Discard;
        }

        self.mode = SyncMode::Ready;
        match outcome {
            LoadOutcome::Found(record) => {
                self.restored = true;
                let state = record.resolve(&ProgressState::new_account());
                info!(
                    identity = %self.identity,
                    level = state.level,
                    progress_pct = state.progress_pct,
                    "Restored saved progress"
                );
                LoadDecision::Apply(state)
            }
            LoadOutcome::NotFound => {
                info!(identity = %self.identity, "No saved progress, using account defaults");
                LoadDecision::KeepCurrent
            }
            LoadOutcome::Failed(reason) => {
                warn!(identity = %self.identity, %reason, "Progress not restored");
                LoadDecision::KeepCurrent
            }
        }
    }
}
