//! Regrow Progress - the tree-growing state machine
//!
//! A user spends currency on two actions that push a progress bar toward
//! 100%. Filling the bar advances the tree one level; finishing the last
//! level completes the tree and starts a new one.
//!
//! # Rollover
//!
//! After every action the engine settles the state:
//!
//! 1. While progress is at or above 100, advance one level
//! 2. Reaching level 4 completes the cycle: one more tree, back to level 1
//! 3. Nothing outside the engine ever sees progress at or above 100
//!
//! # Example
//!
//! ```
//! use regrow_progress::{ProgressEngine, ProgressState, EngineConfig};
//!
//! let mut engine = ProgressEngine::new(ProgressState::new_account(), EngineConfig::default());
//! engine.fertilize().unwrap();
//! assert_eq!(engine.state().currency, 190);
//! assert_eq!(engine.state().progress_pct, 20.0);
//! ```

pub mod engine;
pub mod error;
pub mod rules;
pub mod state;

pub use engine::{CycleCompleted, EngineConfig, GrowOutcome, ProgressEngine, ProgressEvent};
pub use error::{ProgressError, Result};
pub use rules::{
    level_reward, Action, OverflowPolicy, CYCLE_REWARD, DEFAULT_OVERFLOW_POLICY,
    MAX_CARRIED_LEVELS, MAX_LEVEL, PROGRESS_CAP,
};
pub use state::{PartialProgress, ProgressState, ACCOUNT_STARTING_CURRENCY};
