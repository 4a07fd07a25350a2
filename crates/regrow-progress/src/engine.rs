//! Progression engine - the owner of a user's progress state.
//!
//! The engine applies actions, runs the rollover rule to a fixed point and
//! records what happened in an event outbox. Callers drain the outbox with
//! [`ProgressEngine::poll_events`] after each call, the same way a protocol
//! state machine is polled for outgoing messages.

use tracing::{debug, trace};

use crate::error::{ProgressError, Result};
use crate::rules::{
    self, level_reward, Action, OverflowPolicy, Rollover, CYCLE_REWARD, PROGRESS_CAP,
};
use crate::state::ProgressState;

/// Configuration for a progression engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// What happens to progress past 100% on a level-up.
    pub overflow: OverflowPolicy,
}

impl EngineConfig {
    /// Set the overflow policy.
    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

/// Notice raised when a tree is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleCompleted {
    /// Tree count including the one just finished.
    pub trees_grown: u64,
    /// Advertised reward. The engine does not credit it.
    pub reward: u64,
}

/// Something observable that happened inside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The settled state changed.
    StateChanged(ProgressState),
    /// The tree reached `level` within the current cycle.
    LevelUp { level: u32, reward: u64 },
    /// A cycle finished.
    CycleCompleted(CycleCompleted),
}

/// Summary of a successful grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowOutcome {
    /// Currency spent.
    pub spent: u64,
    /// Level-ups inside the current cycle.
    pub level_ups: u32,
    /// Cycles completed by this action.
    pub cycles_completed: u32,
}

/// Owns a [`ProgressState`] and mutates it only through actions.
#[derive(Debug)]
pub struct ProgressEngine {
    state: ProgressState,
    config: EngineConfig,
    completion: Option<CycleCompleted>,
    outbox: Vec<ProgressEvent>,
}

impl ProgressEngine {
    /// Create an engine with the given starting state.
    ///
    /// The state is normalized and settled before it is installed.
    pub fn new(state: ProgressState, config: EngineConfig) -> Self {
        let mut engine = Self {
            state: ProgressState::guest(),
            config,
            completion: None,
            outbox: Vec::new(),
        };
        engine.state = engine.settled(state);
        engine
    }

    /// Create an engine holding the guest default.
    pub fn guest() -> Self {
        Self::new(ProgressState::guest(), EngineConfig::default())
    }

    /// Current settled state.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Engine configuration.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Spend `cost` to add `delta` percent of progress.
    ///
    /// Fails without touching state if the balance is short or the
    /// parameters are invalid.
    pub fn grow(&mut self, cost: u64, delta: f64) -> Result<GrowOutcome> {
        if cost == 0 || !delta.is_finite() || delta <= 0.0 {
            return Err(ProgressError::InvalidAction(format!(
                "cost {cost} and delta {delta} must both be positive"
            )));
        }
        if self.state.currency < cost {
            debug!(
                required = cost,
                available = self.state.currency,
                "Rejected action: insufficient funds"
            );
            return Err(ProgressError::InsufficientFunds {
                required: cost,
                available: self.state.currency,
            });
        }

        let mut next = self.state.clone();
        next.currency -= cost;
        next.progress_pct = match self.config.overflow {
            OverflowPolicy::Discard => (next.progress_pct + delta).min(PROGRESS_CAP),
            OverflowPolicy::Carry => next.progress_pct + delta,
        };

        let steps = rules::settle(&mut next, self.config.overflow);
        let mut outcome = GrowOutcome {
            spent: cost,
            ..GrowOutcome::default()
        };
        for step in &steps {
            match *step {
                Rollover::LevelUp { .. } => outcome.level_ups += 1,
                Rollover::CycleCompleted { .. } => outcome.cycles_completed += 1,
            }
        }

        trace!(
            cost,
            delta,
            level = next.level,
            progress_pct = next.progress_pct,
            "Applied grow"
        );

        self.commit(next, &steps);
        Ok(outcome)
    }

    /// Apply one of the catalogued actions.
    pub fn apply(&mut self, action: Action) -> Result<GrowOutcome> {
        self.grow(action.cost(), action.progress())
    }

    /// Water the tree: 5 currency for 10% progress.
    pub fn water(&mut self) -> Result<GrowOutcome> {
        self.apply(Action::Water)
    }

    /// Fertilize the tree: 10 currency for 20% progress.
    pub fn fertilize(&mut self) -> Result<GrowOutcome> {
        self.apply(Action::Fertilize)
    }

    /// Replace state with the restart value.
    pub fn reset(&mut self) {
        debug!("Resetting progress");
        self.completion = None;
        self.commit(ProgressState::restart(), &[]);
    }

    /// Install a state from outside (identity change, remote load).
    ///
    /// Rollovers needed to settle an incoming record are applied silently;
    /// they raise no level or cycle events.
    pub fn replace(&mut self, state: ProgressState) {
        let state = self.settled(state);
        self.completion = None;
        self.commit(state, &[]);
    }

    /// Adjust the balance by `amount`, saturating at zero.
    pub fn add_currency(&mut self, amount: i64) {
        let mut next = self.state.clone();
        next.currency = if amount >= 0 {
            next.currency.saturating_add(amount.unsigned_abs())
        } else {
            next.currency.saturating_sub(amount.unsigned_abs())
        };
        self.commit(next, &[]);
    }

    /// The completion notice, if one is waiting to be dismissed.
    pub fn completion_notice(&self) -> Option<CycleCompleted> {
        self.completion
    }

    /// Dismiss the completion notice. No-op if none is showing.
    pub fn dismiss_completion(&mut self) {
        if self.completion.take().is_some() {
            trace!("Completion notice dismissed");
        }
    }

    /// Drain events recorded since the last poll.
    pub fn poll_events(&mut self) -> Vec<ProgressEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn settled(&self, mut state: ProgressState) -> ProgressState {
        rules::normalize(&mut state);
        rules::settle(&mut state, self.config.overflow);
        state
    }

    fn commit(&mut self, next: ProgressState, steps: &[Rollover]) {
        debug_assert!(next.is_settled(), "unsettled state escaped: {next:?}");

        for step in steps {
            match *step {
                Rollover::LevelUp { level } => {
                    debug!(level, "Level up");
                    self.outbox.push(ProgressEvent::LevelUp {
                        level,
                        reward: level_reward(level),
                    });
                }
                Rollover::CycleCompleted { trees_grown } => {
                    debug!(trees_grown, "Tree completed");
                    let notice = CycleCompleted {
                        trees_grown,
                        reward: CYCLE_REWARD,
                    };
                    self.completion = Some(notice);
                    self.outbox.push(ProgressEvent::CycleCompleted(notice));
                }
            }
        }

        if next != self.state {
            self.state = next;
            self.outbox
                .push(ProgressEvent::StateChanged(self.state.clone()));
        }
    }
}

impl Default for ProgressEngine {
    fn default() -> Self {
        Self::guest()
    }
}
