//! Game rules: actions, rollover, rewards.
//!
//! A tree grows through levels 1..=3. Reaching [`MAX_LEVEL`] is never a
//! resting state: it completes the cycle, counts a grown tree and starts
//! over at level 1.

use serde::{Deserialize, Serialize};

use crate::state::ProgressState;

/// Reaching this level completes a cycle.
pub const MAX_LEVEL: u32 = 4;

/// Progress needed for one level.
pub const PROGRESS_CAP: f64 = 100.0;

/// Reward advertised for a completed tree.
pub const CYCLE_REWARD: u64 = 500;

/// Overflow handling when a level rolls over.
///
/// The overflow is the amount by which progress exceeds [`PROGRESS_CAP`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Cap each increment at 100 and restart the next level from 0.
    #[default]
    Discard,
    /// Keep the remainder as progress on the next level.
    Carry,
}

/// Overflow policy used unless a config says otherwise.
pub const DEFAULT_OVERFLOW_POLICY: OverflowPolicy = OverflowPolicy::Discard;

/// A user action that spends currency to grow the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Water,
    Fertilize,
}

impl Action {
    /// Currency spent by the action.
    pub const fn cost(self) -> u64 {
        match self {
            Self::Water => 5,
            Self::Fertilize => 10,
        }
    }

    /// Progress gained by the action, in percent.
    pub const fn progress(self) -> f64 {
        match self {
            Self::Water => 10.0,
            Self::Fertilize => 20.0,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Water => write!(f, "water"),
            Self::Fertilize => write!(f, "fertilize"),
        }
    }
}

/// Reward advertised for reaching `level`.
///
/// Level 2 pays 100 and level 3 pays 200; reaching [`MAX_LEVEL`] pays
/// [`CYCLE_REWARD`]. Level 1 is the starting level and pays nothing.
pub const fn level_reward(level: u32) -> u64 {
    if level >= MAX_LEVEL {
        CYCLE_REWARD
    } else if level <= 1 {
        0
    } else {
        (level as u64 - 1) * 100
    }
}

/// A single step taken while settling a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollover {
    /// Advanced to `level` within the current cycle.
    LevelUp { level: u32 },
    /// Finished a tree; `trees_grown` is the new count.
    CycleCompleted { trees_grown: u64 },
}

/// Most levels a single settle may advance under [`OverflowPolicy::Carry`].
///
/// Carried progress beyond this many levels is dropped, which bounds both
/// the work done and the number of rollover events for any finite input.
pub const MAX_CARRIED_LEVELS: u32 = 1_000;

/// Apply the rollover rule until `progress_pct < PROGRESS_CAP`.
///
/// Loops rather than checking once so that any overshoot ends in a settled
/// state. Under `Carry` the remainder is taken up front with `%`, so the
/// loop runs once per level gained (at most [`MAX_CARRIED_LEVELS`]) however
/// large the overshoot.
pub fn settle(state: &mut ProgressState, policy: OverflowPolicy) -> Vec<Rollover> {
    let mut steps = Vec::new();
    if state.progress_pct < PROGRESS_CAP {
        return steps;
    }

    let (levels, remainder) = match policy {
        OverflowPolicy::Discard => (1, 0.0),
        OverflowPolicy::Carry => {
            let whole = (state.progress_pct / PROGRESS_CAP).floor();
            let levels = if whole >= f64::from(MAX_CARRIED_LEVELS) {
                MAX_CARRIED_LEVELS
            } else {
                whole as u32
            };
            (levels, state.progress_pct % PROGRESS_CAP)
        }
    };

    for _ in 0..levels {
        state.level += 1;
        if state.level >= MAX_LEVEL {
            // A record already at u64::MAX trees stays there.
            state.trees_grown = state.trees_grown.saturating_add(1);
            state.level = 1;
            steps.push(Rollover::CycleCompleted {
                trees_grown: state.trees_grown,
            });
        } else {
            steps.push(Rollover::LevelUp { level: state.level });
        }
    }
    state.progress_pct = remainder;

    steps
}

/// Clamp fields that cannot be repaired by rollover.
///
/// Used on records from outside the engine: a missing or zero level becomes
/// 1, a level at or past [`MAX_LEVEL`] is pulled back to the last visible
/// stage, and non-finite or negative progress becomes 0.
pub fn normalize(state: &mut ProgressState) {
    if !state.progress_pct.is_finite() || state.progress_pct < 0.0 {
        state.progress_pct = 0.0;
    }
    state.level = state.level.clamp(1, MAX_LEVEL - 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(level: u32, progress_pct: f64) -> ProgressState {
        ProgressState {
            level,
            progress_pct,
            ..ProgressState::guest()
        }
    }

    #[test]
    fn action_catalogue() {
        assert_eq!(Action::Water.cost(), 5);
        assert_eq!(Action::Water.progress(), 10.0);
        assert_eq!(Action::Fertilize.cost(), 10);
        assert_eq!(Action::Fertilize.progress(), 20.0);
        assert_eq!(Action::Fertilize.to_string(), "fertilize");
    }

    #[test]
    fn rewards_by_level() {
        assert_eq!(level_reward(1), 0);
        assert_eq!(level_reward(2), 100);
        assert_eq!(level_reward(3), 200);
        assert_eq!(level_reward(MAX_LEVEL), CYCLE_REWARD);
    }

    #[test]
    fn settled_state_is_untouched() {
        let mut state = at(2, 99.5);
        assert!(settle(&mut state, OverflowPolicy::Discard).is_empty());
        assert_eq!(state, at(2, 99.5));
    }

    #[test]
    fn discard_restarts_from_zero() {
        let mut state = at(1, 100.0);
        let steps = settle(&mut state, OverflowPolicy::Discard);
        assert_eq!(steps, vec![Rollover::LevelUp { level: 2 }]);
        assert_eq!(state, at(2, 0.0));
    }

    #[test]
    fn carry_keeps_remainder() {
        let mut state = at(1, 105.0);
        settle(&mut state, OverflowPolicy::Carry);
        assert_eq!(state, at(2, 5.0));
    }

    #[test]
    fn large_overshoot_settles_in_a_loop() {
        // 3.5 levels worth of progress from level 1 under carry.
        let mut state = at(1, 350.0);
        let steps = settle(&mut state, OverflowPolicy::Carry);

        assert_eq!(
            steps,
            vec![
                Rollover::LevelUp { level: 2 },
                Rollover::LevelUp { level: 3 },
                Rollover::CycleCompleted { trees_grown: 1 },
            ]
        );
        assert_eq!(state.level, 1);
        assert_eq!(state.progress_pct, 50.0);
        assert_eq!(state.trees_grown, 1);
    }

    #[test]
    fn completing_from_level_three() {
        let mut state = at(3, 100.0);
        let steps = settle(&mut state, OverflowPolicy::Discard);
        assert_eq!(steps, vec![Rollover::CycleCompleted { trees_grown: 1 }]);
        assert_eq!(state, ProgressState { trees_grown: 1, ..at(1, 0.0) });
    }

    #[test]
    fn carry_bounds_huge_overshoot() {
        let mut state = at(1, 1e20);
        let steps = settle(&mut state, OverflowPolicy::Carry);

        assert_eq!(steps.len(), MAX_CARRIED_LEVELS as usize);
        assert!(state.is_settled());
        assert_eq!(state.progress_pct, 1e20 % PROGRESS_CAP);
    }

    #[test]
    fn carry_counts_whole_levels_exactly() {
        let mut state = at(2, 299.0);
        let steps = settle(&mut state, OverflowPolicy::Carry);

        assert_eq!(
            steps,
            vec![
                Rollover::LevelUp { level: 3 },
                Rollover::CycleCompleted { trees_grown: 1 },
            ]
        );
        assert_eq!(state, ProgressState { trees_grown: 1, ..at(1, 99.0) });
    }

    #[test]
    fn tree_count_saturates() {
        let mut state = ProgressState {
            trees_grown: u64::MAX,
            ..at(3, 100.0)
        };
        let steps = settle(&mut state, OverflowPolicy::Discard);

        assert_eq!(steps, vec![Rollover::CycleCompleted { trees_grown: u64::MAX }]);
        assert_eq!(state.trees_grown, u64::MAX);
        assert_eq!(state.level, 1);
    }

    #[test]
    fn normalize_clamps_out_of_range_fields() {
        let mut state = at(0, f64::NAN);
        normalize(&mut state);
        assert_eq!(state, at(1, 0.0));

        let mut state = at(7, -3.0);
        normalize(&mut state);
        assert_eq!(state, at(3, 0.0));
    }
}
