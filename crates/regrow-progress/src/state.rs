//! Progress records and their defaults.

use serde::{Deserialize, Deserializer, Serialize};

use crate::rules::{self, OverflowPolicy, MAX_LEVEL, PROGRESS_CAP};

/// Starting balance for a signed-in account and after a reset.
pub const ACCOUNT_STARTING_CURRENCY: u64 = 200;

/// A user's tree-growing progress.
///
/// Replaced as a whole rather than edited in place; only the engine
/// produces new values from user actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Spendable balance.
    #[serde(alias = "coins")]
    pub currency: u64,
    /// Growth stage within the current cycle, `1..MAX_LEVEL`.
    pub level: u32,
    /// Progress toward the next level, `0..100` when settled.
    pub progress_pct: f64,
    /// Reserved collection marker (unix millis). Never changed by actions.
    #[serde(default)]
    pub last_collect_at: Option<u64>,
    /// Completed cycles.
    pub trees_grown: u64,
}

impl ProgressState {
    /// State shown to anonymous users. Never persisted.
    pub const fn guest() -> Self {
        Self {
            currency: 0,
            level: 1,
            progress_pct: 0.0,
            last_collect_at: None,
            trees_grown: 0,
        }
    }

    /// Defaults for a signed-in user with no saved record.
    pub const fn new_account() -> Self {
        Self {
            currency: ACCOUNT_STARTING_CURRENCY,
            level: 1,
            progress_pct: 0.0,
            last_collect_at: None,
            trees_grown: 0,
        }
    }

    /// State installed by an explicit reset.
    pub const fn restart() -> Self {
        Self {
            currency: ACCOUNT_STARTING_CURRENCY,
            level: 1,
            progress_pct: 0.0,
            last_collect_at: None,
            trees_grown: 0,
        }
    }

    /// Whether every settled-state invariant holds.
    pub fn is_settled(&self) -> bool {
        self.progress_pct.is_finite()
            && (0.0..PROGRESS_CAP).contains(&self.progress_pct)
            && (1..MAX_LEVEL).contains(&self.level)
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::guest()
    }
}

/// A progress record where any field may be missing.
///
/// Remote records are read through this type so that an absent field falls
/// back to its own default instead of discarding the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialProgress {
    #[serde(default, alias = "coins", skip_serializing_if = "Option::is_none")]
    pub currency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<f64>,
    /// `None` leaves the marker alone; `Some(None)` (an explicit `null`
    /// on the wire) clears it.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_collect_at: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trees_grown: Option<u64>,
}

/// Deserialize a field that is present, keeping `null` as `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl PartialProgress {
    /// Fill each missing field from `base`, then settle the result.
    ///
    /// Out-of-range values are clamped and overshooting progress is rolled
    /// over, so the returned state always satisfies
    /// [`ProgressState::is_settled`].
    pub fn resolve(self, base: &ProgressState) -> ProgressState {
        let mut state = ProgressState {
            currency: self.currency.unwrap_or(base.currency),
            level: self.level.unwrap_or(base.level),
            progress_pct: self.progress_pct.unwrap_or(base.progress_pct),
            last_collect_at: self.last_collect_at.unwrap_or(base.last_collect_at),
            trees_grown: self.trees_grown.unwrap_or(base.trees_grown),
        };
        rules::normalize(&mut state);
        rules::settle(&mut state, OverflowPolicy::Discard);
        state
    }

    /// Overwrite the fields present in `self` onto `target`.
    ///
    /// Used by stores applying a partial update to an existing record.
    pub fn apply_to(&self, target: &mut ProgressState) {
        if let Some(currency) = self.currency {
            target.currency = currency;
        }
        if let Some(level) = self.level {
            target.level = level;
        }
        if let Some(progress_pct) = self.progress_pct {
            target.progress_pct = progress_pct;
        }
        if let Some(last_collect_at) = self.last_collect_at {
            target.last_collect_at = last_collect_at;
        }
        if let Some(trees_grown) = self.trees_grown {
            target.trees_grown = trees_grown;
        }
    }
}

impl From<&ProgressState> for PartialProgress {
    fn from(state: &ProgressState) -> Self {
        Self {
            currency: Some(state.currency),
            level: Some(state.level),
            progress_pct: Some(state.progress_pct),
            last_collect_at: Some(state.last_collect_at),
            trees_grown: Some(state.trees_grown),
        }
    }
}
