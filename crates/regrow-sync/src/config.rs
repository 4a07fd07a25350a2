//! Session configuration.

use std::time::Duration;

use regrow_progress::{EngineConfig, OverflowPolicy};

/// Quiet period after the last change before the remote save fires.
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(500);

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Trailing-edge debounce delay for remote saves.
    pub save_delay: Duration,

    /// Capacity of the actor's command mailbox.
    pub mailbox_capacity: usize,

    /// Capacity of the event broadcast channel. Slow subscribers that fall
    /// further behind than this miss events.
    pub event_capacity: usize,

    /// Progression engine settings.
    pub engine: EngineConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            save_delay: DEFAULT_SAVE_DELAY,
            mailbox_capacity: 64,
            event_capacity: 64,
            engine: EngineConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables with defaults.
    ///
    /// - `REGROW_SAVE_DELAY_MS`: debounce delay in milliseconds
    /// - `REGROW_OVERFLOW`: `discard` or `carry`
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = std::env::var("REGROW_SAVE_DELAY_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.save_delay = Duration::from_millis(ms);
        }

        match std::env::var("REGROW_OVERFLOW").as_deref().map(str::trim) {
            Ok("carry") => config.engine.overflow = OverflowPolicy::Carry,
            Ok("discard") => config.engine.overflow = OverflowPolicy::Discard,
            _ => {}
        }

        config
    }

    /// Set the save debounce delay.
    #[must_use]
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    /// Set the mailbox capacity (minimum 1).
    #[must_use]
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the event channel capacity (minimum 1).
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}
