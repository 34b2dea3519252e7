//! Cache configuration.

use std::time::Duration;

use crate::config::Config;

/// Configuration for an entity table.
///
/// Tables only hold weak references. The optional retention tier adds
/// strong references that expire after a period without access, so that
/// recently used entities survive between uses even when the application
/// dropped them.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expected number of slots, used to presize the table.
    pub initial_capacity: usize,

    /// Maximum number of retained entities.
    pub retain_capacity: u64,

    /// Time-to-idle for retained entities.
    /// `None` disables retention.
    pub retain_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            retain_capacity: 10_000,
            retain_idle: None,
        }
    }
}

impl CacheConfig {
    /// Purely weak table, no retention.
    pub fn weak_only() -> Self {
        Self::default()
    }

    /// Table whose entries stay alive for `idle` after their last access.
    pub fn retained(idle: Duration) -> Self {
        Self {
            retain_idle: Some(idle),
            ..Default::default()
        }
    }

    /// Derive the table configuration from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            retain_capacity: config.entity_retain_capacity,
            retain_idle: config.entity_retain,
            ..Default::default()
        }
    }

    /// Set the initial table size (builder pattern).
    #[must_use]
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Set the maximum number of retained entities.
    #[must_use]
    pub fn retain_capacity(mut self, retain_capacity: u64) -> Self {
        self.retain_capacity = retain_capacity;
        self
    }

    pub fn retains(&self) -> bool {
        self.retain_idle.is_some() && self.retain_capacity > 0
    }
}
