//! Database configuration.

use std::time::Duration;

/// When a commit forces its log records onto stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Sync on every commit.
    Always,
    /// Sync at commit time when the previous sync is older than the interval.
    Interval(Duration),
    /// Only hand records to the OS; never sync.
    Never,
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Durability policy applied at the end of every commit.
    pub sync_policy: SyncPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_policy: SyncPolicy::Always,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the commit sync policy.
    #[must_use]
    pub const fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert_eq!(config.sync_policy, SyncPolicy::Always);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_policy(SyncPolicy::Interval(Duration::from_secs(1)));

        assert!(!config.create_if_missing);
        assert_eq!(
            config.sync_policy,
            SyncPolicy::Interval(Duration::from_secs(1))
        );
    }
}
