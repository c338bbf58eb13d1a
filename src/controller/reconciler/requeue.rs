//! # Requeue Scheduler
//!
//! Computes how long to wait before the next pass of a `VaultSecret`.
//! The delay is a hint to the controller queue: a watch event can still trigger an earlier pass.

use crate::crd::VaultSecretSpec;
use std::time::Duration;

/// Applies the process-wide minimum refresh interval to per-object refresh requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueScheduler {
    min_refresh_secs: u64,
}

impl RequeueScheduler {
    #[must_use]
    pub fn new(min_refresh_secs: u64) -> Self {
        Self { min_refresh_secs }
    }

    #[must_use]
    pub fn min_refresh_secs(&self) -> u64 {
        self.min_refresh_secs
    }

    /// `max(declared, minimum)`; a declared value of 0 means "use the minimum"
    #[must_use]
    pub fn delay_secs(&self, declared_refresh_secs: u64) -> u64 {
        declared_refresh_secs.max(self.min_refresh_secs)
    }

    #[must_use]
    pub fn delay_for(&self, spec: &VaultSecretSpec) -> Duration {
        Duration::from_secs(self.delay_secs(spec.secret.refresh_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_wins_over_shorter_refresh() {
        let scheduler = RequeueScheduler::new(300);
        assert_eq!(scheduler.delay_secs(60), 300);
    }

    #[test]
    fn test_longer_refresh_is_kept() {
        let scheduler = RequeueScheduler::new(300);
        assert_eq!(scheduler.delay_secs(600), 600);
    }

    #[test]
    fn test_zero_uses_minimum() {
        let scheduler = RequeueScheduler::new(300);
        assert_eq!(scheduler.delay_secs(0), 300);
        assert_eq!(scheduler.delay_secs(300), 300);
    }
}
