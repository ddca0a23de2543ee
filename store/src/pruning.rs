//! Version retention policy.
//!
//! Pruning discards commit records for old versions. A pruned version can no
//! longer be queried; the latest committed version is always retained.
//! Reclaiming tree nodes that became unreachable is left to external
//! maintenance.

use serde::{Deserialize, Serialize};

use smtstore_primitives::Version;

/// Which historical versions to retain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "param", rename_all = "kebab-case")]
pub enum PruningStrategy {
    /// Retain every version.
    KeepAll,
    /// Retain the `n` most recent versions.
    KeepRecent(u64),
    /// Retain every version divisible by `k`.
    KeepEvery(u64),
    /// Retain only the latest version.
    Nothing,
}

/// Pruning configuration for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningOptions {
    pub strategy: PruningStrategy,
    /// Prune on every `interval`-th commit. `0` prunes on every commit.
    pub interval: u64,
}

impl Default for PruningOptions {
    fn default() -> Self {
        Self::keep_all()
    }
}

impl PruningOptions {
    pub const DEFAULT_INTERVAL: u64 = 10;

    pub fn keep_all() -> Self {
        Self {
            strategy: PruningStrategy::KeepAll,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn keep_recent(n: u64) -> Self {
        Self {
            strategy: PruningStrategy::KeepRecent(n),
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn keep_every(k: u64) -> Self {
        Self {
            strategy: PruningStrategy::KeepEvery(k),
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn nothing() -> Self {
        Self {
            strategy: PruningStrategy::Nothing,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Returns true if this policy can ever discard a version.
    pub fn prunes(&self) -> bool {
        self.strategy != PruningStrategy::KeepAll
    }

    /// Returns true if pruning should run right after committing `latest`.
    pub fn is_due(&self, latest: Version) -> bool {
        if !self.prunes() {
            return false;
        }
        match self.interval {
            0 => true,
            n => latest.rem_euclid(n as Version) == 0,
        }
    }

    /// Returns true if `version` survives pruning once `latest` is committed.
    pub fn retains(&self, version: Version, latest: Version) -> bool {
        if version >= latest {
            return true;
        }
        match self.strategy {
            PruningStrategy::KeepAll => true,
            PruningStrategy::KeepRecent(n) => {
                let n = Version::try_from(n).unwrap_or(Version::MAX);
                version > latest.saturating_sub(n)
            }
            // `KeepEvery(0)` has no divisor; keep everything rather than panic.
            PruningStrategy::KeepEvery(0) => true,
            PruningStrategy::KeepEvery(k) => {
                let k = Version::try_from(k).unwrap_or(Version::MAX);
                version.rem_euclid(k) == 0
            }
            PruningStrategy::Nothing => false,
        }
    }
}
