//! Store configuration.

use serde::{Deserialize, Serialize};

use smtstore_primitives::Version;

use crate::pruning::PruningOptions;

/// Options applied when a store is opened.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Version retention policy.
    pub pruning: PruningOptions,
    /// First version to assign on a fresh store. `0` means the default of 1.
    /// Ignored if the backend already holds commits.
    pub initial_version: Version,
}

impl StoreConfig {
    pub fn with_pruning(mut self, pruning: PruningOptions) -> Self {
        self.pruning = pruning;
        self
    }

    pub fn with_initial_version(mut self, version: Version) -> Self {
        self.initial_version = version;
        self
    }
}
