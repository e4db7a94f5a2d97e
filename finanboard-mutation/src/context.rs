//! Per-mutation state captured in pre-flight.

use finanboard_core::{QueryKey, RecordSet};
use finanboard_storage::EntryVersion;
use std::sync::Arc;

use crate::strategy::OptimisticStrategy;

/// Optimistic install made by one mutation.
#[derive(Debug, Clone)]
pub struct Installed {
    /// Entry payload when the mutation started.
    pub snapshot: RecordSet,
    /// Entry version right after the provisional value went in.
    pub version: EntryVersion,
    /// False when the strategy produced the same payload it was given.
    pub changed: bool,
}

/// State that lives from pre-flight until the mutation settles.
#[derive(Debug, Clone)]
pub struct MutationContext {
    pub key: QueryKey,
    pub strategy: Option<Arc<dyn OptimisticStrategy>>,
    /// `None` when no strategy was given or the entry held no data.
    pub installed: Option<Installed>,
}

impl MutationContext {
    pub fn new(key: QueryKey) -> Self {
        Self {
            key,
            strategy: None,
            installed: None,
        }
    }

    pub fn snapshot(&self) -> Option<&RecordSet> {
        self.installed.as_ref().map(|installed| &installed.snapshot)
    }

    pub fn is_optimistic(&self) -> bool {
        self.installed.is_some()
    }
}
