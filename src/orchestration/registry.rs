//! Active-unit registry for introspection.
//!
//! Every batch call owns one [`ActiveRegistry`]. While the call is live the
//! registry is attached to the orchestrator through a [`BatchScope`] guard,
//! so `list_active`/`status` can see it; when the call ends (normally, by
//! error, by panic, or because its future was dropped) the guard clears the
//! registry and detaches it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for one batch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registry entry for a unit that is currently registered as running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUnit {
    /// Registry key: `unit_<index>` or the caller's task id.
    pub key: String,
    /// The unit's diagnostic label.
    pub label: String,
    pub registered_at: DateTime<Utc>,
}

/// Units registered by a single batch call.
#[derive(Debug, Clone, Default)]
pub struct ActiveRegistry {
    batch_id: BatchId,
    units: Arc<RwLock<BTreeMap<String, ActiveUnit>>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Register a unit under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let unit = ActiveUnit {
            key: key.clone(),
            label: label.into(),
            registered_at: Utc::now(),
        };
        self.units.write().insert(key, unit);
    }

    pub fn remove(&self, key: &str) -> Option<ActiveUnit> {
        self.units.write().remove(key)
    }

    pub fn clear(&self) {
        self.units.write().clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.units.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }

    /// Snapshot of the registered keys.
    pub fn keys(&self) -> Vec<String> {
        self.units.read().keys().cloned().collect()
    }

    /// Snapshot of the registered entries.
    pub fn snapshot(&self) -> Vec<ActiveUnit> {
        self.units.read().values().cloned().collect()
    }
}

/// Point-in-time view of what an orchestrator is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub active_units: usize,
    pub unit_ids: Vec<String>,
}

/// Registries of the batch calls currently live on one orchestrator.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveBatches {
    batches: Arc<RwLock<BTreeMap<BatchId, ActiveRegistry>>>,
}

impl LiveBatches {
    /// Attach a fresh registry for a new batch call.
    pub(crate) fn open(&self) -> BatchScope {
        let registry = ActiveRegistry::new();
        self.batches
            .write()
            .insert(registry.batch_id(), registry.clone());
        BatchScope {
            registry,
            live: self.clone(),
        }
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.batches
            .read()
            .values()
            .flat_map(ActiveRegistry::keys)
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<ActiveUnit> {
        self.batches
            .read()
            .values()
            .flat_map(ActiveRegistry::snapshot)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn batch_count(&self) -> usize {
        self.batches.read().len()
    }
}

/// Keeps a batch's registry attached to its orchestrator.
///
/// Dropping the scope clears the registry and detaches it.
#[derive(Debug)]
pub(crate) struct BatchScope {
    registry: ActiveRegistry,
    live: LiveBatches,
}

impl BatchScope {
    pub(crate) fn registry(&self) -> &ActiveRegistry {
        &self.registry
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        self.registry.clear();
        self.live.batches.write().remove(&self.registry.batch_id());
    }
}
