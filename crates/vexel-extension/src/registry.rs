//! Process-scoped extension table.
//!
//! One registry per process, created by the host at subsystem start and
//! passed explicitly to whoever constructs or looks up extensions — it
//! is a service object, not ambient global state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{ExtensionError, Result};
use crate::extension::{Extension, State};
use crate::log::ErrorLog;

/// Shared handle to a registered extension.
pub type SharedExtension = Arc<RwLock<Extension>>;

/// Summary of one registered extension, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionInfo {
    pub id: String,
    pub name: String,
    pub state: State,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
    pub parameters: usize,
    pub dependencies: usize,
}

impl ExtensionInfo {
    fn of(ext: &Extension) -> ExtensionInfo {
        ExtensionInfo {
            id: ext.id().to_string(),
            name: ext.name().to_string(),
            state: ext.state(),
            loaded_at: ext.loaded_at(),
            parameters: ext.descriptor().parameters().len(),
            dependencies: ext.descriptor().dependencies().len(),
        }
    }
}

/// Table of all known extensions, keyed (and listed) by id.
pub struct Registry {
    extensions: RwLock<BTreeMap<String, SharedExtension>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            extensions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a freshly constructed extension.
    ///
    /// Duplicate ids are rejected; the rejected extension is dropped.
    pub fn register(&self, extension: Extension) -> Result<SharedExtension> {
        let id = extension.id().to_string();
        let mut extensions = self.extensions.write();
        if extensions.contains_key(&id) {
            return Err(ExtensionError::AlreadyRegistered(id));
        }
        tracing::debug!(id = %id, name = extension.name(), "extension registered");
        let shared = Arc::new(RwLock::new(extension));
        extensions.insert(id, Arc::clone(&shared));
        Ok(shared)
    }

    /// Remove an extension, driving it to `Unloaded` first so its
    /// strategy sees a normal unload before the registry forgets it.
    pub fn unregister(&self, id: &str) -> Option<SharedExtension> {
        let ext = self.get(id)?;
        ext.write().set_state(State::Unloaded);
        tracing::debug!(id, "extension unregistered");
        self.extensions.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<SharedExtension> {
        self.extensions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.extensions.read().contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.extensions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.read().is_empty()
    }

    /// Summaries of all extensions, ordered by id.
    pub fn list(&self) -> Vec<ExtensionInfo> {
        self.extensions
            .read()
            .values()
            .map(|ext| ExtensionInfo::of(&ext.read()))
            .collect()
    }

    pub fn info(&self, id: &str) -> Option<ExtensionInfo> {
        self.get(id).map(|ext| ExtensionInfo::of(&ext.read()))
    }

    /// Run [`Extension::check`] on every extension; returns how many
    /// failed. Failure detail lands in `log`.
    pub fn check_all(&self, log: &ErrorLog) -> usize {
        self.extensions
            .read()
            .values()
            .filter(|ext| !ext.read().check(log))
            .count()
    }

    /// Unload every loaded extension whose expiration timer has run
    /// out; returns how many were unloaded.
    pub fn unload_expired(&self) -> usize {
        let mut unloaded = 0;
        for ext in self.extensions.read().values() {
            let mut ext = ext.write();
            if ext.loaded() && ext.timer().is_some_and(|t| t.expired()) {
                ext.set_state(State::Unloaded);
                unloaded += 1;
            }
        }
        unloaded
    }

    /// Drop every extension. Each one still held nowhere else leaves
    /// through its normal unload path.
    pub fn clear(&self) {
        self.extensions.write().clear();
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}
