//! Name service mapping replica ids to handles.

use std::collections::HashMap;
use std::sync::RwLock;

use causeway_types::{ReplicaHandle, ReplicaId};

use crate::DirectoryError;

/// Where replicas publish themselves and callers look them up.
///
/// A networked deployment backs this with a real naming service; the
/// in-process network uses [`InMemoryRegistry`].
pub trait Registry: Send + Sync {
    /// Publishes `handle` under `id`. Fails if the id is already bound.
    fn register(&self, id: ReplicaId, handle: ReplicaHandle) -> Result<(), DirectoryError>;

    /// Removes the binding for `id`, returning the previous handle.
    fn unregister(&self, id: ReplicaId) -> Result<ReplicaHandle, DirectoryError>;

    /// Looks up the handle bound to `id`.
    fn lookup(&self, id: ReplicaId) -> Result<ReplicaHandle, DirectoryError>;
}

/// A registry held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    bindings: RwLock<HashMap<ReplicaId, ReplicaHandle>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound replicas.
    pub fn len(&self) -> usize {
        self.bindings.read().map_or(0, |bindings| bindings.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Registry for InMemoryRegistry {
    fn register(&self, id: ReplicaId, handle: ReplicaHandle) -> Result<(), DirectoryError> {
        let mut bindings = self
            .bindings
            .write()
            .map_err(|_| DirectoryError::LockPoisoned)?;
        if bindings.contains_key(&id) {
            return Err(DirectoryError::AlreadyRegistered(id));
        }
        bindings.insert(id, handle);
        tracing::debug!(replica = %id, "replica registered");
        Ok(())
    }

    fn unregister(&self, id: ReplicaId) -> Result<ReplicaHandle, DirectoryError> {
        self.bindings
            .write()
            .map_err(|_| DirectoryError::LockPoisoned)?
            .remove(&id)
            .ok_or(DirectoryError::NotRegistered(id))
    }

    fn lookup(&self, id: ReplicaId) -> Result<ReplicaHandle, DirectoryError> {
        self.bindings
            .read()
            .map_err(|_| DirectoryError::LockPoisoned)?
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotRegistered(id))
    }
}
