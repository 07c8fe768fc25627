//! causeway-directory: Replica lookup for `Causeway`
//!
//! The directory turns a [`ReplicaId`] into a callable [`ReplicaHandle`].
//! Handles are resolved lazily through a [`Registry`] and cached; the
//! replica's status is cached separately and refreshed on every resolution.
//!
//! Having a handle and being reachable are different things:
//!
//! - [`ReplicaDirectory::handle`] returns the cached handle without asking the
//!   replica anything. Operator commands use it, since they must reach a
//!   replica whatever its status.
//! - [`ReplicaDirectory::resolve`] also fetches the current status and fails
//!   with [`RpcError::Offline`] when the replica reports itself offline.
//!   Gossip and catch-up use it and skip the replica on failure.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(InMemoryRegistry::new());
//! registry.register(ReplicaId::new(0), replica_handle)?;
//!
//! let directory = ReplicaDirectory::new(registry);
//! let replica = directory.resolve(ReplicaId::new(0))?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use causeway_types::{ReplicaHandle, ReplicaId, ReplicaStatus, RpcError};

mod registry;

pub use registry::{InMemoryRegistry, Registry};


/// Errors from registry operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("{0} is already registered")]
    AlreadyRegistered(ReplicaId),

    #[error("{0} is not registered")]
    NotRegistered(ReplicaId),

    #[error("registry lock poisoned")]
    LockPoisoned,
}

impl DirectoryError {
    /// Maps a failed lookup of `replica` onto the caller-facing taxonomy.
    fn into_rpc(self, replica: ReplicaId) -> RpcError {
        match self {
            Self::LockPoisoned => RpcError::internal("registry lock poisoned"),
            other => RpcError::unreachable(replica, other.to_string()),
        }
    }
}

/// A cached handle plus the last status it reported.
struct CachedReplica {
    handle: ReplicaHandle,
    status: Option<ReplicaStatus>,
}

/// Lazily resolves and caches replica handles and their statuses.
///
/// Every caller (a replica reaching its peers, the front end reaching
/// replicas) owns its own directory over a shared registry.
pub struct ReplicaDirectory {
    registry: Arc<dyn Registry>,
    cache: RwLock<HashMap<ReplicaId, CachedReplica>>,
}

impl ReplicaDirectory {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the handle for `id`, looking it up on first use.
    ///
    /// Does not contact the replica.
    pub fn handle(&self, id: ReplicaId) -> Result<ReplicaHandle, RpcError> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| RpcError::internal("lock poisoned"))?;
            if let Some(cached) = cache.get(&id) {
                return Ok(Arc::clone(&cached.handle));
            }
        }

        let handle = self
            .registry
            .lookup(id)
            .map_err(|e| e.into_rpc(id))?;

        let mut cache = self
            .cache
            .write()
            .map_err(|_| RpcError::internal("lock poisoned"))?;
        let cached = cache.entry(id).or_insert_with(|| CachedReplica {
            handle,
            status: None,
        });
        tracing::debug!(replica = %id, "resolved replica handle");
        Ok(Arc::clone(&cached.handle))
    }

    /// Returns the handle for `id` together with the status it reports now.
    ///
    /// The fetched status replaces the cached one. A replica that cannot be
    /// asked for its status is dropped from the cache so the next call looks
    /// it up afresh.
    pub fn probe(&self, id: ReplicaId) -> Result<(ReplicaHandle, ReplicaStatus), RpcError> {
        let handle = self.handle(id)?;

        let status = match handle.status() {
            Ok(status) => status,
            Err(e) => {
                self.forget(id)?;
                return Err(e);
            }
        };
        self.record_status(id, status)?;

        Ok((handle, status))
    }

    /// Returns the handle for `id` after confirming the replica is not
    /// offline.
    pub fn resolve(&self, id: ReplicaId) -> Result<ReplicaHandle, RpcError> {
        let (handle, status) = self.probe(id)?;
        if status.is_offline() {
            return Err(RpcError::Offline { replica: id });
        }
        Ok(handle)
    }

    /// Current status of `id`, treating any failure to ask as offline.
    pub fn status(&self, id: ReplicaId) -> ReplicaStatus {
        match self.probe(id) {
            Ok((_, status)) => status,
            Err(e) => {
                tracing::debug!(replica = %id, error = %e, "replica treated as offline");
                ReplicaStatus::Offline
            }
        }
    }

    /// Status recorded by the last resolution, if any.
    pub fn cached_status(&self, id: ReplicaId) -> Option<ReplicaStatus> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&id).and_then(|cached| cached.status))
    }

    /// Drops the cached handle and status for `id`.
    pub fn forget(&self, id: ReplicaId) -> Result<(), RpcError> {
        self.cache
            .write()
            .map_err(|_| RpcError::internal("lock poisoned"))?
            .remove(&id);
        Ok(())
    }

    fn record_status(&self, id: ReplicaId, status: ReplicaStatus) -> Result<(), RpcError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| RpcError::internal("lock poisoned"))?;
        if let Some(cached) = cache.get_mut(&id) {
            if cached.status != Some(status) {
                tracing::debug!(replica = %id, %status, "replica status changed");
            }
            cached.status = Some(status);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplicaDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.cache.read().map_or(0, |cache| cache.len());
        f.debug_struct("ReplicaDirectory")
            .field("cached", &cached)
            .finish_non_exhaustive()
    }
}
