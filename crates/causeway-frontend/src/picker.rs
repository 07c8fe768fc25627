//! Replica selection with sticky affinity.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use causeway_directory::ReplicaDirectory;
use causeway_types::{ReplicaHandle, ReplicaId, ReplicaStatus};

use crate::error::{FrontEndError, Result};

/// Statuses accepted by a pick, most preferred first.
const TIERS: [ReplicaStatus; 2] = [ReplicaStatus::Active, ReplicaStatus::Overloaded];

/// Chooses which replicas the front end talks to.
///
/// Keeps an ordering of replica ids with the most recently picked first, so
/// the front end keeps using the same replicas while they stay healthy.
/// Picks are serialized: each one is a single critical section over the
/// ordering.
#[derive(Debug)]
pub struct ReplicaPicker {
    directory: Arc<ReplicaDirectory>,
    replica_count: usize,
    order: Mutex<VecDeque<ReplicaId>>,
}

impl ReplicaPicker {
    pub fn new(directory: Arc<ReplicaDirectory>, replica_count: usize) -> Self {
        Self {
            directory,
            replica_count,
            order: Mutex::new(ReplicaId::all(replica_count).collect()),
        }
    }

    /// Picks `count` distinct replicas.
    ///
    /// Scans the ordering for active replicas first and tops up with
    /// overloaded ones. Offline and unreachable replicas are never picked.
    /// The chosen replicas move to the front of the ordering, in pick order.
    pub fn pick(&self, count: usize) -> Result<Vec<ReplicaHandle>> {
        let mut order = self.order.lock().map_err(|_| FrontEndError::lock_poisoned())?;

        let candidates: Vec<ReplicaId> = order.iter().copied().collect();
        let mut probes: Vec<Option<(ReplicaStatus, Option<ReplicaHandle>)>> =
            vec![None; candidates.len()];
        let mut chosen: Vec<(ReplicaId, ReplicaHandle)> = Vec::with_capacity(count);

        for tier in TIERS {
            for (slot, id) in candidates.iter().enumerate() {
                if chosen.len() == count {
                    break;
                }
                if chosen.iter().any(|(picked, _)| picked == id) {
                    continue;
                }

                let (status, handle) = probes[slot].get_or_insert_with(|| self.probe(*id));
                if *status == tier
                    && let Some(handle) = handle
                {
                    chosen.push((*id, Arc::clone(handle)));
                }
            }
        }

        if chosen.len() < count {
            tracing::warn!(required = count, available = chosen.len(), "not enough replicas");
            return Err(FrontEndError::Unavailable {
                required: count,
                available: chosen.len(),
            });
        }

        order.retain(|id| !chosen.iter().any(|(picked, _)| picked == id));
        for (id, _) in chosen.iter().rev() {
            order.push_front(*id);
        }

        let picked: Vec<ReplicaId> = chosen.iter().map(|(id, _)| *id).collect();
        tracing::debug!(?picked, "replicas picked");
        Ok(chosen.into_iter().map(|(_, handle)| handle).collect())
    }

    /// Restores the initial ordering `0, 1, .., n-1`.
    pub fn reset(&self) -> Result<()> {
        let mut order = self.order.lock().map_err(|_| FrontEndError::lock_poisoned())?;
        *order = ReplicaId::all(self.replica_count).collect();
        tracing::debug!("picker order reset");
        Ok(())
    }

    /// Current ordering, most recently picked first.
    pub fn order(&self) -> Result<Vec<ReplicaId>> {
        let order = self.order.lock().map_err(|_| FrontEndError::lock_poisoned())?;
        Ok(order.iter().copied().collect())
    }

    fn probe(&self, id: ReplicaId) -> (ReplicaStatus, Option<ReplicaHandle>) {
        match self.directory.probe(id) {
            Ok((handle, status)) => (status, Some(handle)),
            Err(e) => {
                tracing::debug!(replica = %id, error = %e, "replica unreachable");
                (ReplicaStatus::Offline, None)
            }
        }
    }
}
