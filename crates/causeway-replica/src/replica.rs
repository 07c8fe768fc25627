//! The replica: clocks, log and store behind one lock.
//!
//! # Clocks
//!
//! - `replica_clock` covers every entry this replica has accepted into its
//!   log. Its own slot advances by one per accepted client mutation and is
//!   never advanced by anyone else.
//! - `value_clock` covers every entry applied to the store. It only grows by
//!   merging the clocks of entries the stabilization loop applies.
//!
//! # Locking
//!
//! All mutable state sits behind a single mutex. A handler holds it for the
//! whole of its local work (insert, stabilize, purge) and never while calling
//! another replica: gossip and catch-up copy what they need, release the
//! lock, make the call, and lock again to fold the answer in.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use causeway_directory::ReplicaDirectory;
use causeway_types::{
    GossipMessage, MutationRequest, MutationResponse, QueryRequest, QueryResponse, ReplicaApi,
    ReplicaId, ReplicaStatus, RpcError, UpdateLogEntry, VectorClock,
};

use crate::gossip::GossipTask;
use crate::store::ReplicaStore;
use crate::update_log::{TimestampTable, UpdateLog};

// ============================================================================
// State
// ============================================================================

#[derive(Debug)]
struct ReplicaState {
    status: ReplicaStatus,
    replica_clock: VectorClock,
    value_clock: VectorClock,
    log: UpdateLog,
    timestamps: TimestampTable,
    store: ReplicaStore,
}

impl ReplicaState {
    fn new(replica_count: usize, store: ReplicaStore) -> Self {
        Self {
            status: ReplicaStatus::Active,
            replica_clock: VectorClock::new(replica_count),
            value_clock: VectorClock::new(replica_count),
            log: UpdateLog::new(),
            timestamps: TimestampTable::new(replica_count),
            store,
        }
    }

    /// Applies stable, unapplied entries until none are left.
    ///
    /// Each pass applies everything stable at its start in application
    /// order; applying can make more entries stable, hence the loop.
    fn stabilize(&mut self) -> usize {
        let mut applied = 0;
        while self
            .log
            .has_stable_entry(&self.value_clock, |id| self.store.has_executed(id))
        {
            let ready: Vec<UpdateLogEntry> = self
                .log
                .stable_entries(&self.value_clock)
                .into_iter()
                .filter(|entry| !self.store.has_executed(entry.request_id()))
                .cloned()
                .collect();

            for entry in ready {
                if self.store.apply_mutation(&entry) {
                    applied += 1;
                }
                self.value_clock.merge(&entry.clock);
            }
        }
        applied
    }

    /// Drops entries every replica has and this store already reflects.
    fn purge(&mut self) -> usize {
        let Self {
            log,
            timestamps,
            store,
            ..
        } = self;
        log.purge(timestamps, |id| store.has_executed(id))
    }

    /// Folds a peer's gossip into the log and the clocks.
    fn merge_gossip(&mut self, own_id: ReplicaId, message: &GossipMessage) -> usize {
        let mut added = 0;
        for entry in &message.entries {
            if !entry.clock.is_before_or_equal(&self.replica_clock) && self.log.add(entry.clone())
            {
                added += 1;
            }
        }

        self.replica_clock.merge(&message.sender_clock);
        self.timestamps.record(message.sender, &message.sender_clock);
        self.timestamps.record(own_id, &self.replica_clock);
        added
    }

    /// Folds entries pulled during catch-up into the log.
    ///
    /// The replica clock is left alone: a pulled entry's clock may name
    /// entries this replica has not received, and gossip filters against the
    /// replica clock.
    fn merge_pulled(&mut self, entries: Vec<UpdateLogEntry>) -> usize {
        entries
            .into_iter()
            .filter(|entry| self.log.add(entry.clone()))
            .count()
    }
}

// ============================================================================
// Public Types
// ============================================================================

/// Point-in-time view of a replica's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaSnapshot {
    pub id: ReplicaId,
    pub status: ReplicaStatus,
    pub replica_clock: VectorClock,
    pub value_clock: VectorClock,
    /// Entries still held in the update log.
    pub log_len: usize,
    /// Mutations applied to the store.
    pub executed: usize,
}

/// Outcome of one gossip round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GossipRound {
    /// Peers that accepted the message.
    pub delivered: usize,
    /// Peers that could not be reached.
    pub skipped: usize,
    /// Entries shipped across all delivered messages.
    pub entries_sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    Update,
    Submit,
}

impl MutationKind {
    /// Update needs an existing rating, submit needs its absence.
    fn allows(self, already_rated: bool) -> bool {
        match self {
            Self::Update => already_rated,
            Self::Submit => !already_rated,
        }
    }
}

// ============================================================================
// Replica
// ============================================================================

/// One replica of the ratings data.
#[derive(Debug)]
pub struct Replica {
    id: ReplicaId,
    replica_count: usize,
    state: Mutex<ReplicaState>,
    peers: ReplicaDirectory,
    gossip: Mutex<Option<GossipTask>>,
}

impl Replica {
    /// Creates replica `id` of a deployment of `replica_count` replicas.
    ///
    /// `peers` is this replica's own directory, used to reach the others for
    /// gossip and catch-up.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not name one of the `replica_count` slots.
    pub fn new(
        id: ReplicaId,
        replica_count: usize,
        peers: ReplicaDirectory,
        store: ReplicaStore,
    ) -> Self {
        assert!(
            id.as_index() < replica_count,
            "{id} out of range for {replica_count} replicas"
        );
        Self {
            id,
            replica_count,
            state: Mutex::new(ReplicaState::new(replica_count, store)),
            peers,
            gossip: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn replica_count(&self) -> usize {
        self.replica_count
    }

    pub fn snapshot(&self) -> Result<ReplicaSnapshot, RpcError> {
        let state = self.state()?;
        Ok(ReplicaSnapshot {
            id: self.id,
            status: state.status,
            replica_clock: state.replica_clock.clone(),
            value_clock: state.value_clock.clone(),
            log_len: state.log.len(),
            executed: state.store.executed_count(),
        })
    }

    /// Sends one round of gossip to every peer.
    ///
    /// Does nothing while this replica is offline. Unreachable peers are
    /// skipped; the next round tries them again.
    pub fn gossip_once(&self) -> Result<GossipRound, RpcError> {
        let messages: Vec<(ReplicaId, GossipMessage)> = {
            let state = self.state()?;
            if state.status.is_offline() {
                tracing::debug!(replica = %self.id, "offline, not gossiping");
                return Ok(GossipRound::default());
            }

            ReplicaId::all(self.replica_count)
                .filter(|peer| *peer != self.id)
                .map(|peer| {
                    let entries = state
                        .log
                        .entries_not_dominated_by(state.timestamps.get(peer))
                        .into_iter()
                        .cloned()
                        .collect();
                    let message =
                        GossipMessage::new(self.id, entries, state.replica_clock.clone());
                    (peer, message)
                })
                .collect()
        };

        let mut round = GossipRound::default();
        for (peer, message) in messages {
            let sent = self
                .peers
                .resolve(peer)
                .and_then(|handle| handle.process_gossip(&message));
            match sent {
                Ok(()) => {
                    round.delivered += 1;
                    round.entries_sent += message.entries.len();
                }
                Err(e) => {
                    round.skipped += 1;
                    tracing::debug!(replica = %self.id, %peer, error = %e, "gossip not delivered");
                }
            }
        }

        tracing::debug!(
            replica = %self.id,
            delivered = round.delivered,
            skipped = round.skipped,
            entries = round.entries_sent,
            "gossip round complete"
        );
        Ok(round)
    }

    /// Starts gossiping every `period` on the current tokio runtime.
    ///
    /// Replaces (and so stops) any task already running. The task holds only
    /// a weak reference and ends by itself once the replica is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_gossip(self: &Arc<Self>, period: Duration) -> Result<(), RpcError> {
        let task = GossipTask::spawn(Arc::downgrade(self), period);
        let mut slot = self
            .gossip
            .lock()
            .map_err(|_| RpcError::internal("lock poisoned"))?;
        *slot = Some(task);
        tracing::info!(replica = %self.id, ?period, "gossip started");
        Ok(())
    }

    /// Detaches the running gossip task, if any, for the caller to stop.
    pub fn stop_gossip(&self) -> Result<Option<GossipTask>, RpcError> {
        let task = self
            .gossip
            .lock()
            .map_err(|_| RpcError::internal("lock poisoned"))?
            .take();
        if let Some(task) = &task {
            task.shutdown();
            tracing::info!(replica = %self.id, "gossip stopped");
        }
        Ok(task)
    }

    fn state(&self) -> Result<MutexGuard<'_, ReplicaState>, RpcError> {
        self.state
            .lock()
            .map_err(|_| RpcError::internal("lock poisoned"))
    }

    fn check_dimension(&self, clock: &VectorClock) -> Result<(), RpcError> {
        if clock.dimension() != self.replica_count {
            return Err(RpcError::DimensionMismatch {
                expected: self.replica_count,
                actual: clock.dimension(),
            });
        }
        Ok(())
    }

    /// Checks an entry received from a peer before it reaches the state.
    fn check_entry(&self, entry: &UpdateLogEntry) -> Result<(), RpcError> {
        self.check_dimension(&entry.clock)?;
        self.check_dimension(&entry.request.clock)?;
        if entry.origin.as_index() >= self.replica_count {
            return Err(RpcError::internal(format!(
                "entry {} from unknown {}",
                entry.request_id(),
                entry.origin
            )));
        }
        Ok(())
    }

    /// Pulls what this replica lacks to cover `required`, best effort.
    ///
    /// For each slot where the store is behind, asks the replica owning that
    /// slot for every entry not covered by the local value clock. Owners
    /// that cannot be reached, or that answer with malformed entries, are
    /// skipped.
    fn catch_up(&self, required: &VectorClock) -> Result<(), RpcError> {
        let value_clock = self.state()?.value_clock.clone();
        if !required.is_after(&value_clock) {
            return Ok(());
        }

        for (owner, needed) in required.iter() {
            if owner == self.id || needed <= value_clock.get(owner) {
                continue;
            }

            let pulled = self
                .peers
                .resolve(owner)
                .and_then(|peer| peer.find_required_updates(&value_clock))
                .and_then(|entries| {
                    entries.iter().try_for_each(|entry| self.check_entry(entry))?;
                    Ok(entries)
                });
            let entries = match pulled {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(replica = %self.id, %owner, error = %e, "catch-up skipped");
                    continue;
                }
            };

            let mut state = self.state()?;
            let added = state.merge_pulled(entries);
            let applied = state.stabilize();
            tracing::debug!(replica = %self.id, %owner, added, applied, "caught up");
        }
        Ok(())
    }

    fn mutate(
        &self,
        request: &MutationRequest,
        kind: MutationKind,
    ) -> Result<MutationResponse, RpcError> {
        self.check_dimension(&request.clock)?;

        let mut state = self.state()?;
        if state.log.contains(request.id) || state.store.has_executed(request.id) {
            tracing::debug!(
                replica = %self.id,
                request = %request.id,
                "duplicate request rejected"
            );
            return Ok(MutationResponse::rejected(request.clock.clone()));
        }

        let params = request.params;
        let already_rated = state.store.has_rating(params.item, params.user);
        if !kind.allows(already_rated) {
            tracing::debug!(
                replica = %self.id,
                ?kind,
                item = %params.item,
                user = %params.user,
                "precondition failed"
            );
            return Ok(MutationResponse::rejected(request.clock.clone()));
        }

        let stamp = state.replica_clock.increment(self.id);
        let replica_clock = state.replica_clock.clone();
        state.timestamps.record(self.id, &replica_clock);

        let mut clock = request.clock.clone();
        clock.set(self.id, stamp);
        state
            .log
            .add(UpdateLogEntry::new(self.id, clock.clone(), request.clone()));
        let applied = state.stabilize();

        tracing::debug!(
            replica = %self.id,
            ?kind,
            request = %request.id,
            %clock,
            applied,
            "mutation accepted"
        );
        Ok(MutationResponse::succeeded(clock))
    }
}

impl ReplicaApi for Replica {
    fn id(&self) -> ReplicaId {
        self.id
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryResponse, RpcError> {
        self.check_dimension(&request.clock)?;
        self.catch_up(&request.clock)?;

        let state = self.state()?;
        if request.clock.is_after(&state.value_clock) {
            tracing::warn!(
                replica = %self.id,
                required = %request.clock,
                value = %state.value_clock,
                "answering query behind the caller's session"
            );
        }
        Ok(QueryResponse {
            clock: state.value_clock.clone(),
            details: state.store.query(&request.params),
        })
    }

    fn update(&self, request: &MutationRequest) -> Result<MutationResponse, RpcError> {
        self.mutate(request, MutationKind::Update)
    }

    fn submit(&self, request: &MutationRequest) -> Result<MutationResponse, RpcError> {
        self.mutate(request, MutationKind::Submit)
    }

    fn process_gossip(&self, message: &GossipMessage) -> Result<(), RpcError> {
        self.check_dimension(&message.sender_clock)?;
        if message.sender.as_index() >= self.replica_count {
            return Err(RpcError::internal(format!(
                "gossip from unknown {}",
                message.sender
            )));
        }
        for entry in &message.entries {
            self.check_entry(entry)?;
        }

        let mut state = self.state()?;
        let added = state.merge_gossip(self.id, message);
        let applied = state.stabilize();
        let purged = state.purge();

        tracing::debug!(
            replica = %self.id,
            from = %message.sender,
            added,
            applied,
            purged,
            "gossip received"
        );
        Ok(())
    }

    fn find_required_updates(
        &self,
        clock: &VectorClock,
    ) -> Result<Vec<UpdateLogEntry>, RpcError> {
        self.check_dimension(clock)?;
        let state = self.state()?;
        Ok(state
            .log
            .entries_not_dominated_by(clock)
            .into_iter()
            .cloned()
            .collect())
    }

    fn status(&self) -> Result<ReplicaStatus, RpcError> {
        Ok(self.state()?.status)
    }

    fn set_status(&self, status: ReplicaStatus) -> Result<(), RpcError> {
        let mut state = self.state()?;
        if state.status != status {
            tracing::info!(
                replica = %self.id,
                from = %state.status,
                to = %status,
                "status changed"
            );
            state.status = status;
        }
        Ok(())
    }
}
