//! The client-facing coordinator.

use std::sync::{Arc, Mutex, MutexGuard};

use causeway_directory::ReplicaDirectory;
use causeway_types::{
    ItemDetails, MutationRequest, MutationResponse, QueryParams, QueryRequest, RatingParams,
    ReplicaId, ReplicaStatus, RpcError, VectorClock,
};

use crate::error::{FrontEndError, Result};
use crate::picker::ReplicaPicker;

/// Replicas contacted per mutation unless configured otherwise.
pub const DEFAULT_WRITE_REPLICAS: usize = 2;

/// Operations the front end offers its clients.
pub trait FrontEndApi: Send + Sync {
    /// Reads an item, and the user's own rating when a user is given.
    fn query(&self, params: QueryParams) -> Result<ItemDetails>;

    /// Replaces an existing rating. `Ok(false)` when a contacted replica
    /// rejected it.
    fn update(&self, params: RatingParams) -> Result<bool>;

    /// Records a first rating. `Ok(false)` when a contacted replica rejected
    /// it.
    fn submit(&self, params: RatingParams) -> Result<bool>;

    /// Operator command: sets a replica's status.
    fn change_replica_status(&self, replica: ReplicaId, status: ReplicaStatus) -> Result<()>;

    /// Restores the picker's initial replica ordering.
    fn reset_picker_state(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Update,
    Submit,
}

/// Coordinates one client session across the replicas.
///
/// Queries go to one replica, mutations to `write_replicas` of them. The
/// session clock collects every clock the replicas answer with and rides
/// along on every request, so the client never observes the past of
/// something it has already seen.
#[derive(Debug)]
pub struct FrontEnd {
    replica_count: usize,
    write_replicas: usize,
    directory: Arc<ReplicaDirectory>,
    picker: ReplicaPicker,
    session: Mutex<VectorClock>,
}

impl FrontEnd {
    pub fn new(directory: Arc<ReplicaDirectory>, replica_count: usize) -> Self {
        Self {
            replica_count,
            write_replicas: DEFAULT_WRITE_REPLICAS.min(replica_count),
            picker: ReplicaPicker::new(Arc::clone(&directory), replica_count),
            directory,
            session: Mutex::new(VectorClock::new(replica_count)),
        }
    }

    /// Sets how many replicas each mutation must reach.
    pub fn with_write_replicas(mut self, write_replicas: usize) -> Self {
        self.write_replicas = write_replicas;
        self
    }

    pub fn write_replicas(&self) -> usize {
        self.write_replicas
    }

    pub fn session_clock(&self) -> Result<VectorClock> {
        Ok(self.session()?.clone())
    }

    pub fn picker(&self) -> &ReplicaPicker {
        &self.picker
    }

    fn session(&self) -> Result<MutexGuard<'_, VectorClock>> {
        self.session.lock().map_err(|_| FrontEndError::lock_poisoned())
    }

    /// Sends the mutation to every picked replica with the same
    /// pre-mutation session clock.
    ///
    /// Each replica receives its own request: the copies become separate log
    /// entries, each stamped by the replica that accepted it.
    fn mutate(&self, params: RatingParams, kind: Mutation) -> Result<bool> {
        let replicas = self.picker.pick(self.write_replicas)?;
        let clock = self.session_clock()?;

        let mut observed = clock.clone();
        let mut accepted = true;
        let mut failure: Option<FrontEndError> = None;

        for replica in &replicas {
            let request = MutationRequest::new(params, clock.clone());
            let result: std::result::Result<MutationResponse, RpcError> = match kind {
                Mutation::Update => replica.update(&request),
                Mutation::Submit => replica.submit(&request),
            };

            match result {
                Ok(response) => {
                    observed.merge(&response.clock);
                    accepted &= response.success;
                }
                Err(source) => {
                    tracing::warn!(
                        replica = %replica.id(),
                        ?kind,
                        error = %source,
                        "mutation fan-out failed"
                    );
                    failure.get_or_insert(FrontEndError::Replication {
                        replica: replica.id(),
                        source,
                    });
                }
            }
        }

        self.session()?.merge(&observed);

        match failure {
            Some(error) => Err(error),
            None => {
                tracing::debug!(
                    ?kind,
                    item = %params.item,
                    user = %params.user,
                    accepted,
                    "mutation done"
                );
                Ok(accepted)
            }
        }
    }
}

impl FrontEndApi for FrontEnd {
    fn query(&self, params: QueryParams) -> Result<ItemDetails> {
        let replica = self
            .picker
            .pick(1)?
            .into_iter()
            .next()
            .ok_or(FrontEndError::Unavailable {
                required: 1,
                available: 0,
            })?;

        let request = QueryRequest::new(params, self.session_clock()?);
        let response = replica
            .query(&request)
            .map_err(|source| FrontEndError::Replica {
                replica: replica.id(),
                source,
            })?;

        self.session()?.merge(&response.clock);
        Ok(response.details)
    }

    fn update(&self, params: RatingParams) -> Result<bool> {
        self.mutate(params, Mutation::Update)
    }

    fn submit(&self, params: RatingParams) -> Result<bool> {
        self.mutate(params, Mutation::Submit)
    }

    fn change_replica_status(&self, replica: ReplicaId, status: ReplicaStatus) -> Result<()> {
        if replica.as_index() >= self.replica_count {
            return Err(FrontEndError::UnknownReplica(replica));
        }

        self.directory
            .handle(replica)
            .and_then(|handle| handle.set_status(status))
            .map_err(|source| FrontEndError::Replica { replica, source })?;

        tracing::info!(%replica, %status, "replica status changed by operator");
        Ok(())
    }

    fn reset_picker_state(&self) -> Result<()> {
        self.picker.reset()
    }
}
