//! The replica call surface.
//!
//! Everything that talks to a replica (the front end, the directory's status
//! probe, peers gossiping or catching up) does so through [`ReplicaApi`].
//! Calls are synchronous and block the caller until the replica answers.
//! In-process replicas implement the trait directly; a networked transport
//! implements it with a client stub that maps transport failures onto
//! [`RpcError`].

use std::fmt::Debug;
use std::sync::Arc;

use crate::{
    GossipMessage, MutationRequest, MutationResponse, QueryRequest, QueryResponse, ReplicaId,
    ReplicaStatus, UpdateLogEntry, VectorClock,
};

/// A shared handle to a replica, local or remote.
pub type ReplicaHandle = Arc<dyn ReplicaApi>;

/// Operations a replica serves.
///
/// Every method may fail with an [`RpcError`]; callers decide per call site
/// whether that failure is fatal (front-end fan-out) or skipped (gossip,
/// catch-up).
pub trait ReplicaApi: Send + Sync + Debug {
    /// Identity of the replica behind this handle.
    fn id(&self) -> ReplicaId;

    /// Answers a read once the replica reflects at least `request.clock`.
    fn query(&self, request: &QueryRequest) -> Result<QueryResponse, RpcError>;

    /// Replaces an existing rating. Rejected when the user has not rated the
    /// item yet.
    fn update(&self, request: &MutationRequest) -> Result<MutationResponse, RpcError>;

    /// Records a first rating. Rejected when the user already rated the item.
    fn submit(&self, request: &MutationRequest) -> Result<MutationResponse, RpcError>;

    /// Receives an anti-entropy message from a peer.
    fn process_gossip(&self, message: &GossipMessage) -> Result<(), RpcError>;

    /// Returns every logged entry whose clock is not covered by `clock`.
    fn find_required_updates(&self, clock: &VectorClock)
    -> Result<Vec<UpdateLogEntry>, RpcError>;

    fn status(&self) -> Result<ReplicaStatus, RpcError>;

    fn set_status(&self, status: ReplicaStatus) -> Result<(), RpcError>;
}

/// Failure of a call to a replica.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The replica could not be reached at all.
    #[error("{replica} is unreachable: {reason}")]
    Unreachable { replica: ReplicaId, reason: String },

    /// The replica reports itself offline.
    #[error("{replica} is offline")]
    Offline { replica: ReplicaId },

    /// The replica did not answer in time.
    #[error("call to {replica} timed out after {timeout_ms}ms")]
    Timeout { replica: ReplicaId, timeout_ms: u64 },

    /// A clock in the call does not have one slot per replica.
    #[error("clock dimension {actual} does not match replica count {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The replica failed while serving the call.
    #[error("internal replica error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn unreachable(replica: ReplicaId, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            replica,
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for failures that mean "this replica cannot be used right now".
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Offline { .. } | Self::Timeout { .. }
        )
    }
}
