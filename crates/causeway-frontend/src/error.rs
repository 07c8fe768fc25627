//! Error types for the front end.

use causeway_types::{ReplicaId, RpcError};

/// Result type for front-end operations.
pub type Result<T> = std::result::Result<T, FrontEndError>;

/// Failures the front end reports to its caller.
///
/// A rejected precondition is not among them: update and submit answer
/// `Ok(false)` for that.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrontEndError {
    /// Not enough replicas are active or overloaded to serve the call.
    #[error("service unavailable: {required} replica(s) required, {available} available")]
    Unavailable { required: usize, available: usize },

    /// The replica chosen for a query failed.
    #[error("{replica} failed to answer: {source}")]
    Replica {
        replica: ReplicaId,
        #[source]
        source: RpcError,
    },

    /// A replica contacted for a mutation failed, so the mutation as a whole
    /// did not happen.
    #[error("mutation not replicated, {replica} failed: {source}")]
    Replication {
        replica: ReplicaId,
        #[source]
        source: RpcError,
    },

    #[error("no such replica: {0}")]
    UnknownReplica(ReplicaId),

    #[error("internal front-end error: {0}")]
    Internal(String),
}

impl FrontEndError {
    pub(crate) fn lock_poisoned() -> Self {
        Self::Internal("lock poisoned".to_string())
    }
}
