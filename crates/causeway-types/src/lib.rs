//! # causeway-types: Core types for `Causeway`
//!
//! This crate contains shared types used across the `Causeway` system:
//! - Entity IDs ([`ReplicaId`], [`ItemId`], [`UserId`], [`RequestId`])
//! - Causal time ([`VectorClock`])
//! - Ratings ([`Rating`], [`RatingDistribution`])
//! - Catalog data ([`Item`], [`ItemDetails`])
//! - Replica health ([`ReplicaStatus`])
//! - Requests and wire messages ([`Request`], [`UpdateLogEntry`],
//!   [`GossipMessage`], [`QueryResponse`], [`MutationResponse`])
//! - The replica call surface ([`ReplicaApi`], [`RpcError`])

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

mod api;
mod clock;
mod item;
mod message;

pub use api::{ReplicaApi, ReplicaHandle, RpcError};
pub use clock::VectorClock;
pub use item::{InvalidRating, Item, ItemDetails, Rating, RatingDistribution};
pub use message::{
    GossipMessage, MutationRequest, MutationResponse, QueryParams, QueryRequest, QueryResponse,
    RatingParams, Request, UpdateLogEntry,
};

#[cfg(test)]
mod tests;

// ============================================================================
// Entity IDs - All Copy (cheap fixed-size values)
// ============================================================================

/// Identifier of a replica.
///
/// Replica ids are dense, starting at zero: replica `i` owns slot `i` of
/// every [`VectorClock`] in the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(u32);

impl ReplicaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the vector clock slot owned by this replica.
    pub fn as_index(self) -> usize {
        self.0 as usize
    }

    /// Builds the id owning vector clock slot `index`.
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("replica index exceeds u32::MAX"))
    }

    /// Iterates over every replica id of a deployment with `count` replicas.
    pub fn all(count: usize) -> impl Iterator<Item = ReplicaId> {
        (0..count).map(ReplicaId::from_index)
    }
}

impl Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "replica-{}", self.0)
    }
}

impl From<u32> for ReplicaId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ReplicaId> for u32 {
    fn from(id: ReplicaId) -> Self {
        id.0
    }
}

/// Identifier of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(u32);

impl ItemId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ItemId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ItemId> for u32 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

/// Identifier of a user who rates items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(u32);

impl UserId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UserId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<UserId> for u32 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Globally unique identifier of a client request.
///
/// Every request a replica receives carries a fresh id; a mutation fanned out
/// to two replicas becomes two requests, each stamped by the replica that
/// accepted it. Replicas use the id to make application exactly-once: a
/// request id is applied to a store at most one time, however many paths
/// (direct submission, gossip, catch-up) deliver it, and a retry reusing the
/// id is rejected.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Generates a fresh random (v4) request id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Restores a request id from its 128-bit representation.
    pub fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl Debug for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Replica Status
// ============================================================================

/// Operator-controlled health of a replica.
///
/// Status is advisory: it steers the front end's replica selection and the
/// directory's reachability answer, but a replica keeps serving every call it
/// actually receives whatever its own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReplicaStatus {
    /// Serving normally. Preferred by the front end.
    #[default]
    Active,
    /// Reachable but busy. Only picked when not enough replicas are active.
    Overloaded,
    /// Treated as unreachable by callers. Does not send gossip.
    Offline,
}

impl ReplicaStatus {
    /// Parses the numeric status code used by the interactive client
    /// (`0` = active, `1` = overloaded, `2` = offline).
    pub fn from_code(code: u8) -> Result<Self, InvalidStatusCode> {
        match code {
            0 => Ok(Self::Active),
            1 => Ok(Self::Overloaded),
            2 => Ok(Self::Offline),
            other => Err(InvalidStatusCode(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Overloaded => 1,
            Self::Offline => 2,
        }
    }

    pub fn is_offline(self) -> bool {
        self == Self::Offline
    }
}

impl Display for ReplicaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Overloaded => write!(f, "OVERLOADED"),
            Self::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// A status code outside `0..=2`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid replica status code {0} (expected 0=active, 1=overloaded, 2=offline)")]
pub struct InvalidStatusCode(pub u8);
