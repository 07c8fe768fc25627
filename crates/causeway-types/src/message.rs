//! Requests, log entries and replica messages.
//!
//! ## Client → Replica
//! - [`QueryRequest`] - read one item, optionally for one user
//! - [`MutationRequest`] - write one `(item, user)` rating (update or submit)
//!
//! ## Replica → Client
//! - [`QueryResponse`] - the replica's value clock plus the query result
//! - [`MutationResponse`] - the clock the client should merge, plus success
//!
//! ## Replica → Replica
//! - [`GossipMessage`] - anti-entropy payload: entries the peer may lack
//!   plus the sender's replica clock

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{ItemDetails, ItemId, Rating, ReplicaId, RequestId, UserId, VectorClock};

// ============================================================================
// Request Parameters
// ============================================================================

/// Parameters of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub item: ItemId,
    /// Whose own rating to report, if anyone's.
    pub user: Option<UserId>,
}

impl QueryParams {
    pub fn new(item: ItemId, user: Option<UserId>) -> Self {
        Self { item, user }
    }
}

/// Parameters of a write. Update and submit carry the same payload; they
/// differ only in the precondition a replica checks before accepting them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingParams {
    pub item: ItemId,
    pub user: UserId,
    pub rating: Rating,
}

impl RatingParams {
    pub fn new(item: ItemId, user: UserId, rating: Rating) -> Self {
        Self { item, user, rating }
    }
}

// ============================================================================
// Request
// ============================================================================

/// A client request as seen by a replica.
///
/// `clock` is the issuer's session clock at the time of the call: the replica
/// must reflect at least that much history before it answers a query, and a
/// mutation only becomes applicable once the replica's value has caught up
/// with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request<P> {
    pub params: P,
    pub clock: VectorClock,
    pub id: RequestId,
}

/// A read request.
pub type QueryRequest = Request<QueryParams>;

/// A write request.
pub type MutationRequest = Request<RatingParams>;

impl<P> Request<P> {
    /// Creates a request with a freshly generated id.
    pub fn new(params: P, clock: VectorClock) -> Self {
        Self::with_id(params, clock, RequestId::generate())
    }

    /// Creates a request with a caller-chosen id (retries reuse the id).
    pub fn with_id(params: P, clock: VectorClock, id: RequestId) -> Self {
        Self { params, clock, id }
    }

    /// A request is stable once everything it causally depends on has been
    /// applied, i.e. its clock is before-or-equal the value clock.
    pub fn is_stable(&self, value_clock: &VectorClock) -> bool {
        self.clock.is_before_or_equal(value_clock)
    }
}

// ============================================================================
// Update Log Entry
// ============================================================================

/// A mutation a replica has accepted, as kept in its update log and shipped
/// in gossip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateLogEntry {
    /// Replica that accepted the mutation from a client.
    pub origin: ReplicaId,
    /// The value clock a store reaches after applying this entry (the
    /// request clock with the origin slot advanced).
    pub clock: VectorClock,
    pub request: MutationRequest,
}

impl UpdateLogEntry {
    pub fn new(origin: ReplicaId, clock: VectorClock, request: MutationRequest) -> Self {
        Self {
            origin,
            clock,
            request,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request.id
    }

    /// Deterministic application order: entry clock (lexicographic, which
    /// extends the causal order), then request id.
    pub fn cmp_application_order(&self, other: &UpdateLogEntry) -> Ordering {
        self.clock
            .cmp_lexicographic(&other.clock)
            .then_with(|| self.request.id.cmp(&other.request.id))
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Reply to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The replica's value clock when the answer was produced.
    pub clock: VectorClock,
    pub details: ItemDetails,
}

/// Reply to an update or submit.
///
/// A rejected precondition is a normal negative answer (`success == false`)
/// carrying the request's unchanged clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub clock: VectorClock,
    pub success: bool,
}

impl MutationResponse {
    pub fn succeeded(clock: VectorClock) -> Self {
        Self {
            clock,
            success: true,
        }
    }

    pub fn rejected(clock: VectorClock) -> Self {
        Self {
            clock,
            success: false,
        }
    }
}

// ============================================================================
// Gossip
// ============================================================================

/// Anti-entropy message from one replica to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub sender: ReplicaId,
    /// Entries the sender believes the receiver may not have.
    pub entries: Vec<UpdateLogEntry>,
    /// Sender's replica clock (everything it has accepted into its log).
    pub sender_clock: VectorClock,
}

impl GossipMessage {
    pub fn new(sender: ReplicaId, entries: Vec<UpdateLogEntry>, sender_clock: VectorClock) -> Self {
        Self {
            sender,
            entries,
            sender_clock,
        }
    }
}

impl std::fmt::Display for GossipMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gossip from {} (clock {}, {} entries)",
            self.sender,
            self.sender_clock,
            self.entries.len()
        )
    }
}
