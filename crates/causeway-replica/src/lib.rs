//! # causeway-replica: A causally consistent ratings replica
//!
//! A [`Replica`] holds a copy of the ratings data and serves the
//! [`ReplicaApi`](causeway_types::ReplicaApi) surface. Mutations are logged
//! with a vector clock stamp and applied to the store only once everything
//! they causally depend on has been applied; replicas exchange their logs by
//! periodic gossip until every replica has every entry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         Replica                         │
//! │  ┌─────────────┐  ┌────────────┐  ┌──────────────────┐  │
//! │  │  UpdateLog  │─►│ stabilize  │─►│   ReplicaStore   │  │
//! │  └─────────────┘  └────────────┘  └──────────────────┘  │
//! │         ▲                                               │
//! │   client mutations, gossip, catch-up pulls              │
//! └─────────────────────────────────────────────────────────┘
//!             ▲                         │
//!             │     GossipTask (timer)  ▼
//!        peers' process_gossip   ◄── gossip_once
//! ```
//!
//! # Example
//!
//! ```ignore
//! let replica = Arc::new(Replica::new(
//!     ReplicaId::new(0),
//!     3,
//!     ReplicaDirectory::new(registry.clone()),
//!     ReplicaStore::from_catalog(&catalog),
//! ));
//! registry.register(replica.id(), replica.clone())?;
//! replica.start_gossip(Duration::from_secs(10))?;
//! ```

mod catalog;
mod error;
mod gossip;
mod replica;
mod store;
mod update_log;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use gossip::GossipTask;
pub use replica::{GossipRound, Replica, ReplicaSnapshot};
pub use store::ReplicaStore;
pub use update_log::{TimestampTable, UpdateLog};
