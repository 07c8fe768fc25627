//! # causeway-frontend: Client sessions over the replicas
//!
//! The [`FrontEnd`] is what clients talk to. It tracks the session's vector
//! clock, picks replicas through a [`ReplicaPicker`] and fans mutations out
//! to more than one replica so that a single failure loses nothing.
//!
//! # Example
//!
//! ```ignore
//! let directory = Arc::new(ReplicaDirectory::new(registry));
//! let front_end = FrontEnd::new(directory, 3);
//!
//! front_end.submit(RatingParams::new(item, user, Rating::new(4.0)?))?;
//! let details = front_end.query(QueryParams::new(item, Some(user)))?;
//! ```

mod error;
mod frontend;
mod picker;

pub use error::{FrontEndError, Result};
pub use frontend::{DEFAULT_WRITE_REPLICAS, FrontEnd, FrontEndApi};
pub use picker::ReplicaPicker;
