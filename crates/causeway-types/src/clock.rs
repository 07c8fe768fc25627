//! Fixed-dimension vector clocks.
//!
//! A [`VectorClock`] holds one counter per replica. Replica `i` is the only
//! writer of slot `i`; everyone else learns about slot `i` by merging.
//!
//! # Ordering
//!
//! ```text
//! a.is_before_or_equal(b)  <=>  a[i] <= b[i] for every i
//! a.is_after(b)            <=>  a[i] >  b[i] for some i
//! ```
//!
//! The two predicates are exact negations of each other. Two clocks that are
//! each `is_after` the other are concurrent: neither causally precedes the
//! other, and [`PartialOrd::partial_cmp`] returns `None` for them.
//!
//! Clocks of different dimensions never meet in a correct deployment, so a
//! dimension mismatch is a programming error and panics.

use std::cmp::Ordering;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::ReplicaId;

/// A vector of per-replica counters with the causal partial order.
///
/// `Clone` is the copy operation: operations that logically produce a new
/// clock clone first and mutate the clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock(Vec<u64>);

impl VectorClock {
    /// Creates an all-zero clock with one slot per replica.
    pub fn new(dimension: usize) -> Self {
        Self(vec![0; dimension])
    }

    /// Creates a clock from explicit slot values.
    pub fn from_slots(slots: impl Into<Vec<u64>>) -> Self {
        Self(slots.into())
    }

    /// Number of slots (the replica count of the deployment).
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn slots(&self) -> &[u64] {
        &self.0
    }

    /// Returns the counter of the slot owned by `replica`.
    pub fn get(&self, replica: ReplicaId) -> u64 {
        self.0[replica.as_index()]
    }

    /// Overwrites the counter of the slot owned by `replica`.
    pub fn set(&mut self, replica: ReplicaId, value: u64) {
        self.0[replica.as_index()] = value;
    }

    /// Advances `replica`'s slot by one and returns the new value.
    ///
    /// Only the owning replica may call this on its own clock.
    pub fn increment(&mut self, replica: ReplicaId) -> u64 {
        let slot = &mut self.0[replica.as_index()];
        *slot += 1;
        *slot
    }

    /// True iff some slot of `self` is strictly greater than in `other`.
    pub fn is_after(&self, other: &VectorClock) -> bool {
        self.assert_same_dimension(other);
        self.0.iter().zip(&other.0).any(|(a, b)| a > b)
    }

    /// True iff every slot of `self` is at most the one in `other`.
    pub fn is_before_or_equal(&self, other: &VectorClock) -> bool {
        !self.is_after(other)
    }

    /// True iff neither clock is before-or-equal to the other.
    pub fn is_concurrent_with(&self, other: &VectorClock) -> bool {
        self.is_after(other) && other.is_after(self)
    }

    /// Pointwise maximum, in place.
    pub fn merge(&mut self, other: &VectorClock) {
        self.assert_same_dimension(other);
        for (mine, theirs) in self.0.iter_mut().zip(&other.0) {
            *mine = (*mine).max(*theirs);
        }
    }

    /// Pointwise maximum, returning a new clock.
    pub fn merged(&self, other: &VectorClock) -> VectorClock {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Iterates over `(replica, counter)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ReplicaId, u64)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, v)| (ReplicaId::from_index(i), *v))
    }

    /// Lexicographic comparison of the slots.
    ///
    /// This is a linear extension of the causal order: if `a` is strictly
    /// before `b` then `a` is lexicographically smaller. Used wherever a
    /// deterministic total order over concurrent clocks is needed.
    pub fn cmp_lexicographic(&self, other: &VectorClock) -> Ordering {
        self.assert_same_dimension(other);
        self.0.cmp(&other.0)
    }

    fn assert_same_dimension(&self, other: &VectorClock) {
        assert_eq!(
            self.0.len(),
            other.0.len(),
            "vector clock dimension mismatch"
        );
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_before_or_equal(other), other.is_before_or_equal(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}
