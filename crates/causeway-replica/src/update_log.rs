//! Pending mutations and what each peer is known to have seen.
//!
//! The [`UpdateLog`] holds every mutation a replica has accepted (from a
//! client, from gossip, or from a catch-up pull) until the
//! [`TimestampTable`] proves that every replica already has it.

use std::collections::HashSet;

use causeway_types::{ReplicaId, RequestId, UpdateLogEntry, VectorClock};

// ============================================================================
// Update Log
// ============================================================================

/// A set of log entries, unique by request id.
///
/// Not synchronized on its own: the owning replica guards it together with
/// the clocks and the store, so inserts and the stabilization that follows
/// them happen in one critical section.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    entries: Vec<UpdateLogEntry>,
    ids: HashSet<RequestId>,
}

impl UpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` unless an entry with the same request id is present.
    ///
    /// Returns whether the entry was inserted.
    pub fn add(&mut self, entry: UpdateLogEntry) -> bool {
        if !self.ids.insert(entry.request_id()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.ids.contains(&id)
    }

    /// Entries whose request clock is covered by `value_clock`, in
    /// application order.
    pub fn stable_entries(&self, value_clock: &VectorClock) -> Vec<&UpdateLogEntry> {
        let mut stable: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.request.is_stable(value_clock))
            .collect();
        stable.sort_by(|a, b| a.cmp_application_order(b));
        stable
    }

    /// True while some entry is stable under `value_clock` and not yet
    /// applied according to `is_applied`.
    pub fn has_stable_entry<F>(&self, value_clock: &VectorClock, is_applied: F) -> bool
    where
        F: Fn(RequestId) -> bool,
    {
        self.entries
            .iter()
            .any(|entry| entry.request.is_stable(value_clock) && !is_applied(entry.request_id()))
    }

    /// Entries whose own clock is not covered by `clock`: what a holder of
    /// `clock` may still be missing. Returned in application order.
    pub fn entries_not_dominated_by(&self, clock: &VectorClock) -> Vec<&UpdateLogEntry> {
        let mut missing: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| !entry.clock.is_before_or_equal(clock))
            .collect();
        missing.sort_by(|a, b| a.cmp_application_order(b));
        missing
    }

    /// Removes entries every replica is known to have, provided `is_applied`
    /// confirms they are already reflected in the local store.
    ///
    /// Returns the number of entries removed.
    pub fn purge<F>(&mut self, table: &TimestampTable, is_applied: F) -> usize
    where
        F: Fn(RequestId) -> bool,
    {
        let before = self.entries.len();
        let ids = &mut self.ids;
        self.entries.retain(|entry| {
            let discard = table.is_known_everywhere(entry) && is_applied(entry.request_id());
            if discard {
                ids.remove(&entry.request_id());
            }
            !discard
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpdateLogEntry> {
        self.entries.iter()
    }
}

// ============================================================================
// Timestamp Table
// ============================================================================

/// One replica's estimate of every replica's replica clock.
///
/// Row `i` is the latest clock replica `i` has been observed to hold. Rows
/// only ever grow: recording merges, so a late gossip message cannot make a
/// row forget what an earlier one showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampTable {
    rows: Vec<VectorClock>,
}

impl TimestampTable {
    /// A table of all-zero rows for `replica_count` replicas.
    pub fn new(replica_count: usize) -> Self {
        Self {
            rows: vec![VectorClock::new(replica_count); replica_count],
        }
    }

    pub fn get(&self, replica: ReplicaId) -> &VectorClock {
        &self.rows[replica.as_index()]
    }

    /// Records that `replica` has been seen holding `clock`.
    pub fn record(&mut self, replica: ReplicaId, clock: &VectorClock) {
        self.rows[replica.as_index()].merge(clock);
    }

    /// True when every row covers the origin slot of `entry`.
    pub fn is_known_everywhere(&self, entry: &UpdateLogEntry) -> bool {
        let stamp = entry.clock.get(entry.origin);
        self.rows.iter().all(|row| row.get(entry.origin) >= stamp)
    }

    pub fn rows(&self) -> &[VectorClock] {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use causeway_types::{ItemId, MutationRequest, Rating, RatingParams, UserId};

    use super::*;

    fn vc(slots: &[u64]) -> VectorClock {
        VectorClock::from_slots(slots.to_vec())
    }

    fn entry(origin: u32, request_clock: &[u64], entry_clock: &[u64], id: u128) -> UpdateLogEntry {
        let request = MutationRequest::with_id(
            RatingParams::new(ItemId::new(1), UserId::new(1), Rating::new(3.0).unwrap()),
            vc(request_clock),
            RequestId::from_u128(id),
        );
        UpdateLogEntry::new(ReplicaId::new(origin), vc(entry_clock), request)
    }

    #[test]
    fn add_deduplicates_by_request_id() {
        let mut log = UpdateLog::new();

        assert!(log.add(entry(0, &[0, 0, 0], &[1, 0, 0], 1)));
        assert!(!log.add(entry(1, &[0, 0, 0], &[0, 1, 0], 1)));

        assert_eq!(log.len(), 1);
        assert!(log.contains(RequestId::from_u128(1)));
    }

    #[test]
    fn stable_entries_follow_value_clock() {
        let mut log = UpdateLog::new();
        log.add(entry(0, &[0, 0, 0], &[1, 0, 0], 1));
        log.add(entry(0, &[1, 0, 0], &[2, 0, 0], 2));

        let stable = log.stable_entries(&vc(&[0, 0, 0]));
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].request_id(), RequestId::from_u128(1));

        assert_eq!(log.stable_entries(&vc(&[1, 0, 0])).len(), 2);
    }

    #[test]
    fn has_stable_entry_ignores_applied_entries() {
        let mut log = UpdateLog::new();
        log.add(entry(0, &[0, 0, 0], &[1, 0, 0], 1));
        log.add(entry(0, &[1, 0, 0], &[2, 0, 0], 2));
        let first = RequestId::from_u128(1);

        assert!(log.has_stable_entry(&vc(&[0, 0, 0]), |_| false));
        assert!(!log.has_stable_entry(&vc(&[0, 0, 0]), |id| id == first));
        assert!(log.has_stable_entry(&vc(&[1, 0, 0]), |id| id == first));
    }

    #[test]
    fn stable_entries_are_in_application_order() {
        let mut log = UpdateLog::new();
        log.add(entry(1, &[0, 0, 0], &[0, 1, 0], 9));
        log.add(entry(0, &[0, 0, 0], &[1, 0, 0], 3));
        log.add(entry(2, &[0, 0, 0], &[0, 0, 1], 5));

        let order: Vec<_> = log
            .stable_entries(&vc(&[0, 0, 0]))
            .iter()
            .map(|e| e.origin.as_index())
            .collect();

        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn entries_not_dominated_by_peer_clock() {
        let mut log = UpdateLog::new();
        log.add(entry(0, &[0, 0, 0], &[1, 0, 0], 1));
        log.add(entry(1, &[0, 0, 0], &[0, 1, 0], 2));

        let missing = log.entries_not_dominated_by(&vc(&[1, 0, 0]));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].origin, ReplicaId::new(1));

        assert!(log.entries_not_dominated_by(&vc(&[1, 1, 0])).is_empty());
    }

    #[test]
    fn purge_requires_every_row_and_local_application() {
        let mut log = UpdateLog::new();
        log.add(entry(0, &[0, 0, 0], &[1, 0, 0], 1));

        let mut table = TimestampTable::new(3);
        table.record(ReplicaId::new(0), &vc(&[1, 0, 0]));
        table.record(ReplicaId::new(1), &vc(&[1, 0, 0]));
        assert_eq!(log.purge(&table, |_| true), 0);

        table.record(ReplicaId::new(2), &vc(&[1, 0, 0]));
        assert_eq!(log.purge(&table, |_| false), 0);
        assert_eq!(log.purge(&table, |_| true), 1);

        assert!(log.is_empty());
        assert!(!log.contains(RequestId::from_u128(1)));
    }

    #[test]
    fn timestamp_rows_never_regress() {
        let mut table = TimestampTable::new(2);
        table.record(ReplicaId::new(1), &vc(&[3, 4]));
        table.record(ReplicaId::new(1), &vc(&[1, 5]));

        assert_eq!(table.get(ReplicaId::new(1)), &vc(&[3, 5]));
        assert_eq!(table.get(ReplicaId::new(0)), &vc(&[0, 0]));
    }
}
