//! Property tests for causeway-types.

use proptest::prelude::*;

use crate::{
    GossipMessage, ItemId, MutationRequest, Rating, RatingParams, ReplicaId, ReplicaStatus,
    RequestId, UpdateLogEntry, UserId, VectorClock,
};

fn clock_strategy(dimension: usize) -> impl Strategy<Value = VectorClock> {
    prop::collection::vec(0u64..20, dimension).prop_map(VectorClock::from_slots)
}

fn clock_pair() -> impl Strategy<Value = (VectorClock, VectorClock)> {
    (1usize..6).prop_flat_map(|d| (clock_strategy(d), clock_strategy(d)))
}

fn clock_triple() -> impl Strategy<Value = (VectorClock, VectorClock, VectorClock)> {
    (1usize..6).prop_flat_map(|d| (clock_strategy(d), clock_strategy(d), clock_strategy(d)))
}

proptest! {
    /// Property: merge produces an upper bound of both inputs
    #[test]
    fn prop_merge_is_upper_bound((a, b) in clock_pair()) {
        let m = a.merged(&b);
        prop_assert!(a.is_before_or_equal(&m));
        prop_assert!(b.is_before_or_equal(&m));
    }

    /// Property: merge is commutative and idempotent
    #[test]
    fn prop_merge_commutative_idempotent((a, b) in clock_pair()) {
        prop_assert_eq!(a.merged(&b), b.merged(&a));
        prop_assert_eq!(a.merged(&a), a.clone());
    }

    /// Property: merge is associative
    #[test]
    fn prop_merge_associative((a, b, c) in clock_triple()) {
        prop_assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    }

    /// Property: before-or-equal is exactly the negation of after
    #[test]
    fn prop_before_or_equal_negates_after((a, b) in clock_pair()) {
        prop_assert_eq!(a.is_before_or_equal(&b), !a.is_after(&b));
    }

    /// Property: before-or-equal is transitive
    #[test]
    fn prop_before_or_equal_transitive((a, b, c) in clock_triple()) {
        if a.is_before_or_equal(&b) && b.is_before_or_equal(&c) {
            prop_assert!(a.is_before_or_equal(&c));
        }
    }

    /// Property: lexicographic order never contradicts the causal order
    #[test]
    fn prop_lexicographic_extends_causal_order((a, b) in clock_pair()) {
        if a.is_before_or_equal(&b) && a != b {
            prop_assert_eq!(a.cmp_lexicographic(&b), std::cmp::Ordering::Less);
        }
    }

    /// Property: every status code round-trips
    #[test]
    fn prop_status_code_roundtrip(code in 0u8..3) {
        let status = ReplicaStatus::from_code(code).unwrap();
        prop_assert_eq!(status.code(), code);
    }

    /// Property: codes outside 0..=2 are rejected
    #[test]
    fn prop_status_code_rejects_unknown(code in 3u8..) {
        prop_assert!(ReplicaStatus::from_code(code).is_err());
    }
}

#[test]
fn gossip_message_survives_json() {
    let request = MutationRequest::with_id(
        RatingParams::new(ItemId::new(7), UserId::new(3), Rating::new(4.5).unwrap()),
        VectorClock::from_slots(vec![0, 1, 0]),
        RequestId::from_u128(42),
    );
    let entry = UpdateLogEntry::new(
        ReplicaId::new(1),
        VectorClock::from_slots(vec![0, 2, 0]),
        request,
    );
    let message = GossipMessage::new(
        ReplicaId::new(1),
        vec![entry],
        VectorClock::from_slots(vec![0, 2, 0]),
    );

    let json = serde_json::to_string(&message).unwrap();
    let decoded: GossipMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn request_stability_follows_value_clock() {
    let request = MutationRequest::new(
        RatingParams::new(ItemId::new(1), UserId::new(1), Rating::new(3.0).unwrap()),
        VectorClock::from_slots(vec![1, 0, 2]),
    );

    assert!(!request.is_stable(&VectorClock::from_slots(vec![1, 0, 1])));
    assert!(request.is_stable(&VectorClock::from_slots(vec![1, 0, 2])));
    assert!(request.is_stable(&VectorClock::from_slots(vec![5, 5, 5])));
}

#[test]
fn replica_ids_cover_every_slot() {
    let ids: Vec<_> = ReplicaId::all(3).collect();
    assert_eq!(ids, vec![ReplicaId::new(0), ReplicaId::new(1), ReplicaId::new(2)]);
    assert_eq!(ids[2].as_index(), 2);
    assert_eq!(ids[2].to_string(), "replica-2");
}

#[test]
fn rpc_error_reachability_classes() {
    let id = ReplicaId::new(1);
    assert!(crate::RpcError::unreachable(id, "refused").is_unreachable());
    assert!(crate::RpcError::Offline { replica: id }.is_unreachable());
    assert!(!crate::RpcError::internal("boom").is_unreachable());
    assert_eq!(
        crate::RpcError::Offline { replica: id }.to_string(),
        "replica-1 is offline"
    );
}
