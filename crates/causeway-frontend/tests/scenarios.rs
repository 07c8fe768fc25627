//! End-to-end scenarios: front ends driving a cluster of in-process replicas.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use causeway_directory::{InMemoryRegistry, Registry, ReplicaDirectory};
use causeway_frontend::{FrontEnd, FrontEndApi, FrontEndError};
use causeway_replica::{Replica, ReplicaStore};
use causeway_types::{
    GossipMessage, ItemId, MutationRequest, MutationResponse, QueryParams, QueryRequest,
    QueryResponse, Rating, RatingParams, ReplicaApi, ReplicaHandle, ReplicaId, ReplicaStatus,
    RpcError, UpdateLogEntry, UserId, VectorClock,
};

// ============================================================================
// Harness
// ============================================================================

/// Wraps a replica and fails client calls on demand.
#[derive(Debug)]
struct Flaky {
    inner: Arc<Replica>,
    failing: AtomicBool,
}

impl Flaky {
    fn new(inner: Arc<Replica>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RpcError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RpcError::unreachable(self.inner.id(), "connection reset"))
        } else {
            Ok(())
        }
    }
}

impl ReplicaApi for Flaky {
    fn id(&self) -> ReplicaId {
        self.inner.id()
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryResponse, RpcError> {
        self.check()?;
        self.inner.query(request)
    }

    fn update(&self, request: &MutationRequest) -> Result<MutationResponse, RpcError> {
        self.check()?;
        self.inner.update(request)
    }

    fn submit(&self, request: &MutationRequest) -> Result<MutationResponse, RpcError> {
        self.check()?;
        self.inner.submit(request)
    }

    fn process_gossip(&self, message: &GossipMessage) -> Result<(), RpcError> {
        self.inner.process_gossip(message)
    }

    fn find_required_updates(
        &self,
        clock: &VectorClock,
    ) -> Result<Vec<UpdateLogEntry>, RpcError> {
        self.inner.find_required_updates(clock)
    }

    fn status(&self) -> Result<ReplicaStatus, RpcError> {
        self.inner.status()
    }

    fn set_status(&self, status: ReplicaStatus) -> Result<(), RpcError> {
        self.inner.set_status(status)
    }
}

struct Cluster {
    registry: Arc<InMemoryRegistry>,
    replicas: Vec<Arc<Replica>>,
}

impl Cluster {
    fn new(count: usize) -> Self {
        Self::with_handles(count, |replica| -> ReplicaHandle { replica })
    }

    /// Builds a cluster whose replica `index` is reached through a [`Flaky`]
    /// wrapper.
    fn with_flaky(count: usize, index: u32) -> (Self, Arc<Flaky>) {
        let flaky = std::sync::Mutex::new(None);
        let cluster = Self::with_handles(count, |replica| -> ReplicaHandle {
            if replica.id() != ReplicaId::new(index) {
                return replica;
            }
            let wrapped = Arc::new(Flaky::new(replica));
            *flaky.lock().unwrap() = Some(wrapped.clone());
            wrapped
        });
        let flaky = flaky.into_inner().unwrap().unwrap();
        (cluster, flaky)
    }

    /// Builds a cluster, registering whatever handle `wrap` makes of each
    /// replica.
    fn with_handles(count: usize, wrap: impl Fn(Arc<Replica>) -> ReplicaHandle) -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let replicas: Vec<_> = ReplicaId::all(count)
            .map(|id| {
                Arc::new(Replica::new(
                    id,
                    count,
                    ReplicaDirectory::new(registry.clone()),
                    ReplicaStore::new(),
                ))
            })
            .collect();
        for replica in &replicas {
            registry.register(replica.id(), wrap(replica.clone())).unwrap();
        }
        Self { registry, replicas }
    }

    fn front_end(&self) -> FrontEnd {
        FrontEnd::new(
            Arc::new(ReplicaDirectory::new(self.registry.clone())),
            self.replicas.len(),
        )
    }

    fn replica(&self, index: usize) -> &Arc<Replica> {
        &self.replicas[index]
    }

    fn gossip_rounds(&self, rounds: usize) {
        for _ in 0..rounds {
            for replica in &self.replicas {
                replica.gossip_once().unwrap();
            }
        }
    }
}

fn rating(value: f32) -> Rating {
    Rating::new(value).unwrap()
}

fn mutation(item: u32, user: u32, value: f32) -> RatingParams {
    RatingParams::new(ItemId::new(item), UserId::new(user), rating(value))
}

fn user_rating(front_end: &FrontEnd, item: u32, user: u32) -> Option<Rating> {
    front_end
        .query(QueryParams::new(ItemId::new(item), Some(UserId::new(user))))
        .unwrap()
        .user_rating
}

/// Reads a replica's local state without any session clock.
fn local_rating(replica: &Replica, item: u32, user: u32) -> Option<Rating> {
    let request = QueryRequest::new(
        QueryParams::new(ItemId::new(item), Some(UserId::new(user))),
        VectorClock::new(replica.replica_count()),
    );
    replica.query(&request).unwrap().details.user_rating
}

// ============================================================================
// Client Operations
// ============================================================================

#[test]
fn test_update_and_submit_preconditions() {
    let cluster = Cluster::new(3);
    let front_end = cluster.front_end();

    assert!(!front_end.update(mutation(1, 1, 3.0)).unwrap());
    assert!(front_end.submit(mutation(1, 1, 4.0)).unwrap());
    assert_eq!(user_rating(&front_end, 1, 1), Some(rating(4.0)));

    assert!(!front_end.submit(mutation(1, 1, 5.0)).unwrap());
    assert!(front_end.update(mutation(1, 1, 3.0)).unwrap());
    assert_eq!(user_rating(&front_end, 1, 1), Some(rating(3.0)));
}

#[test]
fn test_query_reports_distribution_of_every_user() {
    let cluster = Cluster::new(3);
    let alice = cluster.front_end();
    let bob = cluster.front_end();

    assert!(alice.submit(mutation(5, 1, 4.0)).unwrap());
    assert!(bob.submit(mutation(5, 2, 2.0)).unwrap());
    cluster.gossip_rounds(1);

    let details = alice
        .query(QueryParams::new(ItemId::new(5), None))
        .unwrap();

    assert_eq!(details.user_rating, None);
    assert_eq!(details.distribution.total(), 2);
    assert_eq!(details.distribution.count_for(rating(4.0)), 1);
    assert_eq!(details.distribution.count_for(rating(2.0)), 1);
}

#[test]
fn test_query_catches_up_with_the_session() {
    let cluster = Cluster::new(3);
    let front_end = cluster.front_end();
    assert!(front_end.submit(mutation(2, 9, 4.5)).unwrap());

    // Only replica 2 is active now, and it has seen no gossip yet.
    cluster.replica(0).set_status(ReplicaStatus::Overloaded).unwrap();
    cluster.replica(1).set_status(ReplicaStatus::Overloaded).unwrap();
    assert_eq!(local_rating(cluster.replica(2), 2, 9), None);

    assert_eq!(user_rating(&front_end, 2, 9), Some(rating(4.5)));
    assert_eq!(local_rating(cluster.replica(2), 2, 9), Some(rating(4.5)));
}

// ============================================================================
// Replication
// ============================================================================

#[test]
fn test_gossip_convergence_survives_origin_going_offline() {
    let cluster = Cluster::new(3);
    let writer = cluster.front_end();
    assert!(writer.submit(mutation(3, 7, 2.5)).unwrap());

    cluster.gossip_rounds(1);
    writer
        .change_replica_status(ReplicaId::new(0), ReplicaStatus::Offline)
        .unwrap();
    writer
        .change_replica_status(ReplicaId::new(1), ReplicaStatus::Offline)
        .unwrap();

    let reader = cluster.front_end();
    assert_eq!(user_rating(&reader, 3, 7), Some(rating(2.5)));
    assert_eq!(user_rating(&writer, 3, 7), Some(rating(2.5)));
}

#[test]
fn test_mutations_survive_one_offline_replica() {
    let cluster = Cluster::new(3);
    let front_end = cluster.front_end();
    front_end
        .change_replica_status(ReplicaId::new(0), ReplicaStatus::Offline)
        .unwrap();

    assert!(front_end.submit(mutation(4, 4, 1.0)).unwrap());
    assert!(front_end.update(mutation(4, 4, 3.5)).unwrap());
    assert_eq!(user_rating(&front_end, 4, 4), Some(rating(3.5)));

    front_end
        .change_replica_status(ReplicaId::new(0), ReplicaStatus::Active)
        .unwrap();
    cluster.gossip_rounds(2);

    for replica in &cluster.replicas {
        assert_eq!(local_rating(replica, 4, 4), Some(rating(3.5)), "{}", replica.id());
    }
}

#[test]
fn test_failed_replica_fails_the_mutation() {
    let (cluster, flaky) = Cluster::with_flaky(3, 1);
    let front_end = cluster.front_end();
    flaky.fail(true);

    let err = front_end.submit(mutation(1, 1, 4.0)).unwrap_err();

    match err {
        FrontEndError::Replication { replica, source } => {
            assert_eq!(replica, ReplicaId::new(1));
            assert!(source.is_unreachable());
        }
        other => panic!("expected a replication failure, got {other:?}"),
    }
    // The replica that did answer is still reflected in the session.
    assert_eq!(front_end.session_clock().unwrap().get(ReplicaId::new(0)), 1);
}

#[test]
fn test_failed_query_is_reported() {
    let (cluster, flaky) = Cluster::with_flaky(3, 0);
    let front_end = cluster.front_end();
    flaky.fail(true);

    let err = front_end
        .query(QueryParams::new(ItemId::new(1), None))
        .unwrap_err();

    assert!(matches!(
        err,
        FrontEndError::Replica { replica, .. } if replica == ReplicaId::new(0)
    ));
}

#[test]
fn test_everything_offline_is_unavailable() {
    let cluster = Cluster::new(3);
    let front_end = cluster.front_end();
    for id in ReplicaId::all(3) {
        front_end
            .change_replica_status(id, ReplicaStatus::Offline)
            .unwrap();
    }

    assert_eq!(
        front_end.submit(mutation(1, 1, 4.0)).unwrap_err(),
        FrontEndError::Unavailable {
            required: 2,
            available: 0
        }
    );
    assert_eq!(
        front_end
            .query(QueryParams::new(ItemId::new(1), None))
            .unwrap_err(),
        FrontEndError::Unavailable {
            required: 1,
            available: 0
        }
    );
}

// ============================================================================
// Picker Fallback
// ============================================================================

#[test]
fn test_overloaded_front_falls_back_to_active_replica() {
    let cluster = Cluster::new(3);
    let front_end = cluster.front_end();
    user_rating(&front_end, 1, 1);
    assert_eq!(front_end.picker().order().unwrap()[0], ReplicaId::new(0));

    front_end
        .change_replica_status(ReplicaId::new(0), ReplicaStatus::Overloaded)
        .unwrap();
    user_rating(&front_end, 1, 1);

    assert_eq!(front_end.picker().order().unwrap()[0], ReplicaId::new(1));
}

// ============================================================================
// Log Garbage Collection
// ============================================================================

#[test]
fn test_log_is_purged_once_known_everywhere() {
    let cluster = Cluster::new(3);
    let front_end = cluster.front_end();
    assert!(front_end.submit(mutation(6, 6, 5.0)).unwrap());
    assert!(cluster.replica(0).snapshot().unwrap().log_len > 0);

    cluster.gossip_rounds(3);

    for replica in &cluster.replicas {
        assert_eq!(replica.snapshot().unwrap().log_len, 0, "{}", replica.id());
        assert_eq!(replica.gossip_once().unwrap().entries_sent, 0);
        assert_eq!(local_rating(replica, 6, 6), Some(rating(5.0)));
    }
    assert_eq!(user_rating(&front_end, 6, 6), Some(rating(5.0)));
}

// ============================================================================
// Periodic Gossip
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_gossip_reaches_the_replica_left_out() {
    let cluster = Cluster::new(3);
    let period = Duration::from_millis(100);
    for replica in &cluster.replicas {
        replica.start_gossip(period).unwrap();
    }

    let writer = cluster.front_end();
    assert!(writer.submit(mutation(7, 3, 3.0)).unwrap());

    tokio::time::sleep(period * 3).await;

    assert_eq!(local_rating(cluster.replica(2), 7, 3), Some(rating(3.0)));

    for replica in &cluster.replicas {
        if let Some(task) = replica.stop_gossip().unwrap() {
            task.stop().await;
        }
    }
}
