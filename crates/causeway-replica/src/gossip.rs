//! Periodic gossip.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::replica::Replica;

/// A background task that calls [`Replica::gossip_once`] every period.
///
/// Stops when [`GossipTask::shutdown`] is signalled, when the replica it
/// serves is dropped, or when the task itself is dropped (which aborts it).
#[derive(Debug)]
pub struct GossipTask {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl GossipTask {
    /// Spawns the task on the current tokio runtime.
    ///
    /// The first round runs one full `period` after spawning.
    pub fn spawn(replica: Weak<Replica>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let Some(replica) = replica.upgrade() else {
                            break;
                        };
                        let id = replica.id();
                        match tokio::task::spawn_blocking(move || replica.gossip_once()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => {
                                tracing::warn!(replica = %id, error = %e, "gossip round failed");
                            }
                            Err(e) => {
                                tracing::warn!(replica = %id, error = %e, "gossip round panicked");
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Asks the task to stop after its current round.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signals shutdown and waits for the task to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for GossipTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
