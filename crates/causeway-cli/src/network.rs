//! In-process deployment: replicas, registry and one front end.

use std::sync::Arc;

use anyhow::{Context, Result};
use causeway_config::CausewayConfig;
use causeway_directory::{InMemoryRegistry, Registry, ReplicaDirectory};
use causeway_frontend::FrontEnd;
use causeway_replica::{Catalog, Replica, ReplicaSnapshot, ReplicaStore};
use causeway_types::{ReplicaHandle, ReplicaId};

/// A running set of replicas behind a front end.
pub struct Network {
    replicas: Vec<Arc<Replica>>,
    front_end: FrontEnd,
}

impl Network {
    /// Creates and registers every replica, each seeded from `catalog`, and
    /// the front end. Gossip is not started.
    pub fn build(config: &CausewayConfig, catalog: Option<&Catalog>) -> Result<Self> {
        let count = config.cluster.replicas;
        let registry = Arc::new(InMemoryRegistry::new());

        let mut replicas = Vec::with_capacity(count);
        for id in ReplicaId::all(count) {
            let store = catalog.map_or_else(ReplicaStore::new, ReplicaStore::from_catalog);
            let replica = Arc::new(Replica::new(
                id,
                count,
                ReplicaDirectory::new(registry.clone()),
                store,
            ));
            let handle: ReplicaHandle = replica.clone();
            registry
                .register(id, handle)
                .with_context(|| format!("Failed to register {id}"))?;
            replicas.push(replica);
        }

        let front_end = FrontEnd::new(Arc::new(ReplicaDirectory::new(registry)), count)
            .with_write_replicas(config.frontend.write_replicas);

        tracing::info!(
            replicas = count,
            write_replicas = config.frontend.write_replicas,
            "network built"
        );
        Ok(Self {
            replicas,
            front_end,
        })
    }

    /// Builds the network and starts every replica's gossip task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(config: &CausewayConfig, catalog: Option<&Catalog>) -> Result<Self> {
        let network = Self::build(config, catalog)?;
        for replica in &network.replicas {
            replica
                .start_gossip(config.gossip.period())
                .with_context(|| format!("Failed to start gossip on {}", replica.id()))?;
        }
        Ok(network)
    }

    pub fn front_end(&self) -> &FrontEnd {
        &self.front_end
    }

    pub fn snapshots(&self) -> Result<Vec<ReplicaSnapshot>> {
        self.replicas
            .iter()
            .map(|replica| {
                replica
                    .snapshot()
                    .with_context(|| format!("Failed to inspect {}", replica.id()))
            })
            .collect()
    }

    /// Stops every gossip task and waits for them to finish.
    pub async fn shutdown(self) -> Result<()> {
        for replica in &self.replicas {
            if let Some(task) = replica
                .stop_gossip()
                .with_context(|| format!("Failed to stop gossip on {}", replica.id()))?
            {
                task.stop().await;
            }
        }
        tracing::info!("network stopped");
        Ok(())
    }
}
