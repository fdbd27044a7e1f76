use std::{future::IntoFuture, sync::Arc};

use tokio::{spawn, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use weave_config::NodeConfig;
use weave_coordinator::{Coordinator, CoordinatorClient, CoordinatorError, CoordinatorEvent};
use weave_core::PeerId;

use crate::{network::MemoryNetwork, rendezvous::MemoryRendezvous};

/// Peer running a coordinator on a [`MemoryNetwork`]
pub struct TestNode {
    pub peer: PeerId,
    pub client: CoordinatorClient,
    pub events: ReceiverStream<CoordinatorEvent>,
    pub handle: JoinHandle<Result<(), CoordinatorError>>,
}

impl TestNode {
    pub async fn shutdown(self) -> Result<(), CoordinatorError> {
        self.client.shutdown().await
    }
}

pub fn spawn_node(
    network: &MemoryNetwork,
    rendezvous: &MemoryRendezvous,
    peer: PeerId,
    config: NodeConfig,
) -> Result<TestNode, CoordinatorError> {
    crate::setup_logging();

    let (transport, transport_events) = network.join(peer.clone());

    let (client, coordinator, events) = Coordinator::builder()
        .with_config(config)
        .with_local_peer(peer.clone())
        .with_transport(transport, transport_events)
        .with_rendezvous(Arc::new(rendezvous.clone()))
        .build()?;

    let handle = spawn(coordinator.into_future());

    Ok(TestNode {
        peer,
        client,
        events,
        handle,
    })
}
