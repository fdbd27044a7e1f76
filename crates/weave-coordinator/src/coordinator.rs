//! Node level glue between the transport, the connection pool and the
//! protocol mediators.

use std::{collections::BTreeMap, future::IntoFuture, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use tokio::{
    spawn,
    sync::{mpsc, oneshot},
};
use tracing::{error, info, warn};
use weave_config::BootstrapConfig;
use weave_connections::{Connection, ConnectionManager, NewConnection, TransportError, TransportEvent};
use weave_core::PeerId;
use weave_mediator::{Mediator, MediatorClient, MediatorEvent};

use crate::{
    rendezvous::{self, Bootstrap},
    CoordinatorCommand, CoordinatorError, CoordinatorEvent, Rendezvous,
};

mod network;
mod protocol;

/// Owns the connection pool and routes messages between the transport and
/// the mediators of the scheduled protocols.
pub struct Coordinator {
    pub(crate) local: PeerId,
    pub(crate) bootstrap: BootstrapConfig,
    pub(crate) rendezvous: Arc<dyn Rendezvous>,
    pub(crate) connections: ConnectionManager,
    pub(crate) mediators: Arc<BTreeMap<String, MediatorClient>>,
    /// Mediators spawned when the coordinator starts
    pub(crate) pending_mediators: Vec<Mediator>,

    pub(crate) transport_events: mpsc::Receiver<TransportEvent>,
    pub(crate) mediator_events: mpsc::UnboundedReceiver<MediatorEvent>,
    pub(crate) commands: mpsc::Receiver<CoordinatorCommand>,
    pub(crate) shutdown: mpsc::Receiver<oneshot::Sender<()>>,
    pub(crate) events: mpsc::Sender<CoordinatorEvent>,
}

impl IntoFuture for Coordinator {
    type Output = Result<(), CoordinatorError>;

    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(mut self) -> Self::IntoFuture {
        async move {
            for mediator in std::mem::take(&mut self.pending_mediators) {
                spawn(mediator.into_future());
            }

            let mut bootstrap = {
                let rendezvous = self.rendezvous.clone();
                let local = self.local.clone();
                let config = self.bootstrap.clone();

                async move { rendezvous::bootstrap(rendezvous.as_ref(), &local, &config).await }
                    .boxed()
            };
            let mut bootstrapping = true;

            let shutdowned: Option<oneshot::Sender<()>> = loop {
                tokio::select! {
                    sender = self.shutdown.recv() => {
                        break sender;
                    }

                    result = &mut bootstrap, if bootstrapping => {
                        bootstrapping = false;
                        self.on_bootstrap(result).await;
                    }

                    Some(event) = self.transport_events.recv() => self.on_transport_event(event).await,

                    Some(event) = self.mediator_events.recv() => self.on_mediator_event(event).await,

                    Some(command) = self.commands.recv() => self.on_command(command).await,
                }
            };

            if let Some(sender) = shutdowned {
                info!("Shutting down coordinator of {}...", self.local);
                self.stop().await;
                _ = sender.send(());
            } else {
                warn!("Shutting down coordinator of {} due to error...", self.local);
                self.stop().await;
            }

            Ok(())
        }
        .boxed()
    }
}

impl Coordinator {
    pub fn builder() -> crate::CoordinatorBuilder {
        crate::CoordinatorBuilder::default()
    }

    async fn on_bootstrap(&mut self, result: Result<Bootstrap, CoordinatorError>) {
        let Bootstrap { peer, view } = match result {
            Ok(bootstrap) => bootstrap,
            Err(error) => {
                error!("Unable to bootstrap {}: {error}", self.local);
                self.publish(CoordinatorEvent::BootstrapAborted {
                    reason: error.to_string(),
                });
                return;
            }
        };

        let mut peers = Vec::new();
        if let Some(peer) = peer.filter(|peer| *peer != self.local) {
            if let Err(error) = self.connect(&peer, true).await {
                warn!("Unable to connect to the bootstrap peer {peer}: {error}");
            }
            peers.push(peer);
        }

        for peer in view {
            if peer != self.local && !peers.contains(&peer) {
                peers.push(peer);
            }
        }

        for (id, mediator) in self.mediators.iter() {
            if let Err(error) = mediator.initialize(peers.clone()).await {
                error!("Unable to initialize protocol {id}: {error}");
            }
        }

        info!("Peer {} bootstrapped with {} peers", self.local, peers.len());
        self.publish(CoordinatorEvent::Bootstrapped { peers });
    }

    async fn on_command(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::SendApplication {
                to,
                payload,
                sender,
            } => {
                let message = weave_core::NetworkMessage::Application {
                    emitter: self.local.clone(),
                    payload,
                };
                _ = sender.send(self.send(to, message).await);
            }
            CoordinatorCommand::ConnectedPeers { sender } => {
                _ = sender.send(self.connections.list());
            }
        }
    }

    /// Connection with `peer`, opened on demand.
    ///
    /// When the pool is full, one connection is evicted and its peer purged
    /// from every view.
    pub(crate) async fn connect(
        &mut self,
        peer: &PeerId,
        via_rendezvous: bool,
    ) -> Result<Connection, TransportError> {
        if let Some(connection) = self.connections.get(peer) {
            return Ok(connection.clone());
        }

        let NewConnection {
            connection,
            limit_reached,
        } = self
            .connections
            .new_connection(peer, true, via_rendezvous)
            .await?;

        if limit_reached {
            if let Some(evicted) = self.connections.delete_one_connection().await {
                info!("Connection pool full, evicted {evicted}");
                self.purge(&evicted);
            }
        }

        self.connections.set(connection.clone());

        Ok(connection)
    }

    /// Remove `peer` from every protocol view
    pub(crate) fn purge(&self, peer: &PeerId) {
        for (id, mediator) in self.mediators.iter() {
            if let Err(error) = mediator.remove_peer(peer.clone()) {
                warn!("Unable to remove {peer} from protocol {id}: {error}");
            }
        }
    }

    pub(crate) fn publish(&self, event: CoordinatorEvent) {
        if let Err(error) = self.events.try_send(event) {
            warn!("Unable to publish coordinator event: {error}");
        }
    }

    /// Stop every mediator before notifying the peers and releasing the
    /// connections
    async fn stop(&mut self) {
        self.mediator_events.close();

        for (id, mediator) in self.mediators.iter() {
            if let Err(error) = mediator.shutdown().await {
                warn!("Unable to shutdown protocol {id}: {error}");
            }
        }

        self.connections.close_all().await;
    }
}
