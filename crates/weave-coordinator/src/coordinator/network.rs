use tracing::{debug, info, warn};
use weave_connections::{NewConnection, TransportEvent};
use weave_core::{NetworkMessage, PeerId};

use crate::{Coordinator, CoordinatorEvent};

impl Coordinator {
    pub(crate) async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Incoming { peer } => self.accept(peer).await,
            TransportEvent::Data { peer, bytes } => match NetworkMessage::try_from(bytes.as_slice()) {
                Ok(message) => self.on_message(message).await,
                Err(error) => warn!("Dropping malformed message from {peer}: {error}"),
            },
            TransportEvent::Closed { peer } => {
                if self.connections.delete_connection(&peer).await.is_some() {
                    debug!("Connection with {peer} closed");
                }
            }
            TransportEvent::Error { peer, error } => {
                warn!("Transport error with {peer}: {error}");
                self.connections.delete_connection(&peer).await;
            }
        }
    }

    async fn accept(&mut self, peer: PeerId) {
        if self.connections.get(&peer).is_some() {
            debug!("Already connected to {peer}");
            return;
        }

        match self.connections.new_connection(&peer, false, false).await {
            Ok(NewConnection {
                connection,
                limit_reached,
            }) => {
                if limit_reached {
                    if let Some(evicted) = self.connections.delete_one_connection().await {
                        info!("Connection pool full, evicted {evicted}");
                        self.purge(&evicted);
                    }
                }

                self.connections.set(connection);
            }
            Err(error) => warn!("Unable to accept connection from {peer}: {error}"),
        }
    }

    async fn on_message(&mut self, message: NetworkMessage) {
        match message {
            NetworkMessage::Gossip(message) => match self.mediators.get(&message.algo_id) {
                Some(mediator) => {
                    if let Err(error) = mediator.deliver(message) {
                        warn!("Unable to deliver message to protocol: {error}");
                    }
                }
                None => warn!(
                    "Dropping message from {} for unknown protocol {}",
                    message.emitter, message.algo_id
                ),
            },
            NetworkMessage::Leave { emitter } => {
                info!("Peer {emitter} left the overlay");
                self.connections.delete_connection(&emitter).await;
                self.purge(&emitter);
                self.publish(CoordinatorEvent::PeerLeft { peer: emitter });
            }
            NetworkMessage::Application { emitter, payload } => {
                self.publish(CoordinatorEvent::Application {
                    from: emitter,
                    payload,
                });
            }
        }
    }
}
