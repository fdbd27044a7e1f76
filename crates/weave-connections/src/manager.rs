use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::{debug, warn};
use weave_core::{NetworkMessage, PeerId};

use crate::{Channel, Transport, TransportError};

/// Open channel with a remote peer
#[derive(Clone)]
pub struct Connection {
    pub peer: PeerId,
    /// The local peer opened the channel
    pub initiator: bool,
    /// The channel was opened while bootstrapping
    pub via_rendezvous: bool,
    channel: Arc<dyn Channel>,
}

impl Connection {
    pub fn new(
        peer: PeerId,
        initiator: bool,
        via_rendezvous: bool,
        channel: Arc<dyn Channel>,
    ) -> Self {
        Self {
            peer,
            initiator,
            via_rendezvous,
            channel,
        }
    }

    pub async fn send(&self, message: &NetworkMessage) -> Result<(), TransportError> {
        self.channel.send(message).await
    }

    pub async fn close(&self) {
        self.channel.close().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("initiator", &self.initiator)
            .field("via_rendezvous", &self.via_rendezvous)
            .finish()
    }
}

#[derive(Debug)]
pub struct NewConnection {
    pub connection: Connection,
    /// The pool was already full when the connection was opened
    pub limit_reached: bool,
}

/// Bounded pool of connections, at most one per peer.
///
/// Opening a connection never inserts it: the caller evicts one with
/// [`ConnectionManager::delete_one_connection`] when the limit is reached,
/// then registers the new one with [`ConnectionManager::set`].
pub struct ConnectionManager {
    local: PeerId,
    transport: Arc<dyn Transport>,
    connections: BTreeMap<PeerId, Connection>,
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(local: PeerId, transport: Arc<dyn Transport>, max_connections: usize) -> Self {
        Self {
            local,
            transport,
            connections: BTreeMap::new(),
            max_connections,
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub async fn new_connection(
        &self,
        peer: &PeerId,
        initiator: bool,
        via_rendezvous: bool,
    ) -> Result<NewConnection, TransportError> {
        let limit_reached = self.connections.len() >= self.max_connections;
        let channel = self.transport.open(peer, initiator, via_rendezvous).await?;

        Ok(NewConnection {
            connection: Connection::new(peer.clone(), initiator, via_rendezvous, channel),
            limit_reached,
        })
    }

    pub fn get(&self, peer: &PeerId) -> Option<&Connection> {
        self.connections.get(peer)
    }

    /// Register `connection`, returns false if one already exists for its peer
    pub fn set(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(&connection.peer) {
            warn!(
                "Connection with {} already exists, keeping the current one",
                connection.peer
            );
            return false;
        }

        self.connections.insert(connection.peer.clone(), connection);
        true
    }

    pub fn list(&self) -> Vec<PeerId> {
        self.connections.keys().cloned().collect()
    }

    /// Evict the connection with the lowest peer id, notifying the peer
    /// with a best effort LEAVE.
    ///
    /// Returns the evicted peer so it can be purged from the views.
    pub async fn delete_one_connection(&mut self) -> Option<PeerId> {
        let (peer, connection) = self.connections.pop_first()?;

        debug!("Evicting connection with {peer}");
        self.leave(&connection).await;

        Some(peer)
    }

    /// Remove the connection with `peer` without notifying it
    pub async fn delete_connection(&mut self, peer: &PeerId) -> Option<Connection> {
        let connection = self.connections.remove(peer)?;
        connection.close().await;

        Some(connection)
    }

    /// Notify every peer with a LEAVE and close all the connections
    pub async fn close_all(&mut self) {
        while let Some((_, connection)) = self.connections.pop_first() {
            self.leave(&connection).await;
        }
    }

    async fn leave(&self, connection: &Connection) {
        let leave = NetworkMessage::Leave {
            emitter: self.local.clone(),
        };

        if let Err(error) = connection.send(&leave).await {
            debug!("Unable to send LEAVE to {}: {error}", connection.peer);
        }

        connection.close().await;
    }
}
