//! In-memory transport connecting the peers of a test.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use weave_connections::{Channel, Transport, TransportError, TransportEvent};
use weave_core::{NetworkMessage, PeerId};

/// Hub routing the transport events between the peers that joined it
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    peers: Arc<Mutex<HashMap<PeerId, mpsc::Sender<TransportEvent>>>>,
    /// Peers rejecting every message, while still being registered
    unreachable: Arc<Mutex<HashSet<PeerId>>>,
}

impl MemoryNetwork {
    pub const EVENT_BUFFER_SIZE: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer`, returning its transport and the events it receives
    pub fn join(&self, peer: PeerId) -> (Arc<MemoryTransport>, mpsc::Receiver<TransportEvent>) {
        let (sender, receiver) = mpsc::channel(Self::EVENT_BUFFER_SIZE);
        self.peers.lock().unwrap().insert(peer.clone(), sender);

        (
            Arc::new(MemoryTransport {
                local: peer,
                network: self.clone(),
            }),
            receiver,
        )
    }

    /// Unregister `peer`, opening a channel to it fails from now on
    pub fn leave(&self, peer: &PeerId) {
        self.peers.lock().unwrap().remove(peer);
    }

    /// Keep `peer` registered but fail every delivery to it
    pub fn set_unreachable(&self, peer: &PeerId, unreachable: bool) {
        let mut peers = self.unreachable.lock().unwrap();
        if unreachable {
            peers.insert(peer.clone());
        } else {
            peers.remove(peer);
        }
    }

    fn route(&self, peer: &PeerId) -> Option<mpsc::Sender<TransportEvent>> {
        if self.unreachable.lock().unwrap().contains(peer) {
            return None;
        }

        self.peers.lock().unwrap().get(peer).cloned()
    }
}

pub struct MemoryTransport {
    local: PeerId,
    network: MemoryNetwork,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(
        &self,
        peer: &PeerId,
        initiator: bool,
        _via_rendezvous: bool,
    ) -> Result<Arc<dyn Channel>, TransportError> {
        let route = self
            .network
            .route(peer)
            .ok_or_else(|| TransportError::Unreachable(peer.clone()))?;

        if initiator {
            route
                .send(TransportEvent::Incoming {
                    peer: self.local.clone(),
                })
                .await
                .map_err(|_| TransportError::Unreachable(peer.clone()))?;
        }

        Ok(Arc::new(MemoryChannel {
            local: self.local.clone(),
            remote: peer.clone(),
            network: self.network.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MemoryChannel {
    local: PeerId,
    remote: PeerId,
    network: MemoryNetwork,
    closed: AtomicBool,
}

#[async_trait]
impl Channel for MemoryChannel {
    fn peer(&self) -> &PeerId {
        &self.remote
    }

    async fn send(&self, message: &NetworkMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ChannelClosed(self.remote.clone()));
        }

        let bytes = message.to_bytes()?;
        let route = self
            .network
            .route(&self.remote)
            .ok_or_else(|| TransportError::ChannelClosed(self.remote.clone()))?;

        route
            .send(TransportEvent::Data {
                peer: self.local.clone(),
                bytes,
            })
            .await
            .map_err(|_| TransportError::ChannelClosed(self.remote.clone()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(route) = self.network.route(&self.remote) {
            _ = route
                .send(TransportEvent::Closed {
                    peer: self.local.clone(),
                })
                .await;
        }
    }
}
