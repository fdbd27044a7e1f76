use std::sync::Arc;

use async_trait::async_trait;
use weave_core::{NetworkMessage, PeerId};

use crate::TransportError;

/// Opens channels to remote peers.
///
/// Implementations deliver what happens on their channels as
/// [`TransportEvent`]s on a queue handed to the coordinator.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a channel to `peer`.
    ///
    /// The initiator side notifies the remote peer with a
    /// [`TransportEvent::Incoming`], the accepting side answers an incoming
    /// connection and only builds its half of the channel.
    async fn open(
        &self,
        peer: &PeerId,
        initiator: bool,
        via_rendezvous: bool,
    ) -> Result<Arc<dyn Channel>, TransportError>;
}

/// One side of an open channel with a remote peer
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    fn peer(&self) -> &PeerId;

    async fn send(&self, message: &NetworkMessage) -> Result<(), TransportError>;

    async fn close(&self);
}

#[derive(Debug)]
pub enum TransportEvent {
    /// A remote peer opened a channel with us
    Incoming { peer: PeerId },
    /// Raw message received from a peer
    Data { peer: PeerId, bytes: Vec<u8> },
    /// The remote peer closed its channel
    Closed { peer: PeerId },
    Error { peer: PeerId, error: TransportError },
}
