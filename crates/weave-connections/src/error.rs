use thiserror::Error;
use weave_core::PeerId;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer {0} is unreachable")]
    Unreachable(PeerId),

    #[error("Channel to {0} is closed")]
    ChannelClosed(PeerId),

    #[error("Unable to encode the message: {0}")]
    Codec(#[from] serde_json::Error),
}
