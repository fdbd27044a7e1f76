use std::fmt::{self, Display};

use tokio::sync::oneshot;
use weave_core::{Payload, PeerId};

use crate::CoordinatorError;

#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Send an application payload to a peer
    SendApplication {
        to: PeerId,
        payload: Payload,
        sender: oneshot::Sender<Result<(), CoordinatorError>>,
    },

    /// List the peers with an open connection
    ConnectedPeers { sender: oneshot::Sender<Vec<PeerId>> },
}

impl Display for CoordinatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorCommand::SendApplication { to, .. } => write!(f, "SendApplication(to: {to})"),
            CoordinatorCommand::ConnectedPeers { .. } => write!(f, "ConnectedPeers"),
        }
    }
}

/// Events published by the coordinator to the application
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// Every protocol was initialized with `peers`
    Bootstrapped { peers: Vec<PeerId> },

    /// The rendezvous could not be reached, bootstrap is not restarted
    BootstrapAborted { reason: String },

    Application { from: PeerId, payload: Payload },

    /// A message could not be delivered, the connection was dropped
    SendFailed { peer: PeerId },

    /// A peer left the overlay and was purged from every view
    PeerLeft { peer: PeerId },
}
