use std::fmt::{self, Display};

use tokio::sync::oneshot;
use weave_config::Dependency;
use weave_core::{GossipMessage, PeerId, View};

use crate::{DependencyError, MediatorState};

#[derive(Debug)]
pub enum MediatorCommand {
    /// Populate the view with the bootstrap peers
    Initialize { peers: Vec<PeerId> },

    /// Gossip message received from a remote peer
    Deliver { message: GossipMessage },

    /// Read an attribute on behalf of a dependent protocol
    ReadAttribute {
        attribute: String,
        sender: oneshot::Sender<Result<View, DependencyError>>,
    },

    /// Forget a peer that left or was evicted
    RemovePeer { peer: PeerId },

    View { sender: oneshot::Sender<View> },

    Trace { sender: oneshot::Sender<String> },

    State { sender: oneshot::Sender<MediatorState> },
}

impl Display for MediatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediatorCommand::Initialize { peers } => write!(f, "Initialize({} peers)", peers.len()),
            MediatorCommand::Deliver { message } => {
                write!(f, "Deliver(from: {}, loop: {})", message.emitter, message.loop_count)
            }
            MediatorCommand::ReadAttribute { attribute, .. } => {
                write!(f, "ReadAttribute({attribute})")
            }
            MediatorCommand::RemovePeer { peer } => write!(f, "RemovePeer({peer})"),
            MediatorCommand::View { .. } => write!(f, "View"),
            MediatorCommand::Trace { .. } => write!(f, "Trace"),
            MediatorCommand::State { .. } => write!(f, "State"),
        }
    }
}

/// Requests emitted by a mediator to the coordinator
#[derive(Debug)]
pub enum MediatorEvent {
    /// Deliver a gossip message to a remote peer
    Send { to: PeerId, message: GossipMessage },

    /// Read a dependency held by another protocol instance
    ResolveDependency {
        dependency: Dependency,
        sender: oneshot::Sender<Result<View, DependencyError>>,
    },
}
