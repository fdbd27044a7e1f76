//! Orchestration of the protocol instances of a peer.
//!
//! The [`Coordinator`] bootstraps the peer through a [`Rendezvous`], spawns
//! one mediator per configured protocol and routes gossip messages between
//! the mediators and the transport.

use thiserror::Error;
use tokio::sync::{
    mpsc::error::SendError,
    oneshot::{self, error::RecvError},
};
use weave_connections::TransportError;
use weave_mediator::MediatorError;

mod builder;
mod client;
mod command;
mod coordinator;
mod rendezvous;

pub use builder::CoordinatorBuilder;
pub use client::CoordinatorClient;
pub use command::{CoordinatorCommand, CoordinatorEvent};
pub use coordinator::Coordinator;
pub use rendezvous::{Rendezvous, RendezvousError};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Unable to communicate with the coordinator: {0}")]
    CommunicationChannel(#[from] SendError<CoordinatorCommand>),

    #[error("Unable to receive expected response from the coordinator: {0}")]
    ResponseChannel(#[from] RecvError),

    #[error("Unable to execute shutdown on the coordinator: {0}")]
    ShutdownCommunication(SendError<oneshot::Sender<()>>),

    #[error("Protocol {0} is not scheduled")]
    UnknownProtocol(String),

    #[error("Rendezvous unreachable after {attempts} attempts: {reason}")]
    BootstrapExhausted { attempts: usize, reason: String },

    #[error(transparent)]
    Mediator(#[from] MediatorError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("No transport provided")]
    MissingTransport,

    #[error("No rendezvous provided")]
    MissingRendezvous,
}
