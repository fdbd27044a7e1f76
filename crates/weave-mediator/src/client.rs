use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tracing::warn;
use weave_core::{GossipMessage, PeerId, View};

use crate::{MediatorCommand, MediatorError, MediatorState};

#[derive(Clone)]
pub struct MediatorClient {
    pub(crate) id: String,
    pub(crate) commands: mpsc::Sender<MediatorCommand>,
    pub(crate) shutdown_channel: mpsc::Sender<oneshot::Sender<()>>,
}

impl MediatorClient {
    /// Identifier of the protocol instance driven by the mediator
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn initialize(&self, peers: Vec<PeerId>) -> Result<(), MediatorError> {
        Ok(self
            .commands
            .send(MediatorCommand::Initialize { peers })
            .await?)
    }

    /// Hand an inbound message to the mediator without waiting.
    ///
    /// The message is dropped when the command queue is full.
    pub fn deliver(&self, message: GossipMessage) -> Result<(), MediatorError> {
        self.push(MediatorCommand::Deliver { message })
    }

    /// Drop `peer` from the view without waiting, see [`Self::deliver`]
    pub fn remove_peer(&self, peer: PeerId) -> Result<(), MediatorError> {
        self.push(MediatorCommand::RemovePeer { peer })
    }

    fn push(&self, command: MediatorCommand) -> Result<(), MediatorError> {
        match self.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                warn!("Protocol {}: command queue full, dropping {command}", self.id);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(MediatorError::Stopped(self.id.clone())),
        }
    }

    pub async fn read_attribute(&self, attribute: &str) -> Result<View, MediatorError> {
        let (sender, receiver) = oneshot::channel();
        self.commands
            .send(MediatorCommand::ReadAttribute {
                attribute: attribute.to_string(),
                sender,
            })
            .await?;

        Ok(receiver.await??)
    }

    pub async fn view(&self) -> Result<View, MediatorError> {
        let (sender, receiver) = oneshot::channel();
        self.commands.send(MediatorCommand::View { sender }).await?;

        Ok(receiver.await?)
    }

    pub async fn trace(&self) -> Result<String, MediatorError> {
        let (sender, receiver) = oneshot::channel();
        self.commands.send(MediatorCommand::Trace { sender }).await?;

        Ok(receiver.await?)
    }

    pub async fn state(&self) -> Result<MediatorState, MediatorError> {
        let (sender, receiver) = oneshot::channel();
        self.commands.send(MediatorCommand::State { sender }).await?;

        Ok(receiver.await?)
    }

    pub async fn shutdown(&self) -> Result<(), MediatorError> {
        let (sender, receiver) = oneshot::channel();
        self.shutdown_channel
            .send(sender)
            .await
            .map_err(MediatorError::ShutdownCommunication)?;

        Ok(receiver.await?)
    }
}
