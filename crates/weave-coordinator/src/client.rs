use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::{mpsc, oneshot};
use weave_core::{Payload, PeerId, View};
use weave_mediator::{MediatorClient, MediatorState};

use crate::{CoordinatorCommand, CoordinatorError};

#[derive(Clone)]
pub struct CoordinatorClient {
    pub(crate) local: PeerId,
    pub(crate) commands: mpsc::Sender<CoordinatorCommand>,
    pub(crate) shutdown_channel: mpsc::Sender<oneshot::Sender<()>>,
    pub(crate) mediators: Arc<BTreeMap<String, MediatorClient>>,
}

impl CoordinatorClient {
    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    /// Identifiers of the scheduled protocol instances
    pub fn protocols(&self) -> Vec<String> {
        self.mediators.keys().cloned().collect()
    }

    pub async fn view(&self, protocol: &str) -> Result<View, CoordinatorError> {
        Ok(self.mediator(protocol)?.view().await?)
    }

    pub async fn trace(&self, protocol: &str) -> Result<String, CoordinatorError> {
        Ok(self.mediator(protocol)?.trace().await?)
    }

    pub async fn state(&self, protocol: &str) -> Result<MediatorState, CoordinatorError> {
        Ok(self.mediator(protocol)?.state().await?)
    }

    pub async fn connected_peers(&self) -> Result<Vec<PeerId>, CoordinatorError> {
        let (sender, receiver) = oneshot::channel();
        self.commands
            .send(CoordinatorCommand::ConnectedPeers { sender })
            .await?;

        Ok(receiver.await?)
    }

    pub async fn send_application(
        &self,
        to: PeerId,
        payload: Payload,
    ) -> Result<(), CoordinatorError> {
        let (sender, receiver) = oneshot::channel();
        self.commands
            .send(CoordinatorCommand::SendApplication {
                to,
                payload,
                sender,
            })
            .await?;

        receiver.await?
    }

    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        let (sender, receiver) = oneshot::channel();
        self.shutdown_channel
            .send(sender)
            .await
            .map_err(CoordinatorError::ShutdownCommunication)?;

        Ok(receiver.await?)
    }

    fn mediator(&self, protocol: &str) -> Result<&MediatorClient, CoordinatorError> {
        self.mediators
            .get(protocol)
            .ok_or_else(|| CoordinatorError::UnknownProtocol(protocol.to_string()))
    }
}
