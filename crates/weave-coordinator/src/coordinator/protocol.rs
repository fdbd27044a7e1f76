use tokio::{spawn, sync::oneshot};
use tracing::{debug, warn};
use weave_config::Dependency;
use weave_core::{NetworkMessage, PeerId, View};
use weave_mediator::{DependencyError, MediatorError, MediatorEvent};

use crate::{Coordinator, CoordinatorError, CoordinatorEvent};

impl Coordinator {
    pub(crate) async fn on_mediator_event(&mut self, event: MediatorEvent) {
        match event {
            MediatorEvent::Send { to, message } => {
                // Failures are published as events
                _ = self.send(to, NetworkMessage::Gossip(message)).await;
            }
            MediatorEvent::ResolveDependency { dependency, sender } => {
                self.resolve(dependency, sender)
            }
        }
    }

    /// Deliver `message` to `to`, dropping the connection on failure
    pub(crate) async fn send(
        &mut self,
        to: PeerId,
        message: NetworkMessage,
    ) -> Result<(), CoordinatorError> {
        let connection = match self.connect(&to, false).await {
            Ok(connection) => connection,
            Err(error) => {
                warn!("Unable to connect to {to}: {error}");
                self.publish(CoordinatorEvent::SendFailed { peer: to });
                return Err(error.into());
            }
        };

        if let Err(error) = connection.send(&message).await {
            warn!("Unable to send message to {to}: {error}");
            self.connections.delete_connection(&to).await;
            self.publish(CoordinatorEvent::SendFailed { peer: to });
            return Err(error.into());
        }

        Ok(())
    }

    /// Read the attribute of another protocol instance without blocking the
    /// coordinator loop
    fn resolve(
        &self,
        dependency: Dependency,
        sender: oneshot::Sender<Result<View, DependencyError>>,
    ) {
        let Some(mediator) = self.mediators.get(&dependency.source).cloned() else {
            _ = sender.send(Err(DependencyError::UnknownProtocol(dependency.source)));
            return;
        };

        spawn(async move {
            let result = mediator
                .read_attribute(&dependency.attribute)
                .await
                .map_err(|error| match error {
                    MediatorError::Dependency(error) => error,
                    error => {
                        debug!("Unable to read {}: {error}", dependency.source);
                        DependencyError::Unavailable(dependency.source.clone())
                    }
                });

            _ = sender.send(result);
        });
    }
}
