use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use weave_config::{ConfigError, NodeConfig};
use weave_connections::{ConnectionManager, Transport, TransportEvent};
use weave_core::{PeerId, SimilarityRegistry};
use weave_mediator::Mediator;
use weave_protocols::ProtocolRegistry;

use crate::{Coordinator, CoordinatorClient, CoordinatorError, CoordinatorEvent, Rendezvous};

pub struct CoordinatorBuilder {
    config: NodeConfig,
    local: Option<PeerId>,
    transport: Option<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>)>,
    rendezvous: Option<Arc<dyn Rendezvous>>,
    protocols: ProtocolRegistry,
    similarities: SimilarityRegistry,
    /// Size of the channel producing events (default: 100)
    event_channel_size: usize,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            config: NodeConfig::default(),
            local: None,
            transport: None,
            rendezvous: None,
            protocols: ProtocolRegistry::default(),
            similarities: SimilarityRegistry::default(),
            event_channel_size: 100,
        }
    }
}

impl CoordinatorBuilder {
    /// Instantiate every configured protocol and its mediator.
    ///
    /// A protocol with an invalid configuration is logged and skipped, the
    /// other ones are scheduled.
    pub fn build(
        self,
    ) -> Result<(CoordinatorClient, Coordinator, ReceiverStream<CoordinatorEvent>), CoordinatorError>
    {
        let (transport, transport_events) =
            self.transport.ok_or(CoordinatorError::MissingTransport)?;
        let rendezvous = self.rendezvous.ok_or(CoordinatorError::MissingRendezvous)?;

        let local = self
            .local
            .or_else(|| self.config.peer_id.clone().map(PeerId::from))
            .unwrap_or_else(PeerId::random);

        let buffer_size = self.config.command_buffer_size;
        let (mediator_events_sender, mediator_events) = mpsc::unbounded_channel();

        let mut mediators = Vec::new();
        let mut clients = BTreeMap::new();

        for options in self.config.protocols.iter().cloned() {
            let id = options.id.clone();

            if clients.contains_key(&id) {
                error!("{}", ConfigError::DuplicateProtocol(id));
                continue;
            }

            let engine = match options.validate().and_then(|config| {
                self.protocols
                    .create(config, local.clone(), &self.similarities)
            }) {
                Ok(engine) => engine,
                Err(error) => {
                    error!("Protocol {id} is not scheduled: {error}");
                    continue;
                }
            };

            let (client, mediator) = Mediator::builder()
                .with_engine(engine)
                .with_events(mediator_events_sender.clone())
                .with_command_buffer_size(buffer_size)
                .build()?;

            clients.insert(id, client);
            mediators.push(mediator);
        }

        for options in &self.config.protocols {
            if !clients.contains_key(&options.id) {
                continue;
            }

            for dependency in &options.dependencies {
                if dependency.algo_id != options.id && !clients.contains_key(&dependency.algo_id) {
                    warn!(
                        "Protocol {} depends on {} which is not scheduled",
                        options.id, dependency.algo_id
                    );
                }
            }
        }

        info!(
            "Peer {local} schedules {} protocols: {:?}",
            clients.len(),
            clients.keys().collect::<Vec<_>>()
        );

        let (commands, commands_recv) = mpsc::channel(buffer_size);
        let (shutdown_channel, shutdown) = mpsc::channel(1);
        let (events, events_recv) = mpsc::channel(self.event_channel_size);

        let clients = Arc::new(clients);
        let connections =
            ConnectionManager::new(local.clone(), transport, self.config.max_connections());

        Ok((
            CoordinatorClient {
                local: local.clone(),
                commands,
                shutdown_channel,
                mediators: clients.clone(),
            },
            Coordinator {
                local,
                bootstrap: self.config.bootstrap,
                rendezvous,
                connections,
                mediators: clients,
                pending_mediators: mediators,
                transport_events,
                mediator_events,
                commands: commands_recv,
                shutdown,
                events,
            },
            ReceiverStream::new(events_recv),
        ))
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;

        self
    }

    /// Overrides the peer id of the configuration
    pub fn with_local_peer(mut self, local: PeerId) -> Self {
        self.local = Some(local);

        self
    }

    pub fn with_transport(
        mut self,
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        self.transport = Some((transport, events));

        self
    }

    pub fn with_rendezvous(mut self, rendezvous: Arc<dyn Rendezvous>) -> Self {
        self.rendezvous = Some(rendezvous);

        self
    }

    pub fn with_protocol_registry(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = protocols;

        self
    }

    pub fn with_similarity_registry(mut self, similarities: SimilarityRegistry) -> Self {
        self.similarities = similarities;

        self
    }

    pub fn with_event_channel_size(mut self, event_channel_size: usize) -> Self {
        self.event_channel_size = event_channel_size;

        self
    }
}
