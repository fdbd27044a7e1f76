use tokio::sync::mpsc;
use weave_protocols::ProtocolEngine;

use crate::{Mediator, MediatorClient, MediatorError, MediatorEvent};

pub struct MediatorBuilder {
    engine: Option<Box<dyn ProtocolEngine>>,
    events: Option<mpsc::UnboundedSender<MediatorEvent>>,
    /// Size of the command channel (default: 1024)
    command_buffer_size: usize,
}

impl Default for MediatorBuilder {
    fn default() -> Self {
        Self {
            engine: None,
            events: None,
            command_buffer_size: 1024,
        }
    }
}

impl MediatorBuilder {
    pub fn build(self) -> Result<(MediatorClient, Mediator), MediatorError> {
        let engine = self.engine.ok_or(MediatorError::MissingEngine)?;
        let events = self.events.ok_or(MediatorError::MissingEventChannel)?;

        let (commands, commands_recv) = mpsc::channel(self.command_buffer_size);
        let (shutdown_channel, shutdown) = mpsc::channel(1);

        let client = MediatorClient {
            id: engine.id().to_string(),
            commands,
            shutdown_channel,
        };

        Ok((
            client,
            Mediator::new(engine, commands_recv, shutdown, events),
        ))
    }

    pub fn with_engine(mut self, engine: Box<dyn ProtocolEngine>) -> Self {
        self.engine = Some(engine);

        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<MediatorEvent>) -> Self {
        self.events = Some(events);

        self
    }

    pub fn with_command_buffer_size(mut self, command_buffer_size: usize) -> Self {
        self.command_buffer_size = command_buffer_size;

        self
    }
}
