//! Scheduling of a protocol instance.
//!
//! A [`Mediator`] owns one [`ProtocolEngine`] and serializes every access to
//! it: the periodic active cycle, the handling of inbound gossip messages and
//! the reads of its attributes by dependent protocols. Everything leaving the
//! instance goes through [`MediatorEvent`]s handled by the coordinator.

use std::{collections::VecDeque, future::IntoFuture};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{
        mpsc::{self, error::SendError},
        oneshot::{self, error::RecvError},
    },
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};
use weave_core::{Direction, GossipMessage, PeerId, View};
use weave_protocols::{DependencyViews, ProtocolEngine};

mod builder;
mod client;
mod command;

#[cfg(test)]
mod tests;

pub use builder::MediatorBuilder;
pub use client::MediatorClient;
pub use command::{MediatorCommand, MediatorEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediatorState {
    Idle,
    ActiveCycle,
    AwaitingDependency,
    PassiveHandling,
}

/// Cycle suspended until its dependencies are resolved
enum Cycle {
    Active { destination: PeerId },
    Passive { message: GossipMessage },
}

pub struct Mediator {
    pub(crate) engine: Box<dyn ProtocolEngine>,
    pub(crate) commands: mpsc::Receiver<MediatorCommand>,
    pub(crate) shutdown: mpsc::Receiver<oneshot::Sender<()>>,
    /// Unbounded so that the mediator never waits on the coordinator
    pub(crate) events: mpsc::UnboundedSender<MediatorEvent>,

    loop_count: u64,
    state: MediatorState,
    /// Messages received while a cycle awaits its dependencies
    deferred: VecDeque<GossipMessage>,
    pending: FuturesUnordered<BoxFuture<'static, (Cycle, DependencyViews)>>,
}

impl IntoFuture for Mediator {
    type Output = Result<(), MediatorError>;

    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(mut self) -> Self::IntoFuture {
        async move {
            let period = self.engine.config().period;
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let shutdowned: Option<oneshot::Sender<()>> = loop {
                let result = tokio::select! {
                    sender = self.shutdown.recv() => {
                        break sender;
                    }

                    _ = interval.tick() => {
                        if self.pending.is_empty() {
                            self.active_cycle().await
                        } else {
                            debug!(
                                "Protocol {}: skipping cycle while awaiting a dependency",
                                self.engine.id()
                            );
                            Ok(())
                        }
                    }

                    Some((cycle, dependencies)) = self.pending.next() => {
                        match self.resume(cycle, dependencies).await {
                            Ok(()) => self.process_deferred().await,
                            Err(error) => Err(error),
                        }
                    }

                    Some(command) = self.commands.recv() => self.handle_command(command).await,
                };

                if let Err(error) = result {
                    error!("Protocol {}: {error}", self.engine.id());
                    break None;
                }
            };

            if let Some(sender) = shutdowned {
                info!("Shutting down mediator of {}...", self.engine.id());
                _ = sender.send(());
            } else {
                warn!(
                    "Shutting down mediator of {} due to error...",
                    self.engine.id()
                );
            }

            Ok(())
        }
        .boxed()
    }
}

impl Mediator {
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::default()
    }

    pub(crate) fn new(
        engine: Box<dyn ProtocolEngine>,
        commands: mpsc::Receiver<MediatorCommand>,
        shutdown: mpsc::Receiver<oneshot::Sender<()>>,
        events: mpsc::UnboundedSender<MediatorEvent>,
    ) -> Self {
        Self {
            engine,
            commands,
            shutdown,
            events,
            loop_count: 0,
            state: MediatorState::Idle,
            deferred: VecDeque::new(),
            pending: FuturesUnordered::new(),
        }
    }

    #[instrument(name = "Mediator::handle_command", skip_all, fields(algo_id = %self.engine.id()))]
    async fn handle_command(&mut self, command: MediatorCommand) -> Result<(), MediatorError> {
        match command {
            MediatorCommand::Initialize { peers } => {
                self.engine.initialize(&peers);
                info!(
                    "Protocol {} initialized with {} peers",
                    self.engine.id(),
                    self.engine.view().len()
                );
            }
            MediatorCommand::Deliver { message } => self.handle_message(message).await?,
            MediatorCommand::ReadAttribute { attribute, sender } => {
                let result = self.engine.attribute(&attribute).ok_or_else(|| {
                    DependencyError::UnknownAttribute {
                        protocol: self.engine.id().to_string(),
                        attribute,
                    }
                });
                _ = sender.send(result);
            }
            MediatorCommand::RemovePeer { peer } => {
                if self.engine.remove_peer(&peer) {
                    debug!("Protocol {}: removed {peer} from the view", self.engine.id());
                }
            }
            MediatorCommand::View { sender } => {
                _ = sender.send(self.engine.view().clone());
            }
            MediatorCommand::Trace { sender } => {
                _ = sender.send(self.engine.trace_string());
            }
            MediatorCommand::State { sender } => {
                _ = sender.send(self.state);
            }
        }

        Ok(())
    }

    #[instrument(name = "Mediator::active_cycle", skip_all, fields(algo_id = %self.engine.id()))]
    async fn active_cycle(&mut self) -> Result<(), MediatorError> {
        self.state = MediatorState::ActiveCycle;
        self.loop_count += 1;
        self.engine.increase_age();

        let propagation = self.engine.config().propagation;
        if !propagation.push && !propagation.pull {
            self.state = MediatorState::Idle;
            return Ok(());
        }

        let Some(destination) = self.engine.select_peer() else {
            debug!("Protocol {}: empty view, nothing to gossip", self.engine.id());
            self.state = MediatorState::Idle;
            return Ok(());
        };

        self.schedule(Cycle::Active { destination }).await
    }

    async fn handle_message(&mut self, message: GossipMessage) -> Result<(), MediatorError> {
        if message.algo_id != self.engine.id() {
            warn!(
                "Protocol {}: dropping message addressed to {}",
                self.engine.id(),
                message.algo_id
            );
            return Ok(());
        }

        if !self.pending.is_empty() {
            self.deferred.push_back(message);
            return Ok(());
        }

        self.schedule(Cycle::Passive { message }).await
    }

    async fn process_deferred(&mut self) -> Result<(), MediatorError> {
        while self.pending.is_empty() {
            let Some(message) = self.deferred.pop_front() else {
                break;
            };

            self.schedule(Cycle::Passive { message }).await?;
        }

        Ok(())
    }

    /// Read the dependencies of the protocol, then run `cycle`.
    ///
    /// Local dependencies are read right away. When some dependency is held
    /// by another protocol instance, the cycle is suspended until every
    /// request is answered or times out after one period.
    async fn schedule(&mut self, cycle: Cycle) -> Result<(), MediatorError> {
        let mut dependencies = DependencyViews::new();
        let mut requests = Vec::new();

        for dependency in self.engine.config().dependencies.clone() {
            if dependency.is_local() {
                match self.engine.attribute(&dependency.attribute) {
                    Some(view) => {
                        dependencies.insert(dependency.source, view);
                    }
                    None => warn!(
                        "Protocol {}: no attribute {}",
                        dependency.dependent, dependency.attribute
                    ),
                }

                continue;
            }

            let (sender, receiver) = oneshot::channel();
            self.events.send(MediatorEvent::ResolveDependency {
                dependency: dependency.clone(),
                sender,
            })?;

            requests.push((dependency, receiver));
        }

        if requests.is_empty() {
            return self.resume(cycle, dependencies).await;
        }

        self.state = MediatorState::AwaitingDependency;
        let timeout = self.engine.config().period;

        self.pending.push(
            async move {
                let responses = futures::future::join_all(requests.into_iter().map(
                    |(dependency, receiver)| async move {
                        (dependency, time::timeout(timeout, receiver).await)
                    },
                ))
                .await;

                for (dependency, response) in responses {
                    match response {
                        Ok(Ok(Ok(view))) => {
                            dependencies.insert(dependency.source, view);
                        }
                        Ok(Ok(Err(error))) => {
                            warn!("Protocol {}: {error}", dependency.dependent)
                        }
                        Ok(Err(_)) => warn!(
                            "Protocol {}: request for {} dropped",
                            dependency.dependent, dependency.source
                        ),
                        Err(_) => warn!(
                            "Protocol {}: request for {} timed out",
                            dependency.dependent, dependency.source
                        ),
                    }
                }

                (cycle, dependencies)
            }
            .boxed(),
        );

        Ok(())
    }

    /// Run a cycle whose dependencies are read. A passive cycle builds its
    /// reply from the view as it was before merging the received entries.
    async fn resume(
        &mut self,
        cycle: Cycle,
        dependencies: DependencyViews,
    ) -> Result<(), MediatorError> {
        match cycle {
            Cycle::Active { destination } => {
                self.state = MediatorState::ActiveCycle;

                // A pull only protocol still asks the destination for its entries
                let payload = if self.engine.config().propagation.push {
                    self.engine.select_items_to_send(
                        Direction::Active,
                        Some(&destination),
                        &dependencies,
                    )
                } else {
                    View::new()
                };

                self.send(destination, Direction::Active, payload).await?;
            }
            Cycle::Passive { message } => {
                self.state = MediatorState::PassiveHandling;

                let reply = (message.direction == Direction::Active
                    && self.engine.config().propagation.pull)
                    .then(|| {
                        self.engine.select_items_to_send(
                            Direction::Passive,
                            Some(&message.emitter),
                            &dependencies,
                        )
                    });

                self.engine
                    .select_items_to_keep(message.payload, &dependencies);

                if let Some(reply) = reply {
                    self.send(message.emitter, Direction::Passive, reply).await?;
                }
            }
        }

        self.state = MediatorState::Idle;

        Ok(())
    }

    async fn send(
        &mut self,
        to: PeerId,
        direction: Direction,
        payload: View,
    ) -> Result<(), MediatorError> {
        let message = GossipMessage {
            algo_id: self.engine.id().to_string(),
            emitter: self.engine.local_peer().clone(),
            direction,
            loop_count: self.loop_count,
            payload,
        };

        self.events.send(MediatorEvent::Send { to, message })?;

        Ok(())
    }
}

/// A dependency could not be read, the cycle proceeds without its contribution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("Protocol {0} is not scheduled")]
    UnknownProtocol(String),

    #[error("Protocol {protocol} has no attribute {attribute}")]
    UnknownAttribute { protocol: String, attribute: String },

    #[error("Protocol {0} is unavailable")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum MediatorError {
    #[error("Unable to communicate with the mediator: {0}")]
    CommunicationChannel(#[from] SendError<MediatorCommand>),

    #[error("Mediator of {0} is no longer running")]
    Stopped(String),

    #[error("Unable to receive expected response from the mediator: {0}")]
    ResponseChannel(#[from] RecvError),

    #[error("Unable to send event to the coordinator: {0}")]
    EventChannel(#[from] SendError<MediatorEvent>),

    #[error("Unable to execute shutdown on the mediator: {0}")]
    ShutdownCommunication(SendError<oneshot::Sender<()>>),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("No protocol engine provided")]
    MissingEngine,

    #[error("No event channel provided")]
    MissingEventChannel,
}
