use std::{future::IntoFuture, time::Duration};

use rstest::rstest;
use serde_json::json;
use test_log::test;
use tokio::{spawn, sync::mpsc, time};
use weave_config::{DependencyOptions, PropagationPolicy, ProtocolOptions};
use weave_core::{Direction, GossipMessage, Item, PeerId, SimilarityRegistry, View};
use weave_protocols::ProtocolRegistry;

use crate::{
    DependencyError, Mediator, MediatorClient, MediatorError, MediatorEvent, MediatorState,
};

const PERIOD: Duration = Duration::from_millis(2000);

fn cyclon_options() -> ProtocolOptions {
    ProtocolOptions {
        id: "rps".to_string(),
        class: "cyclon".to_string(),
        view_size: 4,
        fanout: 2,
        period_time: PERIOD.as_millis() as u64,
        propagation_policy: PropagationPolicy::default(),
        selection_policy: "random".to_string(),
        healer: 0,
        swapper: 0,
        payload: None,
        similarity_function: None,
        dependencies: Vec::new(),
    }
}

fn vicinity_options() -> ProtocolOptions {
    ProtocolOptions {
        id: "clustering".to_string(),
        class: "vicinity".to_string(),
        selection_policy: "agr-biased".to_string(),
        similarity_function: Some("negative-distance".to_string()),
        payload: Some(json!(5)),
        dependencies: vec![DependencyOptions {
            algo_id: "rps".to_string(),
            attribute: "view".to_string(),
        }],
        ..cyclon_options()
    }
}

fn spawn_mediator(options: ProtocolOptions) -> (MediatorClient, mpsc::UnboundedReceiver<MediatorEvent>) {
    let engine = ProtocolRegistry::default()
        .create(
            options.validate().unwrap(),
            PeerId::from("local"),
            &SimilarityRegistry::default(),
        )
        .unwrap();

    let (events, events_recv) = mpsc::unbounded_channel();
    let (client, mediator) = Mediator::builder()
        .with_engine(engine)
        .with_events(events)
        .build()
        .unwrap();

    spawn(mediator.into_future());

    (client, events_recv)
}

fn gossip(algo_id: &str, emitter: &str, direction: Direction, entries: &[(&str, u64)]) -> GossipMessage {
    GossipMessage {
        algo_id: algo_id.to_string(),
        emitter: PeerId::from(emitter),
        direction,
        loop_count: 1,
        payload: entries
            .iter()
            .map(|(peer, age)| (PeerId::from(*peer), Item::new(*age, None)))
            .collect(),
    }
}

fn peers(ids: &[&str]) -> Vec<PeerId> {
    ids.iter().map(|id| PeerId::from(*id)).collect()
}

async fn next_send(events: &mut mpsc::UnboundedReceiver<MediatorEvent>) -> (PeerId, GossipMessage) {
    match events.recv().await {
        Some(MediatorEvent::Send { to, message }) => (to, message),
        other => panic!("Expected a gossip message, got {other:?}"),
    }
}

#[test(tokio::test(start_paused = true))]
async fn no_gossip_before_initialize() {
    let (_client, mut events) = spawn_mediator(cyclon_options());

    assert!(time::timeout(PERIOD * 3, events.recv()).await.is_err());
}

#[test(tokio::test(start_paused = true))]
async fn active_cycle_gossips_with_a_known_peer() {
    let (client, mut events) = spawn_mediator(cyclon_options());
    client.initialize(peers(&["a", "b"])).await.unwrap();

    let (to, message) = next_send(&mut events).await;

    assert!(to == PeerId::from("a") || to == PeerId::from("b"));
    assert_eq!(message.algo_id, "rps");
    assert_eq!(message.emitter, PeerId::from("local"));
    assert_eq!(message.direction, Direction::Active);
    assert_eq!(message.loop_count, 1);
    assert_eq!(message.payload.len(), 2);
    assert_eq!(
        message.payload.get(&PeerId::from("local")).map(|item| item.age),
        Some(0)
    );
    assert!(!message.payload.contains(&to));

    let (_, message) = next_send(&mut events).await;
    assert_eq!(message.loop_count, 2);
}

#[test(tokio::test(start_paused = true))]
async fn active_message_is_answered_when_pull_is_enabled() {
    let (client, mut events) = spawn_mediator(cyclon_options());
    client.initialize(peers(&["a", "b"])).await.unwrap();

    client
        .deliver(gossip("rps", "z", Direction::Active, &[("z", 0), ("c", 1)]))
        .unwrap();

    let (to, reply) = next_send(&mut events).await;
    assert_eq!(to, PeerId::from("z"));
    assert_eq!(reply.direction, Direction::Passive);
    assert_eq!(reply.payload.peers(), peers(&["a", "b"]));

    let view = client.view().await.unwrap();
    assert_eq!(view.peers(), peers(&["a", "b", "z", "c"]));
}

#[rstest]
#[case::passive_message(Direction::Passive, true)]
#[case::pull_disabled(Direction::Active, false)]
#[test_log::test(tokio::test(start_paused = true))]
async fn message_is_merged_without_reply(#[case] direction: Direction, #[case] pull: bool) {
    let mut options = cyclon_options();
    options.propagation_policy.pull = pull;

    let (client, mut events) = spawn_mediator(options);
    client
        .deliver(gossip("rps", "z", direction, &[("z", 0)]))
        .unwrap();

    assert!(time::timeout(PERIOD / 2, events.recv()).await.is_err());
    assert!(client.view().await.unwrap().contains(&PeerId::from("z")));
}

#[test(tokio::test(start_paused = true))]
async fn pull_only_cycle_sends_an_empty_request() {
    let mut options = cyclon_options();
    options.propagation_policy.push = false;

    let (client, mut events) = spawn_mediator(options);
    client.initialize(peers(&["a"])).await.unwrap();

    let (to, message) = next_send(&mut events).await;

    assert_eq!(to, PeerId::from("a"));
    assert_eq!(message.direction, Direction::Active);
    assert!(message.payload.is_empty());
}

#[test(tokio::test(start_paused = true))]
async fn message_for_another_protocol_is_dropped() {
    let (client, _events) = spawn_mediator(cyclon_options());

    client
        .deliver(gossip("clustering", "z", Direction::Passive, &[("z", 0)]))
        .unwrap();

    assert!(client.view().await.unwrap().is_empty());
}

#[test(tokio::test(start_paused = true))]
async fn cycle_resumes_once_dependency_is_resolved() {
    let (client, mut events) = spawn_mediator(vicinity_options());
    client.initialize(peers(&["p1"])).await.unwrap();

    let Some(MediatorEvent::ResolveDependency { dependency, sender }) = events.recv().await else {
        panic!("Expected a dependency request");
    };
    assert_eq!(dependency.source, "rps");
    assert_eq!(dependency.dependent, "clustering");
    assert_eq!(client.state().await.unwrap(), MediatorState::AwaitingDependency);

    // Deferred until the active cycle completes
    client
        .deliver(gossip("clustering", "z", Direction::Active, &[("z", 0)]))
        .unwrap();

    let rps_view: View = [
        (PeerId::from("q"), Item::new(0, Some(json!(4)))),
        (PeerId::from("r"), Item::new(0, Some(json!(100)))),
    ]
    .into_iter()
    .collect();
    sender.send(Ok(rps_view.clone())).unwrap();

    let (to, message) = next_send(&mut events).await;
    assert_eq!(to, PeerId::from("p1"));
    assert_eq!(message.direction, Direction::Active);
    assert_eq!(message.payload.peers(), peers(&["q", "local"]));

    let Some(MediatorEvent::ResolveDependency { sender, .. }) = events.recv().await else {
        panic!("Expected a dependency request for the deferred message");
    };
    sender.send(Ok(rps_view)).unwrap();

    let (to, reply) = next_send(&mut events).await;
    assert_eq!(to, PeerId::from("z"));
    assert_eq!(reply.direction, Direction::Passive);

    assert_eq!(client.state().await.unwrap(), MediatorState::Idle);
    assert!(client.view().await.unwrap().contains(&PeerId::from("q")));
}

#[test(tokio::test(start_paused = true))]
async fn unanswered_dependency_times_out_after_one_period() {
    let (client, mut events) = spawn_mediator(vicinity_options());
    client.initialize(peers(&["p1"])).await.unwrap();

    let Some(MediatorEvent::ResolveDependency { sender: _pending, .. }) = events.recv().await
    else {
        panic!("Expected a dependency request");
    };

    let started = time::Instant::now();
    let (to, message) = next_send(&mut events).await;

    assert!(started.elapsed() >= PERIOD);
    assert_eq!(to, PeerId::from("p1"));
    assert_eq!(message.payload.peers(), peers(&["local"]));
}

#[test(tokio::test(start_paused = true))]
async fn failed_dependency_counts_as_an_empty_contribution() {
    let (client, mut events) = spawn_mediator(vicinity_options());
    client.initialize(peers(&["p1"])).await.unwrap();

    let Some(MediatorEvent::ResolveDependency { sender, .. }) = events.recv().await else {
        panic!("Expected a dependency request");
    };
    sender
        .send(Err(DependencyError::UnknownProtocol("rps".to_string())))
        .unwrap();

    let (_, message) = next_send(&mut events).await;
    assert_eq!(message.payload.peers(), peers(&["local"]));
}

#[test(tokio::test)]
async fn attributes_are_readable() {
    let (client, _events) = spawn_mediator(cyclon_options());
    client.initialize(peers(&["a", "b"])).await.unwrap();

    assert_eq!(
        client.read_attribute("view").await.unwrap().peers(),
        peers(&["a", "b"])
    );

    assert!(matches!(
        client.read_attribute("scores").await,
        Err(MediatorError::Dependency(DependencyError::UnknownAttribute { attribute, .. }))
            if attribute == "scores"
    ));
}

#[test(tokio::test)]
async fn removed_peer_leaves_the_view() {
    let (client, _events) = spawn_mediator(cyclon_options());
    client.initialize(peers(&["a", "b"])).await.unwrap();

    client.remove_peer(PeerId::from("a")).unwrap();

    assert_eq!(client.view().await.unwrap().peers(), peers(&["b"]));
    assert!(client.trace().await.unwrap().starts_with("cyclon[rps] b:0"));
}

#[test(tokio::test)]
async fn mediator_shuts_down() {
    let (client, _events) = spawn_mediator(cyclon_options());

    assert_eq!(client.id(), "rps");
    assert!(client.shutdown().await.is_ok());
}

#[test]
fn builder_requires_an_engine() {
    let (events, _) = mpsc::unbounded_channel();

    assert!(matches!(
        Mediator::builder().with_events(events).build(),
        Err(MediatorError::MissingEngine)
    ));
}

#[test(tokio::test)]
async fn deliver_never_waits_on_a_full_queue() {
    let engine = ProtocolRegistry::default()
        .create(
            cyclon_options().validate().unwrap(),
            PeerId::from("local"),
            &SimilarityRegistry::default(),
        )
        .unwrap();
    let (events, _events) = mpsc::unbounded_channel();
    let (client, mediator) = Mediator::builder()
        .with_engine(engine)
        .with_events(events)
        .with_command_buffer_size(1)
        .build()
        .unwrap();

    // Not running yet: the first message fills the queue, the others are dropped
    for _ in 0..10 {
        client
            .deliver(gossip("rps", "z", Direction::Active, &[("z", 0)]))
            .unwrap();
    }
    client.remove_peer(PeerId::from("z")).unwrap();

    drop(mediator);

    assert!(matches!(
        client.deliver(gossip("rps", "z", Direction::Active, &[])),
        Err(MediatorError::Stopped(id)) if id == "rps"
    ));
}
