use rstest::rstest;
use serde_json::json;
use test_log::test;
use tokio::sync::mpsc;
use weave_connections::{ConnectionManager, TransportError, TransportEvent};
use weave_core::{NetworkMessage, PeerId};
use weave_test_sdk::{fixtures::peers, network::MemoryNetwork};

struct Setup {
    network: MemoryNetwork,
    manager: ConnectionManager,
}

fn setup(max_connections: usize, remotes: &[&str]) -> (Setup, Vec<mpsc::Receiver<TransportEvent>>) {
    let network = MemoryNetwork::new();
    let (transport, _local_events) = network.join(PeerId::from("local"));

    let receivers = peers(remotes)
        .into_iter()
        .map(|peer| network.join(peer).1)
        .collect();

    (
        Setup {
            manager: ConnectionManager::new(PeerId::from("local"), transport, max_connections),
            network,
        },
        receivers,
    )
}

async fn connect(manager: &mut ConnectionManager, peer: &str) -> bool {
    let new = manager
        .new_connection(&PeerId::from(peer), true, false)
        .await
        .unwrap();

    manager.set(new.connection);
    new.limit_reached
}

fn decode(event: TransportEvent) -> NetworkMessage {
    match event {
        TransportEvent::Data { bytes, .. } => NetworkMessage::try_from(bytes.as_slice()).unwrap(),
        other => panic!("Expected data, got {other:?}"),
    }
}

#[test(tokio::test)]
async fn initiator_announces_itself() {
    let (mut setup, mut receivers) = setup(2, &["a"]);

    assert!(!connect(&mut setup.manager, "a").await);

    assert!(matches!(
        receivers[0].recv().await,
        Some(TransportEvent::Incoming { peer }) if peer == PeerId::from("local")
    ));
    assert_eq!(setup.manager.list(), peers(&["a"]));
}

#[test(tokio::test)]
async fn limit_is_reported_before_insertion() {
    let (mut setup, _receivers) = setup(2, &["a", "b", "c", "d"]);

    assert!(!connect(&mut setup.manager, "a").await);
    assert!(!connect(&mut setup.manager, "b").await);

    let new = setup
        .manager
        .new_connection(&PeerId::from("c"), true, false)
        .await
        .unwrap();
    assert!(new.limit_reached);
    assert_eq!(setup.manager.len(), 2);

    assert_eq!(
        setup.manager.delete_one_connection().await,
        Some(PeerId::from("a"))
    );
    assert!(setup.manager.set(new.connection));

    assert_eq!(setup.manager.list(), peers(&["b", "c"]));
    assert!(connect(&mut setup.manager, "d").await);
}

#[test(tokio::test)]
async fn eviction_frees_a_slot_for_the_next_connection() {
    let (mut setup, _receivers) = setup(2, &["a", "b", "c", "d"]);
    connect(&mut setup.manager, "a").await;
    connect(&mut setup.manager, "b").await;

    let full = setup
        .manager
        .new_connection(&PeerId::from("c"), true, false)
        .await
        .unwrap();
    assert!(full.limit_reached);

    assert!(setup.manager.delete_one_connection().await.is_some());

    let next = setup
        .manager
        .new_connection(&PeerId::from("d"), true, false)
        .await
        .unwrap();
    assert!(!next.limit_reached);
    assert_eq!(setup.manager.list(), peers(&["b"]));
}

#[test(tokio::test)]
async fn eviction_notifies_the_evicted_peer() {
    let (mut setup, mut receivers) = setup(1, &["a"]);
    connect(&mut setup.manager, "a").await;

    setup.manager.delete_one_connection().await;

    let events = &mut receivers[0];
    assert!(matches!(events.recv().await, Some(TransportEvent::Incoming { .. })));
    assert_eq!(
        decode(events.recv().await.unwrap()),
        NetworkMessage::Leave {
            emitter: PeerId::from("local")
        }
    );
    assert!(matches!(events.recv().await, Some(TransportEvent::Closed { .. })));
    assert!(setup.manager.is_empty());
}

#[test(tokio::test)]
async fn deleted_connection_is_closed_silently() {
    let (mut setup, mut receivers) = setup(2, &["a"]);
    connect(&mut setup.manager, "a").await;

    let connection = setup
        .manager
        .delete_connection(&PeerId::from("a"))
        .await
        .unwrap();

    let events = &mut receivers[0];
    assert!(matches!(events.recv().await, Some(TransportEvent::Incoming { .. })));
    assert!(matches!(events.recv().await, Some(TransportEvent::Closed { .. })));

    assert!(matches!(
        connection.send(&NetworkMessage::Leave { emitter: PeerId::from("local") }).await,
        Err(TransportError::ChannelClosed(_))
    ));
    assert!(setup.manager.delete_connection(&PeerId::from("a")).await.is_none());
}

#[test(tokio::test)]
async fn duplicate_connection_is_rejected() {
    let (mut setup, _receivers) = setup(4, &["a"]);
    connect(&mut setup.manager, "a").await;

    let duplicate = setup
        .manager
        .new_connection(&PeerId::from("a"), false, false)
        .await
        .unwrap();

    assert!(!setup.manager.set(duplicate.connection));
    assert!(setup.manager.get(&PeerId::from("a")).unwrap().initiator);
}

#[test(tokio::test)]
async fn close_all_sends_leave_to_every_peer() {
    let (mut setup, mut receivers) = setup(4, &["a", "b"]);
    connect(&mut setup.manager, "a").await;
    connect(&mut setup.manager, "b").await;

    setup.manager.close_all().await;

    assert!(setup.manager.is_empty());
    for events in receivers.iter_mut() {
        assert!(matches!(events.recv().await, Some(TransportEvent::Incoming { .. })));
        assert!(matches!(
            decode(events.recv().await.unwrap()),
            NetworkMessage::Leave { .. }
        ));
    }
}

#[rstest]
#[case::unknown_peer("z", false)]
#[case::unreachable_peer("a", true)]
#[test_log::test(tokio::test)]
async fn opening_a_channel_to_a_missing_peer_fails(#[case] peer: &str, #[case] unreachable: bool) {
    let (setup, _receivers) = setup(4, &["a"]);
    let peer = PeerId::from(peer);
    setup.network.set_unreachable(&peer, unreachable);

    assert!(matches!(
        setup.manager.new_connection(&peer, true, false).await,
        Err(TransportError::Unreachable(unreachable)) if unreachable == peer
    ));
}

#[test(tokio::test)]
async fn sending_to_a_departed_peer_fails() {
    let (mut setup, _receivers) = setup(4, &["a"]);
    connect(&mut setup.manager, "a").await;

    setup.network.leave(&PeerId::from("a"));

    let connection = setup.manager.get(&PeerId::from("a")).unwrap();
    assert!(matches!(
        connection
            .send(&NetworkMessage::Leave { emitter: PeerId::from("local") })
            .await,
        Err(TransportError::ChannelClosed(_))
    ));
}

#[test(tokio::test)]
async fn application_payload_reaches_the_peer() {
    let (mut setup, mut receivers) = setup(4, &["a"]);
    connect(&mut setup.manager, "a").await;

    let message = NetworkMessage::Application {
        emitter: PeerId::from("local"),
        payload: json!({"hello": "world"}),
    };
    setup
        .manager
        .get(&PeerId::from("a"))
        .unwrap()
        .send(&message)
        .await
        .unwrap();

    let events = &mut receivers[0];
    events.recv().await;
    assert_eq!(decode(events.recv().await.unwrap()), message);
}
