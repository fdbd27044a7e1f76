use std::collections::HashSet;

use rstest::rstest;
use serde_json::json;
use test_log::test;
use weave_core::{Direction, Item};

use super::{options, peer, peers, view_of};
use crate::{DependencyViews, ProtocolEngine, SamplingService};

fn sampling(
    view_size: usize,
    healer: usize,
    swapper: usize,
    policy: &str,
    view: &[(&str, u64)],
) -> SamplingService {
    let mut options = options("rps-hs", "sampling-service", view_size, 2);
    options.healer = healer;
    options.swapper = swapper;
    options.selection_policy = policy.to_string();

    let mut engine = SamplingService::new(options.validate().unwrap(), peer("x")).unwrap();
    engine.select_items_to_keep(view_of(view), &DependencyViews::new());

    engine
}

#[test]
fn sends_half_of_the_view_with_a_fresh_local_entry() {
    let mut engine = sampling(
        6,
        0,
        0,
        "random",
        &[("a", 0), ("b", 1), ("c", 2), ("d", 3), ("e", 4), ("f", 5)],
    );

    let sent = engine.select_items_to_send(Direction::Active, Some(&peer("a")), &DependencyViews::new());

    assert_eq!(sent.len(), 3);
    assert_eq!(sent.get_index(0).map(|(peer, item)| (peer.clone(), item.age)), Some((peer("x"), 0)));
}

#[test]
fn oldest_entries_are_moved_to_the_tail_before_sending() {
    let mut engine = sampling(
        6,
        2,
        0,
        "random",
        &[("a", 5), ("b", 1), ("c", 2), ("d", 4), ("e", 0), ("f", 3)],
    );

    let sent = engine.select_items_to_send(Direction::Passive, None, &DependencyViews::new());

    let view = engine.view();
    assert_eq!(view.len(), 6);
    assert_eq!(view.get_index(4).map(|(peer, _)| peer.clone()), Some(peer("d")));
    assert_eq!(view.get_index(5).map(|(peer, _)| peer.clone()), Some(peer("a")));
    assert!(!sent.contains(&peer("a")) && !sent.contains(&peer("d")));
}

#[test]
fn healer_evicts_the_oldest_entries() {
    let mut engine = sampling(4, 2, 0, "random", &[("a", 0), ("b", 1), ("c", 2), ("d", 3)]);

    engine.select_items_to_keep(view_of(&[("e", 0), ("f", 0)]), &DependencyViews::new());

    assert_eq!(engine.view(), &view_of(&[("a", 0), ("b", 1), ("e", 0), ("f", 0)]));
}

#[test]
fn swapper_evicts_entries_from_the_head() {
    let mut engine = sampling(4, 0, 2, "random", &[("a", 0), ("b", 1), ("c", 2), ("d", 3)]);

    engine.select_items_to_keep(view_of(&[("e", 0), ("f", 0)]), &DependencyViews::new());

    assert_eq!(engine.view(), &view_of(&[("c", 2), ("d", 3), ("e", 0), ("f", 0)]));
}

#[test]
fn incoming_entry_wins_ties() {
    let mut engine = sampling(4, 0, 0, "random", &[("a", 3), ("b", 1)]);

    let mut received = view_of(&[("b", 2)]);
    received.insert(peer("a"), Item::new(3, Some(json!("fresh"))));
    engine.select_items_to_keep(received, &DependencyViews::new());

    assert_eq!(engine.view().get(&peer("a")).and_then(|item| item.payload.clone()), Some(json!("fresh")));
    assert_eq!(engine.view().get(&peer("b")).map(|item| item.age), Some(1));
}

#[rstest]
#[case(0, 0)]
#[case(1, 1)]
#[case(3, 0)]
#[case(0, 3)]
#[test_log::test]
fn kept_view_never_exceeds_view_size(#[case] healer: usize, #[case] swapper: usize) {
    let mut engine = sampling(4, healer, swapper, "random", &[("a", 0), ("b", 1), ("c", 2)]);

    engine.select_items_to_keep(
        view_of(&[("d", 0), ("e", 1), ("f", 2), ("g", 3), ("h", 4), ("x", 0)]),
        &DependencyViews::new(),
    );

    assert_eq!(engine.view().len(), 4);
    assert!(!engine.view().contains(&peer("x")));
}

#[test]
fn every_peer_is_selected_once_per_round() {
    let mut engine = sampling(4, 0, 0, "random", &[("a", 0), ("b", 1), ("c", 2), ("d", 3)]);

    let selected: HashSet<_> = (0..4).filter_map(|_| engine.select_peer()).collect();

    assert_eq!(selected, peers(&["a", "b", "c", "d"]).into_iter().collect());
    assert_eq!(engine.pending(), 0);

    assert!(engine.select_peer().is_some());
    assert_eq!(engine.pending(), 3);
}

#[test]
fn oldest_policy_selects_the_oldest_pending_peer() {
    let mut engine = sampling(4, 0, 0, "oldest", &[("a", 0), ("b", 5), ("c", 2)]);

    assert_eq!(engine.select_peer(), Some(peer("b")));
    assert_eq!(engine.select_peer(), Some(peer("c")));
}

#[test]
fn removed_peer_is_no_longer_pending() {
    let mut engine = sampling(4, 0, 0, "oldest", &[("a", 0), ("b", 5)]);

    assert!(engine.remove_peer(&peer("b")));
    assert_eq!(engine.pending(), 1);
    assert_eq!(engine.select_peer(), Some(peer("a")));
}

#[test]
fn empty_engine_is_a_no_op() {
    let mut engine = sampling(4, 1, 1, "random", &[]);

    assert_eq!(engine.select_peer(), None);
    engine.increase_age();
    assert!(engine.view().is_empty());
}
