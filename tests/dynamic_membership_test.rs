//! Consensus over the full reference graph with dynamic membership: a participant added at the
//! round-2 boundary, another removed at the round-5 boundary, blocks produced through round
//! received 5, and byte-for-byte determinism across two independent runs.

mod common;

use borsh::BorshSerialize;
use common::build_dyn_graph;

use hashgraph_rs::store::Store;
use hashgraph_rs::types::basic::{BlockNumber, Round, Trilean};
use hashgraph_rs::types::transactions::InternalTransaction;

#[test]
fn divide_rounds_with_membership_changes() {
    let mut graph = build_dyn_graph();
    graph.hashgraph.divide_rounds().unwrap();

    // (event, lamport timestamp, round)
    let expected = [
        ("w00", 0, 0),
        ("w01", 0, 0),
        ("w02", 0, 0),
        ("e10", 1, 0),
        ("e21", 2, 0),
        ("e12", 3, 0),
        ("w11", 4, 1),
        ("w12", 5, 1),
        ("w10", 6, 1),
        ("f10", 7, 1),
        ("w22", 8, 2),
        ("w20", 9, 2),
        ("w21", 10, 2),
        ("g21", 11, 2),
        ("w33", 12, 3),
        ("w30", 13, 3),
        ("w31", 14, 3),
        ("w32", 15, 3),
        ("w43", 16, 4),
        ("w40", 17, 4),
        ("w41", 18, 4),
        ("w42", 19, 4),
        ("w53", 20, 5),
        ("w52", 21, 5),
        ("w51", 22, 5),
        ("j31", 23, 5),
        ("w62", 24, 6),
        ("w61", 25, 6),
        ("w63", 26, 6),
        ("h23", 27, 6),
        ("w71", 28, 7),
    ];
    for (name, lamport, round) in expected {
        assert_eq!(graph.lamport_of(name), lamport, "{} lamport", name);
        assert_eq!(graph.round_of(name), round, "{} round", name);
    }

    let expected_witnesses: [(i64, Vec<&str>); 8] = [
        (0, vec!["w00", "w01", "w02"]),
        (1, vec!["w10", "w11", "w12"]),
        (2, vec!["w20", "w21", "w22"]),
        (3, vec!["w30", "w31", "w32", "w33"]),
        (4, vec!["w40", "w41", "w42", "w43"]),
        (5, vec!["w51", "w52", "w53"]),
        (6, vec!["w61", "w62", "w63"]),
        (7, vec!["w71"]),
    ];
    for (round, expected) in expected_witnesses {
        let mut witnesses = graph.witnesses_of(round);
        witnesses.sort();
        let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(witnesses, expected, "round {} witnesses", round);
    }
}

#[test]
fn peer_set_pins_resolve_by_floor_lookup() {
    let graph = build_dyn_graph();
    let store = graph.hashgraph.store();
    for round in 0..=1 {
        assert_eq!(store.get_peer_set(Round::new(round)).unwrap().len(), 3);
    }
    for round in 2..=4 {
        assert_eq!(store.get_peer_set(Round::new(round)).unwrap().len(), 4);
    }
    for round in 5..=9 {
        assert_eq!(store.get_peer_set(Round::new(round)).unwrap().len(), 3);
    }
    // Participant 0 keeps its history but is out of the later peer sets.
    assert!(!store
        .get_peer_set(Round::new(5))
        .unwrap()
        .contains(&graph.nodes[0].pub_key));
    assert_eq!(store.repertoire_by_pub_key().len(), 4);
}

#[test]
fn decide_fame_with_membership_changes() {
    let mut graph = build_dyn_graph();
    graph.hashgraph.divide_rounds().unwrap();
    graph.hashgraph.decide_fame().unwrap();

    // (round, event, witness, famous)
    let expected: [(i64, &str, bool, Trilean); 31] = [
        (0, "w00", true, Trilean::True),
        (0, "w01", true, Trilean::True),
        (0, "w02", true, Trilean::True),
        (0, "e10", false, Trilean::Undefined),
        (0, "e21", false, Trilean::Undefined),
        (0, "e12", false, Trilean::Undefined),
        (1, "w10", true, Trilean::True),
        (1, "w11", true, Trilean::True),
        (1, "w12", true, Trilean::True),
        (1, "f10", false, Trilean::Undefined),
        (2, "w20", true, Trilean::True),
        (2, "w21", true, Trilean::True),
        (2, "w22", true, Trilean::True),
        (2, "g21", false, Trilean::Undefined),
        (3, "w30", true, Trilean::True),
        (3, "w31", true, Trilean::True),
        (3, "w32", true, Trilean::True),
        (3, "w33", true, Trilean::True),
        (4, "w40", true, Trilean::True),
        (4, "w41", true, Trilean::True),
        (4, "w42", true, Trilean::True),
        (4, "w43", true, Trilean::True),
        (5, "w51", true, Trilean::True),
        (5, "w52", true, Trilean::True),
        (5, "w53", true, Trilean::True),
        (5, "j31", false, Trilean::Undefined),
        (6, "w61", true, Trilean::Undefined),
        (6, "w62", true, Trilean::Undefined),
        (6, "w63", true, Trilean::Undefined),
        (6, "h23", false, Trilean::Undefined),
        (7, "w71", true, Trilean::Undefined),
    ];
    for (round, name, witness, famous) in expected {
        let round_created = graph
            .hashgraph
            .store()
            .get_round_created(Round::new(round))
            .unwrap();
        let event = &round_created.events[&graph.hash_of(name)];
        assert_eq!(event.witness, witness, "{} witness flag", name);
        assert_eq!(event.famous, famous, "{} fame", name);
    }

    // The four-witness round 3 (scenario: participant added) and the reduced round 5
    // (scenario: participant removed) are both decided.
    for round in 0..=5 {
        assert!(
            graph
                .hashgraph
                .store()
                .get_round_created(Round::new(round))
                .unwrap()
                .witnesses_decided(),
            "round {} should be decided",
            round
        );
    }
    for round in 6..=7 {
        assert!(
            !graph
                .hashgraph
                .store()
                .get_round_created(Round::new(round))
                .unwrap()
                .witnesses_decided(),
            "round {} should be undecided",
            round
        );
    }
}

#[test]
fn decide_round_received_orders_events_into_rounds() {
    let mut graph = build_dyn_graph();
    graph.hashgraph.divide_rounds().unwrap();
    graph.hashgraph.decide_fame().unwrap();
    graph.hashgraph.decide_round_received().unwrap();

    let expected: [(i64, Vec<&str>); 5] = [
        (1, vec!["w00", "w01", "w02", "e10", "e21", "e12"]),
        (2, vec!["w11", "w12", "w10", "f10"]),
        (3, vec!["w22", "w20", "w21", "g21"]),
        (4, vec!["w33", "w30", "w31", "w32"]),
        (5, vec!["w43", "w40", "w41", "w42"]),
    ];
    for (round, names) in expected {
        let received = graph
            .hashgraph
            .store()
            .get_round_received(Round::new(round))
            .unwrap();
        let received_names: Vec<String> =
            received.0.iter().map(|h| graph.name_of(h)).collect();
        assert_eq!(received_names, names, "round {} received", round);

        for name in names {
            let event = graph.event_of(name);
            assert_eq!(event.round_received(), Some(Round::new(round)), "{}", name);
            assert!(event.consensus_timestamp().is_some(), "{}", name);
        }
    }
}

#[test]
fn process_decided_rounds_emits_blocks() {
    let mut graph = build_dyn_graph();
    graph.run_consensus();

    let store = graph.hashgraph.store();
    assert_eq!(store.consensus_events_count(), 22);
    assert_eq!(graph.hashgraph.pending_loaded_events(), 9);
    assert_eq!(store.last_block_index().int(), 4);

    for i in 0..=4i64 {
        let round_received = Round::new(i + 1);
        let block = store.get_block(BlockNumber::new(i)).unwrap();
        assert_eq!(block.round_received(), round_received, "block {}", i);

        let frame = store.get_frame(round_received).unwrap();
        assert_eq!(block.body.frame_hash, frame.hash().unwrap(), "block {}", i);
        assert_eq!(
            block.body.peers_hash,
            store.get_peer_set(round_received).unwrap().hash().unwrap(),
            "block {}",
            i
        );

        // Frame events are sorted by (consensus timestamp, lamport timestamp, whitened
        // signature).
        let keys: Vec<_> = frame
            .events
            .iter()
            .map(|e| {
                (
                    e.consensus_timestamp().unwrap(),
                    e.lamport_timestamp().unwrap(),
                    e.signature.whitened(round_received),
                )
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "frame {} order", i + 1);
    }

    assert_eq!(store.get_block(BlockNumber::new(0)).unwrap().body.transactions.len(), 6);
    for i in 1..=4i64 {
        let block = store.get_block(BlockNumber::new(i)).unwrap();
        assert_eq!(block.body.transactions.len(), 4, "block {}", i);
    }

    // The commit channel delivered the same blocks, in index order.
    let committed = graph.drain_blocks();
    assert_eq!(committed.len(), 5);
    for (i, block) in committed.iter().enumerate() {
        assert_eq!(block.index().int(), i as i64);
    }
}

#[test]
fn internal_transactions_pin_the_next_peer_set() {
    let mut graph = build_dyn_graph();
    graph.run_consensus();

    // w22 (received in round 3, block 2) carries the PeerAdd of participant 3; processing block
    // 2 pins the resulting peer set for round 4.
    let store = graph.hashgraph.store();
    let block2 = store.get_block(BlockNumber::new(2)).unwrap();
    assert_eq!(block2.body.internal_transactions.len(), 1);
    match &block2.body.internal_transactions[0] {
        InternalTransaction::PeerAdd(peer) => assert_eq!(peer.pub_key, graph.nodes[3].pub_key),
        other => panic!("expected PeerAdd, got {:?}", other),
    }

    let pinned = store.get_peer_set(Round::new(4)).unwrap();
    assert_eq!(pinned.len(), 4);
    assert!(pinned.contains(&graph.nodes[3].pub_key));
}

#[test]
fn two_runs_produce_byte_identical_blocks() {
    let mut one = build_dyn_graph();
    let mut two = build_dyn_graph();
    one.run_consensus();
    two.run_consensus();

    for i in 0..=4i64 {
        let index = BlockNumber::new(i);
        let block_one = one.hashgraph.store().get_block(index).unwrap();
        let block_two = two.hashgraph.store().get_block(index).unwrap();
        assert_eq!(
            block_one.body.try_to_vec().unwrap(),
            block_two.body.try_to_vec().unwrap(),
            "block {}",
            i
        );
    }
    for round in 1..=5i64 {
        let frame_one = one.hashgraph.store().get_frame(Round::new(round)).unwrap();
        let frame_two = two.hashgraph.store().get_frame(Round::new(round)).unwrap();
        assert_eq!(
            frame_one.hash().unwrap(),
            frame_two.hash().unwrap(),
            "frame {}",
            round
        );
    }
}

#[test]
fn frames_are_not_served_for_undecided_rounds() {
    let mut graph = build_dyn_graph();
    graph.run_consensus();

    // Round 5 is decided and processed; rounds 6 and beyond are still open.
    assert!(graph.hashgraph.get_frame(Round::new(5)).is_ok());
    match graph.hashgraph.get_frame(Round::new(6)) {
        Err(hashgraph_rs::error::Error::RoundNotDecided(round)) => {
            assert_eq!(round, Round::new(6))
        }
        other => panic!("expected RoundNotDecided, got {:?}", other.err()),
    }
}

#[test]
fn block_round_received_is_strictly_increasing() {
    let mut graph = build_dyn_graph();
    graph.run_consensus();
    let blocks = graph.drain_blocks();
    for pair in blocks.windows(2) {
        assert!(pair[1].round_received() > pair[0].round_received());
        assert_eq!(pair[1].index().int(), pair[0].index().int() + 1);
    }
}
