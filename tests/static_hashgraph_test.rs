//! Consensus over a static 3-participant graph: round division, witness detection, Lamport
//! timestamps, fame of the round-0 witnesses, and the insertion failure modes.

mod common;

use common::{build_static_prefix, new_nodes, Graph};
use rand_core::OsRng;

use hashgraph_rs::error::Error;
use hashgraph_rs::store::Store;
use hashgraph_rs::types::basic::{CryptoHash, EventIndex, Round, Timestamp, Trilean};
use hashgraph_rs::types::crypto_primitives::{Keypair, SigningKey};
use hashgraph_rs::types::event::Event;

fn static_graph() -> Graph {
    let mut graph = Graph::new(new_nodes(3), 3);
    build_static_prefix(&mut graph);
    graph
}

#[test]
fn divide_rounds_assigns_rounds_and_lamport_timestamps() {
    let mut graph = static_graph();
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
    ];
    for (name, lamport, round) in expected {
        assert_eq!(graph.lamport_of(name), lamport, "{} lamport", name);
        assert_eq!(graph.round_of(name), round, "{} round", name);
    }

    let expected_witnesses = [
        (0, vec!["w00", "w01", "w02"]),
        (1, vec!["w10", "w11", "w12"]),
        (2, vec!["w20", "w21", "w22"]),
    ];
    for (round, expected) in expected_witnesses {
        let mut witnesses = graph.witnesses_of(round);
        witnesses.sort();
        let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(witnesses, expected, "round {} witnesses", round);
    }

    assert_eq!(graph.hashgraph.store().round_events_count(Round::new(0)), 6);
    assert_eq!(graph.hashgraph.store().round_events_count(Round::new(1)), 4);
    assert_eq!(graph.hashgraph.store().round_events_count(Round::new(2)), 4);
    assert_eq!(graph.hashgraph.store().last_round(), Round::new(2));
}

#[test]
fn decide_fame_decides_round_zero() {
    let mut graph = static_graph();
    graph.hashgraph.divide_rounds().unwrap();
    graph.hashgraph.decide_fame().unwrap();

    let round0 = graph
        .hashgraph
        .store()
        .get_round_created(Round::new(0))
        .unwrap();
    for name in ["w00", "w01", "w02"] {
        let event = &round0.events[&graph.hash_of(name)];
        assert!(event.witness, "{} should be a witness", name);
        assert_eq!(event.famous, Trilean::True, "{} should be famous", name);
    }
    for name in ["e10", "e21", "e12"] {
        let event = &round0.events[&graph.hash_of(name)];
        assert!(!event.witness, "{} should not be a witness", name);
        assert_eq!(event.famous, Trilean::Undefined);
    }
    assert!(round0.witnesses_decided());

    // Rounds 1 and 2 cannot be decided without witnesses two rounds above them.
    for round in [1, 2] {
        let round_created = graph
            .hashgraph
            .store()
            .get_round_created(Round::new(round))
            .unwrap();
        assert!(
            !round_created.witnesses_decided(),
            "round {} should be undecided",
            round
        );
    }
}

#[test]
fn no_events_are_received_while_the_receiving_round_is_undecided() {
    let mut graph = static_graph();
    graph.run_consensus();

    // Round 1 is undecided, so nothing can be received in it, and no block can be produced.
    assert_eq!(graph.hashgraph.store().consensus_events_count(), 0);
    assert_eq!(graph.hashgraph.store().last_block_index().int(), -1);
    assert_eq!(graph.hashgraph.pending_loaded_events(), 14);
    assert!(graph.drain_blocks().is_empty());
}

#[test]
fn consensus_phases_are_idempotent() {
    let mut graph = static_graph();
    graph.run_consensus();

    let rounds_before: Vec<_> = (0..=2)
        .map(|r| {
            graph
                .hashgraph
                .store()
                .get_round_created(Round::new(r))
                .unwrap()
                .events
        })
        .collect();
    let consensus_before = graph.hashgraph.store().consensus_events_count();

    graph.run_consensus();
    graph.run_consensus();

    let rounds_after: Vec<_> = (0..=2)
        .map(|r| {
            graph
                .hashgraph
                .store()
                .get_round_created(Round::new(r))
                .unwrap()
                .events
        })
        .collect();
    assert_eq!(rounds_before, rounds_after);
    assert_eq!(
        graph.hashgraph.store().consensus_events_count(),
        consensus_before
    );
    assert!(graph.drain_blocks().is_empty());
}

#[test]
fn known_events_tracks_the_last_index_of_every_participant() {
    let graph = static_graph();
    let known = graph.hashgraph.store().known_events();
    assert_eq!(known.len(), 3);
    assert_eq!(known[&graph.nodes[0].peer.id], EventIndex::new(3));
    assert_eq!(known[&graph.nodes[1].peer.id], EventIndex::new(4));
    assert_eq!(known[&graph.nodes[2].peer.id], EventIndex::new(4));
}

#[test]
fn equivocation_is_rejected() {
    let mut graph = static_graph();

    // A second, different event by participant 0 claiming the occupied index 3.
    let equivocation = graph.build_event(0, 3, "w10", "e21", "w20-equivocation", vec![]);
    match graph.hashgraph.insert_event(equivocation) {
        Err(Error::Equivocation { index, .. }) => assert_eq!(index, EventIndex::new(3)),
        other => panic!("expected Equivocation, got {:?}", other.err()),
    }

    // Re-inserting the original event unchanged is a no-op, not an equivocation.
    let original = graph.event_of("w20");
    let mut clean = original.clone();
    clean.clear_coordinates();
    assert!(graph.hashgraph.insert_event(clean).is_ok());
}

#[test]
fn bad_signatures_are_rejected() {
    let mut graph = static_graph();
    let mut event = graph.build_event(0, 4, "w20", "g21", "tampered", vec![]);
    // Tamper with the payload after signing.
    event.body.transactions[0] = b"changed".to_vec();
    match graph.hashgraph.insert_event(event) {
        Err(Error::BadSignature) => {}
        other => panic!("expected BadSignature, got {:?}", other.err()),
    }
}

#[test]
fn unknown_parents_and_creators_are_rejected() {
    let mut graph = static_graph();

    let orphan = {
        let creator = &graph.nodes[0];
        let mut event = Event::new(
            vec![b"orphan".to_vec()],
            vec![],
            vec![],
            CryptoHash::new([0xEE; 32]),
            None,
            creator.pub_key,
            EventIndex::new(4),
            Timestamp::new(99),
        );
        event.sign(&creator.keypair).unwrap();
        event
    };
    match graph.hashgraph.insert_event(orphan) {
        Err(Error::UnknownParent(_)) => {}
        other => panic!("expected UnknownParent, got {:?}", other.err()),
    }

    let mut csprng = OsRng;
    let stranger = Keypair::new(SigningKey::generate(&mut csprng));
    let foreign = {
        let mut event = Event::new(
            vec![b"foreign".to_vec()],
            vec![],
            vec![],
            CryptoHash::new([0xEE; 32]),
            None,
            stranger.public_bytes(),
            EventIndex::new(0),
            Timestamp::new(99),
        );
        event.sign(&stranger).unwrap();
        event
    };
    match graph.hashgraph.insert_event(foreign) {
        Err(Error::UnknownCreator(_)) => {}
        other => panic!("expected UnknownCreator, got {:?}", other.err()),
    }
}

#[test]
fn self_parent_must_belong_to_the_creator() {
    let mut graph = static_graph();
    // Participant 0 claiming participant 1's w21 as its self-parent.
    let event = graph.build_event(0, 4, "w21", "g21", "bad-self-parent", vec![]);
    match graph.hashgraph.insert_event(event) {
        Err(Error::SelfParentMismatch { .. }) => {}
        other => panic!("expected SelfParentMismatch, got {:?}", other.err()),
    }
}

#[test]
fn wire_events_round_trip_through_the_store() {
    let mut graph = static_graph();
    graph.hashgraph.divide_rounds().unwrap();

    for name in ["w00", "e21", "f10", "g21"] {
        let event = graph.event_of(name);
        let wire = graph.hashgraph.to_wire_event(&event).unwrap();
        let resolved = graph.hashgraph.read_wire_event(wire).unwrap();
        assert_eq!(resolved.hash().unwrap(), event.hash().unwrap(), "{}", name);
        assert!(resolved.verify().unwrap(), "{}", name);
    }
}
