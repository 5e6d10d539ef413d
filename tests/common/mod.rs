//! Shared harness for the consensus test suite: deterministic test nodes, a table-driven event
//! scripter for building graphs, and helpers for reading consensus state back out of the store.
//!
//! Keys and timestamps are fully deterministic (fixed key seeds, a timestamp counter that
//! advances once per created event), so building the same graph twice yields byte-identical
//! events, and with them byte-identical blocks.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver};

use hashgraph_rs::config::Configuration;
use hashgraph_rs::hashgraph::{Block, Hashgraph};
use hashgraph_rs::store::{InmemStore, Store};
use hashgraph_rs::types::basic::{CryptoHash, EventIndex, PubKeyBytes, Round, Timestamp};
use hashgraph_rs::types::crypto_primitives::{Keypair, SigningKey};
use hashgraph_rs::types::event::Event;
use hashgraph_rs::types::peer_set::{Peer, PeerSet};
use hashgraph_rs::types::transactions::InternalTransaction;

pub struct TestNode {
    pub keypair: Keypair,
    pub pub_key: PubKeyBytes,
    pub peer: Peer,
}

impl TestNode {
    fn new(seed: u8, name: &str) -> TestNode {
        let keypair = Keypair::new(SigningKey::from_bytes(&[seed; 32]));
        let pub_key = keypair.public_bytes();
        let peer = Peer::new(pub_key, name.to_string());
        TestNode {
            keypair,
            pub_key,
            peer,
        }
    }
}

pub fn new_nodes(n: usize) -> Vec<TestNode> {
    (0..n)
        .map(|i| TestNode::new(10 + i as u8, &format!("node{}", i)))
        .collect()
}

pub struct Graph {
    pub nodes: Vec<TestNode>,
    pub hashgraph: Hashgraph<InmemStore>,
    /// name -> event hash, like the index of the original test tables.
    pub index: HashMap<String, CryptoHash>,
    /// Events in insertion order, as created (clean of consensus coordinates).
    pub order: Vec<(String, Event)>,
    pub commits: Receiver<Block>,
    next_timestamp: i64,
}

impl Graph {
    /// A graph over `nodes`, with the first `genesis` of them forming the round-0 peer set.
    pub fn new(nodes: Vec<TestNode>, genesis: usize) -> Graph {
        let peer_set = PeerSet::new(nodes[..genesis].iter().map(|n| n.peer.clone()).collect());
        let store = InmemStore::new(peer_set).expect("store init");
        let (commit_tx, commits) = sync_channel(64);
        let hashgraph = Hashgraph::new(store, Some(commit_tx), Configuration::default());
        Graph {
            nodes,
            hashgraph,
            index: HashMap::new(),
            order: Vec::new(),
            commits,
            next_timestamp: 0,
        }
    }

    pub fn genesis_peer_set(&self) -> PeerSet {
        self.hashgraph
            .store()
            .get_peer_set(Round::new(0))
            .expect("genesis peer set")
    }

    /// Resolve a parent reference: an event name from the index, or "R<i>" for node i's root.
    fn resolve(&self, reference: &str) -> CryptoHash {
        if let Some(hash) = self.index.get(reference) {
            return *hash;
        }
        if let Some(stripped) = reference.strip_prefix('R') {
            let node: usize = stripped.parse().expect("root reference");
            let root = self
                .hashgraph
                .store()
                .get_root(&self.nodes[node].pub_key)
                .expect("root");
            return root.self_parent.hash;
        }
        panic!("unknown event reference {}", reference);
    }

    /// Create, sign, and insert one event, following the original's play tables: the payload is
    /// the event's name.
    pub fn play(&mut self, node: usize, index: i64, self_parent: &str, other_parent: &str, name: &str) {
        self.play_with(node, index, self_parent, other_parent, name, vec![]);
    }

    pub fn play_with(
        &mut self,
        node: usize,
        index: i64,
        self_parent: &str,
        other_parent: &str,
        name: &str,
        internal_transactions: Vec<InternalTransaction>,
    ) {
        let event = self.build_event(node, index, self_parent, other_parent, name, internal_transactions);
        self.hashgraph
            .insert_event(event)
            .unwrap_or_else(|e| panic!("inserting {}: {}", name, e));
    }

    /// Create and sign an event without inserting it.
    pub fn build_event(
        &mut self,
        node: usize,
        index: i64,
        self_parent: &str,
        other_parent: &str,
        name: &str,
        internal_transactions: Vec<InternalTransaction>,
    ) -> Event {
        let self_parent = self.resolve(self_parent);
        let other_parent = if other_parent.is_empty() {
            None
        } else {
            Some(self.resolve(other_parent))
        };
        let creator = &self.nodes[node];
        let mut event = Event::new(
            vec![name.as_bytes().to_vec()],
            internal_transactions,
            vec![],
            self_parent,
            other_parent,
            creator.pub_key,
            EventIndex::new(index),
            Timestamp::new(self.next_timestamp),
        );
        self.next_timestamp += 1;
        event.sign(&creator.keypair).expect("sign");
        let hash = event.hash().expect("hash");
        self.index.insert(name.to_string(), hash);
        self.order.push((name.to_string(), event.clone()));
        event
    }

    pub fn hash_of(&self, name: &str) -> CryptoHash {
        self.index[name]
    }

    pub fn event_of(&self, name: &str) -> Event {
        self.hashgraph
            .store()
            .get_event(&self.index[name])
            .unwrap_or_else(|e| panic!("event {}: {}", name, e))
    }

    pub fn round_of(&self, name: &str) -> i64 {
        self.event_of(name)
            .round()
            .unwrap_or_else(|| panic!("{} has no round", name))
            .int()
    }

    pub fn lamport_of(&self, name: &str) -> i64 {
        self.event_of(name)
            .lamport_timestamp()
            .unwrap_or_else(|| panic!("{} has no lamport timestamp", name))
            .int()
    }

    /// The names of `round`'s witnesses, resolved back through the index.
    pub fn witnesses_of(&self, round: i64) -> Vec<String> {
        let witnesses = self.hashgraph.store().round_witnesses(Round::new(round));
        witnesses.iter().map(|h| self.name_of(h)).collect()
    }

    pub fn name_of(&self, hash: &CryptoHash) -> String {
        self.index
            .iter()
            .find(|(_, h)| *h == hash)
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| format!("{}", hash))
    }

    pub fn run_consensus(&mut self) {
        self.hashgraph.divide_rounds().expect("divide_rounds");
        self.hashgraph.decide_fame().expect("decide_fame");
        self.hashgraph
            .decide_round_received()
            .expect("decide_round_received");
        self.hashgraph
            .process_decided_rounds()
            .expect("process_decided_rounds");
        self.hashgraph.process_sig_pool().expect("process_sig_pool");
    }

    pub fn drain_blocks(&mut self) -> Vec<Block> {
        let mut blocks = Vec::new();
        while let Ok(block) = self.commits.try_recv() {
            blocks.push(block);
        }
        blocks
    }
}

/// The static 3-participant prefix of the reference graph: rounds 0 through 2, events w00
/// through g21.
///
/// ```text
/// Round 2     |    |    | /  |
///             |    |   g21   |
///             |    | /  |
///             |   w21   |
///             | /  |    |
///            w20   |    |
///             |  \ |    |
///             |    | \  |
///             |    |   w22
///          -----------/------
/// Round 1     |   f10   |
///             | /  |    |
///            w10   |    |
///             |  \ |    |
///             |    | \  |
///             |    |   w12
///             |    |  / |
///             |   w11   |
///          -----/------------
/// Round 0    e12   |    |
///             |  \ |    |
///             |    | \  |
///             |    |   e21
///             |    | /  |
///             |   e10   |
///             |  / |    |
///            w00  w01  w02
///             |    |    |
///             R0   R1   R2
/// ```
pub fn build_static_prefix(graph: &mut Graph) {
    graph.play(0, 0, "R0", "", "w00");
    graph.play(1, 0, "R1", "", "w01");
    graph.play(2, 0, "R2", "", "w02");
    graph.play(1, 1, "w01", "w00", "e10");
    graph.play(2, 1, "w02", "e10", "e21");
    graph.play(0, 1, "w00", "e21", "e12");
    graph.play(1, 2, "e10", "e12", "w11");
    graph.play(2, 2, "e21", "w11", "w12");
    graph.play(0, 2, "e12", "w12", "w10");
    graph.play(1, 3, "w11", "w10", "f10");
    graph.play(2, 3, "w12", "f10", "w22");
    graph.play(0, 3, "w10", "w22", "w20");
    graph.play(1, 4, "f10", "w20", "w21");
    graph.play(2, 4, "w22", "w21", "g21");
}

/// The full reference graph with dynamic membership: participant 3 joins at the round-2
/// boundary, participant 0 leaves at the round-5 boundary, and events continue up to the
/// round-7 witness w71.
///
/// The event carrying `w22`'s payload also carries the internal transaction that adds
/// participant 3, so the membership change both takes the manual-pin path (required for the
/// rounds *between* the pin and the transaction reaching consensus) and flows through a decided
/// block.
pub fn build_dyn_graph() -> Graph {
    let nodes = new_nodes(4);
    let peer3 = nodes[3].peer.clone();
    let pub_key0 = nodes[0].pub_key;
    let mut graph = Graph::new(nodes, 3);

    graph.play(0, 0, "R0", "", "w00");
    graph.play(1, 0, "R1", "", "w01");
    graph.play(2, 0, "R2", "", "w02");
    graph.play(1, 1, "w01", "w00", "e10");
    graph.play(2, 1, "w02", "e10", "e21");
    graph.play(0, 1, "w00", "e21", "e12");
    graph.play(1, 2, "e10", "e12", "w11");
    graph.play(2, 2, "e21", "w11", "w12");
    graph.play(0, 2, "e12", "w12", "w10");
    graph.play(1, 3, "w11", "w10", "f10");
    graph.play_with(
        2,
        3,
        "w12",
        "f10",
        "w22",
        vec![InternalTransaction::PeerAdd(peer3.clone())],
    );
    graph.play(0, 3, "w10", "w22", "w20");
    graph.play(1, 4, "f10", "w20", "w21");
    graph.play(2, 4, "w22", "w21", "g21");

    // Participant 3 joins; its peer set governs rounds 2 and up.
    let with_peer3 = graph.genesis_peer_set().with_new_peer(peer3);
    graph
        .hashgraph
        .store_mut()
        .set_peer_set(Round::new(2), with_peer3.clone())
        .expect("pin round-2 peer set");

    graph.play(3, 0, "R3", "g21", "w33");
    graph.play(0, 4, "w20", "w33", "w30");
    graph.play(1, 5, "w21", "w30", "w31");
    graph.play(2, 5, "g21", "w31", "w32");
    graph.play(3, 1, "w33", "w32", "w43");
    graph.play(0, 5, "w30", "w43", "w40");
    graph.play(1, 6, "w31", "w40", "w41");
    graph.play(2, 6, "w32", "w41", "w42");

    // Participant 0 leaves; the reduced peer set governs rounds 5 and up.
    let without_peer0 = with_peer3.with_removed_peer(&pub_key0);
    graph
        .hashgraph
        .store_mut()
        .set_peer_set(Round::new(5), without_peer0)
        .expect("pin round-5 peer set");

    graph.play(3, 2, "w43", "w42", "w53");
    graph.play(2, 7, "w42", "w53", "w52");
    graph.play(1, 7, "w41", "w52", "w51");
    graph.play(3, 3, "w53", "w51", "j31");
    graph.play(2, 8, "w52", "j31", "w62");
    graph.play(1, 8, "w51", "w62", "w61");
    graph.play(3, 4, "j31", "w61", "w63");
    graph.play(2, 9, "w62", "w63", "h23");
    graph.play(1, 9, "w61", "h23", "w71");

    graph
}
