/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The driver that sits between the transport layer and the [`Hashgraph`]: it tracks the node's
//! own head of the graph, buffers the payloads waiting to be gossiped out, creates and signs the
//! node's own events, and runs the consensus phases in order.
//!
//! The core is single-threaded cooperative: one loop (owned by the embedding node) feeds it
//! synced events and invokes [`run_consensus`](Core::run_consensus). The transaction,
//! internal-transaction, and block-signature pools are plain vectors appended under that same
//! single-writer discipline.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Configuration;
use crate::error::Error;
use crate::hashgraph::{Block, Frame, Hashgraph};
use crate::logging;
use crate::store::Store;
use crate::types::{
    basic::{CryptoHash, EventIndex, PeerId, Timestamp},
    crypto_primitives::Keypair,
    event::{Event, WireEvent},
    transactions::{BlockSignature, InternalTransaction},
};

pub struct Core<S: Store> {
    id: PeerId,
    keypair: Keypair,
    hashgraph: Hashgraph<S>,

    /// Hash of this node's latest own event (or its root's self-parent hash).
    head: CryptoHash,
    /// Index of this node's latest own event; -1 before the first.
    seq: EventIndex,

    transaction_pool: Vec<Vec<u8>>,
    internal_transaction_pool: Vec<InternalTransaction>,
    /// This node's own block signatures, waiting to ride out on the next self event.
    block_signature_pool: Vec<BlockSignature>,
}

impl<S: Store> Core<S> {
    /// Create a core for the participant holding `keypair`. The store must already know the
    /// participant (it must be in the repertoire of some pinned peer set).
    pub fn new(
        keypair: Keypair,
        store: S,
        commit_tx: Option<std::sync::mpsc::SyncSender<Block>>,
        config: Configuration,
    ) -> Result<Core<S>, Error> {
        let pub_key = keypair.public_bytes();
        let id = store
            .repertoire_by_pub_key()
            .get(&pub_key)
            .map(|peer| peer.id)
            .ok_or(Error::UnknownCreator(pub_key))?;
        let hashgraph = Hashgraph::new(store, commit_tx, config);
        let mut core = Core {
            id,
            keypair,
            hashgraph,
            head: CryptoHash::default(),
            seq: EventIndex::new(-1),
            transaction_pool: Vec::new(),
            internal_transaction_pool: Vec::new(),
            block_signature_pool: Vec::new(),
        };
        core.set_head_and_seq()?;
        if core.hashgraph.store().need_bootstrap() {
            core.run_consensus()?;
        }
        Ok(core)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn head(&self) -> CryptoHash {
        self.head
    }

    pub fn seq(&self) -> EventIndex {
        self.seq
    }

    pub fn hashgraph(&self) -> &Hashgraph<S> {
        &self.hashgraph
    }

    pub fn hashgraph_mut(&mut self) -> &mut Hashgraph<S> {
        &mut self.hashgraph
    }

    /// Re-derive `head` and `seq` from the store. Called at startup and after a fast-forward.
    pub fn set_head_and_seq(&mut self) -> Result<(), Error> {
        let pub_key = self.keypair.public_bytes();
        let (last, is_root) = self.hashgraph.store().last_event_from(&pub_key)?;
        if is_root {
            let root = self.hashgraph.store().get_root(&pub_key)?;
            self.head = root.self_parent.hash;
            self.seq = root.self_parent.index;
        } else {
            let last_event = self.hashgraph.store().get_event(&last)?;
            self.head = last;
            self.seq = last_event.index();
        }
        Ok(())
    }

    /* ↓↓↓ Pools ↓↓↓ */

    pub fn add_transactions(&mut self, transactions: Vec<Vec<u8>>) {
        self.transaction_pool.extend(transactions);
    }

    pub fn add_internal_transaction(&mut self, transaction: InternalTransaction) {
        self.internal_transaction_pool.push(transaction);
    }

    /// Sign `block` with this node's key, queueing the signature for the next self event and
    /// for the local signature pool.
    pub fn sign_block(&mut self, block: &Block) -> Result<BlockSignature, Error> {
        let signature = block.sign(&self.keypair)?;
        self.block_signature_pool.push(signature.clone());
        self.hashgraph.add_pending_signature(signature.clone());
        Ok(signature)
    }

    /* ↓↓↓ Event creation and ingestion ↓↓↓ */

    /// Create, sign, and insert this node's next event, carrying everything waiting in the
    /// pools and referencing `other_parent` (the head learned from the last sync; `None` only
    /// on the node's first-ever event).
    pub fn add_self_event(&mut self, other_parent: Option<CryptoHash>) -> Result<CryptoHash, Error> {
        let mut event = Event::new(
            std::mem::take(&mut self.transaction_pool),
            std::mem::take(&mut self.internal_transaction_pool),
            std::mem::take(&mut self.block_signature_pool),
            self.head,
            other_parent,
            self.keypair.public_bytes(),
            self.seq + 1,
            system_timestamp(),
        );
        event.sign(&self.keypair)?;
        let hash = event.hash()?;
        self.hashgraph.insert_event(event)?;
        self.head = hash;
        self.seq = self.seq + 1;
        Ok(hash)
    }

    /// Insert an event received from another participant via sync.
    pub fn insert_event(&mut self, event: Event) -> Result<(), Error> {
        self.hashgraph.insert_event(event)
    }

    /// Resolve and insert a wire-form event received via sync.
    pub fn insert_wire_event(&mut self, wire: WireEvent) -> Result<(), Error> {
        let event = self.hashgraph.read_wire_event(wire)?;
        self.hashgraph.insert_event(event)
    }

    /* ↓↓↓ Consensus ↓↓↓ */

    /// Run the consensus phases in order. Each phase is idempotent, so the driver may call this
    /// as often as it likes.
    pub fn run_consensus(&mut self) -> Result<(), Error> {
        self.hashgraph.divide_rounds()?;
        self.hashgraph.decide_fame()?;
        self.hashgraph.decide_round_received()?;
        self.hashgraph.process_decided_rounds()?;
        self.hashgraph.process_sig_pool()?;
        Ok(())
    }

    /// Bootstrap this node from a trusted `block` and its `frame`, discarding all state below
    /// the frame, then catch up on anything already decidable.
    pub fn fast_forward(&mut self, block: Block, frame: Frame) -> Result<(), Error> {
        self.hashgraph.reset(block, frame)?;
        self.set_head_and_seq()?;
        self.run_consensus()?;
        log::info!("{}, {}", logging::FAST_FORWARD, self.seq);
        Ok(())
    }
}

fn system_timestamp() -> Timestamp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Timestamp::new(nanos)
}
