/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The hashgraph itself: the event graph, its insertion pipeline, and the consensus phases that
//! derive a total order from it.
//!
//! ## Phases
//!
//! A driver (normally the [`Core`](crate::core::Core)) feeds events into
//! [`insert_event`](Hashgraph::insert_event) and then periodically invokes, in order:
//! 1. [`divide_rounds`](Hashgraph::divide_rounds) — assign rounds and Lamport timestamps, detect
//!    witnesses;
//! 2. [`decide_fame`](Hashgraph::decide_fame) — virtual voting on witness fame;
//! 3. [`decide_round_received`](Hashgraph::decide_round_received) — assign received rounds and
//!    consensus timestamps;
//! 4. [`process_decided_rounds`](Hashgraph::process_decided_rounds) — build frames, emit blocks
//!    on the commit channel;
//! 5. [`process_sig_pool`](Hashgraph::process_sig_pool) — attach block signatures that were
//!    waiting for their block.
//!
//! Each phase is idempotent and resumable: re-running a phase without new inputs changes
//! nothing, and an interrupted phase leaves the store in a state from which re-invocation
//! produces identical results.
//!
//! ## Concurrency
//!
//! The hashgraph is single-threaded cooperative with respect to its own state: ancestry
//! memoization, round tables, and block state are not safe for concurrent mutation. The only
//! blocking operations are store I/O and the commit-channel send; the latter applies
//! back-pressure, so a block is not produced until the previous one has been accepted.

mod ancestry;
mod block;
mod consensus;
mod frame;
mod rounds;
mod sig_pool;

pub use block::{Block, BlockBody};
pub use frame::Frame;
pub use rounds::{PendingRound, RoundCreated, RoundEvent, RoundReceived};
pub use sig_pool::SigPool;

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::SyncSender;

use crate::config::Configuration;
use crate::error::{Error, Item};
use crate::logging;
use crate::store::Store;
use crate::types::{
    basic::{CryptoHash, EventIndex, PubKeyBytes, Round},
    event::{Event, WireEvent},
    root::Root,
};

pub(crate) use ancestry::AncestorEntry;

/// The consensus core. Owns the store, the memoization caches, and the queues of events and
/// rounds whose consensus state is still being derived.
pub struct Hashgraph<S: Store> {
    store: S,
    config: Configuration,
    commit_tx: Option<SyncSender<Block>>,

    /// Inserted events that have not been assigned a received round yet, in topological order.
    undetermined_events: Vec<CryptoHash>,
    /// Rounds with witnesses whose fame is being decided, and whether they are decided.
    pending_rounds: BTreeMap<Round, PendingRound>,
    /// Number of inserted payload-carrying events that have not reached consensus.
    pending_loaded_events: i64,
    /// After a reset from a frame, rounds at or below this bound belong to the trusted snapshot
    /// and must not produce blocks again.
    round_lower_bound: Option<Round>,

    /// Out-of-order block signatures, held until the signed block exists.
    sig_pool: SigPool,

    // Memoization. Entries are only ever added (events are immutable once inserted), which
    // makes insertion-order population forward-safe; the caches are dropped wholesale on reset.
    last_ancestors_cache: HashMap<CryptoHash, BTreeMap<PubKeyBytes, AncestorEntry>>,
    strongly_see_cache: HashMap<(CryptoHash, CryptoHash, CryptoHash), bool>,
    round_cache: HashMap<CryptoHash, Round>,
}

impl<S: Store> Hashgraph<S> {
    /// Create a hashgraph over `store`. Blocks are delivered on `commit_tx` in strictly
    /// increasing index order; the channel's bound provides the back-pressure required of the
    /// driver.
    pub fn new(store: S, commit_tx: Option<SyncSender<Block>>, config: Configuration) -> Self {
        let cache_size = config.cache_size;
        Hashgraph {
            store,
            config,
            commit_tx,
            undetermined_events: Vec::new(),
            pending_rounds: BTreeMap::new(),
            pending_loaded_events: 0,
            round_lower_bound: None,
            sig_pool: SigPool::new(),
            last_ancestors_cache: HashMap::with_capacity(cache_size),
            strongly_see_cache: HashMap::with_capacity(cache_size),
            round_cache: HashMap::with_capacity(cache_size),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Number of inserted payload-carrying events that have not reached consensus yet.
    pub fn pending_loaded_events(&self) -> i64 {
        self.pending_loaded_events
    }

    /// Queue a block signature for [`process_sig_pool`](Self::process_sig_pool).
    pub fn add_pending_signature(&mut self, signature: crate::types::transactions::BlockSignature) {
        self.sig_pool.add(signature);
    }

    /* ↓↓↓ Insertion ↓↓↓ */

    /// Validate `event` and link it into the graph.
    ///
    /// Validation order: signature, creator membership in the repertoire, self-parent,
    /// other-parent. Membership of the creator in the peer set of the event's round is *not*
    /// checked here — it is enforced lazily, when the round is computed, because the round is
    /// not known at insertion time.
    ///
    /// Re-inserting an event that is already in the store is a no-op; inserting a *different*
    /// event at an occupied `(creator, index)` slot fails with
    /// [`Equivocation`](Error::Equivocation) and the event is not admitted.
    pub fn insert_event(&mut self, event: Event) -> Result<(), Error> {
        let hash = event.hash()?;
        if self.store.get_event(&hash).is_ok() {
            return Ok(());
        }

        if !event.verify()? {
            return Err(Error::BadSignature);
        }

        let creator = *event.creator();
        let root = self
            .store
            .get_root(&creator)
            .map_err(|_| Error::UnknownCreator(creator))?;

        // Self-parent: the creator's previous event, or its root.
        let self_parent = *event.self_parent();
        let expected_index = if self_parent == root.self_parent.hash {
            root.self_parent.index + 1
        } else {
            match self.store.get_event(&self_parent) {
                Ok(parent) => {
                    if parent.creator() != &creator {
                        return Err(Error::SelfParentMismatch {
                            creator,
                            index: event.index(),
                        });
                    }
                    parent.index() + 1
                }
                Err(e) if e.is_not_found() => return Err(Error::UnknownParent(self_parent)),
                Err(e) => return Err(e),
            }
        };
        if self.store.participant_event(&creator, event.index()).is_ok() {
            return Err(Error::Equivocation {
                creator,
                index: event.index(),
            });
        }
        if event.index() != expected_index {
            return Err(Error::SelfParentMismatch {
                creator,
                index: event.index(),
            });
        }

        // Other-parent: a known event, or an event the creator's root describes.
        if let Some(other_parent) = event.other_parent() {
            if self.store.get_event(other_parent).is_err() {
                match root.others.get(&hash) {
                    Some(described) if described.hash == *other_parent => {}
                    _ => return Err(Error::UnknownParent(*other_parent)),
                }
            }
        }

        let loaded = event.is_loaded();
        let block_signatures = event.body.block_signatures.clone();
        self.store.set_event(event)?;
        self.undetermined_events.push(hash);
        if loaded {
            self.pending_loaded_events += 1;
        }
        for signature in block_signatures {
            self.sig_pool.add(signature);
        }

        log::debug!(
            "{}, {}, {}",
            logging::INSERT_EVENT,
            logging::short_hash(&creator),
            hash,
        );
        Ok(())
    }

    /* ↓↓↓ Wire form ↓↓↓ */

    /// Resolve a [`WireEvent`]'s `(creator id, index)` parent references against the store and
    /// return the full event, ready for [`insert_event`](Self::insert_event).
    pub fn read_wire_event(&self, wire: WireEvent) -> Result<Event, Error> {
        let repertoire = self.store.repertoire_by_id();
        let creator = repertoire
            .get(&wire.creator_id)
            .ok_or(Error::NotFound(Item::PeerById(wire.creator_id)))?
            .clone();
        let root = self.store.get_root(&creator.pub_key)?;

        let self_parent = if wire.self_parent_index == root.self_parent.index {
            root.self_parent.hash
        } else {
            self.store
                .participant_event(&creator.pub_key, wire.self_parent_index)?
        };

        let other_parent = match wire.other_parent_creator_id {
            None => None,
            Some(other_creator_id) => {
                let other_creator = repertoire
                    .get(&other_creator_id)
                    .ok_or(Error::NotFound(Item::PeerById(other_creator_id)))?;
                match self
                    .store
                    .participant_event(&other_creator.pub_key, wire.other_parent_index)
                {
                    Ok(hash) => Some(hash),
                    Err(e) if e.is_not_found() => {
                        // The referenced event may have fallen below a reset horizon; the
                        // creator's root then describes it.
                        let described = root.others.values().find(|re| {
                            re.creator_id == other_creator_id && re.index == wire.other_parent_index
                        });
                        match described {
                            Some(re) => Some(re.hash),
                            None => return Err(e),
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let mut event = Event::new(
            wire.transactions,
            wire.internal_transactions,
            wire.block_signatures,
            self_parent,
            other_parent,
            creator.pub_key,
            wire.index,
            wire.timestamp,
        );
        event.signature = wire.signature;
        Ok(event)
    }

    /// Convert a stored event into its wire form.
    pub fn to_wire_event(&self, event: &Event) -> Result<WireEvent, Error> {
        let hash = event.hash()?;
        let repertoire = self.store.repertoire_by_pub_key();
        let creator = repertoire
            .get(event.creator())
            .ok_or(Error::UnknownCreator(*event.creator()))?;
        let root = self.store.get_root(event.creator())?;

        let other = match event.other_parent() {
            None => None,
            Some(other_parent) => match self.store.get_event(other_parent) {
                Ok(parent) => {
                    let other_creator = repertoire
                        .get(parent.creator())
                        .ok_or(Error::UnknownCreator(*parent.creator()))?;
                    Some((other_creator.id, parent.index()))
                }
                Err(e) if e.is_not_found() => match root.others.get(&hash) {
                    Some(re) => Some((re.creator_id, re.index)),
                    None => return Err(Error::UnknownParent(*other_parent)),
                },
                Err(e) => return Err(e),
            },
        };

        Ok(WireEvent {
            transactions: event.body.transactions.clone(),
            internal_transactions: event.body.internal_transactions.clone(),
            block_signatures: event.body.block_signatures.clone(),
            creator_id: creator.id,
            index: event.index(),
            self_parent_index: EventIndex::new(event.index().int() - 1),
            other_parent_creator_id: other.map(|(id, _)| id),
            other_parent_index: other.map(|(_, i)| i).unwrap_or(EventIndex::new(-1)),
            timestamp: event.timestamp(),
            signature: event.signature,
        })
    }

    /* ↓↓↓ Reset / fast-forward ↓↓↓ */

    /// Rebuild the node's state from a trusted `block` and the `frame` it commits to.
    ///
    /// Refuses to mutate any state unless the block carries a super-majority of valid
    /// signatures from the frame's peer set and the frame's recomputed hashes match the ones
    /// committed in the block.
    pub fn reset(&mut self, block: Block, frame: Frame) -> Result<(), Error> {
        use crate::types::transactions::BlockSignature;

        let mut valid = 0;
        for (pub_key, signature) in &block.signatures {
            if !frame.peers.contains(pub_key) {
                continue;
            }
            let block_signature = BlockSignature {
                validator: *pub_key,
                index: block.index(),
                signature: *signature,
            };
            if block.verify_signature(&block_signature)? {
                valid += 1;
            }
        }
        let need = frame.peers.super_majority();
        if valid < need {
            return Err(Error::InsufficientSignatures { got: valid, need });
        }

        if frame.hash()? != block.body.frame_hash || frame.peers.hash()? != block.body.peers_hash {
            return Err(Error::FrameHashMismatch);
        }

        self.store.reset(&frame)?;
        self.store.set_frame(frame.clone())?;
        self.store.set_block(block)?;

        self.undetermined_events.clear();
        self.pending_rounds.clear();
        self.pending_loaded_events = 0;
        self.last_ancestors_cache.clear();
        self.strongly_see_cache.clear();
        self.round_cache.clear();
        self.round_lower_bound = Some(frame.round);

        // Replay the frame's events. Lamport order puts every parent before its children, and
        // the coordinates are recomputed, which reproduces the frame's values exactly.
        let mut events = frame.events.clone();
        events.sort_by_key(|e| {
            (
                e.lamport_timestamp().map(|l| l.int()).unwrap_or(-1),
                *e.creator(),
                e.index(),
            )
        });
        for mut event in events {
            event.clear_coordinates();
            self.insert_event(event)?;
        }

        log::info!("{}, {}", logging::RESET, frame.round);
        Ok(())
    }

    /* ↓↓↓ Shared helpers ↓↓↓ */

    pub(crate) fn creator_root(&self, creator: &PubKeyBytes) -> Result<Root, Error> {
        self.store.get_root(creator)
    }
}
