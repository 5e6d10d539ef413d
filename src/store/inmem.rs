/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A volatile, in-memory implementation of [`Store`].
//!
//! Every map in this store that influences hashing or block contents is a `BTreeMap`, so that
//! iteration order is a function of content alone and two stores fed the same events derive the
//! same blocks. Participant chains are keyed by event index rather than position: after a reset,
//! a participant's first stored event sits at the index just above its root, not at 0.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Item};
use crate::hashgraph::{Block, Frame, RoundCreated, RoundReceived};
use crate::types::{
    basic::{BlockNumber, CryptoHash, EventIndex, PeerId, PubKeyBytes, Round, TopologicalIndex},
    event::Event,
    peer_set::{floor_peer_set, Peer, PeerSet},
    root::Root,
};

use super::Store;

#[derive(Clone)]
pub struct InmemStore {
    events: HashMap<CryptoHash, Event>,
    /// Per-participant event hashes, keyed by event index.
    participant_events: BTreeMap<PubKeyBytes, BTreeMap<i64, CryptoHash>>,
    rounds_created: BTreeMap<Round, RoundCreated>,
    rounds_received: BTreeMap<Round, RoundReceived>,
    blocks: BTreeMap<BlockNumber, Block>,
    frames: BTreeMap<Round, Frame>,
    peer_sets: BTreeMap<Round, PeerSet>,
    repertoire: BTreeMap<PubKeyBytes, Peer>,
    roots: BTreeMap<PubKeyBytes, Root>,
    consensus_events: Vec<CryptoHash>,
    topological_counter: u64,
}

impl InmemStore {
    /// Create a store for a graph starting from `peer_set`, pinned at round 0. Every peer
    /// receives a base root.
    pub fn new(peer_set: PeerSet) -> Result<InmemStore, Error> {
        let mut store = InmemStore {
            events: HashMap::new(),
            participant_events: BTreeMap::new(),
            rounds_created: BTreeMap::new(),
            rounds_received: BTreeMap::new(),
            blocks: BTreeMap::new(),
            frames: BTreeMap::new(),
            peer_sets: BTreeMap::new(),
            repertoire: BTreeMap::new(),
            roots: BTreeMap::new(),
            consensus_events: Vec::new(),
            topological_counter: 0,
        };
        store.set_peer_set(Round::new(0), peer_set)?;
        Ok(store)
    }
}

impl Store for InmemStore {
    fn get_peer_set(&self, round: Round) -> Result<PeerSet, Error> {
        floor_peer_set(self.peer_sets.iter(), round).cloned()
    }

    fn get_last_peer_set(&self) -> Result<PeerSet, Error> {
        self.peer_sets
            .values()
            .next_back()
            .cloned()
            .ok_or(Error::NotFound(Item::PeerSet(Round::new(-1))))
    }

    fn set_peer_set(&mut self, round: Round, peer_set: PeerSet) -> Result<(), Error> {
        for peer in peer_set.peers() {
            if !self.repertoire.contains_key(&peer.pub_key) {
                self.repertoire.insert(peer.pub_key, peer.clone());
                self.roots.insert(peer.pub_key, Root::base(peer.id));
                self.participant_events.entry(peer.pub_key).or_default();
            }
        }
        self.peer_sets.insert(round, peer_set);
        Ok(())
    }

    fn repertoire_by_pub_key(&self) -> BTreeMap<PubKeyBytes, Peer> {
        self.repertoire.clone()
    }

    fn repertoire_by_id(&self) -> BTreeMap<PeerId, Peer> {
        self.repertoire
            .values()
            .map(|p| (p.id, p.clone()))
            .collect()
    }

    fn get_event(&self, hash: &CryptoHash) -> Result<Event, Error> {
        self.events
            .get(hash)
            .cloned()
            .ok_or(Error::NotFound(Item::Event(*hash)))
    }

    fn set_event(&mut self, mut event: Event) -> Result<(), Error> {
        let hash = event.hash()?;
        let creator = *event.creator();
        let index = event.index().int();
        let chain = self.participant_events.entry(creator).or_default();

        match chain.get(&index) {
            Some(existing) if *existing != hash => {
                return Err(Error::Equivocation {
                    creator,
                    index: event.index(),
                });
            }
            Some(_) => {
                // updating an existing event keeps its topological index
                if event.topological_index().is_none() {
                    if let Some(stored) = self.events.get(&hash) {
                        if let Some(t) = stored.topological_index() {
                            event.set_topological_index(t);
                        }
                    }
                }
            }
            None => {
                if let Some((last, _)) = chain.iter().next_back() {
                    if index != last + 1 {
                        return Err(Error::Internal(format!(
                            "non-contiguous event index {} after {}",
                            index, last
                        )));
                    }
                }
                chain.insert(index, hash);
                if event.topological_index().is_none() {
                    event.set_topological_index(TopologicalIndex::new(self.topological_counter));
                    self.topological_counter += 1;
                }
            }
        }
        self.events.insert(hash, event);
        Ok(())
    }

    fn participant_events(
        &self,
        participant: &PubKeyBytes,
        from: EventIndex,
    ) -> Result<Vec<CryptoHash>, Error> {
        let chain = self
            .participant_events
            .get(participant)
            .ok_or(Error::NotFound(Item::Peer(*participant)))?;
        Ok(chain
            .range((from.int() + 1)..)
            .map(|(_, h)| *h)
            .collect())
    }

    fn participant_event(
        &self,
        participant: &PubKeyBytes,
        index: EventIndex,
    ) -> Result<CryptoHash, Error> {
        self.participant_events
            .get(participant)
            .ok_or(Error::NotFound(Item::Peer(*participant)))?
            .get(&index.int())
            .copied()
            .ok_or(Error::NotFound(Item::ParticipantEvent(*participant, index)))
    }

    fn last_event_from(&self, participant: &PubKeyBytes) -> Result<(CryptoHash, bool), Error> {
        let chain = self
            .participant_events
            .get(participant)
            .ok_or(Error::NotFound(Item::Peer(*participant)))?;
        match chain.iter().next_back() {
            Some((_, hash)) => Ok((*hash, false)),
            None => {
                let root = self.get_root(participant)?;
                Ok((root.self_parent.hash, true))
            }
        }
    }

    fn known_events(&self) -> BTreeMap<PeerId, EventIndex> {
        self.repertoire
            .values()
            .map(|peer| {
                let last = self
                    .participant_events
                    .get(&peer.pub_key)
                    .and_then(|chain| chain.keys().next_back().copied())
                    .or_else(|| {
                        self.roots
                            .get(&peer.pub_key)
                            .map(|root| root.self_parent.index.int())
                    })
                    .unwrap_or(-1);
                (peer.id, EventIndex::new(last))
            })
            .collect()
    }

    fn consensus_events(&self) -> Vec<CryptoHash> {
        self.consensus_events.clone()
    }

    fn consensus_events_count(&self) -> usize {
        self.consensus_events.len()
    }

    fn add_consensus_event(&mut self, event: &Event) -> Result<(), Error> {
        self.consensus_events.push(event.hash()?);
        Ok(())
    }

    fn get_round_created(&self, round: Round) -> Result<RoundCreated, Error> {
        self.rounds_created
            .get(&round)
            .cloned()
            .ok_or(Error::NotFound(Item::RoundCreated(round)))
    }

    fn set_round_created(&mut self, round: Round, round_created: RoundCreated) -> Result<(), Error> {
        self.rounds_created.insert(round, round_created);
        Ok(())
    }

    fn get_round_received(&self, round: Round) -> Result<RoundReceived, Error> {
        self.rounds_received
            .get(&round)
            .cloned()
            .ok_or(Error::NotFound(Item::RoundReceived(round)))
    }

    fn set_round_received(
        &mut self,
        round: Round,
        round_received: RoundReceived,
    ) -> Result<(), Error> {
        self.rounds_received.insert(round, round_received);
        Ok(())
    }

    fn last_round(&self) -> Round {
        self.rounds_created
            .keys()
            .next_back()
            .copied()
            .unwrap_or(Round::new(-1))
    }

    fn round_witnesses(&self, round: Round) -> Vec<CryptoHash> {
        self.rounds_created
            .get(&round)
            .map(|rc| rc.witnesses())
            .unwrap_or_default()
    }

    fn round_events_count(&self, round: Round) -> usize {
        self.rounds_created
            .get(&round)
            .map_or(0, |rc| rc.events.len())
    }

    fn get_root(&self, participant: &PubKeyBytes) -> Result<Root, Error> {
        self.roots
            .get(participant)
            .cloned()
            .ok_or(Error::NotFound(Item::Root(*participant)))
    }

    fn get_block(&self, index: BlockNumber) -> Result<Block, Error> {
        self.blocks
            .get(&index)
            .cloned()
            .ok_or(Error::NotFound(Item::Block(index)))
    }

    fn set_block(&mut self, block: Block) -> Result<(), Error> {
        self.blocks.insert(block.index(), block);
        Ok(())
    }

    fn last_block_index(&self) -> BlockNumber {
        self.blocks
            .keys()
            .next_back()
            .copied()
            .unwrap_or(BlockNumber::new(-1))
    }

    fn get_frame(&self, round: Round) -> Result<Frame, Error> {
        self.frames
            .get(&round)
            .cloned()
            .ok_or(Error::NotFound(Item::Frame(round)))
    }

    fn set_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.frames.insert(frame.round, frame);
        Ok(())
    }

    fn reset(&mut self, frame: &Frame) -> Result<(), Error> {
        self.events.clear();
        self.rounds_created.clear();
        self.rounds_received.clear();
        self.consensus_events.clear();
        self.frames = self.frames.split_off(&frame.round);
        self.blocks = self
            .blocks
            .iter()
            .filter(|(_, b)| b.round_received() >= frame.round)
            .map(|(i, b)| (*i, b.clone()))
            .collect();

        for peer in frame.peers.peers() {
            self.repertoire.entry(peer.pub_key).or_insert(peer.clone());
        }
        for chain in self.participant_events.values_mut() {
            chain.clear();
        }
        for (pub_key, root) in &frame.roots {
            self.roots.insert(*pub_key, root.clone());
            self.participant_events.entry(*pub_key).or_default();
        }
        self.peer_sets.insert(frame.round, frame.peers.clone());
        Ok(())
    }

    fn need_bootstrap(&self) -> bool {
        // A volatile store never survives a restart.
        false
    }
}
