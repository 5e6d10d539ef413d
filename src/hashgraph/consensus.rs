/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The consensus phases: round division, virtual voting, received-round derivation, and block
//! production.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::Error;
use crate::logging;
use crate::store::Store;
use crate::types::{
    basic::{CryptoHash, LamportTime, PubKeyBytes, Round, Timestamp},
    event::Event,
    root::{Root, RootEvent},
    transactions::InternalTransaction,
};

use super::{Block, Frame, Hashgraph, PendingRound, RoundCreated, RoundReceived};

impl<S: Store> Hashgraph<S> {
    /* ↓↓↓ Round and Lamport-timestamp computation ↓↓↓ */

    /// The round created of `x`.
    ///
    /// The parent round is the maximum of the parents' rounds, with roots contributing their
    /// stored round (-1 for base roots). The event is promoted to the next round when it
    /// strongly sees a super-majority of the parent round's witnesses, under the peer set of
    /// that next round. When the event sits directly on its creator's root and the root is
    /// authoritative for its other-parent, the root's `next_round` is returned outright.
    pub(crate) fn round(&mut self, x: &CryptoHash) -> Result<Round, Error> {
        let event = self.store.get_event(x)?;
        if let Some(round) = event.round() {
            return Ok(round);
        }
        if let Some(round) = self.round_cache.get(x) {
            return Ok(*round);
        }

        let root = self.creator_root(event.creator())?;
        let round = self.round_uncached(&event, &root, x)?;
        self.round_cache.insert(*x, round);
        Ok(round)
    }

    fn round_uncached(&mut self, event: &Event, root: &Root, x: &CryptoHash) -> Result<Round, Error> {
        if *event.self_parent() == root.self_parent.hash {
            let other_covered = match event.other_parent() {
                None => true,
                Some(op) => root.others.get(x).map_or(false, |re| re.hash == *op),
            };
            if other_covered {
                return Ok(root.next_round);
            }
        }

        let parent_round = self.parent_round(event, root, x)?;
        let next_peers = self.store.get_peer_set(parent_round + 1)?;
        let witnesses = self.store.round_witnesses(parent_round);
        let mut strongly_seen = 0;
        for witness in &witnesses {
            if self.strongly_see(x, witness, &next_peers)? {
                strongly_seen += 1;
            }
        }
        if strongly_seen >= next_peers.super_majority() {
            Ok(parent_round + 1)
        } else {
            Ok(parent_round)
        }
    }

    /// `max(round(self_parent), round(other_parent))`, with roots contributing their stored
    /// rounds.
    fn parent_round(&mut self, event: &Event, root: &Root, x: &CryptoHash) -> Result<Round, Error> {
        let self_parent_round = self.self_parent_round(event, root)?;
        let other_parent_round = match event.other_parent() {
            None => Round::new(-1),
            Some(op) => match self.store.get_event(op) {
                Ok(_) => self.round(op)?,
                Err(e) if e.is_not_found() => root
                    .others
                    .get(x)
                    .filter(|re| re.hash == *op)
                    .map(|re| re.round)
                    .ok_or(Error::UnknownParent(*op))?,
                Err(e) => return Err(e),
            },
        };
        Ok(self_parent_round.max(other_parent_round))
    }

    fn self_parent_round(&mut self, event: &Event, root: &Root) -> Result<Round, Error> {
        if *event.self_parent() == root.self_parent.hash {
            Ok(root.self_parent.round)
        } else {
            let self_parent = *event.self_parent();
            self.round(&self_parent)
        }
    }

    /// Whether `x` is a witness: the first event of its creator in its round, i.e. its round is
    /// greater than its self-parent's.
    fn witness(&mut self, event: &Event, x: &CryptoHash) -> Result<bool, Error> {
        let root = self.creator_root(event.creator())?;
        let round = self.round(x)?;
        Ok(round > self.self_parent_round(event, &root)?)
    }

    /// `1 + max(lamport(self_parent), lamport(other_parent))`, with roots contributing their
    /// stored Lamport timestamps (-1 for base roots).
    pub(crate) fn lamport_timestamp(&mut self, x: &CryptoHash) -> Result<LamportTime, Error> {
        let event = self.store.get_event(x)?;
        if let Some(lamport) = event.lamport_timestamp() {
            return Ok(lamport);
        }

        let root = self.creator_root(event.creator())?;
        let self_parent_lamport = if *event.self_parent() == root.self_parent.hash {
            root.self_parent.lamport_timestamp
        } else {
            let self_parent = *event.self_parent();
            self.lamport_timestamp(&self_parent)?
        };
        let other_parent_lamport = match event.other_parent() {
            None => LamportTime::new(-1),
            Some(op) => match self.store.get_event(op) {
                Ok(_) => self.lamport_timestamp(op)?,
                Err(e) if e.is_not_found() => root
                    .others
                    .get(x)
                    .filter(|re| re.hash == *op)
                    .map(|re| re.lamport_timestamp)
                    .ok_or(Error::UnknownParent(*op))?,
                Err(e) => return Err(e),
            },
        };
        Ok(self_parent_lamport.max(other_parent_lamport) + 1)
    }

    /* ↓↓↓ Phase 1: DivideRounds ↓↓↓ */

    /// Assign a round and Lamport timestamp to every undetermined event, in topological order,
    /// registering each in its round's table and queueing rounds with new witnesses for fame
    /// decision.
    pub fn divide_rounds(&mut self) -> Result<(), Error> {
        let undetermined = self.undetermined_events.clone();
        for x in undetermined {
            let mut event = self.store.get_event(&x)?;
            let mut updated = false;

            if event.round().is_none() {
                let round = self.round(&x)?;
                let witness = self.witness(&event, &x)?;
                event.set_round(round);
                updated = true;

                let mut round_created = match self.store.get_round_created(round) {
                    Ok(rc) => rc,
                    Err(e) if e.is_not_found() => {
                        RoundCreated::new(self.store.get_peer_set(round)?)
                    }
                    Err(e) => return Err(e),
                };
                round_created.add_created_event(x, witness);
                let queued = round_created.queued;
                self.store.set_round_created(round, round_created)?;
                if witness && !queued {
                    self.pending_rounds
                        .entry(round)
                        .or_insert(PendingRound { decided: false });
                }
            }

            if event.lamport_timestamp().is_none() {
                let lamport = self.lamport_timestamp(&x)?;
                event.set_lamport_timestamp(lamport);
                updated = true;
            }

            if updated {
                self.store.set_event(event)?;
            }
        }
        log::debug!(
            "{}, {}, {}",
            logging::DIVIDE_ROUNDS,
            self.store.last_round(),
            self.pending_rounds.len()
        );
        Ok(())
    }

    /* ↓↓↓ Phase 2: DecideFame ↓↓↓ */

    /// Run virtual voting on the witnesses of every pending round.
    ///
    /// A witness of round `r+1` votes directly on a witness `x` of round `r` (true iff it sees
    /// `x`). A witness `y` of a later round `r+d` collects the votes of the round `r+d-1`
    /// witnesses it strongly sees under that round's peer set, and adopts the majority (ties
    /// default to true). On a regular round, a majority that reaches the super-majority
    /// threshold decides `x`; on a coin round (every `coin_round_frequency`-th), deciding is
    /// forbidden, and a witness that observes no super-majority votes with the middle bit of
    /// its own signature.
    pub fn decide_fame(&mut self) -> Result<(), Error> {
        let coin_frequency = self.config.coin_round_frequency;
        let mut votes: HashMap<(CryptoHash, CryptoHash), bool> = HashMap::new();
        let pending: Vec<Round> = self.pending_rounds.keys().copied().collect();
        let last_round = self.store.last_round();
        let mut newly_decided = Vec::new();

        for round_index in pending {
            let mut round_created = self.store.get_round_created(round_index)?;
            for x in round_created.witnesses() {
                if round_created.is_decided(&x) {
                    continue;
                }
                'vote_loop: for j in (round_index.int() + 1)..=last_round.int() {
                    let voting_round = Round::new(j);
                    let diff = j - round_index.int();
                    for y in self.store.round_witnesses(voting_round) {
                        if diff == 1 {
                            let sees = self.see(&y, &x)?;
                            votes.insert((y, x), sees);
                            continue;
                        }

                        let prev = self.store.get_round_created(Round::new(j - 1))?;
                        let mut yays = 0usize;
                        let mut nays = 0usize;
                        for w in prev.witnesses() {
                            if self.strongly_see(&y, &w, &prev.peer_set)? {
                                if votes.get(&(w, x)).copied().unwrap_or(false) {
                                    yays += 1;
                                } else {
                                    nays += 1;
                                }
                            }
                        }
                        let majority = yays >= nays;
                        let tally = if majority { yays } else { nays };

                        if diff % coin_frequency != 0 {
                            if tally >= prev.peer_set.super_majority() {
                                round_created.set_fame(&x, majority);
                                votes.insert((y, x), majority);
                                break 'vote_loop;
                            }
                            votes.insert((y, x), majority);
                        } else {
                            // Coin round: no decisions, even on a super-majority.
                            if tally >= prev.peer_set.super_majority() {
                                votes.insert((y, x), majority);
                            } else {
                                let y_event = self.store.get_event(&y)?;
                                votes.insert((y, x), y_event.signature.middle_bit());
                            }
                        }
                    }
                }
            }

            let decided = round_created.witnesses_decided();
            self.store.set_round_created(round_index, round_created)?;
            if decided {
                if let Some(pending_round) = self.pending_rounds.get_mut(&round_index) {
                    if !pending_round.decided {
                        pending_round.decided = true;
                        newly_decided.push(round_index);
                    }
                }
            }
        }

        for round in newly_decided {
            log::debug!("{}, {}", logging::DECIDE_FAME, round);
        }
        Ok(())
    }

    /* ↓↓↓ Phase 3: DecideRoundReceived ↓↓↓ */

    /// Assign received rounds: an event is received in the smallest decided round whose famous
    /// witnesses are all its descendants. Its consensus timestamp is the median of the
    /// timestamps of the earliest event on each famous witness's self-ancestry that still sees
    /// it.
    pub fn decide_round_received(&mut self) -> Result<(), Error> {
        let mut still_undetermined = Vec::new();
        let last_round = self.store.last_round();

        for x in self.undetermined_events.clone() {
            let mut event = self.store.get_event(&x)?;
            let round = match event.round() {
                Some(round) => round,
                None => {
                    still_undetermined.push(x);
                    continue;
                }
            };

            let mut received = false;
            for i in (round.int() + 1)..=last_round.int() {
                let candidate = Round::new(i);
                let round_created = match self.store.get_round_created(candidate) {
                    Ok(rc) => rc,
                    Err(e) if e.is_not_found() => break,
                    Err(e) => return Err(e),
                };
                // Rounds are walked from earlier to later; an undecided round bars every later
                // round from receiving this event.
                if !round_created.witnesses_decided() {
                    break;
                }

                let famous = round_created.famous_witnesses();
                let mut seen_by_all = !famous.is_empty();
                for w in &famous {
                    if !self.see(w, &x)? {
                        seen_by_all = false;
                        break;
                    }
                }
                if !seen_by_all {
                    continue;
                }

                event.set_round_received(candidate);
                let consensus_timestamp = self.consensus_timestamp(&famous, &x)?;
                event.set_consensus_timestamp(consensus_timestamp);
                self.store.set_event(event)?;

                let mut own_round = self.store.get_round_created(round)?;
                own_round.set_round_received(&x, candidate);
                self.store.set_round_created(round, own_round)?;

                let mut round_received = match self.store.get_round_received(candidate) {
                    Ok(rr) => rr,
                    Err(e) if e.is_not_found() => RoundReceived::default(),
                    Err(e) => return Err(e),
                };
                round_received.0.push(x);
                self.store.set_round_received(candidate, round_received)?;

                received = true;
                break;
            }

            if !received {
                still_undetermined.push(x);
            }
        }

        self.undetermined_events = still_undetermined;
        log::debug!(
            "{}, {}",
            logging::DECIDE_ROUND_RECEIVED,
            self.undetermined_events.len()
        );
        Ok(())
    }

    /// The median of the timestamps of the earliest event on each famous witness's self-ancestry
    /// that still sees `x`. With an even number of contributions, the upper middle is taken.
    fn consensus_timestamp(
        &mut self,
        famous: &[CryptoHash],
        x: &CryptoHash,
    ) -> Result<Timestamp, Error> {
        let mut timestamps = Vec::with_capacity(famous.len());
        for w in famous {
            let mut cursor = *w;
            loop {
                let event = self.store.get_event(&cursor)?;
                let self_parent = *event.self_parent();
                if self.store.get_event(&self_parent).is_err() {
                    break;
                }
                if !self.see(&self_parent, x)? {
                    break;
                }
                cursor = self_parent;
            }
            timestamps.push(self.store.get_event(&cursor)?.timestamp());
        }
        timestamps.sort();
        if timestamps.is_empty() {
            return Err(Error::Internal(
                "consensus timestamp requested with no famous witnesses".to_string(),
            ));
        }
        Ok(timestamps[timestamps.len() / 2])
    }

    /* ↓↓↓ Phase 4: ProcessDecidedRounds ↓↓↓ */

    /// Turn decided rounds into frames and blocks, in ascending order, stopping at the first
    /// undecided round. Blocks are delivered on the commit channel, which blocks until the
    /// subscriber accepts them.
    pub fn process_decided_rounds(&mut self) -> Result<(), Error> {
        let pending: Vec<(Round, PendingRound)> = self
            .pending_rounds
            .iter()
            .map(|(r, p)| (*r, *p))
            .collect();
        let mut processed = Vec::new();

        for (round, pending_round) in pending {
            // A later round is never processed before an earlier one.
            if !pending_round.decided {
                break;
            }

            // Below a reset horizon, the round belongs to the trusted snapshot: account for its
            // events without emitting their block again.
            let suppressed = self.round_lower_bound.map_or(false, |bound| round <= bound);

            let frame = self.build_frame(round)?;
            for event in &frame.events {
                self.store.add_consensus_event(event)?;
                if event.is_loaded() {
                    self.pending_loaded_events -= 1;
                }
            }

            let mut round_created = self.store.get_round_created(round)?;
            round_created.queued = true;
            self.store.set_round_created(round, round_created)?;

            if !suppressed && !frame.events.is_empty() {
                self.store.set_frame(frame.clone())?;
                let index = self.store.last_block_index() + 1;
                let block = Block::from_frame(index, &frame)?;
                self.store.set_block(block.clone())?;
                self.apply_internal_transactions(&block)?;
                log::info!(
                    "{}, {}, {}, {}",
                    logging::NEW_BLOCK,
                    block.index(),
                    block.round_received(),
                    block.body.transactions.len()
                );
                if let Some(commit_tx) = &self.commit_tx {
                    commit_tx
                        .send(block)
                        .map_err(|_| Error::Internal("commit channel closed".to_string()))?;
                }
            }

            processed.push(round);
        }

        for round in processed {
            self.pending_rounds.remove(&round);
            log::debug!("{}, {}", logging::PROCESS_DECIDED_ROUNDS, round);
        }
        Ok(())
    }

    /// Apply a block's membership changes to the peer set effective at its round, pinning the
    /// result for the following round.
    fn apply_internal_transactions(&mut self, block: &Block) -> Result<(), Error> {
        if block.body.internal_transactions.is_empty() {
            return Ok(());
        }
        let mut peers = self.store.get_peer_set(block.round_received())?;
        for itx in &block.body.internal_transactions {
            match itx {
                InternalTransaction::PeerAdd(peer) => {
                    peers = peers.with_new_peer(peer.clone());
                }
                InternalTransaction::PeerRemove(pub_key) => {
                    peers = peers.with_removed_peer(pub_key);
                }
            }
        }
        let effective = block.round_received() + 1;
        log::info!("{}, {}, {}", logging::PIN_PEER_SET, effective, peers.len());
        self.store.set_peer_set(effective, peers)
    }

    /* ↓↓↓ Phase 5: ProcessSigPool ↓↓↓ */

    /// Drain the signature pool: attach the signatures whose block now exists, drop the ones
    /// whose signer is not a member of the block's peer set or whose signature does not verify,
    /// and keep the rest pending.
    pub fn process_sig_pool(&mut self) -> Result<(), Error> {
        let pending = self.sig_pool.pending();
        for signature in pending {
            let mut block = match self.store.get_block(signature.index) {
                Ok(block) => block,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            let peers = self.store.get_peer_set(block.round_received())?;
            if !peers.contains(&signature.validator) {
                log::warn!(
                    "{}, {}, {}, stale signer",
                    logging::PROCESS_SIG_POOL,
                    signature.index,
                    logging::short_hash(&signature.validator)
                );
                self.sig_pool.remove(&signature);
                continue;
            }
            if !block.verify_signature(&signature)? {
                log::warn!(
                    "{}, {}, {}, invalid signature",
                    logging::PROCESS_SIG_POOL,
                    signature.index,
                    logging::short_hash(&signature.validator)
                );
                self.sig_pool.remove(&signature);
                continue;
            }
            block.append_signature(signature.clone());
            self.store.set_block(block)?;
            self.sig_pool.remove(&signature);
        }
        Ok(())
    }

    /* ↓↓↓ Frame construction ↓↓↓ */

    /// The frame for `round`, for serving fast-forward requests to joining nodes.
    ///
    /// Fails with [`RoundNotDecided`](Error::RoundNotDecided) while the round's fame is still
    /// open: an undecided round has no final received-event list to snapshot.
    pub fn get_frame(&mut self, round: Round) -> Result<Frame, Error> {
        if round > self.store.last_round() {
            return Err(Error::RoundNotDecided(round));
        }
        if let Some(pending) = self.pending_rounds.get(&round) {
            if !pending.decided {
                return Err(Error::RoundNotDecided(round));
            }
        }
        self.build_frame(round)
    }

    /// Build (or fetch, when already persisted) the frame of the events received in `round`:
    /// the peer set effective at the round, the received events in consensus order, and one
    /// root per peer describing the history below the frame.
    pub fn build_frame(&mut self, round: Round) -> Result<Frame, Error> {
        match self.store.get_frame(round) {
            Ok(frame) => return Ok(frame),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let peers = self.store.get_peer_set(round)?;
        let received = match self.store.get_round_received(round) {
            Ok(rr) => rr.0,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        // Consensus order: consensus timestamp, then Lamport timestamp, then whitened
        // signature.
        let mut keyed: Vec<((i64, i64, [u8; 64]), Event)> = Vec::with_capacity(received.len());
        for hash in &received {
            let event = self.store.get_event(hash)?;
            let consensus_timestamp = event.consensus_timestamp().ok_or_else(|| {
                Error::Internal("received event without consensus timestamp".to_string())
            })?;
            let lamport = event.lamport_timestamp().ok_or_else(|| {
                Error::Internal("received event without lamport timestamp".to_string())
            })?;
            keyed.push((
                (
                    consensus_timestamp.int(),
                    lamport.int(),
                    event.signature.whitened(round),
                ),
                event,
            ));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        let events: Vec<Event> = keyed.into_iter().map(|(_, e)| e).collect();

        let frame_hashes: BTreeSet<CryptoHash> = {
            let mut hashes = BTreeSet::new();
            for event in &events {
                hashes.insert(event.hash()?);
            }
            hashes
        };

        let mut roots: BTreeMap<PubKeyBytes, Root> = BTreeMap::new();
        for peer in peers.peers() {
            let first = events
                .iter()
                .filter(|e| e.creator() == &peer.pub_key)
                .min_by_key(|e| e.index());
            let root = match first {
                Some(first) => self.frame_root(first, &events, &frame_hashes)?,
                None => self.fallback_root(&peer.pub_key, round)?,
            };
            roots.insert(peer.pub_key, root);
        }
        // A participant removed from the peer set may still have events in the frame (its last
        // ones before removal); they need a root too, or the frame cannot be replayed.
        let creators: Vec<PubKeyBytes> = events.iter().map(|e| *e.creator()).collect();
        for creator in creators {
            if !roots.contains_key(&creator) {
                let first = events
                    .iter()
                    .filter(|e| e.creator() == &creator)
                    .min_by_key(|e| e.index())
                    .ok_or_else(|| Error::Internal("creator without events".to_string()))?;
                let root = self.frame_root(first, &events, &frame_hashes)?;
                roots.insert(creator, root);
            }
        }

        Ok(Frame {
            round,
            peers,
            roots,
            events,
        })
    }

    /// The root of a participant that has events in the frame: anchored on the self-parent of
    /// its first frame event, with descriptors for every below-frame other-parent its frame
    /// events reference.
    fn frame_root(
        &mut self,
        first: &Event,
        frame_events: &[Event],
        frame_hashes: &BTreeSet<CryptoHash>,
    ) -> Result<Root, Error> {
        let creator = *first.creator();
        let stored_root = self.creator_root(&creator)?;

        let self_parent = match self.store.get_event(first.self_parent()) {
            Ok(parent) => self.root_event_from(&parent)?,
            // The first frame event already sits on a root.
            Err(e) if e.is_not_found() => stored_root.self_parent.clone(),
            Err(e) => return Err(e),
        };

        let mut others = BTreeMap::new();
        for event in frame_events.iter().filter(|e| e.creator() == &creator) {
            let hash = event.hash()?;
            if let Some(other_parent) = event.other_parent() {
                if !frame_hashes.contains(other_parent) {
                    let descriptor = match self.store.get_event(other_parent) {
                        Ok(parent) => self.root_event_from(&parent)?,
                        Err(e) if e.is_not_found() => stored_root
                            .others
                            .get(&hash)
                            .cloned()
                            .ok_or(Error::UnknownParent(*other_parent))?,
                        Err(e) => return Err(e),
                    };
                    others.insert(hash, descriptor);
                }
            }
        }

        let next_round = first
            .round()
            .ok_or_else(|| Error::Internal("frame event without round".to_string()))?;
        Ok(Root {
            next_round,
            self_parent,
            others,
        })
    }

    /// The root of a participant with no events in the frame: its most recent consensus event
    /// received no later than `round`, or its current root when it has none.
    fn fallback_root(&mut self, participant: &PubKeyBytes, round: Round) -> Result<Root, Error> {
        let chain = self
            .store
            .participant_events(participant, crate::types::basic::EventIndex::new(-1))?;
        for hash in chain.iter().rev() {
            let event = self.store.get_event(hash)?;
            if let Some(round_received) = event.round_received() {
                if round_received <= round {
                    let self_parent = self.root_event_from(&event)?;
                    return Ok(Root {
                        next_round: self_parent.round,
                        self_parent,
                        others: BTreeMap::new(),
                    });
                }
            }
        }
        self.creator_root(participant)
    }

    fn root_event_from(&self, event: &Event) -> Result<RootEvent, Error> {
        Ok(RootEvent {
            hash: event.hash()?,
            creator_id: crate::types::basic::PeerId::from_pub_key(event.creator()),
            index: event.index(),
            lamport_timestamp: event.lamport_timestamp().ok_or_else(|| {
                Error::Internal("root anchor event without lamport timestamp".to_string())
            })?,
            round: event
                .round()
                .ok_or_else(|| Error::Internal("root anchor event without round".to_string()))?,
        })
    }
}
