/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-round bookkeeping: which events were *created* in a round, which of them are witnesses,
//! how virtual voting decided their fame, and — as a separate artifact — which events were
//! *received* in a round.
//!
//! `RoundCreated` deliberately does not record received events; those live in the standalone
//! [`RoundReceived`] list, keyed by the same round number in the store.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    basic::{CryptoHash, Round, Trilean},
    peer_set::PeerSet,
};

/// What a round knows about one of its created events.
#[derive(Clone, Debug, PartialEq, Eq, Default, BorshDeserialize, BorshSerialize)]
pub struct RoundEvent {
    pub witness: bool,
    pub famous: Trilean,
    /// The round in which this event was received, once known.
    pub round_received: Option<Round>,
}

/// The events created in one round, the peer set effective for that round, and the fame state of
/// its witnesses.
///
/// The map is ordered by event hash so that every iteration over a round is deterministic.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct RoundCreated {
    pub events: BTreeMap<CryptoHash, RoundEvent>,
    pub peer_set: PeerSet,
    /// Set once the round has been queued for block production; latched thereafter.
    pub queued: bool,
}

impl RoundCreated {
    /// Create an empty `RoundCreated` governed by `peer_set`.
    pub fn new(peer_set: PeerSet) -> RoundCreated {
        RoundCreated {
            events: BTreeMap::new(),
            peer_set,
            queued: false,
        }
    }

    /// Register `event` as created in this round. A no-op if the event is already registered.
    pub fn add_created_event(&mut self, event: CryptoHash, witness: bool) {
        self.events.entry(event).or_insert(RoundEvent {
            witness,
            famous: Trilean::Undefined,
            round_received: None,
        });
    }

    /// Record the round in which `event` was received.
    pub fn set_round_received(&mut self, event: &CryptoHash, round_received: Round) {
        if let Some(round_event) = self.events.get_mut(event) {
            round_event.round_received = Some(round_received);
        }
    }

    /// Latch the fame of the witness `event`. Fame is never overwritten once set.
    pub fn set_fame(&mut self, event: &CryptoHash, famous: bool) {
        let round_event = self.events.entry(*event).or_insert(RoundEvent {
            witness: true,
            famous: Trilean::Undefined,
            round_received: None,
        });
        if round_event.famous == Trilean::Undefined {
            round_event.famous = if famous { Trilean::True } else { Trilean::False };
        }
    }

    /// The hashes of this round's witnesses, in hash order.
    pub fn witnesses(&self) -> Vec<CryptoHash> {
        self.events
            .iter()
            .filter(|(_, e)| e.witness)
            .map(|(h, _)| *h)
            .collect()
    }

    /// The hashes of this round's witnesses decided famous, in hash order.
    pub fn famous_witnesses(&self) -> Vec<CryptoHash> {
        self.events
            .iter()
            .filter(|(_, e)| e.witness && e.famous == Trilean::True)
            .map(|(h, _)| *h)
            .collect()
    }

    /// Whether the fame of `witness` has been decided.
    pub fn is_decided(&self, witness: &CryptoHash) -> bool {
        match self.events.get(witness) {
            Some(e) => e.witness && e.famous != Trilean::Undefined,
            None => false,
        }
    }

    /// Whether the round as a whole is decided: every witness has a decided fame, and the number
    /// of decided witnesses reaches the super-majority of the round's peer set.
    pub fn witnesses_decided(&self) -> bool {
        let witnesses: Vec<_> = self.events.values().filter(|e| e.witness).collect();
        let decided = witnesses
            .iter()
            .filter(|e| e.famous != Trilean::Undefined)
            .count();
        decided == witnesses.len() && decided >= self.peer_set.super_majority()
    }
}

/// The ordered list of events received in one round. Built up in topological order by
/// [`DecideRoundReceived`](crate::hashgraph::Hashgraph::decide_round_received); the consensus
/// order (by consensus timestamp, Lamport timestamp, and whitened signature) is established when
/// the round's frame is constructed.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct RoundReceived(pub Vec<CryptoHash>);

/// A round queued for fame decision and, eventually, block production.
#[derive(Clone, Copy, Debug)]
pub struct PendingRound {
    pub decided: bool,
}
