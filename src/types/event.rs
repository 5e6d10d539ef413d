/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'event' type — the signed vertex of the hashgraph — and its wire form.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::error::Error;

use super::{
    basic::{
        CryptoHash, EventIndex, LamportTime, PeerId, PubKeyBytes, Round, SignatureBytes,
        Timestamp, TopologicalIndex,
    },
    crypto_primitives::{verify_signature, CryptoHasher, Keypair},
    transactions::{BlockSignature, InternalTransaction},
};

/// The signed portion of an [`Event`]. Everything in the body is fixed by the creator at
/// creation time; the signature covers the SHA256 digest of the body's Borsh form, which is also
/// the event's hash.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct EventBody {
    /// Opaque application transactions.
    pub transactions: Vec<Vec<u8>>,
    /// Membership changes.
    pub internal_transactions: Vec<InternalTransaction>,
    /// Block signatures being gossiped out.
    pub block_signatures: Vec<BlockSignature>,
    /// Hash of the creator's previous event, or of the creator's root when `index` is 0.
    pub self_parent: CryptoHash,
    /// Hash of an event by another creator, absent only on a participant's first-ever event.
    pub other_parent: Option<CryptoHash>,
    pub creator: PubKeyBytes,
    /// 0-based sequence number per creator.
    pub index: EventIndex,
    /// Wall clock of the creator. Untrusted.
    pub timestamp: Timestamp,
}

/// A vertex of the hashgraph.
///
/// The `body` and `signature` are immutable once the event is created. The remaining fields are
/// consensus coordinates that the consensus phases populate after insertion:
/// [`DivideRounds`](crate::hashgraph::Hashgraph::divide_rounds) assigns `round` and
/// `lamport_timestamp`, and
/// [`DecideRoundReceived`](crate::hashgraph::Hashgraph::decide_round_received) assigns
/// `round_received` and `consensus_timestamp`. The `topological_index` is assigned by the store
/// at insertion and is node-local: it is deliberately excluded from the serialized form.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Event {
    pub body: EventBody,
    pub signature: SignatureBytes,

    round: Option<Round>,
    lamport_timestamp: Option<LamportTime>,
    round_received: Option<Round>,
    consensus_timestamp: Option<Timestamp>,
    #[borsh_skip]
    topological_index: Option<TopologicalIndex>,
}

impl Event {
    /// Create a new, unsigned `Event`. Call [`sign`](Self::sign) before handing it to the
    /// hashgraph.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transactions: Vec<Vec<u8>>,
        internal_transactions: Vec<InternalTransaction>,
        block_signatures: Vec<BlockSignature>,
        self_parent: CryptoHash,
        other_parent: Option<CryptoHash>,
        creator: PubKeyBytes,
        index: EventIndex,
        timestamp: Timestamp,
    ) -> Event {
        Event {
            body: EventBody {
                transactions,
                internal_transactions,
                block_signatures,
                self_parent,
                other_parent,
                creator,
                index,
                timestamp,
            },
            signature: SignatureBytes::default(),
            round: None,
            lamport_timestamp: None,
            round_received: None,
            consensus_timestamp: None,
            topological_index: None,
        }
    }

    /// The event's hash: the SHA256 digest of the canonical Borsh form of its body. The
    /// signature, consensus coordinates, and topological index are excluded, so the hash is
    /// fixed at creation time and identical on every node.
    pub fn hash(&self) -> Result<CryptoHash, Error> {
        let bytes = self
            .body
            .try_to_vec()
            .map_err(|_| Error::Internal("event body serialization failed".to_string()))?;
        Ok(CryptoHash::new(CryptoHasher::digest(&bytes).into()))
    }

    /// Sign the event with `keypair`, which must hold the key the body names as `creator`.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), Error> {
        if keypair.public_bytes() != self.body.creator {
            return Err(Error::Internal(
                "signing key does not match event creator".to_string(),
            ));
        }
        let hash = self.hash()?;
        self.signature = keypair.sign(&hash.bytes());
        Ok(())
    }

    /// Verify the event's signature against the creator key named in its body.
    pub fn verify(&self) -> Result<bool, Error> {
        let hash = self.hash()?;
        Ok(verify_signature(
            &self.body.creator,
            &hash.bytes(),
            &self.signature,
        ))
    }

    pub fn creator(&self) -> &PubKeyBytes {
        &self.body.creator
    }

    pub fn index(&self) -> EventIndex {
        self.body.index
    }

    pub fn self_parent(&self) -> &CryptoHash {
        &self.body.self_parent
    }

    pub fn other_parent(&self) -> Option<&CryptoHash> {
        self.body.other_parent.as_ref()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.body.timestamp
    }

    /// An event is "loaded" when it carries a payload that will end up in a block: transactions,
    /// membership changes, or block signatures.
    pub fn is_loaded(&self) -> bool {
        !self.body.transactions.is_empty()
            || !self.body.internal_transactions.is_empty()
            || !self.body.block_signatures.is_empty()
    }

    pub fn round(&self) -> Option<Round> {
        self.round
    }

    pub fn set_round(&mut self, round: Round) {
        self.round = Some(round);
    }

    pub fn lamport_timestamp(&self) -> Option<LamportTime> {
        self.lamport_timestamp
    }

    pub fn set_lamport_timestamp(&mut self, lamport_timestamp: LamportTime) {
        self.lamport_timestamp = Some(lamport_timestamp);
    }

    pub fn round_received(&self) -> Option<Round> {
        self.round_received
    }

    pub fn set_round_received(&mut self, round_received: Round) {
        self.round_received = Some(round_received);
    }

    pub fn consensus_timestamp(&self) -> Option<Timestamp> {
        self.consensus_timestamp
    }

    pub fn set_consensus_timestamp(&mut self, consensus_timestamp: Timestamp) {
        self.consensus_timestamp = Some(consensus_timestamp);
    }

    pub fn topological_index(&self) -> Option<TopologicalIndex> {
        self.topological_index
    }

    pub fn set_topological_index(&mut self, topological_index: TopologicalIndex) {
        self.topological_index = Some(topological_index);
    }

    /// Strip all consensus coordinates, returning the event to its as-created state. Used when
    /// replaying a frame's events into a freshly reset store, which recomputes them.
    pub fn clear_coordinates(&mut self) {
        self.round = None;
        self.lamport_timestamp = None;
        self.round_received = None;
        self.consensus_timestamp = None;
        self.topological_index = None;
    }
}

/// The on-wire form of an [`Event`]: parents are referenced by `(creator id, index)` pairs
/// instead of hashes, which keeps sync payloads small. Resolution back into hashes happens
/// against the receiving node's store; see
/// [`Hashgraph::read_wire_event`](crate::hashgraph::Hashgraph::read_wire_event).
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct WireEvent {
    pub transactions: Vec<Vec<u8>>,
    pub internal_transactions: Vec<InternalTransaction>,
    pub block_signatures: Vec<BlockSignature>,
    pub creator_id: PeerId,
    pub index: EventIndex,
    /// Index of the creator's previous event; -1 refers to the creator's root.
    pub self_parent_index: EventIndex,
    /// Creator id of the other-parent; absent on a participant's first-ever event.
    pub other_parent_creator_id: Option<PeerId>,
    pub other_parent_index: EventIndex,
    pub timestamp: Timestamp,
    pub signature: SignatureBytes,
}
