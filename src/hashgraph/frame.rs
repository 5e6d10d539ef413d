/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The self-contained snapshot needed to bootstrap a node at a given round.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::error::Error;
use crate::types::{
    basic::{CryptoHash, PubKeyBytes, Round},
    crypto_primitives::CryptoHasher,
    event::Event,
    peer_set::PeerSet,
    root::Root,
};

/// Everything a node needs to resume consensus from round `round`: the peer set effective at
/// that round, one root per participant describing the history below the frame, and the events
/// received in the round, in consensus order.
///
/// The events are carried with their consensus coordinates filled in, so that a node receiving
/// the frame can reproduce subsequent consensus byte-for-byte; the node-local topological index
/// is excluded from the events' serialized form, keeping the frame's hash identical on every
/// node.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct Frame {
    pub round: Round,
    pub peers: PeerSet,
    /// One root per participant active at `round`, keyed by public key.
    pub roots: BTreeMap<PubKeyBytes, Root>,
    /// The events received in `round`, ordered by (consensus timestamp, Lamport timestamp,
    /// whitened signature).
    pub events: Vec<Event>,
}

impl Frame {
    /// The canonical content hash of this `Frame`: the SHA256 digest of its Borsh form.
    pub fn hash(&self) -> Result<CryptoHash, Error> {
        let bytes = self
            .try_to_vec()
            .map_err(|_| Error::Internal("frame serialization failed".to_string()))?;
        Ok(CryptoHash::new(CryptoHasher::digest(&bytes).into()))
    }
}
