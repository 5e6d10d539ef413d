/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Payload items that ride inside events: opaque application transactions travel as plain
//! `Vec<u8>`, while the two structured payload kinds, internal (membership) transactions and
//! block signatures, are defined here.

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::{BlockNumber, PubKeyBytes, SignatureBytes};
use super::peer_set::Peer;

/// A membership change carried inside an event's payload.
///
/// Internal transactions only take effect once the event carrying them reaches consensus: when
/// the decided round that contains them is processed, the resulting peer set is pinned for the
/// following round.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub enum InternalTransaction {
    /// Add `Peer` to the peer set.
    PeerAdd(Peer),
    /// Remove the peer with this public key from the peer set.
    PeerRemove(PubKeyBytes),
}

/// A validator's signature over a [`Block`](crate::hashgraph::Block), identified by the signer
/// and the index of the signed block.
///
/// Block signatures travel inside events, and may therefore arrive before the block they sign
/// has been produced locally; the [signature pool](crate::hashgraph::SigPool) holds them until
/// the block exists.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockSignature {
    pub validator: PubKeyBytes,
    pub index: BlockNumber,
    pub signature: SignatureBytes,
}
