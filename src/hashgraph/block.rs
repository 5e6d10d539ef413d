/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type and its methods.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use crate::error::Error;
use crate::types::{
    basic::{BlockNumber, CryptoHash, PubKeyBytes, Round, SignatureBytes},
    crypto_primitives::{verify_signature, CryptoHasher, Keypair},
    transactions::{BlockSignature, InternalTransaction},
};

use super::frame::Frame;

/// The signed portion of a [`Block`].
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockBody {
    pub index: BlockNumber,
    pub round_received: Round,
    /// Hash of the [`Frame`] the block was built from.
    pub frame_hash: CryptoHash,
    /// Hash of the peer set effective at `round_received`.
    pub peers_hash: CryptoHash,
    /// The transactions of the received events, in consensus order.
    pub transactions: Vec<Vec<u8>>,
    /// The membership changes of the received events, in consensus order. Applied to produce the
    /// peer set pinned for the following round.
    pub internal_transactions: Vec<InternalTransaction>,
}

/// One finalized element of the totally ordered output of consensus.
///
/// The `signatures` map accumulates validators' signatures over the body hash as they arrive
/// (possibly out of order, via the [signature pool](crate::hashgraph::SigPool)); it is not part
/// of the signed content, and two nodes may hold the same block with different signature sets.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub struct Block {
    pub body: BlockBody,
    pub signatures: BTreeMap<PubKeyBytes, SignatureBytes>,
}

impl Block {
    /// Build the block with the given `index` from a constructed frame: the block's transactions
    /// are the concatenation of the frame's events' payloads, in the frame's (consensus) order.
    pub fn from_frame(index: BlockNumber, frame: &Frame) -> Result<Block, Error> {
        let mut transactions = Vec::new();
        let mut internal_transactions = Vec::new();
        for event in &frame.events {
            transactions.extend(event.body.transactions.iter().cloned());
            internal_transactions.extend(event.body.internal_transactions.iter().cloned());
        }
        Ok(Block {
            body: BlockBody {
                index,
                round_received: frame.round,
                frame_hash: frame.hash()?,
                peers_hash: frame.peers.hash()?,
                transactions,
                internal_transactions,
            },
            signatures: BTreeMap::new(),
        })
    }

    pub fn index(&self) -> BlockNumber {
        self.body.index
    }

    pub fn round_received(&self) -> Round {
        self.body.round_received
    }

    /// The hash of the block's body: what block signatures sign.
    pub fn hash(&self) -> Result<CryptoHash, Error> {
        let bytes = self
            .body
            .try_to_vec()
            .map_err(|_| Error::Internal("block body serialization failed".to_string()))?;
        Ok(CryptoHash::new(CryptoHasher::digest(&bytes).into()))
    }

    /// Sign the block with `keypair`, returning the detached signature to gossip out.
    pub fn sign(&self, keypair: &Keypair) -> Result<BlockSignature, Error> {
        let hash = self.hash()?;
        Ok(BlockSignature {
            validator: keypair.public_bytes(),
            index: self.body.index,
            signature: keypair.sign(&hash.bytes()),
        })
    }

    /// Verify a detached signature against this block's body.
    pub fn verify_signature(&self, signature: &BlockSignature) -> Result<bool, Error> {
        if signature.index != self.body.index {
            return Ok(false);
        }
        let hash = self.hash()?;
        Ok(verify_signature(
            &signature.validator,
            &hash.bytes(),
            &signature.signature,
        ))
    }

    /// Attach a verified signature to the block.
    pub fn append_signature(&mut self, signature: BlockSignature) {
        self.signatures
            .insert(signature.validator, signature.signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::crypto_primitives::SigningKey;

    fn block() -> Block {
        Block {
            body: BlockBody {
                index: BlockNumber::new(0),
                round_received: Round::new(1),
                frame_hash: CryptoHash::new([1; 32]),
                peers_hash: CryptoHash::new([2; 32]),
                transactions: vec![b"tx".to_vec()],
                internal_transactions: vec![],
            },
            signatures: BTreeMap::new(),
        }
    }

    #[test]
    fn sign_and_verify() {
        let keypair = Keypair::new(SigningKey::from_bytes(&[1; 32]));
        let mut block = block();
        let sig = block.sign(&keypair).unwrap();
        assert!(block.verify_signature(&sig).unwrap());

        block.append_signature(sig.clone());
        assert_eq!(block.signatures.len(), 1);

        // A signature over a different block index does not verify.
        let mut wrong_index = sig;
        wrong_index.index = BlockNumber::new(1);
        assert!(!block.verify_signature(&wrong_index).unwrap());
    }

    #[test]
    fn signatures_do_not_change_the_hash() {
        let keypair = Keypair::new(SigningKey::from_bytes(&[1; 32]));
        let mut block = block();
        let hash = block.hash().unwrap();
        let sig = block.sign(&keypair).unwrap();
        block.append_signature(sig);
        assert_eq!(block.hash().unwrap(), hash);
    }
}
