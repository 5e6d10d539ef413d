/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Out-of-order block signatures, held until the matching block exists.

use std::collections::BTreeMap;

use crate::types::{
    basic::{BlockNumber, PubKeyBytes},
    transactions::BlockSignature,
};

/// Pending block signatures, keyed by `(block index, signer)` so that a signer's re-gossiped
/// signature replaces rather than duplicates its earlier one.
#[derive(Default)]
pub struct SigPool {
    pending: BTreeMap<(BlockNumber, PubKeyBytes), BlockSignature>,
}

impl SigPool {
    pub fn new() -> SigPool {
        SigPool {
            pending: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, signature: BlockSignature) {
        self.pending
            .insert((signature.index, signature.validator), signature);
    }

    pub fn remove(&mut self, signature: &BlockSignature) {
        self.pending
            .remove(&(signature.index, signature.validator));
    }

    /// The pending signatures in key order.
    pub fn pending(&self) -> Vec<BlockSignature> {
        self.pending.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
