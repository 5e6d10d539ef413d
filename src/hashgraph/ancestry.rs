/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ancestry queries: `ancestor`, `self_ancestor`, `see`, and `strongly_see`.
//!
//! Reachability is answered from a per-event "last ancestors" table: for each creator, the
//! highest-index event of that creator reachable from the queried event. Because insertion
//! refuses equivocation, every creator's chain is linear, so `y` is an ancestor of `x` exactly
//! when `x`'s table holds an event of `y`'s creator at an index `>= y`'s. The tables are built
//! bottom-up with an explicit work stack (the graph is a DAG by construction, but deep), and
//! memoized; events sitting on a root contribute nothing below themselves.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::store::Store;
use crate::types::{
    basic::{CryptoHash, EventIndex, PubKeyBytes},
    event::Event,
    peer_set::PeerSet,
};

use super::Hashgraph;

/// One entry of an event's last-ancestors table: the highest-index ancestor by one creator.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AncestorEntry {
    pub hash: CryptoHash,
    pub index: EventIndex,
}

impl<S: Store> Hashgraph<S> {
    /// The last-ancestors table of `x`: for each creator, the highest-index event of that
    /// creator that is reachable from `x` (including `x` itself).
    pub(crate) fn last_ancestors(
        &mut self,
        x: &CryptoHash,
    ) -> Result<BTreeMap<PubKeyBytes, AncestorEntry>, Error> {
        if let Some(table) = self.last_ancestors_cache.get(x) {
            return Ok(table.clone());
        }

        let mut stack = vec![*x];
        while let Some(hash) = stack.last().copied() {
            if self.last_ancestors_cache.contains_key(&hash) {
                stack.pop();
                continue;
            }
            let event = self.store.get_event(&hash)?;

            let mut missing = Vec::new();
            let self_parent = *event.self_parent();
            let self_parent_known = self.store.get_event(&self_parent).is_ok();
            if self_parent_known && !self.last_ancestors_cache.contains_key(&self_parent) {
                missing.push(self_parent);
            }
            let other_parent = event.other_parent().copied();
            let other_parent_known = other_parent
                .map(|op| self.store.get_event(&op).is_ok())
                .unwrap_or(false);
            if let Some(op) = other_parent {
                if other_parent_known && !self.last_ancestors_cache.contains_key(&op) {
                    missing.push(op);
                }
            }
            if !missing.is_empty() {
                stack.extend(missing);
                continue;
            }

            let mut table: BTreeMap<PubKeyBytes, AncestorEntry> = if self_parent_known {
                self.last_ancestors_cache[&self_parent].clone()
            } else {
                BTreeMap::new()
            };
            if let Some(op) = other_parent {
                if other_parent_known {
                    for (creator, entry) in &self.last_ancestors_cache[&op] {
                        match table.get(creator) {
                            Some(existing) if existing.index >= entry.index => {}
                            _ => {
                                table.insert(*creator, *entry);
                            }
                        }
                    }
                }
            }
            let own = AncestorEntry {
                hash,
                index: event.index(),
            };
            match table.get(event.creator()) {
                Some(existing) if existing.index >= own.index => {}
                _ => {
                    table.insert(*event.creator(), own);
                }
            }

            self.last_ancestors_cache.insert(hash, table);
            stack.pop();
        }

        Ok(self.last_ancestors_cache[x].clone())
    }

    /// Whether `y` is reachable from `x` following any parent edges. Reflexive.
    pub fn ancestor(&mut self, x: &CryptoHash, y: &CryptoHash) -> Result<bool, Error> {
        if x == y {
            return Ok(true);
        }
        let y_event = self.store.get_event(y)?;
        let table = self.last_ancestors(x)?;
        Ok(table
            .get(y_event.creator())
            .map_or(false, |entry| entry.index >= y_event.index()))
    }

    /// Whether `y` is reachable from `x` following only self-parent edges. Reflexive.
    pub fn self_ancestor(&mut self, x: &CryptoHash, y: &CryptoHash) -> Result<bool, Error> {
        if x == y {
            return Ok(true);
        }
        let x_event = self.store.get_event(x)?;
        let y_event = self.store.get_event(y)?;
        Ok(x_event.creator() == y_event.creator() && x_event.index() > y_event.index())
    }

    /// Whether `x` sees `y`: `y` is an ancestor of `x` and `x` does not witness a fork by `y`'s
    /// creator.
    ///
    /// Forks cannot exist in the store — insertion refuses a second event at an occupied
    /// `(creator, index)` slot — so the fork condition is vacuous and seeing coincides with
    /// ancestry.
    pub fn see(&mut self, x: &CryptoHash, y: &CryptoHash) -> Result<bool, Error> {
        self.ancestor(x, y)
    }

    /// Whether `x` strongly sees `y` under `peers`: `x` sees events by a super-majority of
    /// distinct members of `peers`, each of which sees `y`.
    ///
    /// For each member it suffices to test the member's highest-index event reachable from `x`:
    /// if any event of that member sees `y`, its later events (being its self-descendants) do
    /// too.
    pub fn strongly_see(
        &mut self,
        x: &CryptoHash,
        y: &CryptoHash,
        peers: &PeerSet,
    ) -> Result<bool, Error> {
        let key = (*x, *y, peers.hash()?);
        if let Some(cached) = self.strongly_see_cache.get(&key) {
            return Ok(*cached);
        }

        let table = self.last_ancestors(x)?;
        let mut count = 0;
        for peer in peers.peers() {
            if let Some(entry) = table.get(&peer.pub_key) {
                let intermediate = entry.hash;
                if self.see(&intermediate, y)? {
                    count += 1;
                }
            }
        }
        let result = count >= peers.super_majority();
        self.strongly_see_cache.insert(key, result);
        Ok(result)
    }

    /// The stored event for `hash`, exposed for the driver and tests.
    pub fn get_event(&self, hash: &CryptoHash) -> Result<Event, Error> {
        self.store.get_event(hash)
    }
}
