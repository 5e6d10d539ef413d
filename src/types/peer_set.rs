/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that store information about the participants of the hashgraph and the voting
//! thresholds derived from them.

use std::fmt::{self, Debug, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::{Error, Item};

use super::{
    basic::{CryptoHash, PeerId, PubKeyBytes, Round},
    crypto_primitives::CryptoHasher,
};

/// A single participant: a stable numeric id derived from its public key, the public key itself,
/// and a network hint that the transport layer is free to interpret.
#[derive(Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Peer {
    pub id: PeerId,
    pub pub_key: PubKeyBytes,
    pub address: String,
}

impl Peer {
    /// Create a new `Peer`, deriving its id from `pub_key`.
    pub fn new(pub_key: PubKeyBytes, address: String) -> Peer {
        Peer {
            id: PeerId::from_pub_key(&pub_key),
            pub_key,
            address,
        }
    }
}

impl Debug for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peer({}, {})",
            self.id,
            crate::logging::short_hash(&self.pub_key)
        )
    }
}

/// An immutable snapshot of the participants active at some range of rounds.
///
/// ## Ordering of peers
///
/// `PeerSet` internally maintains the list of peers in ascending order of their public-key
/// bytes. Every iteration over a peer set walks this order, so anything derived from one (its
/// content hash in particular) is independent of the order in which peers were supplied.
///
/// ## Immutability
///
/// Membership changes never mutate a `PeerSet`; [`with_new_peer`](Self::with_new_peer) and
/// [`with_removed_peer`](Self::with_removed_peer) derive a new snapshot instead. The store pins
/// one snapshot per round at which membership changed, and resolves the peer set of any round by
/// floor lookup.
#[derive(Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct PeerSet {
    // Kept in ascending order of public-key bytes.
    peers: Vec<Peer>,
}

impl PeerSet {
    /// Create a new `PeerSet` containing `peers`, in canonical order.
    pub fn new(mut peers: Vec<Peer>) -> PeerSet {
        peers.sort_by(|a, b| a.pub_key.cmp(&b.pub_key));
        peers.dedup_by(|a, b| a.pub_key == b.pub_key);
        PeerSet { peers }
    }

    /// Derive the `PeerSet` obtained by adding `peer` to this one. If a peer with the same public
    /// key is already a member, the existing membership is kept.
    pub fn with_new_peer(&self, peer: Peer) -> PeerSet {
        let mut peers = self.peers.clone();
        if !self.contains(&peer.pub_key) {
            let pos = peers
                .binary_search_by(|p| p.pub_key.cmp(&peer.pub_key))
                .unwrap_err();
            peers.insert(pos, peer);
        }
        PeerSet { peers }
    }

    /// Derive the `PeerSet` obtained by removing the peer with `pub_key` from this one.
    pub fn with_removed_peer(&self, pub_key: &PubKeyBytes) -> PeerSet {
        let peers = self
            .peers
            .iter()
            .filter(|p| &p.pub_key != pub_key)
            .cloned()
            .collect();
        PeerSet { peers }
    }

    /// Get an iterator over the peers in ascending order of public-key bytes.
    pub fn peers(&self) -> std::slice::Iter<'_, Peer> {
        self.peers.iter()
    }

    /// Get the number of peers in this `PeerSet`.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check whether the peer set is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Check whether the peer with `pub_key` is a member of this `PeerSet`.
    pub fn contains(&self, pub_key: &PubKeyBytes) -> bool {
        self.by_pub_key(pub_key).is_some()
    }

    /// Get the member with the given public key, if any.
    pub fn by_pub_key(&self, pub_key: &PubKeyBytes) -> Option<&Peer> {
        self.peers
            .binary_search_by(|p| p.pub_key.cmp(pub_key))
            .ok()
            .map(|pos| &self.peers[pos])
    }

    /// Get the member with the given numeric id, if any.
    pub fn by_id(&self, id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// The minimum number of members whose agreement decides for the whole set: `2n/3 + 1`.
    ///
    /// With at most `trust_count` Byzantine members, two conflicting super-majorities cannot
    /// both form.
    pub fn super_majority(&self) -> usize {
        2 * self.peers.len() / 3 + 1
    }

    /// The maximum number of Byzantine members the set tolerates: `(n - 1) / 3`.
    pub fn trust_count(&self) -> usize {
        if self.peers.is_empty() {
            0
        } else {
            (self.peers.len() - 1) / 3
        }
    }

    /// The canonical content hash of this `PeerSet`: the SHA256 digest of its Borsh form, which
    /// covers the peers in canonical order.
    pub fn hash(&self) -> Result<CryptoHash, Error> {
        use sha2::Digest;
        let bytes = self
            .try_to_vec()
            .map_err(|_| Error::Internal("peer set serialization failed".to_string()))?;
        Ok(CryptoHash::new(CryptoHasher::digest(&bytes).into()))
    }
}

impl Debug for PeerSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.peers.iter()).finish()
    }
}

/// Look up a peer in an iterator of `(round, PeerSet)` pins, tolerating absence.
///
/// This is a convenience for store implementations; see
/// [`Store::get_peer_set`](crate::store::Store::get_peer_set) for the floor-lookup contract.
pub fn floor_peer_set<'a, I>(pins: I, round: Round) -> Result<&'a PeerSet, Error>
where
    I: IntoIterator<Item = (&'a Round, &'a PeerSet)>,
{
    let mut floor: Option<&PeerSet> = None;
    let mut earliest: Option<&PeerSet> = None;
    for (r, ps) in pins {
        if earliest.is_none() {
            earliest = Some(ps);
        }
        if *r <= round {
            floor = Some(ps);
        } else {
            break;
        }
    }
    // A query below the earliest pin falls back to the earliest pin; this only happens for
    // rounds beneath a reset horizon.
    floor
        .or(earliest)
        .ok_or(Error::NotFound(Item::PeerSet(round)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(byte: u8) -> Peer {
        Peer::new([byte; 32], String::new())
    }

    #[test]
    fn thresholds() {
        let ps = PeerSet::new(vec![peer(1), peer(2), peer(3)]);
        assert_eq!(ps.super_majority(), 3);
        assert_eq!(ps.trust_count(), 0);

        let ps = ps.with_new_peer(peer(4));
        assert_eq!(ps.len(), 4);
        assert_eq!(ps.super_majority(), 3);
        assert_eq!(ps.trust_count(), 1);

        let ps = PeerSet::new((1..=7).map(peer).collect());
        assert_eq!(ps.super_majority(), 5);
        assert_eq!(ps.trust_count(), 2);
    }

    #[test]
    fn hash_is_order_independent() {
        let a = PeerSet::new(vec![peer(1), peer(2), peer(3)]);
        let b = PeerSet::new(vec![peer(3), peer(1), peer(2)]);
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());

        let c = a.with_removed_peer(&[2u8; 32]);
        assert_ne!(a.hash().unwrap(), c.hash().unwrap());
    }

    #[test]
    fn membership_changes_do_not_mutate() {
        let a = PeerSet::new(vec![peer(1), peer(2)]);
        let b = a.with_new_peer(peer(3));
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
        assert!(b.contains(&[3u8; 32]));
        assert!(!a.contains(&[3u8; 32]));
    }
}
