/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The synthetic starting point of a participant's event chain.
//!
//! When a node holds full history, every event's parents resolve to real events. After a
//! [reset](crate::hashgraph::Hashgraph::reset) truncates history at a frame, the events below
//! the horizon are gone, and the events just above it need something to attach to. A [`Root`]
//! stands in for the discarded history of one participant: it describes the participant's last
//! event below the horizon (the `self_parent`), and carries a table of descriptors for the
//! other-parents that fell below the horizon, keyed by the hash of the event that references
//! them.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::{CryptoHash, EventIndex, LamportTime, PeerId, Round};
use super::crypto_primitives::CryptoHasher;

/// Descriptor of an event that is referenced from above a reset horizon but no longer exists in
/// the store: just enough of its consensus coordinates to let round, Lamport-timestamp, and
/// ancestry computations proceed without it.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct RootEvent {
    pub hash: CryptoHash,
    pub creator_id: PeerId,
    pub index: EventIndex,
    pub lamport_timestamp: LamportTime,
    pub round: Round,
}

impl RootEvent {
    /// The descriptor of the imaginary event below a participant's first-ever event: index -1,
    /// round -1, Lamport timestamp -1, with a hash derived from the participant's id.
    pub fn base(creator_id: PeerId) -> RootEvent {
        use sha2::Digest;
        let mut hasher = CryptoHasher::new();
        hasher.update(b"base-root");
        hasher.update(creator_id.int().to_le_bytes());
        RootEvent {
            hash: CryptoHash::new(hasher.finalize().into()),
            creator_id,
            index: EventIndex::new(-1),
            lamport_timestamp: LamportTime::new(-1),
            round: Round::new(-1),
        }
    }
}

/// Per-participant anchor used when genuine parents have been discarded.
///
/// `next_round` is the round assigned to an event sitting directly on this root, when the
/// root is authoritative for it (its other-parent is absent or also described by the root).
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Root {
    pub next_round: Round,
    pub self_parent: RootEvent,
    /// Descriptors of below-horizon other-parents, keyed by the hash of the event that
    /// references them.
    pub others: BTreeMap<CryptoHash, RootEvent>,
}

impl Root {
    /// The root a participant starts from when it has no discarded history: a base
    /// [`RootEvent`] and `next_round` 0.
    pub fn base(creator_id: PeerId) -> Root {
        Root {
            next_round: Round::new(0),
            self_parent: RootEvent::base(creator_id),
            others: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_root_sentinels() {
        let root = Root::base(PeerId::new(42));
        assert_eq!(root.next_round, Round::new(0));
        assert_eq!(root.self_parent.index, EventIndex::new(-1));
        assert_eq!(root.self_parent.lamport_timestamp, LamportTime::new(-1));
        assert_eq!(root.self_parent.round, Round::new(-1));
        assert!(root.others.is_empty());
    }

    #[test]
    fn base_root_hash_depends_on_id() {
        let a = RootEvent::base(PeerId::new(1));
        let b = RootEvent::base(PeerId::new(2));
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.hash, RootEvent::base(PeerId::new(1)).hash);
    }
}
