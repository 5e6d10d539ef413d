/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The error kinds reported by the consensus core.
//!
//! Every fallible operation in the crate returns one of the kinds below; a missing value is
//! always an explicit [`NotFound`](Error::NotFound), never a nil-ish sentinel. Phase methods
//! return on the first error they encounter. [`UnknownParent`](Error::UnknownParent) during sync
//! is recoverable by the caller (fetch the parent and retry);
//! [`Equivocation`](Error::Equivocation) and [`BadSignature`](Error::BadSignature) are permanent
//! for the offending event; [`Internal`](Error::Internal) means an invariant was violated and
//! the driver should halt.

use std::fmt::{self, Display, Formatter};

use crate::types::basic::{BlockNumber, CryptoHash, EventIndex, PeerId, PubKeyBytes, Round};

#[derive(Debug)]
pub enum Error {
    /// A referenced parent event is not in the store and is not covered by the creator's root.
    UnknownParent(CryptoHash),
    /// The event's creator is not in the repertoire (the union of all peers ever seen).
    UnknownCreator(PubKeyBytes),
    /// The event's signature does not verify under its claimed creator.
    BadSignature,
    /// A second event by the same creator at an index that is already occupied.
    Equivocation {
        creator: PubKeyBytes,
        index: EventIndex,
    },
    /// The self-parent does not belong to the event's creator at the preceding index.
    SelfParentMismatch {
        creator: PubKeyBytes,
        index: EventIndex,
    },
    /// An operation required a decided round that is not decided yet.
    RoundNotDecided(Round),
    /// A value the store was asked for does not exist.
    NotFound(Item),
    /// A frame's recomputed hash does not match the hash committed in its block.
    FrameHashMismatch,
    /// A trusted block does not carry a super-majority of valid signatures.
    InsufficientSignatures { got: usize, need: usize },
    /// The storage backend failed.
    StoreIO(String),
    /// An internal invariant was violated. Halts the driver.
    Internal(String),
}

/// The kinds of value a [`NotFound`](Error::NotFound) can refer to.
#[derive(Debug)]
pub enum Item {
    Event(CryptoHash),
    ParticipantEvent(PubKeyBytes, EventIndex),
    LastEvent(PubKeyBytes),
    Root(PubKeyBytes),
    RoundCreated(Round),
    RoundReceived(Round),
    Block(BlockNumber),
    Frame(Round),
    PeerSet(Round),
    Peer(PubKeyBytes),
    PeerById(PeerId),
}

impl Error {
    /// Whether this error merely reports an absent value, which many phases treat as "nothing to
    /// do yet" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownParent(hash) => write!(f, "unknown parent {}", hash),
            Error::UnknownCreator(pk) => {
                write!(f, "unknown creator {}", crate::logging::short_hash(pk))
            }
            Error::BadSignature => write!(f, "bad event signature"),
            Error::Equivocation { creator, index } => write!(
                f,
                "equivocation: second event by {} at index {}",
                crate::logging::short_hash(creator),
                index
            ),
            Error::SelfParentMismatch { creator, index } => write!(
                f,
                "self-parent mismatch for event by {} at index {}",
                crate::logging::short_hash(creator),
                index
            ),
            Error::RoundNotDecided(round) => write!(f, "round {} is not decided", round),
            Error::NotFound(item) => write!(f, "not found: {}", item),
            Error::FrameHashMismatch => write!(f, "frame hash does not match block"),
            Error::InsufficientSignatures { got, need } => {
                write!(f, "insufficient block signatures: {} of {} required", got, need)
            }
            Error::StoreIO(msg) => write!(f, "store error: {}", msg),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl Display for Item {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Item::Event(hash) => write!(f, "event {}", hash),
            Item::ParticipantEvent(pk, index) => write!(
                f,
                "event at index {} by participant {}",
                index,
                crate::logging::short_hash(pk)
            ),
            Item::LastEvent(pk) => {
                write!(f, "last event of participant {}", crate::logging::short_hash(pk))
            }
            Item::Root(pk) => write!(f, "root of participant {}", crate::logging::short_hash(pk)),
            Item::RoundCreated(round) => write!(f, "round {} (created)", round),
            Item::RoundReceived(round) => write!(f, "round {} (received)", round),
            Item::Block(index) => write!(f, "block {}", index),
            Item::Frame(round) => write!(f, "frame for round {}", round),
            Item::PeerSet(round) => write!(f, "peer set for round {}", round),
            Item::Peer(pk) => write!(f, "peer {}", crate::logging::short_hash(pk)),
            Item::PeerById(id) => write!(f, "peer with id {}", id),
        }
    }
}

impl std::error::Error for Error {}
