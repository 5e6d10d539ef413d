/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or small integers, and do not have any major "active"
//! behavior.
//!
//! Several of the integer newtypes in this module wrap an `i64` rather than a `u64`. This is
//! because the synthetic [root](crate::types::root::Root) that anchors every participant's event
//! chain sits *below* the first real event, at index -1, round -1, and Lamport timestamp -1. All
//! consensus arithmetic starts from these sentinels.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Bytes of an Ed25519 public key, used wherever a participant identity needs to be stored,
/// serialized, or used as an ordered map key.
///
/// Conversion into an [`ed25519_dalek::VerifyingKey`] happens only at the signature-verification
/// boundary, and is fallible there.
pub type PubKeyBytes = [u8; 32];

/// Consensus round number. Starts at 0; the synthetic roots sit at round -1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Round(i64);

impl Round {
    /// Create a new `Round` wrapping `int`.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the inner `i64` value of this `Round`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i64> for Round {
    type Output = Round;
    fn add(self, rhs: i64) -> Self::Output {
        Round(self.0 + rhs)
    }
}

impl AddAssign<i64> for Round {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs
    }
}

/// Per-creator event sequence number. The first event of every participant has index 0; the
/// participant's root sits at index -1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct EventIndex(i64);

impl EventIndex {
    /// Create a new `EventIndex` wrapping `int`.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the inner `i64` value of this `EventIndex`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for EventIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i64> for EventIndex {
    type Output = EventIndex;
    fn add(self, rhs: i64) -> Self::Output {
        EventIndex(self.0 + rhs)
    }
}

/// Logical (Lamport) timestamp of an event: `1 + max(lamport(self_parent),
/// lamport(other_parent))`, with roots contributing -1 so that first events start at 0.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct LamportTime(i64);

impl LamportTime {
    /// Create a new `LamportTime` wrapping `int`.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the inner `i64` value of this `LamportTime`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for LamportTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i64> for LamportTime {
    type Output = LamportTime;
    fn add(self, rhs: i64) -> Self::Output {
        LamportTime(self.0 + rhs)
    }
}

/// Wall-clock timestamp of an event in nanoseconds since the Unix Epoch, as claimed by its
/// creator.
///
/// Individual timestamps are untrusted. They only enter consensus through the *median* of the
/// timestamps contributed by the famous witnesses of the deciding round, which bounds the
/// influence any single creator has over the consensus timestamp of an event.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a new `Timestamp` wrapping `unix_nanos`.
    pub const fn new(unix_nanos: i64) -> Self {
        Self(unix_nanos)
    }

    /// Get the inner `i64` value of this `Timestamp`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

/// Index of a block in the committed blockchain. Starts at 0; an empty chain is represented by a
/// last block index of -1.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockNumber(i64);

impl BlockNumber {
    /// Create a new `BlockNumber` wrapping `int`.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the inner `i64` value of this `BlockNumber`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for BlockNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i64> for BlockNumber {
    type Output = BlockNumber;
    fn add(self, rhs: i64) -> Self::Output {
        BlockNumber(self.0 + rhs)
    }
}

/// Numeric identifier of a peer, derived deterministically from its public key by
/// [`PeerId::from_pub_key`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct PeerId(u32);

impl PeerId {
    /// Create a new `PeerId` wrapping `int`.
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    /// Derive the `PeerId` of the participant with the given public key: the first four bytes of
    /// the SHA256 digest of the key, interpreted little-endian.
    pub fn from_pub_key(pub_key: &PubKeyBytes) -> PeerId {
        use sha2::Digest;
        let digest = sha2::Sha256::digest(pub_key);
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        PeerId(u32::from_le_bytes(bytes))
    }

    /// Get the inner `u32` value of this `PeerId`.
    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Node-local insertion order of an event. Monotonically increasing per store, never part of any
/// hash or serialized form: two nodes holding the same graph may disagree on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TopologicalIndex(u64);

impl TopologicalIndex {
    /// Create a new `TopologicalIndex` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `TopologicalIndex`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// 32-byte cryptographic hash.
///
/// Within this crate, `CryptoHash`-es are always SHA256 digests of the canonical Borsh
/// serialization of the hashed value.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize, Default,
)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::logging::short_hash(&self.0))
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoHash({})", crate::logging::short_hash(&self.0))
    }
}

/// Ed25519 digital signature bytes.
///
/// Produced using the [`ed25519_dalek`] crate, whose main definitions are re-exported from the
/// [`crypto_primitives`](super::crypto_primitives) module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }

    /// The "middle bit" of the signature, used as a deterministic pseudo-coin during coin rounds
    /// of virtual voting. Deterministic but biased in theory; retained for protocol
    /// compatibility, not cryptographic strength.
    pub fn middle_bit(&self) -> bool {
        self.0[32] & 0x01 != 0
    }

    /// The signature bytes XOR-ed with a single byte derived from `round`. Used as the last
    /// tie-break when ordering the events received in `round`, so that a creator cannot pick its
    /// position in every round at event-creation time.
    pub fn whitened(&self, round: Round) -> [u8; 64] {
        let mask = round
            .int()
            .to_le_bytes()
            .iter()
            .fold(0u8, |acc, b| acc ^ b);
        let mut out = self.0;
        for b in out.iter_mut() {
            *b ^= mask;
        }
        out
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", crate::logging::short_hash(&self.0))
    }
}

impl Default for SignatureBytes {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

/// Three-valued fame state of a witness: `Undefined` until virtual voting decides, then latched
/// to `True` or `False`.
///
/// The wire encoding is `0 = Undefined, 1 = True, 2 = False`, which is exactly the order of the
/// variants below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize, Default)]
pub enum Trilean {
    #[default]
    Undefined,
    True,
    False,
}

impl Display for Trilean {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Trilean::Undefined => write!(f, "Undefined"),
            Trilean::True => write!(f, "True"),
            Trilean::False => write!(f, "False"),
        }
    }
}
