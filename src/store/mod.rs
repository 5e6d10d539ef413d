/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the [`Store`] trait, which specifies the persistence interface the consensus core
//! requires, and provides [`InmemStore`], a volatile implementation of it.
//!
//! The consensus core owns its store exclusively and drives it from a single thread; `Store`
//! implementations do not need to be internally synchronized, but each individual write must be
//! atomic so that an interrupted consensus phase can be re-run from the stored state.

mod inmem;

pub use inmem::InmemStore;

use std::collections::BTreeMap;

use crate::error::Error;
use crate::hashgraph::{Block, Frame, RoundCreated, RoundReceived};
use crate::types::{
    basic::{BlockNumber, CryptoHash, EventIndex, PeerId, PubKeyBytes, Round},
    event::Event,
    peer_set::{Peer, PeerSet},
    root::Root,
};

/// The persistence operations the consensus core requires.
///
/// Every getter returns an explicit [`Error::NotFound`] when the requested value does not
/// exist; callers that treat absence as "nothing yet" test for it with
/// [`Error::is_not_found`].
pub trait Store {
    /* ↓↓↓ Peer sets ↓↓↓ */

    /// Get the peer set effective at `round`: the one pinned at the greatest round `<= round`.
    /// Queries beneath the earliest pin (which only happen below a reset horizon) resolve to the
    /// earliest pin.
    fn get_peer_set(&self, round: Round) -> Result<PeerSet, Error>;

    /// Get the most recently pinned peer set.
    fn get_last_peer_set(&self) -> Result<PeerSet, Error>;

    /// Pin `peer_set` as effective from `round` on. Peers never seen before join the
    /// repertoire and receive a base root.
    fn set_peer_set(&mut self, round: Round, peer_set: PeerSet) -> Result<(), Error>;

    /// All peers ever seen across all pinned peer sets, keyed by public key.
    fn repertoire_by_pub_key(&self) -> BTreeMap<PubKeyBytes, Peer>;

    /// All peers ever seen across all pinned peer sets, keyed by numeric id.
    fn repertoire_by_id(&self) -> BTreeMap<PeerId, Peer>;

    /* ↓↓↓ Events ↓↓↓ */

    fn get_event(&self, hash: &CryptoHash) -> Result<Event, Error>;

    /// Insert or update an event. On first insertion the store assigns the event the next
    /// topological index and appends it to its creator's ordered event list.
    fn set_event(&mut self, event: Event) -> Result<(), Error>;

    /// The hashes of `participant`'s events with index strictly greater than `from`, in index
    /// order. `from = -1` returns the whole chain.
    fn participant_events(
        &self,
        participant: &PubKeyBytes,
        from: EventIndex,
    ) -> Result<Vec<CryptoHash>, Error>;

    /// The hash of `participant`'s event at exactly `index`.
    fn participant_event(
        &self,
        participant: &PubKeyBytes,
        index: EventIndex,
    ) -> Result<CryptoHash, Error>;

    /// The hash of `participant`'s latest event, with a flag that is true when the participant
    /// has no events and the returned hash is its root's self-parent hash.
    fn last_event_from(&self, participant: &PubKeyBytes) -> Result<(CryptoHash, bool), Error>;

    /// The last known event index of every peer in the repertoire; -1 for peers with no events.
    fn known_events(&self) -> BTreeMap<PeerId, EventIndex>;

    /* ↓↓↓ Consensus events ↓↓↓ */

    /// The hashes of events that have reached consensus, in consensus order.
    fn consensus_events(&self) -> Vec<CryptoHash>;

    fn consensus_events_count(&self) -> usize;

    fn add_consensus_event(&mut self, event: &Event) -> Result<(), Error>;

    /* ↓↓↓ Rounds ↓↓↓ */

    fn get_round_created(&self, round: Round) -> Result<RoundCreated, Error>;

    fn set_round_created(&mut self, round: Round, round_created: RoundCreated) -> Result<(), Error>;

    fn get_round_received(&self, round: Round) -> Result<RoundReceived, Error>;

    fn set_round_received(
        &mut self,
        round: Round,
        round_received: RoundReceived,
    ) -> Result<(), Error>;

    /// The greatest round with a `RoundCreated` entry; -1 when there is none.
    fn last_round(&self) -> Round;

    /// The witnesses of `round`, in hash order; empty when the round does not exist.
    fn round_witnesses(&self, round: Round) -> Vec<CryptoHash>;

    /// The number of events created in `round`.
    fn round_events_count(&self, round: Round) -> usize;

    /* ↓↓↓ Roots ↓↓↓ */

    fn get_root(&self, participant: &PubKeyBytes) -> Result<Root, Error>;

    /* ↓↓↓ Blocks and frames ↓↓↓ */

    fn get_block(&self, index: BlockNumber) -> Result<Block, Error>;

    fn set_block(&mut self, block: Block) -> Result<(), Error>;

    /// The index of the latest block; -1 when there is none.
    fn last_block_index(&self) -> BlockNumber;

    fn get_frame(&self, round: Round) -> Result<Frame, Error>;

    fn set_frame(&mut self, frame: Frame) -> Result<(), Error>;

    /* ↓↓↓ Lifecycle ↓↓↓ */

    /// Discard all event, round, and frame state, install the frame's roots and peer set, and
    /// leave the store ready for the frame's events to be replayed into it. Blocks below the
    /// frame's round are discarded too.
    fn reset(&mut self, frame: &Frame) -> Result<(), Error>;

    /// Whether the store was loaded from pre-existing state, in which case the driver must
    /// replay it through the consensus phases before accepting new events.
    fn need_bootstrap(&self) -> bool;
}
