/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust implementation of the hashgraph consensus algorithm: a leaderless, asynchronous,
//! Byzantine fault tolerant engine that turns a gossiped graph of signed events into a totally
//! ordered sequence of finalized blocks.
//!
//! ## What this crate is
//!
//! This crate is the *consensus core* only. It accepts a continuous inflow of signed
//! [events](crate::types::event::Event) contributed by a dynamic set of participants, links
//! them into the [hashgraph](crate::hashgraph::Hashgraph), and deterministically derives
//! consensus from the graph's shape alone ("virtual voting" — no extra voting messages are
//! exchanged). Finality is deterministic: once a super-majority of a round's witnesses have
//! their fame decided, the ordering of the affected events never changes.
//!
//! Gossip transport, RPC endpoints, the node-level sync loop, key generation, and persistent
//! storage backends are external collaborators. Storage is reached through the
//! [`Store`](crate::store::Store) trait (an in-memory implementation
//! [ships with the crate](crate::store::InmemStore)), and finalized
//! [blocks](crate::hashgraph::Block) are handed to the application through a bounded channel
//! that applies back-pressure to the consensus driver.
//!
//! ## Using it
//!
//! Embedders construct a [`Core`](crate::core::Core) around a store initialized with the
//! genesis [`PeerSet`](crate::types::peer_set::PeerSet), feed it synced events, and invoke
//! [`Core::run_consensus`](crate::core::Core::run_consensus) periodically. Nodes joining late
//! bootstrap with [`Core::fast_forward`](crate::core::Core::fast_forward) from a trusted block
//! and its [`Frame`](crate::hashgraph::Frame).

pub mod config;

pub mod core;

pub mod error;

pub mod hashgraph;

pub mod logging;

pub mod store;

pub mod types;
