/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the data types that make up the hashgraph: passive newtypes, cryptographic
//! primitives, the event vertex and its wire form, peers and peer sets, payload transactions,
//! and the synthetic roots that stand in for truncated history.

pub mod basic;

pub mod crypto_primitives;

pub mod event;

pub mod peer_set;

pub mod root;

pub mod transactions;
