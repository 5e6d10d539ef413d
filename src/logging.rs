/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Helpers for the log lines emitted by the consensus phases.
//!
//! hashgraph_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these
//! messages printed onto a terminal or into a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values). The first value is always the name of the
//! phase or occurrence in PascalCase (defined in this module as constants); the remaining values
//! identify the affected rounds, events, or blocks. Hashes and public keys are rendered as the
//! first seven characters of their Base64 encoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

// Names of each occurrence in PascalCase for printing:
pub const INSERT_EVENT: &str = "InsertEvent";
pub const DIVIDE_ROUNDS: &str = "DivideRounds";
pub const DECIDE_FAME: &str = "DecideFame";
pub const DECIDE_ROUND_RECEIVED: &str = "DecideRoundReceived";
pub const PROCESS_DECIDED_ROUNDS: &str = "ProcessDecidedRounds";
pub const PROCESS_SIG_POOL: &str = "ProcessSigPool";
pub const NEW_BLOCK: &str = "NewBlock";
pub const PIN_PEER_SET: &str = "PinPeerSet";
pub const RESET: &str = "Reset";
pub const FAST_FORWARD: &str = "FastForward";

/// Get a more readable representation of a byte sequence by Base64-encoding it and taking the
/// first 7 characters.
pub fn short_hash(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}
