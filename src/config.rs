/*
    Copyright © 2024, the hashgraph_rs contributors
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of the consensus core, as specified by the operator.

/// Configuration of a [`Hashgraph`](crate::hashgraph::Hashgraph) and the
/// [`Core`](crate::core::Core) that drives it.
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Initial capacity of the ancestry memoization caches.
    pub cache_size: usize,

    /// Every `coin_round_frequency`-th voting round of virtual voting is a coin round, in which
    /// witnesses that fail to observe a super-majority vote with a deterministic pseudo-coin.
    ///
    /// Deciding fame is forbidden on a coin round even when a super-majority is reached there;
    /// a decision can only be made on the following non-coin rounds.
    pub coin_round_frequency: i64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            cache_size: 5_000,
            coin_round_frequency: 10,
        }
    }
}
