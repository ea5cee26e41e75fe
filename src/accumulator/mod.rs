/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ledger accumulator: an order-sensitive hash chain over the identifiers of committed transactions.
//!
//! Folding a transaction id `id` into an [`AccumulatorState`] `s` yields a state whose `state_version` is
//! `s.state_version + 1` and whose `accumulator_hash` is `H(s.accumulator_hash || id)`. Two nodes that
//! agree on an accumulator state therefore agree on the exact sequence of transactions committed before
//! it.
//!
//! The [`LedgerAccumulatorVerifier`] checks that a candidate sequence of transactions is a valid
//! extension from one accumulator state to another. The ledger uses it both when preparing a vertex on
//! top of uncommitted ancestors, and when committing a quorum-certified proof.

pub mod implementation;

pub use implementation::SimpleLedgerAccumulatorAndVerifier;

use crate::types::{data_types::CryptoHash, ledger::AccumulatorState};

/// Folds transaction ids into accumulator states.
pub trait LedgerAccumulator: Send + Sync {
    fn accumulate(&self, parent: &AccumulatorState, item_id: &CryptoHash) -> AccumulatorState;
}

/// Checks whether sequences of transactions extend one accumulator state into another.
pub trait LedgerAccumulatorVerifier: Send + Sync {
    /// Check that folding `hashes` into `start` yields `end`.
    fn verify(&self, start: &AccumulatorState, hashes: &[CryptoHash], end: &AccumulatorState)
        -> bool;

    /// Find the suffix of `candidates` that extends `current` into `target`.
    ///
    /// Returns `None` if `target` is behind `current`, if there are fewer candidates than the versions
    /// between the two states, or if the suffix does not land exactly on `target`. If `current` and
    /// `target` are equal, the extension is empty.
    fn verify_and_get_extension<T: Clone>(
        &self,
        current: &AccumulatorState,
        candidates: &[T],
        id_of: impl Fn(&T) -> CryptoHash,
        target: &AccumulatorState,
    ) -> Option<Vec<T>>
    where
        Self: Sized;
}
