/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::{crypto_primitives::Hasher, data_types::CryptoHash, ledger::AccumulatorState};

use super::{LedgerAccumulator, LedgerAccumulatorVerifier};

/// Accumulator and verifier that hash `parent_hash || item_id` with a [`Hasher`].
#[derive(Clone, Debug, Default)]
pub struct SimpleLedgerAccumulatorAndVerifier<H: Hasher> {
    hasher: H,
}

impl<H: Hasher> SimpleLedgerAccumulatorAndVerifier<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }
}

impl<H: Hasher> LedgerAccumulator for SimpleLedgerAccumulatorAndVerifier<H> {
    fn accumulate(&self, parent: &AccumulatorState, item_id: &CryptoHash) -> AccumulatorState {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&parent.accumulator_hash().bytes());
        bytes.extend_from_slice(&item_id.bytes());
        AccumulatorState::new(parent.state_version() + 1, self.hasher.hash_bytes(&bytes))
    }
}

impl<H: Hasher> LedgerAccumulatorVerifier for SimpleLedgerAccumulatorAndVerifier<H> {
    fn verify(
        &self,
        start: &AccumulatorState,
        hashes: &[CryptoHash],
        end: &AccumulatorState,
    ) -> bool {
        let folded = hashes
            .iter()
            .fold(*start, |state, hash| self.accumulate(&state, hash));
        &folded == end
    }

    fn verify_and_get_extension<T: Clone>(
        &self,
        current: &AccumulatorState,
        candidates: &[T],
        id_of: impl Fn(&T) -> CryptoHash,
        target: &AccumulatorState,
    ) -> Option<Vec<T>> {
        if current.state_version() > target.state_version() {
            return None;
        }

        let extension_len = target.state_version() - current.state_version();
        if extension_len > candidates.len() as u64 {
            return None;
        }

        let extension = &candidates[candidates.len() - extension_len as usize..];
        let hashes: Vec<CryptoHash> = extension.iter().map(&id_of).collect();
        if self.verify(current, &hashes, target) {
            Some(extension.to_vec())
        } else {
            None
        }
    }
}
