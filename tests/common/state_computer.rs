/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Mock implementations of the ledger's pluggable collaborators.
//!
//! Every mock is cheaply `Clone`-able and shares its recorded state between clones, so a test can keep
//! one clone to inspect after moving another into the ledger.

use std::sync::{Arc, Mutex, MutexGuard};

use hotstuff_ledger::ledger::{
    StateComputer, StateComputerError, StateComputerResult, TimeSupplier, VertexStoreState,
};
use hotstuff_ledger::safety::{PersistentSafetyStateStore, SafetyState};
use hotstuff_ledger::types::{
    data_types::{CryptoHash, Txn, VerifyingKeyBytes},
    ledger::VerifiedTxnsAndProof,
    validator_set::ValidatorSet,
    vertex::{FailedTxn, PreparedTxn, PreparedVertex, Vertex},
};

/// Payloads starting with this prefix fail to execute.
pub(crate) const BAD_TXN_PREFIX: &[u8] = b"bad";

pub(crate) struct PrepareCall {
    pub(crate) previous: Vec<Txn>,
    pub(crate) vertex: CryptoHash,
    pub(crate) timestamp: u64,
}

pub(crate) struct CommitCall {
    pub(crate) txns_and_proof: VerifiedTxnsAndProof,
    pub(crate) from_bft: bool,
}

#[derive(Default)]
pub(crate) struct Recorded {
    pub(crate) mempool: Vec<(Txn, Option<VerifyingKeyBytes>)>,
    pub(crate) prepare_calls: Vec<PrepareCall>,
    pub(crate) commit_calls: Vec<CommitCall>,
}

/// A [`StateComputer`] that executes every transaction that does not start with [`BAD_TXN_PREFIX`],
/// and records every call it receives.
#[derive(Clone, Default)]
pub(crate) struct RecordingStateComputer {
    recorded: Arc<Mutex<Recorded>>,
    next_validator_set: Arc<Mutex<Option<ValidatorSet>>>,
    fail_commits: Arc<Mutex<bool>>,
}

impl RecordingStateComputer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn recorded(&self) -> MutexGuard<Recorded> {
        self.recorded.lock().unwrap()
    }

    /// Make every following `prepare` end the epoch with `validator_set`.
    pub(crate) fn end_epoch_with(&self, validator_set: ValidatorSet) {
        *self.next_validator_set.lock().unwrap() = Some(validator_set);
    }

    pub(crate) fn fail_commits(&self, fail: bool) {
        *self.fail_commits.lock().unwrap() = fail;
    }
}

impl StateComputer for RecordingStateComputer {
    fn add_to_mempool(&mut self, txn: Txn, origin: Option<VerifyingKeyBytes>) {
        self.recorded().mempool.push((txn, origin));
    }

    fn next_txns_from_mempool(&mut self, prepared: &[PreparedVertex]) -> Vec<Txn> {
        let already_prepared: Vec<&Txn> = prepared
            .iter()
            .flat_map(|vertex| vertex.vertex().txns())
            .collect();
        self.recorded()
            .mempool
            .iter()
            .map(|(txn, _)| txn.clone())
            .filter(|txn| !already_prepared.contains(&txn))
            .collect()
    }

    fn prepare(
        &mut self,
        previous: &[PreparedTxn],
        vertex: &Vertex,
        timestamp: u64,
    ) -> StateComputerResult {
        self.recorded().prepare_calls.push(PrepareCall {
            previous: previous.iter().map(|p| p.txn().clone()).collect(),
            vertex: vertex.id(),
            timestamp,
        });

        let (bad, good): (Vec<&Txn>, Vec<&Txn>) = vertex
            .txns()
            .iter()
            .partition(|txn| txn.payload().starts_with(BAD_TXN_PREFIX));

        StateComputerResult::new(
            good.into_iter()
                .map(|txn| PreparedTxn::new(txn.clone(), Vec::new()))
                .collect(),
            bad.into_iter()
                .map(|txn| FailedTxn::new(txn.clone(), String::from("rejected")))
                .collect(),
            self.next_validator_set.lock().unwrap().clone(),
        )
    }

    fn commit(
        &mut self,
        txns_and_proof: &VerifiedTxnsAndProof,
        vertex_store_state: Option<&VertexStoreState>,
    ) -> Result<(), StateComputerError> {
        if *self.fail_commits.lock().unwrap() {
            return Err(StateComputerError::CommitFailed {
                reason: String::from("disk full"),
            });
        }

        self.recorded().commit_calls.push(CommitCall {
            txns_and_proof: txns_and_proof.clone(),
            from_bft: vertex_store_state.is_some(),
        });
        Ok(())
    }
}

/// A [`TimeSupplier`] that always tells the same time.
#[derive(Clone, Copy)]
pub(crate) struct FixedTimeSupplier(pub(crate) u64);

impl TimeSupplier for FixedTimeSupplier {
    fn current_time(&self) -> u64 {
        self.0
    }
}

/// A [`PersistentSafetyStateStore`] that remembers every state committed to it.
#[derive(Clone, Default)]
pub(crate) struct SharedSafetyStateStore(Arc<Mutex<Vec<SafetyState>>>);

impl SharedSafetyStateStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn committed(&self) -> Vec<SafetyState> {
        self.0.lock().unwrap().clone()
    }
}

impl PersistentSafetyStateStore for SharedSafetyStateStore {
    fn commit_state(&mut self, state: &SafetyState) {
        self.0.lock().unwrap().push(state.clone());
    }

    fn last_state(&self) -> Option<SafetyState> {
        self.0.lock().unwrap().last().cloned()
    }
}
