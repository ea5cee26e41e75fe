/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits that the ledger uses to talk to its pluggable collaborators: the [`StateComputer`] that
//! executes and persists transactions, and the [`TimeSupplier`] that tells the local time.

use std::fmt::{self, Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{
    data_types::{Txn, VerifyingKeyBytes},
    ledger::VerifiedTxnsAndProof,
    validator_set::ValidatorSet,
    vertex::{FailedTxn, PreparedTxn, PreparedVertex, Vertex},
};

use super::VertexStoreState;

/// The execution engine behind the ledger.
///
/// The ledger calls every method of its `StateComputer` while holding its lock, so implementations never
/// see two calls at the same time.
pub trait StateComputer: Send {
    /// Add `txn` to the mempool. `origin` is the peer that relayed `txn`, or `None` if it was submitted
    /// locally.
    fn add_to_mempool(&mut self, txn: Txn, origin: Option<VerifyingKeyBytes>);

    /// Get the transactions to propose in a vertex that extends `prepared`, leaving out those that are
    /// already in `prepared`.
    fn next_txns_from_mempool(&mut self, prepared: &[PreparedVertex]) -> Vec<Txn>;

    /// Speculatively execute the transactions of `vertex` on top of the committed ledger and the
    /// `previous` uncommitted transactions.
    fn prepare(
        &mut self,
        previous: &[PreparedTxn],
        vertex: &Vertex,
        timestamp: u64,
    ) -> StateComputerResult;

    /// Durably commit `txns_and_proof`. `vertex_store_state` is present when the commit comes from the BFT
    /// path, and absent when it comes from ledger sync.
    fn commit(
        &mut self,
        txns_and_proof: &VerifiedTxnsAndProof,
        vertex_store_state: Option<&VertexStoreState>,
    ) -> Result<(), StateComputerError>;
}

/// The outcome of [`StateComputer::prepare`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateComputerResult {
    pub successful: Vec<PreparedTxn>,
    pub failed: Vec<FailedTxn>,

    /// Present if executing the vertex ends the epoch.
    pub next_validator_set: Option<ValidatorSet>,
}

impl StateComputerResult {
    pub fn new(
        successful: Vec<PreparedTxn>,
        failed: Vec<FailedTxn>,
        next_validator_set: Option<ValidatorSet>,
    ) -> Self {
        Self {
            successful,
            failed,
            next_validator_set,
        }
    }
}

#[derive(Debug)]
pub enum StateComputerError {
    CommitFailed { reason: String },
}

impl Display for StateComputerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StateComputerError::CommitFailed { reason } => write!(f, "commit failed: {}", reason),
        }
    }
}

/// Source of local wall-clock time.
pub trait TimeSupplier: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn current_time(&self) -> u64;
}

/// [`TimeSupplier`] backed by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSupplier;

impl TimeSupplier for SystemTimeSupplier {
    fn current_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}
