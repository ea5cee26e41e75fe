/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::cmp::Ordering;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::accumulator::{LedgerAccumulator, LedgerAccumulatorVerifier};
use crate::events::{
    AbstainPrepareEvent, CommitLedgerEvent, CommitSource, Event, IgnoreStaleCommitEvent,
    MempoolAddEvent, PrepareVertexEvent,
};
use crate::types::{
    data_types::{Txn, VerifyingKeyBytes, ViewNumber},
    ledger::{HeaderComparator, LedgerHeader, LedgerProof, VerifiedTxnsAndProof},
    vertex::{FailedTxn, PreparedTxn, PreparedVertex, Vertex},
};

use super::{
    BftCommittedUpdate, CounterType, LedgerError, StateComputer, SystemCounters, TimeSupplier,
    VertexStoreState,
};

/// What the ledger lock guards.
struct LockedLedger<S: StateComputer> {
    current_ledger_header: LedgerProof,
    state_computer: S,
}

/// Ledger that delegates execution and persistence to a [`StateComputer`], and checks everything it
/// hands over against the ledger accumulator.
pub struct StateComputerLedger<S, A, T, C>
where
    S: StateComputer,
    A: LedgerAccumulator + LedgerAccumulatorVerifier,
    T: TimeSupplier,
    C: HeaderComparator,
{
    locked: Mutex<LockedLedger<S>>,
    accumulator: A,
    time_supplier: T,
    header_comparator: C,
    counters: Arc<SystemCounters>,
    event_publisher: Option<Sender<Event>>,
}

impl<S, A, T, C> StateComputerLedger<S, A, T, C>
where
    S: StateComputer,
    A: LedgerAccumulator + LedgerAccumulatorVerifier,
    T: TimeSupplier,
    C: HeaderComparator,
{
    pub fn new(
        initial_proof: LedgerProof,
        state_computer: S,
        accumulator: A,
        time_supplier: T,
        header_comparator: C,
        counters: Arc<SystemCounters>,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        counters.set(CounterType::LedgerStateVersion, initial_proof.state_version());
        Self {
            locked: Mutex::new(LockedLedger {
                current_ledger_header: initial_proof,
                state_computer,
            }),
            accumulator,
            time_supplier,
            header_comparator,
            counters,
            event_publisher,
        }
    }

    /// Get the proof of the most recently committed ledger state.
    pub fn current_ledger_header(&self) -> LedgerProof {
        self.lock().current_ledger_header.clone()
    }

    pub fn counters(&self) -> &SystemCounters {
        &self.counters
    }

    /// Add a locally submitted `txn` to the mempool.
    pub fn mempool_add(&self, txn: Txn) {
        self.add_to_mempool(txn, None)
    }

    /// Add a `txn` relayed by `origin` to the mempool.
    pub fn mempool_add_from(&self, origin: VerifyingKeyBytes, txn: Txn) {
        self.add_to_mempool(txn, Some(origin))
    }

    /// Get the transactions to propose in `view`, on top of the `prepared` uncommitted vertices.
    pub fn generate_next_txns(&self, view: ViewNumber, prepared: &[PreparedVertex]) -> Vec<Txn> {
        let txns = self.lock().state_computer.next_txns_from_mempool(prepared);
        log::debug!("Generated {} txns for view {}", txns.len(), view);
        txns
    }

    /// Speculatively execute `vertex` on top of the `previous` uncommitted vertices that lie between the
    /// committed ledger and `vertex`'s parent.
    ///
    /// Returns `None`, i.e., abstains, if the committed ledger is already ahead of `vertex`'s parent, or
    /// if the successful transactions of `previous` do not extend the committed ledger to the parent's
    /// accumulator state.
    pub fn prepare(&self, previous: &[PreparedVertex], vertex: &Vertex) -> Option<PreparedVertex> {
        let parent = vertex.parent_header();
        let parent_header = parent.ledger_header();
        let parent_accumulator_state = parent_header.accumulator_state();
        let quorum_timestamp = if parent.view().is_genesis() {
            parent_header.timestamp()
        } else {
            vertex
                .qc()
                .weighted_timestamp()
                .unwrap_or(parent_header.timestamp())
        };

        let mut locked = self.lock();

        if locked.current_ledger_header.state_version() > parent_accumulator_state.state_version() {
            drop(locked);
            return self.abstain(vertex);
        }

        // No transactions execute on top of an end of epoch header.
        if parent_header.is_end_of_epoch() {
            let ledger_header =
                parent_header.update_view_and_timestamp(vertex.view(), quorum_timestamp);
            drop(locked);
            return Some(self.prepared(vertex, ledger_header, Vec::new(), Vec::new()));
        }

        let previous_txns: Vec<PreparedTxn> = previous
            .iter()
            .flat_map(|prepared| prepared.successful().iter().cloned())
            .collect();
        let verified = match self.accumulator.verify_and_get_extension(
            locked.current_ledger_header.accumulator_state(),
            &previous_txns,
            |prepared| prepared.txn().id(),
            parent_accumulator_state,
        ) {
            Some(verified) => verified,
            None => {
                drop(locked);
                return self.abstain(vertex);
            }
        };

        let result = locked
            .state_computer
            .prepare(&verified, vertex, quorum_timestamp);
        drop(locked);

        let accumulator_state = result
            .successful
            .iter()
            .fold(*parent_accumulator_state, |state, prepared| {
                self.accumulator.accumulate(&state, &prepared.txn().id())
            });
        let ledger_header = LedgerHeader::new(
            parent_header.epoch(),
            vertex.view(),
            accumulator_state,
            quorum_timestamp,
            result.next_validator_set,
        );

        Some(self.prepared(vertex, ledger_header, result.successful, result.failed))
    }

    /// Commit the successful transactions of the vertices that the BFT path committed.
    pub fn commit_bft(&self, update: BftCommittedUpdate) -> Result<(), LedgerError> {
        let txns = update
            .committed
            .iter()
            .flat_map(|prepared| prepared.successful().iter().map(|p| p.txn().clone()))
            .collect();
        let proof = update.vertex_store_state.root_header().clone();
        self.commit(
            VerifiedTxnsAndProof::new(txns, proof),
            Some(&update.vertex_store_state),
        )
    }

    /// Commit a batch of transactions obtained through ledger sync.
    pub fn commit_sync(&self, txns_and_proof: VerifiedTxnsAndProof) -> Result<(), LedgerError> {
        self.commit(txns_and_proof, None)
    }

    /// Commit `txns_and_proof`, if its proof is newer than the current ledger proof.
    ///
    /// ## Steps
    ///
    /// 1. Ignore the request if its proof is not strictly newer than the current one.
    /// 2. Find the suffix of the request's transactions that extends the committed ledger to the proven
    ///    accumulator state. Failing to is fatal.
    /// 3. Hand the suffix and the proof to the state computer.
    /// 4. Make the proof the current ledger proof.
    ///
    /// Counters are updated and events published before the lock is released, so both follow the order
    /// in which commits took effect.
    pub fn commit(
        &self,
        txns_and_proof: VerifiedTxnsAndProof,
        vertex_store_state: Option<&VertexStoreState>,
    ) -> Result<(), LedgerError> {
        let source = match vertex_store_state {
            Some(_) => CommitSource::Bft,
            None => CommitSource::Sync,
        };
        let (txns, proof) = txns_and_proof.into_parts();

        let mut locked = self.lock();

        /* 1 */
        if self
            .header_comparator
            .compare(&proof, &locked.current_ledger_header)
            != Ordering::Greater
        {
            self.counters.increment(CounterType::LedgerStaleCommits);
            log::debug!(
                "Ignoring stale commit of state version {} in view {}",
                proof.state_version(),
                proof.view()
            );
            Event::publish(
                &self.event_publisher,
                Event::IgnoreStaleCommit(IgnoreStaleCommitEvent {
                    timestamp: SystemTime::now(),
                    source,
                    proof,
                }),
            );
            drop(locked);
            return Ok(());
        }

        /* 2 */
        let current = *locked.current_ledger_header.accumulator_state();
        let extension = match self.accumulator.verify_and_get_extension(
            &current,
            &txns,
            |txn| txn.id(),
            proof.accumulator_state(),
        ) {
            Some(extension) => extension,
            None => {
                let err = LedgerError::ByzantineQuorum {
                    current,
                    proven: *proof.accumulator_state(),
                    txns: txns.len(),
                };
                log::error!("Accumulator failure: {}", err);
                return Err(err);
            }
        };

        /* 3 */
        let extension_len = extension.len();
        let to_commit = VerifiedTxnsAndProof::new(extension, proof);
        locked
            .state_computer
            .commit(&to_commit, vertex_store_state)?;

        /* 4 */
        let (_, proof) = to_commit.into_parts();
        locked.current_ledger_header = proof.clone();

        let processed = match source {
            CommitSource::Bft => CounterType::LedgerBftTxnsProcessed,
            CommitSource::Sync => CounterType::LedgerSyncTxnsProcessed,
        };
        self.counters.add(processed, extension_len as u64);
        self.counters
            .set(CounterType::LedgerStateVersion, proof.state_version());

        Event::publish(
            &self.event_publisher,
            Event::CommitLedger(CommitLedgerEvent {
                timestamp: SystemTime::now(),
                source,
                txns: extension_len,
                proof,
            }),
        );
        drop(locked);

        Ok(())
    }

    fn add_to_mempool(&self, txn: Txn, origin: Option<VerifyingKeyBytes>) {
        let txn_id = txn.id();
        self.lock().state_computer.add_to_mempool(txn, origin);
        self.counters.increment(CounterType::MempoolAdds);
        Event::publish(
            &self.event_publisher,
            Event::MempoolAdd(MempoolAddEvent {
                timestamp: SystemTime::now(),
                txn: txn_id,
                origin,
            }),
        );
    }

    fn prepared(
        &self,
        vertex: &Vertex,
        ledger_header: LedgerHeader,
        successful: Vec<PreparedTxn>,
        failed: Vec<FailedTxn>,
    ) -> PreparedVertex {
        let prepared = PreparedVertex::new(
            vertex.clone(),
            ledger_header,
            self.time_supplier.current_time(),
            successful,
            failed,
        );
        Event::publish(
            &self.event_publisher,
            Event::PrepareVertex(PrepareVertexEvent {
                timestamp: SystemTime::now(),
                vertex: prepared.id(),
                view: prepared.view(),
                state_version: prepared.ledger_header().accumulator_state().state_version(),
                successful: prepared.successful().len(),
                failed: prepared.failed().len(),
            }),
        );
        prepared
    }

    fn abstain(&self, vertex: &Vertex) -> Option<PreparedVertex> {
        self.counters.increment(CounterType::LedgerPrepareAbstains);
        log::debug!("Abstaining from preparing vertex in view {}", vertex.view());
        Event::publish(
            &self.event_publisher,
            Event::AbstainPrepare(AbstainPrepareEvent {
                timestamp: SystemTime::now(),
                vertex: vertex.id(),
                view: vertex.view(),
            }),
        );
        None
    }

    fn lock(&self) -> MutexGuard<'_, LockedLedger<S>> {
        self.locked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
