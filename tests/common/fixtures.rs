/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Builders for the ledger headers, vertices, and quorum certificates that the tests feed in.

use std::sync::{
    mpsc::{self, Receiver},
    Arc,
};

use hotstuff_ledger::events::Event;
use hotstuff_ledger::accumulator::{LedgerAccumulator, SimpleLedgerAccumulatorAndVerifier};
use hotstuff_ledger::ledger::{StateComputerLedger, SystemCounters};
use hotstuff_ledger::types::{
    crypto_primitives::Sha256Hasher,
    data_types::{CryptoHash, EpochNumber, Power, SignatureBytes, Txn, ViewNumber},
    ledger::{
        AccumulatorState, LedgerHeader, LedgerProof, OrderByEpochViewAndVersion,
        TimestampedSignature, TimestampedSignatures,
    },
    vertex::{BftHeader, Vertex},
    voting::{QuorumCertificate, VoteData},
};

use super::state_computer::{FixedTimeSupplier, RecordingStateComputer};

pub(crate) const GENESIS_TIMESTAMP: u64 = 1_000;
pub(crate) const LOCAL_TIME: u64 = 7_777;

pub(crate) type TestLedger = StateComputerLedger<
    RecordingStateComputer,
    SimpleLedgerAccumulatorAndVerifier<Sha256Hasher>,
    FixedTimeSupplier,
    OrderByEpochViewAndVersion,
>;

pub(crate) fn txn(payload: &[u8]) -> Txn {
    Txn::new(payload.to_vec())
}

/// Fold the ids of `txns` into `state`.
pub(crate) fn accumulate(state: &AccumulatorState, txns: &[Txn]) -> AccumulatorState {
    let accumulator = SimpleLedgerAccumulatorAndVerifier::new(Sha256Hasher);
    txns.iter()
        .fold(*state, |state, txn| accumulator.accumulate(&state, &txn.id()))
}

pub(crate) fn genesis_header() -> LedgerHeader {
    LedgerHeader::genesis(AccumulatorState::genesis(), None, GENESIS_TIMESTAMP)
}

pub(crate) fn genesis_proof() -> LedgerProof {
    LedgerProof::genesis(AccumulatorState::genesis(), None, GENESIS_TIMESTAMP)
}

pub(crate) fn ledger_header(
    epoch: u64,
    view: u64,
    accumulator_state: AccumulatorState,
) -> LedgerHeader {
    LedgerHeader::new(
        EpochNumber::new(epoch),
        ViewNumber::new(view),
        accumulator_state,
        GENESIS_TIMESTAMP + view,
        None,
    )
}

pub(crate) fn proof(epoch: u64, view: u64, accumulator_state: AccumulatorState) -> LedgerProof {
    LedgerProof::new(
        CryptoHash::zero(),
        ledger_header(epoch, view, accumulator_state),
        TimestampedSignatures::new(),
    )
}

/// A header for a vertex in `view` whose id is derived from `view` and whose ledger header sits at
/// `accumulator_state`.
pub(crate) fn bft_header(view: u64, accumulator_state: AccumulatorState) -> BftHeader {
    let mut id = [0u8; 32];
    id[..8].copy_from_slice(&view.to_le_bytes());
    BftHeader::new(
        ViewNumber::new(view),
        CryptoHash::new(id),
        ledger_header(1, view, accumulator_state),
    )
}

/// Signatures of validators signing at each of the given `(timestamp, power)` pairs.
pub(crate) fn signatures(timestamps_and_powers: &[(u64, u64)]) -> TimestampedSignatures {
    let mut signatures = TimestampedSignatures::new();
    for (i, (timestamp, power)) in timestamps_and_powers.iter().enumerate() {
        signatures.insert(
            [i as u8 + 1; 32],
            TimestampedSignature {
                timestamp: *timestamp,
                power: Power::new(*power),
                signature: SignatureBytes::new([0u8; 64]),
            },
        );
    }
    signatures
}

pub(crate) fn qc(
    proposed: &BftHeader,
    parent: &BftHeader,
    committed: Option<&BftHeader>,
) -> QuorumCertificate {
    qc_signed_at(proposed, parent, committed, &[(GENESIS_TIMESTAMP, 1)])
}

pub(crate) fn qc_signed_at(
    proposed: &BftHeader,
    parent: &BftHeader,
    committed: Option<&BftHeader>,
    timestamps_and_powers: &[(u64, u64)],
) -> QuorumCertificate {
    QuorumCertificate::new(
        VoteData::new(proposed.clone(), parent.clone(), committed.cloned()),
        signatures(timestamps_and_powers),
    )
}

/// A vertex in `view` that extends `parent`, whose own parent is `grandparent`.
pub(crate) fn vertex(view: u64, parent: &BftHeader, grandparent: &BftHeader, txns: Vec<Txn>) -> Vertex {
    Vertex::new(ViewNumber::new(view), qc(parent, grandparent, None), txns, None)
}

/// The genesis vertex and the QC that certifies it.
pub(crate) fn genesis() -> (Vertex, QuorumCertificate) {
    let genesis_vertex = Vertex::genesis(genesis_header());
    let genesis_qc = QuorumCertificate::genesis(&genesis_vertex, genesis_header());
    (genesis_vertex, genesis_qc)
}

pub(crate) fn new_ledger(
    initial_proof: LedgerProof,
    state_computer: RecordingStateComputer,
) -> TestLedger {
    StateComputerLedger::new(
        initial_proof,
        state_computer,
        SimpleLedgerAccumulatorAndVerifier::new(Sha256Hasher),
        FixedTimeSupplier(LOCAL_TIME),
        OrderByEpochViewAndVersion,
        Arc::new(SystemCounters::new()),
        None,
    )
}

/// Like [new_ledger], but every event the ledger publishes arrives on the returned receiver.
pub(crate) fn new_ledger_with_events(
    initial_proof: LedgerProof,
    state_computer: RecordingStateComputer,
) -> (TestLedger, Receiver<Event>) {
    let (event_publisher, events) = mpsc::channel();
    let ledger = StateComputerLedger::new(
        initial_proof,
        state_computer,
        SimpleLedgerAccumulatorAndVerifier::new(Sha256Hasher),
        FixedTimeSupplier(LOCAL_TIME),
        OrderByEpochViewAndVersion,
        Arc::new(SystemCounters::new()),
        Some(event_publisher),
    );
    (ledger, events)
}
