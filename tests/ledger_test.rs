/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the state-computer ledger, driven through a [RecordingStateComputer] that executes every
//! transaction whose payload does not start with "bad".

mod common;

use std::{sync::Arc, thread};

use ed25519_dalek::SigningKey;
use hotstuff_ledger::events::Event;
use hotstuff_ledger::ledger::{
    BftCommittedUpdate, CounterType, LedgerError, StateComputerError, VertexStoreState,
};
use hotstuff_ledger::types::{
    crypto_primitives::Sha256Hasher,
    data_types::{CryptoHash, EpochNumber, Power, ViewNumber},
    ledger::{AccumulatorState, LedgerHeader, VerifiedTxnsAndProof},
    validator_set::ValidatorSet,
    vertex::{BftHeader, Vertex},
};
use log::LevelFilter;
use rand_core::OsRng;

use common::fixtures::*;
use common::logging::setup_logger;
use common::state_computer::RecordingStateComputer;

fn validator_set() -> ValidatorSet {
    let mut validator_set = ValidatorSet::new();
    validator_set.put(
        &SigningKey::generate(&mut OsRng).verifying_key(),
        Power::new(1),
    );
    validator_set
}

#[test]
fn commit_sync_hands_txns_to_state_computer() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let txns = vec![txn(b"a"), txn(b"b")];
    let target = accumulate(&AccumulatorState::genesis(), &txns);
    let proof = proof(0, 1, target);

    ledger
        .commit_sync(VerifiedTxnsAndProof::new(txns.clone(), proof.clone()))
        .unwrap();

    assert_eq!(ledger.current_ledger_header(), proof);
    let recorded = state_computer.recorded();
    assert_eq!(recorded.commit_calls.len(), 1);
    assert_eq!(recorded.commit_calls[0].txns_and_proof.txns(), &txns[..]);
    assert!(!recorded.commit_calls[0].from_bft);
    drop(recorded);

    let counters = ledger.counters();
    assert_eq!(counters.get(CounterType::LedgerStateVersion), 2);
    assert_eq!(counters.get(CounterType::LedgerSyncTxnsProcessed), 2);
    assert_eq!(counters.get(CounterType::LedgerBftTxnsProcessed), 0);
}

#[test]
fn stale_commit_is_ignored() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let txns = vec![txn(b"a"), txn(b"b")];
    let request = VerifiedTxnsAndProof::new(
        txns.clone(),
        proof(0, 1, accumulate(&AccumulatorState::genesis(), &txns)),
    );
    ledger.commit_sync(request.clone()).unwrap();

    // The same request again, and one for an older view.
    ledger.commit_sync(request.clone()).unwrap();
    ledger
        .commit_sync(VerifiedTxnsAndProof::new(
            vec![txn(b"a")],
            proof(0, 0, accumulate(&AccumulatorState::genesis(), &txns[..1])),
        ))
        .unwrap();

    assert_eq!(state_computer.recorded().commit_calls.len(), 1);
    assert_eq!(ledger.current_ledger_header(), *request.proof());
    assert_eq!(ledger.counters().get(CounterType::LedgerStaleCommits), 2);
}

#[test]
fn commit_only_hands_over_the_uncommitted_suffix() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let txns = vec![txn(b"a"), txn(b"b"), txn(b"c")];
    ledger
        .commit_sync(VerifiedTxnsAndProof::new(
            txns[..2].to_vec(),
            proof(1, 3, accumulate(&AccumulatorState::genesis(), &txns[..2])),
        ))
        .unwrap();

    // A request that overlaps with what is already committed.
    ledger
        .commit_sync(VerifiedTxnsAndProof::new(
            txns.clone(),
            proof(1, 4, accumulate(&AccumulatorState::genesis(), &txns)),
        ))
        .unwrap();

    let recorded = state_computer.recorded();
    assert_eq!(recorded.commit_calls.len(), 2);
    assert_eq!(recorded.commit_calls[1].txns_and_proof.txns(), &txns[2..]);
    drop(recorded);

    assert_eq!(ledger.current_ledger_header().state_version(), 3);
    assert_eq!(ledger.counters().get(CounterType::LedgerSyncTxnsProcessed), 3);
}

#[test]
fn commit_that_does_not_extend_the_ledger_is_fatal() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    // The proof certifies a different second transaction than the one in the request.
    let proven = accumulate(&AccumulatorState::genesis(), &[txn(b"a"), txn(b"x")]);
    let result = ledger.commit_sync(VerifiedTxnsAndProof::new(
        vec![txn(b"a"), txn(b"b")],
        proof(0, 1, proven),
    ));

    assert!(matches!(
        result,
        Err(LedgerError::ByzantineQuorum { txns: 2, .. })
    ));
    assert_eq!(ledger.current_ledger_header(), genesis_proof());
    assert!(state_computer.recorded().commit_calls.is_empty());

    // Too few transactions to reach the proven state version.
    let result = ledger.commit_sync(VerifiedTxnsAndProof::new(vec![txn(b"a")], proof(0, 1, proven)));
    assert!(matches!(result, Err(LedgerError::ByzantineQuorum { .. })));
}

#[test]
fn failed_state_computer_commit_leaves_ledger_unchanged() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());
    state_computer.fail_commits(true);

    let txns = vec![txn(b"a")];
    let request = VerifiedTxnsAndProof::new(
        txns.clone(),
        proof(1, 2, accumulate(&AccumulatorState::genesis(), &txns)),
    );
    let result = ledger.commit_sync(request.clone());

    assert!(matches!(
        result,
        Err(LedgerError::StateComputer(StateComputerError::CommitFailed { .. }))
    ));
    assert_eq!(ledger.current_ledger_header(), genesis_proof());
    assert_eq!(ledger.counters().get(CounterType::LedgerStateVersion), 0);

    // The same request goes through once the state computer recovers.
    state_computer.fail_commits(false);
    ledger.commit_sync(request.clone()).unwrap();
    assert_eq!(ledger.current_ledger_header(), *request.proof());
}

#[test]
fn racing_duplicate_commits_reach_state_computer_once() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = Arc::new(new_ledger(genesis_proof(), state_computer.clone()));

    let txns = vec![txn(b"a"), txn(b"b")];
    let request = VerifiedTxnsAndProof::new(
        txns.clone(),
        proof(0, 1, accumulate(&AccumulatorState::genesis(), &txns)),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let request = request.clone();
            thread::spawn(move || {
                if i % 2 == 0 {
                    ledger.commit_sync(request)
                } else {
                    ledger.commit(request, None)
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(state_computer.recorded().commit_calls.len(), 1);
    assert_eq!(ledger.current_ledger_header(), *request.proof());
    let counters = ledger.counters();
    assert_eq!(counters.get(CounterType::LedgerStaleCommits), 7);
    assert_eq!(counters.get(CounterType::LedgerSyncTxnsProcessed), 2);
}

#[test]
fn newer_proof_wins_a_commit_race() {
    setup_logger(LevelFilter::Trace);

    let txns = vec![txn(b"a"), txn(b"b"), txn(b"c")];
    let older = VerifiedTxnsAndProof::new(
        txns[..1].to_vec(),
        proof(0, 1, accumulate(&AccumulatorState::genesis(), &txns[..1])),
    );
    let newer = VerifiedTxnsAndProof::new(
        txns.clone(),
        proof(0, 2, accumulate(&AccumulatorState::genesis(), &txns)),
    );

    for _ in 0..16 {
        let state_computer = RecordingStateComputer::new();
        let ledger = Arc::new(new_ledger(genesis_proof(), state_computer.clone()));

        let handles: Vec<_> = [older.clone(), newer.clone()]
            .into_iter()
            .map(|request| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.commit_sync(request))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(ledger.current_ledger_header(), *newer.proof());
        assert_eq!(ledger.counters().get(CounterType::LedgerStateVersion), 3);
        let recorded = state_computer.recorded();
        let committed: usize = recorded
            .commit_calls
            .iter()
            .map(|call| call.txns_and_proof.txns().len())
            .sum();
        assert_eq!(committed, 3);
    }
}

#[test]
fn concurrent_commits_publish_events_in_commit_order() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let (ledger, events) = new_ledger_with_events(genesis_proof(), state_computer.clone());
    let ledger = Arc::new(ledger);

    let txns: Vec<_> = (0..12u8).map(|i| txn(&[b'a' + i])).collect();
    let requests: Vec<_> = (1..=txns.len())
        .map(|version| {
            VerifiedTxnsAndProof::new(
                txns[..version].to_vec(),
                proof(
                    0,
                    version as u64,
                    accumulate(&AccumulatorState::genesis(), &txns[..version]),
                ),
            )
        })
        .collect();

    // Submit out of order so that some commits find themselves stale.
    let handles: Vec<_> = requests
        .into_iter()
        .rev()
        .map(|request| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.commit_sync(request))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let header = ledger.current_ledger_header();
    assert_eq!(header.state_version(), txns.len() as u64);
    assert_eq!(
        ledger.counters().get(CounterType::LedgerStateVersion),
        header.state_version()
    );

    let published: Vec<u64> = events
        .try_iter()
        .filter_map(|event| match event {
            Event::CommitLedger(event) => Some(event.proof.state_version()),
            _ => None,
        })
        .collect();
    assert!(!published.is_empty());
    assert!(published.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(published.last(), Some(&header.state_version()));
    assert_eq!(
        published.len(),
        state_computer.recorded().commit_calls.len()
    );
}

#[test]
fn prepare_on_genesis_executes_txns_at_parent_timestamp() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let (_, genesis_qc) = genesis();
    let vertex = Vertex::new(
        ViewNumber::new(1),
        genesis_qc,
        vec![txn(b"a"), txn(b"bad"), txn(b"b")],
        None,
    );

    let prepared = ledger.prepare(&[], &vertex).unwrap();

    let header = prepared.ledger_header();
    assert_eq!(header.epoch(), EpochNumber::new(0));
    assert_eq!(header.view(), ViewNumber::new(1));
    assert_eq!(header.timestamp(), GENESIS_TIMESTAMP);
    assert_eq!(
        *header.accumulator_state(),
        accumulate(&AccumulatorState::genesis(), &[txn(b"a"), txn(b"b")])
    );
    assert!(!header.is_end_of_epoch());

    assert_eq!(prepared.successful().len(), 2);
    assert_eq!(prepared.failed().len(), 1);
    assert_eq!(prepared.failed()[0].txn(), &txn(b"bad"));
    assert_eq!(prepared.prepared_at(), LOCAL_TIME);

    let recorded = state_computer.recorded();
    assert_eq!(recorded.prepare_calls.len(), 1);
    assert_eq!(recorded.prepare_calls[0].vertex, vertex.id());
    assert_eq!(recorded.prepare_calls[0].timestamp, GENESIS_TIMESTAMP);
    assert!(recorded.prepare_calls[0].previous.is_empty());
}

#[test]
fn prepare_uses_weighted_median_of_qc_timestamps() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let grandparent = bft_header(2, AccumulatorState::genesis());
    let parent = bft_header(3, AccumulatorState::genesis());
    let qc = qc_signed_at(&parent, &grandparent, None, &[(100, 1), (200, 1), (300, 5)]);
    let vertex = Vertex::new(ViewNumber::new(4), qc, Vec::new(), None);

    let prepared = ledger.prepare(&[], &vertex).unwrap();

    assert_eq!(prepared.ledger_header().timestamp(), 300);
    assert_eq!(state_computer.recorded().prepare_calls[0].timestamp, 300);
}

#[test]
fn prepare_without_txns_keeps_parent_accumulator_state() {
    setup_logger(LevelFilter::Trace);

    let ledger = new_ledger(genesis_proof(), RecordingStateComputer::new());

    let grandparent = bft_header(2, AccumulatorState::genesis());
    let parent = bft_header(3, AccumulatorState::genesis());
    let prepared = ledger
        .prepare(&[], &vertex(4, &parent, &grandparent, Vec::new()))
        .unwrap();

    assert_eq!(
        prepared.ledger_header().accumulator_state(),
        parent.ledger_header().accumulator_state()
    );
    assert_eq!(prepared.ledger_header().epoch(), EpochNumber::new(1));
    assert_eq!(prepared.ledger_header().view(), ViewNumber::new(4));
}

#[test]
fn prepare_executes_on_top_of_previous_vertices() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let (_, genesis_qc) = genesis();
    let first = Vertex::new(
        ViewNumber::new(1),
        genesis_qc.clone(),
        vec![txn(b"a"), txn(b"bad")],
        None,
    );
    let first = ledger.prepare(&[], &first).unwrap();

    let second = vertex(
        2,
        &first.to_bft_header(),
        genesis_qc.proposed(),
        vec![txn(b"b")],
    );
    let second = ledger.prepare(&[first], &second).unwrap();

    assert_eq!(
        *second.ledger_header().accumulator_state(),
        accumulate(&AccumulatorState::genesis(), &[txn(b"a"), txn(b"b")])
    );
    // Failed transactions of previous vertices are not re-executed.
    assert_eq!(state_computer.recorded().prepare_calls[1].previous, vec![txn(b"a")]);
}

#[test]
fn prepare_abstains_if_previous_does_not_reach_parent() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let grandparent = bft_header(1, AccumulatorState::genesis());
    let parent = bft_header(2, accumulate(&AccumulatorState::genesis(), &[txn(b"a")]));

    assert!(ledger
        .prepare(&[], &vertex(3, &parent, &grandparent, vec![txn(b"b")]))
        .is_none());
    assert!(state_computer.recorded().prepare_calls.is_empty());
    assert_eq!(ledger.counters().get(CounterType::LedgerPrepareAbstains), 1);
}

#[test]
fn prepare_abstains_if_ledger_is_ahead_of_parent() {
    setup_logger(LevelFilter::Trace);

    let committed = accumulate(&AccumulatorState::genesis(), &[txn(b"a"), txn(b"b")]);
    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(proof(1, 5, committed), state_computer.clone());

    let grandparent = bft_header(2, AccumulatorState::genesis());
    let parent = bft_header(3, accumulate(&AccumulatorState::genesis(), &[txn(b"a")]));

    assert!(ledger
        .prepare(&[], &vertex(4, &parent, &grandparent, vec![txn(b"c")]))
        .is_none());
    assert!(state_computer.recorded().prepare_calls.is_empty());
    assert_eq!(ledger.counters().get(CounterType::LedgerPrepareAbstains), 1);
}

#[test]
fn prepare_on_end_of_epoch_executes_nothing() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let grandparent = bft_header(2, AccumulatorState::genesis());
    let parent_header = LedgerHeader::new(
        EpochNumber::new(1),
        ViewNumber::new(3),
        AccumulatorState::genesis(),
        GENESIS_TIMESTAMP + 3,
        Some(validator_set()),
    );
    let parent = BftHeader::new(ViewNumber::new(3), CryptoHash::new([3u8; 32]), parent_header.clone());

    let prepared = ledger
        .prepare(&[], &vertex(4, &parent, &grandparent, vec![txn(b"a")]))
        .unwrap();

    assert_eq!(
        *prepared.ledger_header(),
        parent_header.update_view_and_timestamp(ViewNumber::new(4), GENESIS_TIMESTAMP)
    );
    assert!(prepared.ledger_header().is_end_of_epoch());
    assert!(prepared.successful().is_empty());
    assert!(prepared.failed().is_empty());
    assert!(state_computer.recorded().prepare_calls.is_empty());
}

#[test]
fn prepare_ends_epoch_when_state_computer_returns_validator_set() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());
    let next_validator_set = validator_set();
    state_computer.end_epoch_with(next_validator_set.clone());

    let grandparent = bft_header(2, AccumulatorState::genesis());
    let parent = bft_header(3, AccumulatorState::genesis());
    let prepared = ledger
        .prepare(&[], &vertex(4, &parent, &grandparent, vec![txn(b"a")]))
        .unwrap();

    assert!(prepared.ledger_header().is_end_of_epoch());
    assert_eq!(
        prepared.ledger_header().next_validator_set(),
        Some(&next_validator_set)
    );
}

#[test]
fn commit_bft_commits_root_of_vertex_store() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    let (_, genesis_qc) = genesis();
    let first = Vertex::new(
        ViewNumber::new(1),
        genesis_qc,
        vec![txn(b"a"), txn(b"bad")],
        None,
    );
    let first = ledger.prepare(&[], &first).unwrap();

    let high_qc = qc(
        &bft_header(3, *first.ledger_header().accumulator_state()),
        &bft_header(2, *first.ledger_header().accumulator_state()),
        Some(&first.to_bft_header()),
    );

    // The high QC does not commit the genesis vertex.
    let (genesis_vertex, _) = genesis();
    assert!(
        VertexStoreState::from_high_qc(genesis_vertex, high_qc.clone(), Vec::new(), &Sha256Hasher)
            .is_none()
    );

    let vertex_store_state =
        VertexStoreState::from_high_qc(first.vertex().clone(), high_qc, Vec::new(), &Sha256Hasher)
            .unwrap();
    assert_eq!(
        vertex_store_state.root_header().ledger_header(),
        first.ledger_header()
    );

    ledger
        .commit_bft(BftCommittedUpdate {
            committed: vec![first],
            vertex_store_state: vertex_store_state.clone(),
        })
        .unwrap();

    assert_eq!(
        ledger.current_ledger_header(),
        *vertex_store_state.root_header()
    );
    let recorded = state_computer.recorded();
    assert_eq!(recorded.commit_calls.len(), 1);
    assert!(recorded.commit_calls[0].from_bft);
    assert_eq!(recorded.commit_calls[0].txns_and_proof.txns(), &[txn(b"a")][..]);
    drop(recorded);

    assert_eq!(ledger.counters().get(CounterType::LedgerBftTxnsProcessed), 1);
    assert_eq!(ledger.counters().get(CounterType::LedgerStateVersion), 1);
}

#[test]
fn mempool_relays_to_state_computer() {
    setup_logger(LevelFilter::Trace);

    let state_computer = RecordingStateComputer::new();
    let ledger = new_ledger(genesis_proof(), state_computer.clone());

    ledger.mempool_add(txn(b"a"));
    ledger.mempool_add_from([9u8; 32], txn(b"b"));

    assert_eq!(
        state_computer.recorded().mempool,
        vec![(txn(b"a"), None), (txn(b"b"), Some([9u8; 32]))]
    );
    assert_eq!(ledger.counters().get(CounterType::MempoolAdds), 2);

    let (_, genesis_qc) = genesis();
    let prepared = ledger
        .prepare(
            &[],
            &Vertex::new(ViewNumber::new(1), genesis_qc, vec![txn(b"a")], None),
        )
        .unwrap();

    assert_eq!(
        ledger.generate_next_txns(ViewNumber::new(2), &[prepared]),
        vec![txn(b"b")]
    );
}
