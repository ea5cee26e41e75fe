/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events that the safety rules and the ledger emit, for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::safety::SafetyViolation;
use crate::types::{
    data_types::{CryptoHash, EpochNumber, TxnId, VerifyingKeyBytes, ViewNumber},
    ledger::LedgerProof,
    voting::Vote,
};

pub enum Event {
    // Events emitted by the safety rules.
    UpdateHighestQCView(UpdateHighestQCViewEvent),
    UpdateLockedView(UpdateLockedViewEvent),
    CommitVertex(CommitVertexEvent),
    Vote(VoteEvent),
    RejectVote(RejectVoteEvent),
    TimeoutVote(TimeoutVoteEvent),
    // Events emitted by the ledger.
    MempoolAdd(MempoolAddEvent),
    PrepareVertex(PrepareVertexEvent),
    AbstainPrepare(AbstainPrepareEvent),
    CommitLedger(CommitLedgerEvent),
    IgnoreStaleCommit(IgnoreStaleCommitEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The receiving end goes away when the event bus shuts down.
            let _ = event_publisher.send(event);
        }
    }
}

pub struct UpdateHighestQCViewEvent {
    pub timestamp: SystemTime,
    pub highest_qc_view: ViewNumber,
}

pub struct UpdateLockedViewEvent {
    pub timestamp: SystemTime,
    pub locked_view: ViewNumber,
}

/// The safety rules saw a QC whose commit marker advances the committed view.
pub struct CommitVertexEvent {
    pub timestamp: SystemTime,
    pub view: ViewNumber,
    pub vertex: CryptoHash,
}

pub struct VoteEvent {
    pub timestamp: SystemTime,
    pub vote: Vote,
}

pub struct RejectVoteEvent {
    pub timestamp: SystemTime,
    pub view: ViewNumber,
    pub violation: SafetyViolation,
}

pub struct TimeoutVoteEvent {
    pub timestamp: SystemTime,
    pub view: ViewNumber,
    pub epoch: EpochNumber,
}

/// A transaction was handed to the state computer's mempool. `origin` is absent for local submissions.
pub struct MempoolAddEvent {
    pub timestamp: SystemTime,
    pub txn: TxnId,
    pub origin: Option<VerifyingKeyBytes>,
}

pub struct PrepareVertexEvent {
    pub timestamp: SystemTime,
    pub vertex: CryptoHash,
    pub view: ViewNumber,
    pub state_version: u64,
    pub successful: usize,
    pub failed: usize,
}

pub struct AbstainPrepareEvent {
    pub timestamp: SystemTime,
    pub vertex: CryptoHash,
    pub view: ViewNumber,
}

/// Where a commit request came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitSource {
    Bft,
    Sync,
}

pub struct CommitLedgerEvent {
    pub timestamp: SystemTime,
    pub source: CommitSource,
    pub txns: usize,
    pub proof: LedgerProof,
}

pub struct IgnoreStaleCommitEvent {
    pub timestamp: SystemTime,
    pub source: CommitSource,
    pub proof: LedgerProof,
}
