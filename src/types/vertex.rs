/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'vertex' type, i.e., a proposed block of transactions, and its prepared form.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    crypto_primitives::{CryptoHasher, Digest},
    data_types::{CryptoHash, Txn, VerifyingKeyBytes, ViewNumber},
    ledger::LedgerHeader,
    voting::QuorumCertificate,
};

/// The part of a vertex that quorum certificates vote over.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BftHeader {
    view: ViewNumber,
    vertex_id: CryptoHash,
    ledger_header: LedgerHeader,
}

impl BftHeader {
    pub fn new(view: ViewNumber, vertex_id: CryptoHash, ledger_header: LedgerHeader) -> Self {
        Self {
            view,
            vertex_id,
            ledger_header,
        }
    }

    /// Header of the (imaginary) vertex that the genesis vertex extends.
    pub fn genesis_ancestor(ledger_header: LedgerHeader) -> Self {
        Self::new(ViewNumber::genesis(), CryptoHash::zero(), ledger_header)
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn vertex_id(&self) -> CryptoHash {
        self.vertex_id
    }

    pub fn ledger_header(&self) -> &LedgerHeader {
        &self.ledger_header
    }
}

/// A proposed block.
///
/// A vertex extends the vertex that its `qc` certifies, and its `id` is the SHA256 hash over its view,
/// its QC, its transactions and its proposer.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vertex {
    view: ViewNumber,
    qc: QuorumCertificate,
    txns: Vec<Txn>,
    proposer: Option<VerifyingKeyBytes>,
    id: CryptoHash,
}

impl Vertex {
    pub fn new(
        view: ViewNumber,
        qc: QuorumCertificate,
        txns: Vec<Txn>,
        proposer: Option<VerifyingKeyBytes>,
    ) -> Vertex {
        Vertex {
            id: Vertex::hash(view, &qc, &txns, proposer.as_ref()),
            view,
            qc,
            txns,
            proposer,
        }
    }

    /// Create the first vertex of an epoch whose ledger starts at `ledger_header`.
    pub fn genesis(ledger_header: LedgerHeader) -> Vertex {
        let qc = QuorumCertificate::genesis_ancestor(ledger_header);
        Vertex::new(ViewNumber::genesis(), qc, Vec::new(), None)
    }

    pub fn hash(
        view: ViewNumber,
        qc: &QuorumCertificate,
        txns: &[Txn],
        proposer: Option<&VerifyingKeyBytes>,
    ) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&view.try_to_vec().unwrap());
        hasher.update(&qc.try_to_vec().unwrap());
        hasher.update(&txns.try_to_vec().unwrap());
        hasher.update(&proposer.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn qc(&self) -> &QuorumCertificate {
        &self.qc
    }

    pub fn txns(&self) -> &[Txn] {
        &self.txns
    }

    pub fn proposer(&self) -> Option<&VerifyingKeyBytes> {
        self.proposer.as_ref()
    }

    pub fn id(&self) -> CryptoHash {
        self.id
    }

    pub fn is_genesis(&self) -> bool {
        self.view.is_genesis()
    }

    /// Header of the vertex that this vertex extends.
    pub fn parent_header(&self) -> &BftHeader {
        self.qc.proposed()
    }

    /// Header of the parent of the vertex that this vertex extends, absent if the QC is the genesis QC.
    pub fn grandparent_header(&self) -> Option<&BftHeader> {
        self.qc.parent()
    }
}

/// A transaction that the state computer executed successfully while preparing a vertex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedTxn {
    txn: Txn,
    receipt: Vec<u8>,
}

impl PreparedTxn {
    /// `receipt` carries whatever the state computer wants to remember about the execution.
    pub fn new(txn: Txn, receipt: Vec<u8>) -> Self {
        Self { txn, receipt }
    }

    pub fn txn(&self) -> &Txn {
        &self.txn
    }

    pub fn receipt(&self) -> &[u8] {
        &self.receipt
    }
}

/// A transaction that the state computer rejected while preparing a vertex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedTxn {
    txn: Txn,
    reason: String,
}

impl FailedTxn {
    pub fn new(txn: Txn, reason: String) -> Self {
        Self { txn, reason }
    }

    pub fn txn(&self) -> &Txn {
        &self.txn
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A vertex after it has been speculatively executed on top of its ancestors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedVertex {
    vertex: Vertex,
    ledger_header: LedgerHeader,
    prepared_at: u64,
    successful: Vec<PreparedTxn>,
    failed: Vec<FailedTxn>,
}

impl PreparedVertex {
    pub fn new(
        vertex: Vertex,
        ledger_header: LedgerHeader,
        prepared_at: u64,
        successful: Vec<PreparedTxn>,
        failed: Vec<FailedTxn>,
    ) -> Self {
        Self {
            vertex,
            ledger_header,
            prepared_at,
            successful,
            failed,
        }
    }

    pub fn vertex(&self) -> &Vertex {
        &self.vertex
    }

    pub fn view(&self) -> ViewNumber {
        self.vertex.view()
    }

    pub fn id(&self) -> CryptoHash {
        self.vertex.id()
    }

    pub fn ledger_header(&self) -> &LedgerHeader {
        &self.ledger_header
    }

    /// Local wall-clock time, in milliseconds since the Unix epoch, at which the vertex was prepared.
    pub fn prepared_at(&self) -> u64 {
        self.prepared_at
    }

    pub fn successful(&self) -> &[PreparedTxn] {
        &self.successful
    }

    pub fn failed(&self) -> &[FailedTxn] {
        &self.failed
    }

    /// The header that a vote for this vertex votes over.
    pub fn to_bft_header(&self) -> BftHeader {
        BftHeader::new(self.view(), self.id(), self.ledger_header.clone())
    }
}
