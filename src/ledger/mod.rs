/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The state-computer ledger: the component that turns quorum-certified vertices into a committed,
//! tamper-evident ledger.
//!
//! The ledger has two jobs:
//! 1. **Prepare**: before a node votes for a vertex, the ledger speculatively executes the vertex's
//!    transactions on top of its uncommitted ancestors, after checking that those ancestors extend the
//!    committed ledger. The result is a [`PreparedVertex`] whose ledger header the vote votes over.
//! 2. **Commit**: once a QC commits some vertices (or ledger sync hands over a proven batch of
//!    transactions), the ledger checks that the transactions extend the committed ledger up to the
//!    proven accumulator state, and hands them to the [`StateComputer`] to persist.
//!
//! Both jobs, together with mempool access, are serialized by a single lock, so the ledger can be shared
//! between the BFT path and the sync path through an [`Arc`](std::sync::Arc).
//!
//! ## Failures
//!
//! Failing to prepare is not an error: the ledger abstains by returning `None`. A commit request whose
//! transactions do not extend the committed ledger up to the proven state, however, means that a quorum
//! of validators signed an inconsistent ledger. That is fatal, and is reported as
//! [`LedgerError::ByzantineQuorum`].

pub mod counters;

pub mod implementation;

pub mod state_computer;

pub use counters::{CounterType, SystemCounters};
pub use implementation::StateComputerLedger;
pub use state_computer::{
    StateComputer, StateComputerError, StateComputerResult, SystemTimeSupplier, TimeSupplier,
};

use std::fmt::{self, Display, Formatter};

use crate::types::{
    crypto_primitives::Hasher,
    ledger::{AccumulatorState, LedgerProof},
    vertex::{PreparedVertex, Vertex},
    voting::QuorumCertificate,
};

/// The vertices that a node's vertex store holds after a commit, rooted at the newly committed vertex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexStoreState {
    root: Vertex,
    high_qc: QuorumCertificate,
    vertices: Vec<Vertex>,
    root_header: LedgerProof,
}

impl VertexStoreState {
    pub fn new(
        root: Vertex,
        high_qc: QuorumCertificate,
        vertices: Vec<Vertex>,
        root_header: LedgerProof,
    ) -> Self {
        Self {
            root,
            high_qc,
            vertices,
            root_header,
        }
    }

    /// Create the state whose root is the vertex that `high_qc` commits.
    ///
    /// Returns `None` if `high_qc` does not commit anything, or commits a vertex other than `root`.
    pub fn from_high_qc(
        root: Vertex,
        high_qc: QuorumCertificate,
        vertices: Vec<Vertex>,
        hasher: &impl Hasher,
    ) -> Option<Self> {
        let (committed, root_header) = high_qc.committed_and_ledger_state_proof(hasher)?;
        if committed.vertex_id() != root.id() {
            return None;
        }
        Some(Self::new(root, high_qc, vertices, root_header))
    }

    pub fn root(&self) -> &Vertex {
        &self.root
    }

    pub fn high_qc(&self) -> &QuorumCertificate {
        &self.high_qc
    }

    /// Uncommitted vertices that descend from the root.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Proof of the ledger state as of the root.
    pub fn root_header(&self) -> &LedgerProof {
        &self.root_header
    }
}

/// Vertices that the BFT path committed, in order, and the vertex store state after the commit.
#[derive(Clone, Debug)]
pub struct BftCommittedUpdate {
    pub committed: Vec<PreparedVertex>,
    pub vertex_store_state: VertexStoreState,
}

#[derive(Debug)]
pub enum LedgerError {
    /// The transactions of a commit request do not extend the committed ledger to the state that the
    /// request's proof certifies.
    ByzantineQuorum {
        current: AccumulatorState,
        proven: AccumulatorState,
        txns: usize,
    },
    StateComputer(StateComputerError),
}

impl From<StateComputerError> for LedgerError {
    fn from(value: StateComputerError) -> Self {
        LedgerError::StateComputer(value)
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::ByzantineQuorum {
                current,
                proven,
                txns,
            } => write!(
                f,
                "{} txns do not extend state version {} to proven state version {}",
                txns,
                current.state_version(),
                proven.state_version()
            ),
            LedgerError::StateComputer(err) => Display::fmt(err, f),
        }
    }
}
