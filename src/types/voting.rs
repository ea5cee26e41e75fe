/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Votes and the quorum certificates that votes are aggregated into.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    crypto_primitives::Hasher,
    data_types::{EpochNumber, SignatureBytes, VerifyingKeyBytes, ViewNumber},
    ledger::{LedgerHeader, LedgerProof, TimestampedSignatures},
    vertex::{BftHeader, Vertex},
};

/// What a vote votes over: the proposed vertex, its parent, and, if the vote completes a 3-chain, the
/// vertex that becomes committed.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VoteData {
    proposed: BftHeader,
    parent: BftHeader,
    committed: Option<BftHeader>,
}

impl VoteData {
    pub fn new(proposed: BftHeader, parent: BftHeader, committed: Option<BftHeader>) -> Self {
        Self {
            proposed,
            parent,
            committed,
        }
    }

    pub fn proposed(&self) -> &BftHeader {
        &self.proposed
    }

    pub fn parent(&self) -> &BftHeader {
        &self.parent
    }

    pub fn committed(&self) -> Option<&BftHeader> {
        self.committed.as_ref()
    }

    /// Serialize the pair `(self, timestamp)` that a validator signs when it votes.
    pub fn timestamped_bytes(&self, timestamp: u64) -> Vec<u8> {
        let mut bytes = self.try_to_vec().unwrap();
        bytes.extend_from_slice(&timestamp.try_to_vec().unwrap());
        bytes
    }
}

/// Proof that a quorum of validators voted for the same [`VoteData`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QuorumCertificate {
    vote_data: VoteData,
    signatures: TimestampedSignatures,
}

impl QuorumCertificate {
    pub fn new(vote_data: VoteData, signatures: TimestampedSignatures) -> Self {
        Self {
            vote_data,
            signatures,
        }
    }

    /// The unsigned QC carried by the genesis vertex.
    pub(crate) fn genesis_ancestor(ledger_header: LedgerHeader) -> Self {
        let header = BftHeader::genesis_ancestor(ledger_header);
        Self::new(
            VoteData::new(header.clone(), header.clone(), Some(header)),
            TimestampedSignatures::new(),
        )
    }

    /// The unsigned QC that certifies `genesis_vertex` and commits it.
    pub fn genesis(genesis_vertex: &Vertex, ledger_header: LedgerHeader) -> Self {
        let header = BftHeader::new(ViewNumber::genesis(), genesis_vertex.id(), ledger_header);
        Self::new(
            VoteData::new(header.clone(), header.clone(), Some(header)),
            TimestampedSignatures::new(),
        )
    }

    pub fn vote_data(&self) -> &VoteData {
        &self.vote_data
    }

    pub fn signatures(&self) -> &TimestampedSignatures {
        &self.signatures
    }

    pub fn view(&self) -> ViewNumber {
        self.vote_data.proposed.view()
    }

    pub fn epoch(&self) -> EpochNumber {
        self.vote_data.proposed.ledger_header().epoch()
    }

    pub fn proposed(&self) -> &BftHeader {
        &self.vote_data.proposed
    }

    /// Header of the parent of the certified vertex, absent if this is a genesis QC.
    pub fn parent(&self) -> Option<&BftHeader> {
        if self.view().is_genesis() {
            None
        } else {
            Some(&self.vote_data.parent)
        }
    }

    /// The commit marker embedded in this QC.
    pub fn committed(&self) -> Option<&BftHeader> {
        self.vote_data.committed()
    }

    /// Power-weighted median of the signers' timestamps.
    pub fn weighted_timestamp(&self) -> Option<u64> {
        self.signatures.weighted_timestamp()
    }

    /// Get the header that this QC commits, together with the [`LedgerProof`] that the QC's signatures
    /// make of its ledger header.
    ///
    /// The proof's `opaque` is the hash of the QC's vote data.
    pub fn committed_and_ledger_state_proof(
        &self,
        hasher: &impl Hasher,
    ) -> Option<(BftHeader, LedgerProof)> {
        let committed = self.vote_data.committed()?;
        let opaque = hasher.hash_bytes(&self.vote_data.try_to_vec().unwrap());
        let proof = LedgerProof::new(
            opaque,
            committed.ledger_header().clone(),
            self.signatures.clone(),
        );
        Some((committed.clone(), proof))
    }
}

/// A validator's vote for a vertex.
///
/// A vote can be turned into a timeout vote by attaching a signature over the [`VoteTimeout`] of the
/// vote's view and epoch.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vote {
    author: VerifyingKeyBytes,
    vote_data: VoteData,
    timestamp: u64,
    signature: SignatureBytes,
    timeout_signature: Option<SignatureBytes>,
}

impl Vote {
    pub fn new(
        author: VerifyingKeyBytes,
        vote_data: VoteData,
        timestamp: u64,
        signature: SignatureBytes,
        timeout_signature: Option<SignatureBytes>,
    ) -> Self {
        Self {
            author,
            vote_data,
            timestamp,
            signature,
            timeout_signature,
        }
    }

    pub fn author(&self) -> &VerifyingKeyBytes {
        &self.author
    }

    pub fn vote_data(&self) -> &VoteData {
        &self.vote_data
    }

    pub fn view(&self) -> ViewNumber {
        self.vote_data.proposed().view()
    }

    pub fn epoch(&self) -> EpochNumber {
        self.vote_data.proposed().ledger_header().epoch()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn signature(&self) -> &SignatureBytes {
        &self.signature
    }

    pub fn timeout_signature(&self) -> Option<&SignatureBytes> {
        self.timeout_signature.as_ref()
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout_signature.is_some()
    }

    /// Create a copy of this vote that carries `timeout_signature`.
    pub fn with_timeout_signature(&self, timeout_signature: SignatureBytes) -> Self {
        Self {
            timeout_signature: Some(timeout_signature),
            ..self.clone()
        }
    }
}

/// What a timeout signature signs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VoteTimeout {
    view: ViewNumber,
    epoch: EpochNumber,
}

impl VoteTimeout {
    pub fn new(view: ViewNumber, epoch: EpochNumber) -> Self {
        Self { view, epoch }
    }

    pub fn of(vote: &Vote) -> Self {
        Self::new(vote.view(), vote.epoch())
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn epoch(&self) -> EpochNumber {
        self.epoch
    }
}
