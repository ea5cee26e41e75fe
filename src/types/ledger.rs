/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that describe the state of the ledger: accumulator states, ledger headers, and the
//! quorum-signed proofs that make a ledger header authoritative.

use std::{cmp::Ordering, collections::BTreeMap};

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    data_types::{
        CryptoHash, EpochNumber, Power, SignatureBytes, TotalPower, Txn, VerifyingKeyBytes,
        ViewNumber,
    },
    validator_set::ValidatorSet,
};

/// The state of the ledger accumulator after `state_version` transactions have been folded into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct AccumulatorState {
    state_version: u64,
    accumulator_hash: CryptoHash,
}

impl AccumulatorState {
    pub fn new(state_version: u64, accumulator_hash: CryptoHash) -> Self {
        Self {
            state_version,
            accumulator_hash,
        }
    }

    /// The state of an accumulator that has not accumulated anything.
    pub fn genesis() -> Self {
        Self::new(0, CryptoHash::zero())
    }

    pub fn state_version(&self) -> u64 {
        self.state_version
    }

    pub fn accumulator_hash(&self) -> CryptoHash {
        self.accumulator_hash
    }
}

/// Summary of the ledger as of a specific vertex.
///
/// ## End of epoch
///
/// A header is "end of epoch" if it carries the validator set of the next epoch. No transactions may be
/// executed on top of an end of epoch header: vertices that extend it only advance its view and
/// timestamp.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LedgerHeader {
    epoch: EpochNumber,
    view: ViewNumber,
    accumulator_state: AccumulatorState,
    timestamp: u64,
    next_validator_set: Option<ValidatorSet>,
}

impl LedgerHeader {
    pub fn new(
        epoch: EpochNumber,
        view: ViewNumber,
        accumulator_state: AccumulatorState,
        timestamp: u64,
        next_validator_set: Option<ValidatorSet>,
    ) -> Self {
        Self {
            epoch,
            view,
            accumulator_state,
            timestamp,
            next_validator_set,
        }
    }

    /// Create the header that starts the ledger. It sits in epoch 0 at the genesis view and hands over to
    /// `validator_set` if one is given.
    pub fn genesis(
        accumulator_state: AccumulatorState,
        validator_set: Option<ValidatorSet>,
        timestamp: u64,
    ) -> Self {
        Self::new(
            EpochNumber::new(0),
            ViewNumber::genesis(),
            accumulator_state,
            timestamp,
            validator_set,
        )
    }

    /// Create a copy of this header that only differs in its `view` and `timestamp`.
    pub fn update_view_and_timestamp(&self, view: ViewNumber, timestamp: u64) -> Self {
        Self {
            view,
            timestamp,
            ..self.clone()
        }
    }

    pub fn epoch(&self) -> EpochNumber {
        self.epoch
    }

    pub fn view(&self) -> ViewNumber {
        self.view
    }

    pub fn accumulator_state(&self) -> &AccumulatorState {
        &self.accumulator_state
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn next_validator_set(&self) -> Option<&ValidatorSet> {
        self.next_validator_set.as_ref()
    }

    pub fn is_end_of_epoch(&self) -> bool {
        self.next_validator_set.is_some()
    }
}

/// A validator's signature together with the time at which the validator made it and the power it
/// carried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TimestampedSignature {
    pub timestamp: u64,
    pub power: Power,
    pub signature: SignatureBytes,
}

/// The signatures that make up a quorum certificate, keyed by the verifying key of the signer.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TimestampedSignatures {
    signatures: BTreeMap<VerifyingKeyBytes, TimestampedSignature>,
}

impl TimestampedSignatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the signature of `signer`, replacing the signature it already had in the set, if any.
    pub fn insert(&mut self, signer: VerifyingKeyBytes, signature: TimestampedSignature) {
        self.signatures.insert(signer, signature);
    }

    pub fn get(&self, signer: &VerifyingKeyBytes) -> Option<&TimestampedSignature> {
        self.signatures.get(signer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VerifyingKeyBytes, &TimestampedSignature)> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Compute the power-weighted median of the signers' timestamps.
    ///
    /// Returns `None` if there are no signatures, or if none of the signers carries any power.
    pub fn weighted_timestamp(&self) -> Option<u64> {
        let mut weighted: Vec<(u64, Power)> = self
            .signatures
            .values()
            .map(|s| (s.timestamp, s.power))
            .collect();
        weighted.sort_unstable_by_key(|(timestamp, _)| *timestamp);

        let mut total = TotalPower::new(0);
        for (_, power) in &weighted {
            total += *power;
        }
        if total.int() == 0 {
            return None;
        }

        let mut cumulative = TotalPower::new(0);
        for (timestamp, power) in weighted {
            cumulative += power;
            if cumulative.int() * 2 >= total.int() {
                return Some(timestamp);
            }
        }
        None
    }
}

/// A [`LedgerHeader`] together with the quorum signatures that certify it.
///
/// The current `LedgerProof` of a node is the authoritative tip of its committed ledger.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LedgerProof {
    opaque: CryptoHash,
    ledger_header: LedgerHeader,
    signatures: TimestampedSignatures,
}

impl LedgerProof {
    pub fn new(
        opaque: CryptoHash,
        ledger_header: LedgerHeader,
        signatures: TimestampedSignatures,
    ) -> Self {
        Self {
            opaque,
            ledger_header,
            signatures,
        }
    }

    /// Create an unsigned proof of the genesis header.
    pub fn genesis(
        accumulator_state: AccumulatorState,
        validator_set: Option<ValidatorSet>,
        timestamp: u64,
    ) -> Self {
        Self::new(
            CryptoHash::zero(),
            LedgerHeader::genesis(accumulator_state, validator_set, timestamp),
            TimestampedSignatures::new(),
        )
    }

    /// Hash of the quorum data that this proof was formed for.
    pub fn opaque(&self) -> CryptoHash {
        self.opaque
    }

    pub fn ledger_header(&self) -> &LedgerHeader {
        &self.ledger_header
    }

    pub fn signatures(&self) -> &TimestampedSignatures {
        &self.signatures
    }

    pub fn epoch(&self) -> EpochNumber {
        self.ledger_header.epoch()
    }

    pub fn view(&self) -> ViewNumber {
        self.ledger_header.view()
    }

    pub fn accumulator_state(&self) -> &AccumulatorState {
        self.ledger_header.accumulator_state()
    }

    pub fn state_version(&self) -> u64 {
        self.ledger_header.accumulator_state().state_version()
    }

    pub fn timestamp(&self) -> u64 {
        self.ledger_header.timestamp()
    }

    pub fn is_end_of_epoch(&self) -> bool {
        self.ledger_header.is_end_of_epoch()
    }

    pub fn next_validator_set(&self) -> Option<&ValidatorSet> {
        self.ledger_header.next_validator_set()
    }
}

/// Total order over [`LedgerProof`]s that decides whether a commit request is newer than the current
/// ledger tip.
pub trait HeaderComparator: Send + Sync {
    fn compare(&self, a: &LedgerProof, b: &LedgerProof) -> Ordering;
}

/// Orders proofs by epoch, then by view, then by state version.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderByEpochViewAndVersion;

impl HeaderComparator for OrderByEpochViewAndVersion {
    fn compare(&self, a: &LedgerProof, b: &LedgerProof) -> Ordering {
        a.epoch()
            .cmp(&b.epoch())
            .then_with(|| a.view().cmp(&b.view()))
            .then_with(|| a.state_version().cmp(&b.state_version()))
    }
}

/// A sequence of transactions together with the proof of the ledger state that they lead to. This is
/// the unit in which transactions get committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedTxnsAndProof {
    txns: Vec<Txn>,
    proof: LedgerProof,
}

impl VerifiedTxnsAndProof {
    pub fn new(txns: Vec<Txn>, proof: LedgerProof) -> Self {
        Self { txns, proof }
    }

    pub fn txns(&self) -> &[Txn] {
        &self.txns
    }

    pub fn proof(&self) -> &LedgerProof {
        &self.proof
    }

    pub fn into_parts(self) -> (Vec<Txn>, LedgerProof) {
        (self.txns, self.proof)
    }
}
