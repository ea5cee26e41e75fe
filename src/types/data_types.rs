/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or numbers, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    ops::AddAssign,
};

use borsh::{BorshDeserialize, BorshSerialize};

use super::crypto_primitives::{CryptoHasher, Digest};

/// BFT view number.
///
/// Views are totally ordered and start at [`genesis`](Self::genesis) (0) in every epoch. The only
/// vertex that may carry the genesis view is the genesis vertex of the epoch.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ViewNumber(u64);

impl ViewNumber {
    /// Create a new `ViewNumber` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// The view of the genesis vertex.
    pub const fn genesis() -> Self {
        Self(0)
    }

    /// Get the inner `u64` value of this `ViewNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    pub const fn is_genesis(&self) -> bool {
        self.0 == 0
    }

    /// Get the view directly following this one.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for ViewNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Number of a validator-set era.
///
/// An epoch ends with an "end of epoch" ledger header, i.e., a header that carries the validator set of
/// the next epoch.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct EpochNumber(u64);

impl EpochNumber {
    /// Create a new `EpochNumber` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `EpochNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for EpochNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// 32-byte cryptographic hash.
///
/// # Choice of cryptographic hash function
///
/// The type signature of this type allows instances of `CryptoHash` to be produced by any cryptographic
/// hash function with a 32-byte output. Inside this crate, `CryptoHash`-es are produced by a
/// [`Hasher`](super::crypto_primitives::Hasher), except for [`TxnId`]s and vertex ids, which are always
/// SHA256 hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zero hash. Used as the accumulator hash of an empty ledger.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ed25519 digital signature.
///
/// These are produced using the [`ed25519_dalek`] crate, whose main definitions are re-exported from the
/// [`crypto_primitives`](super::crypto_primitives) module.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bytes of an Ed25519 verifying key, used where a key has to be serialized with Borsh.
pub type VerifyingKeyBytes = [u8; 32];

/// Weight of a specific validator's votes in consensus decisions.
///
/// The higher the power, the more weight the validator's votes have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Power(u64);

impl Power {
    /// Create a new `Power` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `Power`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Sum of the [`Power`]s of a set of validators.
///
/// The inner type that this newtype wraps around is `u128`, which is bigger than inner `u64` that
/// `Power` wraps around. This is so that summing up large `Power`s do not cause `TotalPower`'s inner
/// value to overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct TotalPower(u128);

impl TotalPower {
    /// Create a new `TotalPower` wrapping `int`.
    pub const fn new(int: u128) -> Self {
        Self(int)
    }

    /// Get the inner `u128` value of this `TotalPower`.
    pub const fn int(&self) -> u128 {
        self.0
    }
}

impl AddAssign<Power> for TotalPower {
    fn add_assign(&mut self, rhs: Power) {
        self.0.add_assign(rhs.0 as u128)
    }
}

/// Identifier of a [`Txn`]: the SHA256 hash of its payload.
pub type TxnId = CryptoHash;

/// Opaque transaction payload.
///
/// The meaning of the bytes is only known to the [`StateComputer`](crate::ledger::StateComputer). Inside
/// this crate a `Txn` is only ever identified, ordered, and handed around.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Txn(Vec<u8>);

impl Txn {
    /// Create a new `Txn` wrapping `payload`.
    pub fn new(payload: Vec<u8>) -> Self {
        Self(payload)
    }

    /// Get a reference to the payload of this `Txn`.
    pub fn payload(&self) -> &[u8] {
        &self.0
    }

    /// Compute the identifier of this `Txn`.
    pub fn id(&self) -> TxnId {
        let mut hasher = CryptoHasher::new();
        hasher.update(&self.0);
        CryptoHash::new(hasher.finalize().into())
    }
}

impl Debug for Txn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({:?})", self.id())
    }
}
