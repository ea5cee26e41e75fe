/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The set of validators that takes over at the end of an epoch.

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    io, slice,
};

use super::data_types::{Power, VerifyingKeyBytes};

pub use ed25519_dalek::VerifyingKey;

/// Stores the identities of validators and their voting powers.
///
/// ## Ordering of validators
///
/// `ValidatorSet` internally maintains the list of validators in ascending order of their
/// `VerifyingKey`s, and avails the methods [`validators`](ValidatorSet::validators) and
/// [`validators_and_powers`](ValidatorSet::validators_and_powers) that walk them in this order.
///
/// ## Serialization
///
/// `ValidatorSet` is serialized through [`ValidatorSetBytes`], since `VerifyingKey` does not implement
/// the Borsh traits.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    // The verifying keys of validators are included here in ascending order.
    validators: Vec<VerifyingKey>,
    powers: HashMap<VerifyingKey, Power>,
}

impl Default for ValidatorSet {
    fn default() -> Self {
        ValidatorSet::new()
    }
}

impl ValidatorSet {
    /// Create an empty validator set.
    pub fn new() -> ValidatorSet {
        Self {
            validators: Vec::new(),
            powers: HashMap::new(),
        }
    }

    /// Put a `validator` with the specified `power` into the validator set, placing them in a position that
    /// preserves the [ordering of validators](Self#ordering-of-validators).
    ///
    /// If `validator` already exists in the validator set, this function updates its power instead.
    pub fn put(&mut self, validator: &VerifyingKey, power: Power) {
        let validator_bytes = validator.to_bytes();
        if let Err(insert_pos) = self
            .validators
            .binary_search_by(|v| v.to_bytes().cmp(&validator_bytes))
        {
            self.validators.insert(insert_pos, *validator);
        }

        self.powers.insert(*validator, power);
    }

    /// Get the power of the specified `validator` inside the validator set.
    pub fn power(&self, validator: &VerifyingKey) -> Option<&Power> {
        self.powers.get(validator)
    }

    /// Get an iterator through validators' verifying keys which walks through them in ascending order.
    pub fn validators(&self) -> slice::Iter<VerifyingKey> {
        self.validators.iter()
    }

    /// Get a vector containing each validator and its power, in ascending order of the validators' verifying keys.
    pub fn validators_and_powers(&self) -> Vec<(VerifyingKey, Power)> {
        self.validators()
            .filter_map(|v| self.power(v).map(|power| (*v, *power)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for ValidatorSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.validators_and_powers()
                    .iter()
                    .map(|(v, p)| (v.to_bytes(), p.int())),
            )
            .finish()
    }
}

/// Intermediate representation of [`ValidatorSet`] for safe serialization and deserialization.
///
/// This type is internally exactly like `ValidatorSet`, but replaces `VerifyingKey` with
/// `VerifyingKeyBytes`, and so is straightforward to serialize and deserialize. However, this also means
/// that instances of this type are not guaranteed to contain "valid" Ed25519 verifying keys, and
/// therefore conversion from this type into `ValidatorSet` using `TryFrom` is fallible.
#[derive(Clone, BorshSerialize, BorshDeserialize)]
pub struct ValidatorSetBytes {
    // Pairs are kept in the ascending order of the verifying keys.
    validators_and_powers: Vec<(VerifyingKeyBytes, Power)>,
}

impl TryFrom<ValidatorSetBytes> for ValidatorSet {
    type Error = ed25519_dalek::SignatureError;

    fn try_from(value: ValidatorSetBytes) -> Result<Self, Self::Error> {
        let mut validator_set = ValidatorSet::new();
        for (pk_bytes, power) in value.validators_and_powers {
            let pk = VerifyingKey::from_bytes(&pk_bytes)?;
            validator_set.put(&pk, power);
        }
        Ok(validator_set)
    }
}

impl From<&ValidatorSet> for ValidatorSetBytes {
    fn from(value: &ValidatorSet) -> Self {
        ValidatorSetBytes {
            validators_and_powers: value
                .validators_and_powers()
                .into_iter()
                .map(|(pk, power)| (pk.to_bytes(), power))
                .collect(),
        }
    }
}

impl BorshSerialize for ValidatorSet {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        ValidatorSetBytes::from(self).serialize(writer)
    }
}

impl BorshDeserialize for ValidatorSet {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let bytes = ValidatorSetBytes::deserialize_reader(reader)?;
        ValidatorSet::try_from(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
