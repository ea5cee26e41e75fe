/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The state that the safety rules guard, and the pluggable store that persists it.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{data_types::ViewNumber, voting::Vote};

/// Views that the safety rules remember in order to never vote unsafely.
///
/// All of the views are non-decreasing over the lifetime of a node. A `SafetyState` is never updated in
/// place: [`SafetyRules`](super::SafetyRules) computes the next state as a whole and then replaces the
/// current one.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SafetyState {
    pub(super) highest_qc_view: ViewNumber,
    pub(super) locked_view: ViewNumber,
    pub(super) last_voted_view: ViewNumber,
    pub(super) committed_view: ViewNumber,
    pub(super) last_vote: Option<Vote>,
}

impl Default for SafetyState {
    fn default() -> Self {
        Self::initial()
    }
}

impl SafetyState {
    pub fn new(
        highest_qc_view: ViewNumber,
        locked_view: ViewNumber,
        last_voted_view: ViewNumber,
        committed_view: ViewNumber,
        last_vote: Option<Vote>,
    ) -> Self {
        Self {
            highest_qc_view,
            locked_view,
            last_voted_view,
            committed_view,
            last_vote,
        }
    }

    /// The state of a node that has not seen anything but the genesis vertex.
    pub fn initial() -> Self {
        Self::new(
            ViewNumber::genesis(),
            ViewNumber::genesis(),
            ViewNumber::genesis(),
            ViewNumber::genesis(),
            None,
        )
    }

    pub fn highest_qc_view(&self) -> ViewNumber {
        self.highest_qc_view
    }

    pub fn locked_view(&self) -> ViewNumber {
        self.locked_view
    }

    pub fn last_voted_view(&self) -> ViewNumber {
        self.last_voted_view
    }

    pub fn committed_view(&self) -> ViewNumber {
        self.committed_view
    }

    pub fn last_vote(&self) -> Option<&Vote> {
        self.last_vote.as_ref()
    }
}

/// Durable storage for [`SafetyState`].
///
/// [`SafetyRules`](super::SafetyRules) hands every new state to `commit_state` before the vote that
/// caused it is returned, so that a node that restarts never votes twice in the same view.
pub trait PersistentSafetyStateStore: Send {
    fn commit_state(&mut self, state: &SafetyState);

    /// Get the most recently committed state, if any.
    fn last_state(&self) -> Option<SafetyState>;
}

/// [`PersistentSafetyStateStore`] that keeps the Borsh serialization of the latest state in memory.
#[derive(Clone, Default)]
pub struct InMemorySafetyStateStore {
    bytes: Option<Vec<u8>>,
}

impl InMemorySafetyStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentSafetyStateStore for InMemorySafetyStateStore {
    fn commit_state(&mut self, state: &SafetyState) {
        match state.try_to_vec() {
            Ok(bytes) => self.bytes = Some(bytes),
            Err(err) => log::error!("Failed to serialize safety state: {}", err),
        }
    }

    fn last_state(&self) -> Option<SafetyState> {
        let bytes = self.bytes.as_ref()?;
        SafetyState::deserialize(&mut bytes.as_slice()).ok()
    }
}
