/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules that guarantee that a node never casts a vote that could lead to conflicting commits.
//!
//! The safety rules own a [`SafetyState`] and update it on two kinds of events:
//! 1. Seeing a quorum certificate ([`SafetyRules::process`]),
//! 2. Being asked to vote for a vertex ([`SafetyRules::vote_for`]).
//!
//! ## Voting rules
//!
//! A node votes at most once per view: a vertex whose view is not greater than the last voted view is
//! refused with [`SafetyViolation::DoubleVote`]. A node also never votes for a vertex that does not
//! respect its lock: a vertex whose QC is for a view lower than the locked view is refused with
//! [`SafetyViolation::LockViolation`].
//!
//! ## Locking rules
//!
//! A vertex is locked once there is a 2-chain on top of it, i.e., once the node sees a QC for one of its
//! children whose view directly follows its own. The locked view only ever moves forward.
//!
//! ## Commit rules
//!
//! A vertex becomes eligible for commit once it is followed by a 3-chain of consecutive views. When a
//! node votes for a vertex in view `V + 2` whose parent is in view `V + 1` and whose grandparent is in view
//! `V`, the vote carries the header of the grandparent as its commit marker. Once the QC formed from such
//! votes is [processed](SafetyRules::process), the committed view advances.

pub mod rules;

pub mod state;

pub use rules::SafetyRules;
pub use state::{InMemorySafetyStateStore, PersistentSafetyStateStore, SafetyState};

use std::fmt::{self, Display, Formatter};

use crate::types::data_types::ViewNumber;

/// Reasons why the safety rules refuse to sign something.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SafetyViolation {
    /// The node has already voted in `view` or a later view.
    DoubleVote {
        view: ViewNumber,
        last_voted_view: ViewNumber,
    },

    /// The QC that the vertex extends is for a view lower than the node's locked view.
    LockViolation {
        qc_view: ViewNumber,
        locked_view: ViewNumber,
    },
}

impl Display for SafetyViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SafetyViolation::DoubleVote {
                view,
                last_voted_view,
            } => write!(
                f,
                "double vote in view {} (last voted in view {})",
                view, last_voted_view
            ),
            SafetyViolation::LockViolation { qc_view, locked_view } => write!(
                f,
                "QC view {} is below the locked view {}",
                qc_view, locked_view
            ),
        }
    }
}
