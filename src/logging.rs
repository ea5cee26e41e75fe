/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the core's
//! [configuration](crate::core::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [CommitLedger](crate::events::CommitLedgerEvent) is printed:
//!
//! ```text
//! CommitLedger, 1701329264, Bft, 3, 1, 12, 42
//! ```
//!
//! In the snippet:
//! - The third value is where the commit came from.
//! - The fourth value is the number of transactions committed.
//! - The fifth, sixth and seventh values are the epoch, view, and state version of the new ledger proof.

use crate::events::*;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

// Names of each event in PascalCase for printing:
pub const UPDATE_HIGHEST_QC_VIEW: &str = "UpdateHighestQCView";
pub const UPDATE_LOCKED_VIEW: &str = "UpdateLockedView";
pub const COMMIT_VERTEX: &str = "CommitVertex";
pub const VOTE: &str = "Vote";
pub const REJECT_VOTE: &str = "RejectVote";
pub const TIMEOUT_VOTE: &str = "TimeoutVote";

pub const MEMPOOL_ADD: &str = "MempoolAdd";
pub const PREPARE_VERTEX: &str = "PrepareVertex";
pub const ABSTAIN_PREPARE: &str = "AbstainPrepare";
pub const COMMIT_LEDGER: &str = "CommitLedger";
pub const IGNORE_STALE_COMMIT: &str = "IgnoreStaleCommit";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for UpdateHighestQCViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_highest_qc_view_event: &UpdateHighestQCViewEvent| {
            log::info!(
                "{}, {}, {}",
                UPDATE_HIGHEST_QC_VIEW,
                secs_since_unix_epoch(update_highest_qc_view_event.timestamp),
                update_highest_qc_view_event.highest_qc_view
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateLockedViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_locked_view_event: &UpdateLockedViewEvent| {
            log::info!(
                "{}, {}, {}",
                UPDATE_LOCKED_VIEW,
                secs_since_unix_epoch(update_locked_view_event.timestamp),
                update_locked_view_event.locked_view
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitVertexEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_vertex_event: &CommitVertexEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COMMIT_VERTEX,
                secs_since_unix_epoch(commit_vertex_event.timestamp),
                first_seven_base64_chars(&commit_vertex_event.vertex.bytes()),
                commit_vertex_event.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for VoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |vote_event: &VoteEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                VOTE,
                secs_since_unix_epoch(vote_event.timestamp),
                first_seven_base64_chars(&vote_event.vote.vote_data().proposed().vertex_id().bytes()),
                vote_event.vote.view(),
                vote_event.vote.vote_data().committed().is_some()
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectVoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_vote_event: &RejectVoteEvent| {
            log::info!(
                "{}, {}, {}, {}",
                REJECT_VOTE,
                secs_since_unix_epoch(reject_vote_event.timestamp),
                reject_vote_event.view,
                reject_vote_event.violation
            )
        };
        Box::new(logger)
    }
}

impl Logger for TimeoutVoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |timeout_vote_event: &TimeoutVoteEvent| {
            log::info!(
                "{}, {}, {}, {}",
                TIMEOUT_VOTE,
                secs_since_unix_epoch(timeout_vote_event.timestamp),
                timeout_vote_event.epoch,
                timeout_vote_event.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for MempoolAddEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |mempool_add_event: &MempoolAddEvent| {
            log::info!(
                "{}, {}, {}, {}",
                MEMPOOL_ADD,
                secs_since_unix_epoch(mempool_add_event.timestamp),
                first_seven_base64_chars(&mempool_add_event.txn.bytes()),
                mempool_add_event
                    .origin
                    .map(|origin| first_seven_base64_chars(&origin))
                    .unwrap_or_else(|| String::from("local"))
            )
        };
        Box::new(logger)
    }
}

impl Logger for PrepareVertexEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prepare_vertex_event: &PrepareVertexEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                PREPARE_VERTEX,
                secs_since_unix_epoch(prepare_vertex_event.timestamp),
                first_seven_base64_chars(&prepare_vertex_event.vertex.bytes()),
                prepare_vertex_event.view,
                prepare_vertex_event.state_version,
                prepare_vertex_event.successful,
                prepare_vertex_event.failed
            )
        };
        Box::new(logger)
    }
}

impl Logger for AbstainPrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |abstain_prepare_event: &AbstainPrepareEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ABSTAIN_PREPARE,
                secs_since_unix_epoch(abstain_prepare_event.timestamp),
                first_seven_base64_chars(&abstain_prepare_event.vertex.bytes()),
                abstain_prepare_event.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitLedgerEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_ledger_event: &CommitLedgerEvent| {
            log::info!(
                "{}, {}, {:?}, {}, {}, {}, {}",
                COMMIT_LEDGER,
                secs_since_unix_epoch(commit_ledger_event.timestamp),
                commit_ledger_event.source,
                commit_ledger_event.txns,
                commit_ledger_event.proof.epoch(),
                commit_ledger_event.proof.view(),
                commit_ledger_event.proof.state_version()
            )
        };
        Box::new(logger)
    }
}

impl Logger for IgnoreStaleCommitEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |ignore_stale_commit_event: &IgnoreStaleCommitEvent| {
            log::info!(
                "{}, {}, {:?}, {}, {}, {}",
                IGNORE_STALE_COMMIT,
                secs_since_unix_epoch(ignore_stale_commit_event.timestamp),
                ignore_stale_commit_event.source,
                ignore_stale_commit_event.proof.epoch(),
                ignore_stale_commit_event.proof.view(),
                ignore_stale_commit_event.proof.state_version()
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
