/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that delivers [events](crate::events) to the handlers registered for them.

use crate::events::*;
use crate::logging::Logger;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

// How long the event bus waits for an event before checking for the shutdown signal again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct EventHandlers {
    pub(crate) update_highest_qc_view_handlers: Vec<HandlerPtr<UpdateHighestQCViewEvent>>,
    pub(crate) update_locked_view_handlers: Vec<HandlerPtr<UpdateLockedViewEvent>>,
    pub(crate) commit_vertex_handlers: Vec<HandlerPtr<CommitVertexEvent>>,
    pub(crate) vote_handlers: Vec<HandlerPtr<VoteEvent>>,
    pub(crate) reject_vote_handlers: Vec<HandlerPtr<RejectVoteEvent>>,
    pub(crate) timeout_vote_handlers: Vec<HandlerPtr<TimeoutVoteEvent>>,
    pub(crate) mempool_add_handlers: Vec<HandlerPtr<MempoolAddEvent>>,
    pub(crate) prepare_vertex_handlers: Vec<HandlerPtr<PrepareVertexEvent>>,
    pub(crate) abstain_prepare_handlers: Vec<HandlerPtr<AbstainPrepareEvent>>,
    pub(crate) commit_ledger_handlers: Vec<HandlerPtr<CommitLedgerEvent>>,
    pub(crate) ignore_stale_commit_handlers: Vec<HandlerPtr<IgnoreStaleCommitEvent>>,
}

impl EventHandlers {
    /// Create the handlers to fire. If `log_events` is true, the default logger of every event type is
    /// registered before the user-supplied handlers.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        on_update_highest_qc_view: Option<HandlerPtr<UpdateHighestQCViewEvent>>,
        on_update_locked_view: Option<HandlerPtr<UpdateLockedViewEvent>>,
        on_commit_vertex: Option<HandlerPtr<CommitVertexEvent>>,
        on_vote: Option<HandlerPtr<VoteEvent>>,
        on_reject_vote: Option<HandlerPtr<RejectVoteEvent>>,
        on_timeout_vote: Option<HandlerPtr<TimeoutVoteEvent>>,
        on_mempool_add: Option<HandlerPtr<MempoolAddEvent>>,
        on_prepare_vertex: Option<HandlerPtr<PrepareVertexEvent>>,
        on_abstain_prepare: Option<HandlerPtr<AbstainPrepareEvent>>,
        on_commit_ledger: Option<HandlerPtr<CommitLedgerEvent>>,
        on_ignore_stale_commit: Option<HandlerPtr<IgnoreStaleCommitEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, user: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(user);
            handlers
        }

        EventHandlers {
            update_highest_qc_view_handlers: handlers(log_events, on_update_highest_qc_view),
            update_locked_view_handlers: handlers(log_events, on_update_locked_view),
            commit_vertex_handlers: handlers(log_events, on_commit_vertex),
            vote_handlers: handlers(log_events, on_vote),
            reject_vote_handlers: handlers(log_events, on_reject_vote),
            timeout_vote_handlers: handlers(log_events, on_timeout_vote),
            mempool_add_handlers: handlers(log_events, on_mempool_add),
            prepare_vertex_handlers: handlers(log_events, on_prepare_vertex),
            abstain_prepare_handlers: handlers(log_events, on_abstain_prepare),
            commit_ledger_handlers: handlers(log_events, on_commit_ledger),
            ignore_stale_commit_handlers: handlers(log_events, on_ignore_stale_commit),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.update_highest_qc_view_handlers.is_empty()
            && self.update_locked_view_handlers.is_empty()
            && self.commit_vertex_handlers.is_empty()
            && self.vote_handlers.is_empty()
            && self.reject_vote_handlers.is_empty()
            && self.timeout_vote_handlers.is_empty()
            && self.mempool_add_handlers.is_empty()
            && self.prepare_vertex_handlers.is_empty()
            && self.abstain_prepare_handlers.is_empty()
            && self.commit_ledger_handlers.is_empty()
            && self.ignore_stale_commit_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::UpdateHighestQCView(update_highest_qc_view_event) => self
                .update_highest_qc_view_handlers
                .iter()
                .for_each(|handler| handler(&update_highest_qc_view_event)),

            Event::UpdateLockedView(update_locked_view_event) => self
                .update_locked_view_handlers
                .iter()
                .for_each(|handler| handler(&update_locked_view_event)),

            Event::CommitVertex(commit_vertex_event) => self
                .commit_vertex_handlers
                .iter()
                .for_each(|handler| handler(&commit_vertex_event)),

            Event::Vote(vote_event) => self
                .vote_handlers
                .iter()
                .for_each(|handler| handler(&vote_event)),

            Event::RejectVote(reject_vote_event) => self
                .reject_vote_handlers
                .iter()
                .for_each(|handler| handler(&reject_vote_event)),

            Event::TimeoutVote(timeout_vote_event) => self
                .timeout_vote_handlers
                .iter()
                .for_each(|handler| handler(&timeout_vote_event)),

            Event::MempoolAdd(mempool_add_event) => self
                .mempool_add_handlers
                .iter()
                .for_each(|handler| handler(&mempool_add_event)),

            Event::PrepareVertex(prepare_vertex_event) => self
                .prepare_vertex_handlers
                .iter()
                .for_each(|handler| handler(&prepare_vertex_event)),

            Event::AbstainPrepare(abstain_prepare_event) => self
                .abstain_prepare_handlers
                .iter()
                .for_each(|handler| handler(&abstain_prepare_event)),

            Event::CommitLedger(commit_ledger_event) => self
                .commit_ledger_handlers
                .iter()
                .for_each(|handler| handler(&commit_ledger_event)),

            Event::IgnoreStaleCommit(ignore_stale_commit_event) => self
                .ignore_stale_commit_handlers
                .iter()
                .for_each(|handler| handler(&ignore_stale_commit_event)),
        }
    }
}

/// Start the thread that fires `event_handlers` for every event received on `event_subscriber`.
///
/// On receiving the shutdown signal, the thread fires the handlers of the events that are already queued
/// and then exits.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
