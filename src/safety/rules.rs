/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use borsh::BorshSerialize;

use crate::events::{
    CommitVertexEvent, Event, RejectVoteEvent, TimeoutVoteEvent, UpdateHighestQCViewEvent,
    UpdateLockedViewEvent, VoteEvent,
};
use crate::types::{
    crypto_primitives::{HashSigner, Hasher},
    data_types::{SignatureBytes, ViewNumber},
    vertex::{BftHeader, Vertex},
    voting::{QuorumCertificate, Vote, VoteData, VoteTimeout},
};

use super::{PersistentSafetyStateStore, SafetyState, SafetyViolation};

/// The per-node state machine that decides whether the node may vote.
///
/// `SafetyRules` is owned by the consensus event loop, and all of its state-changing methods take
/// `&mut self`.
pub struct SafetyRules<H: Hasher, S: HashSigner, P: PersistentSafetyStateStore> {
    hasher: H,
    signer: S,
    state: SafetyState,
    store: P,
    event_publisher: Option<Sender<Event>>,
}

impl<H: Hasher, S: HashSigner, P: PersistentSafetyStateStore> SafetyRules<H, S, P> {
    pub fn new(
        hasher: H,
        signer: S,
        initial_state: SafetyState,
        store: P,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            hasher,
            signer,
            state: initial_state,
            store,
            event_publisher,
        }
    }

    pub fn state(&self) -> &SafetyState {
        &self.state
    }

    /// Update the safety state on seeing `qc`, and return the header that `qc` commits if it commits a
    /// vertex that the node has not seen committed yet.
    ///
    /// ## State updates
    ///
    /// 1. The highest QC view becomes `qc.view()` if that is higher.
    /// 2. If `qc`'s parent is in the view directly before `qc`'s view, and that view is higher than the
    ///    locked view, the parent's view becomes the locked view.
    /// 3. If `qc` carries a commit marker for a view higher than the committed view, the committed view
    ///    advances to it.
    pub fn process(&mut self, qc: &QuorumCertificate) -> Option<BftHeader> {
        let mut next = self.state.clone();

        /* 1 */
        if qc.view() > next.highest_qc_view {
            next.highest_qc_view = qc.view();
        }

        /* 2 */
        if let Some(parent) = qc.parent() {
            if parent.view() > next.locked_view && parent.view().next() == qc.view() {
                next.locked_view = parent.view();
            }
        }

        /* 3 */
        let committed = qc
            .committed()
            .filter(|committed| committed.view() > next.committed_view)
            .cloned();
        if let Some(committed) = &committed {
            next.committed_view = committed.view();
        }

        if next != self.state {
            self.publish_view_updates(&next, committed.as_ref());
            self.commit_state(next);
        }

        committed
    }

    /// Vote for `vertex`, whose prepared header is `proposed_header`, at local time `timestamp`.
    ///
    /// ## Conditional checks
    ///
    /// `vote_for` returns a vote in case all of the following predicates are `true`:
    /// 1. `vertex.view()` is greater than the last voted view.
    /// 2. `vertex.qc().view()` is not lower than the locked view.
    ///
    /// The vote carries a commit marker if `vertex` completes a 3-chain, as decided by
    /// [`vertex_to_commit`](Self::vertex_to_commit).
    pub fn vote_for(
        &mut self,
        vertex: &Vertex,
        proposed_header: BftHeader,
        timestamp: u64,
    ) -> Result<Vote, SafetyViolation> {
        /* 1 */
        if vertex.view() <= self.state.last_voted_view {
            return Err(self.reject(
                vertex.view(),
                SafetyViolation::DoubleVote {
                    view: vertex.view(),
                    last_voted_view: self.state.last_voted_view,
                },
            ));
        }

        /* 2 */
        if vertex.qc().view() < self.state.locked_view {
            return Err(self.reject(
                vertex.view(),
                SafetyViolation::LockViolation {
                    qc_view: vertex.qc().view(),
                    locked_view: self.state.locked_view,
                },
            ));
        }

        let to_commit = Self::vertex_to_commit(vertex).cloned();
        let vote_data = VoteData::new(proposed_header, vertex.parent_header().clone(), to_commit);
        let hash = self
            .hasher
            .hash_bytes(&vote_data.timestamped_bytes(timestamp));
        let signature = self.signer.sign(&hash);
        let vote = Vote::new(
            self.signer.public().to_bytes(),
            vote_data,
            timestamp,
            signature,
            None,
        );

        let mut next = self.state.clone();
        next.last_voted_view = vertex.view();
        next.last_vote = Some(vote.clone());
        self.commit_state(next);

        Event::publish(
            &self.event_publisher,
            Event::Vote(VoteEvent {
                timestamp: SystemTime::now(),
                vote: vote.clone(),
            }),
        );

        Ok(vote)
    }

    /// Returns the header of the vertex that becomes committed if `vertex` gets a QC.
    ///
    /// ## Commit rule
    ///
    /// That is the grandparent of `vertex`, in case all of the following predicates are `true`:
    /// 1. `vertex`'s view directly follows its parent's view.
    /// 2. Neither the parent nor the grandparent is a genesis vertex.
    /// 3. The parent's view directly follows the grandparent's view.
    pub fn vertex_to_commit(vertex: &Vertex) -> Option<&BftHeader> {
        let parent = vertex.parent_header();
        let grandparent = vertex.grandparent_header()?;

        if
        /* 1 */
        vertex.view() == parent.view().next() &&
        /* 2 */ !parent.view().is_genesis() && !grandparent.view().is_genesis() &&
        /* 3 */ parent.view() == grandparent.view().next()
        {
            Some(grandparent)
        } else {
            None
        }
    }

    /// Sign `vertex` as its proposer.
    ///
    /// The proposal is refused if the QC that `vertex` extends is for a view lower than the locked view.
    pub fn sign_proposal(&self, vertex: &Vertex) -> Result<SignatureBytes, SafetyViolation> {
        if vertex.qc().view() < self.state.locked_view {
            return Err(self.reject(
                vertex.view(),
                SafetyViolation::LockViolation {
                    qc_view: vertex.qc().view(),
                    locked_view: self.state.locked_view,
                },
            ));
        }

        Ok(self.signer.sign(&vertex.id()))
    }

    /// Turn `vote` into a timeout vote by signing the [`VoteTimeout`] of its view and epoch.
    ///
    /// The timed-out vote becomes the last vote. A vote that already carries a timeout signature is
    /// returned unchanged.
    pub fn timeout_vote(&mut self, vote: &Vote) -> Vote {
        if vote.is_timeout() {
            return vote.clone();
        }

        let vote_timeout = VoteTimeout::of(vote);
        let hash = self
            .hasher
            .hash_bytes(&vote_timeout.try_to_vec().unwrap());
        let timeout_vote = vote.with_timeout_signature(self.signer.sign(&hash));

        let mut next = self.state.clone();
        next.last_vote = Some(timeout_vote.clone());
        self.commit_state(next);

        Event::publish(
            &self.event_publisher,
            Event::TimeoutVote(TimeoutVoteEvent {
                timestamp: SystemTime::now(),
                view: vote_timeout.view(),
                epoch: vote_timeout.epoch(),
            }),
        );

        timeout_vote
    }

    /// Get the last vote that the node cast, if it was cast in `view`.
    pub fn last_vote(&self, view: ViewNumber) -> Option<Vote> {
        self.state
            .last_vote()
            .filter(|vote| vote.view() == view)
            .cloned()
    }

    fn commit_state(&mut self, next: SafetyState) {
        self.store.commit_state(&next);
        self.state = next;
    }

    fn reject(&self, view: ViewNumber, violation: SafetyViolation) -> SafetyViolation {
        log::warn!("Refusing to sign in view {}: {}", view, violation);
        Event::publish(
            &self.event_publisher,
            Event::RejectVote(RejectVoteEvent {
                timestamp: SystemTime::now(),
                view,
                violation: violation.clone(),
            }),
        );
        violation
    }

    fn publish_view_updates(&self, next: &SafetyState, committed: Option<&BftHeader>) {
        if next.highest_qc_view != self.state.highest_qc_view {
            Event::publish(
                &self.event_publisher,
                Event::UpdateHighestQCView(UpdateHighestQCViewEvent {
                    timestamp: SystemTime::now(),
                    highest_qc_view: next.highest_qc_view,
                }),
            );
        }

        if next.locked_view != self.state.locked_view {
            Event::publish(
                &self.event_publisher,
                Event::UpdateLockedView(UpdateLockedViewEvent {
                    timestamp: SystemTime::now(),
                    locked_view: next.locked_view,
                }),
            );
        }

        if let Some(committed) = committed {
            Event::publish(
                &self.event_publisher,
                Event::CommitVertex(CommitVertexEvent {
                    timestamp: SystemTime::now(),
                    view: committed.view(),
                    vertex: committed.vertex_id(),
                }),
            );
        }
    }
}
