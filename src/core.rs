/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and start the safety-and-commit core of a node.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the core](CoreSpec) with:
//!   1. `CoreSpec::builder` to construct a `CoreSpecBuilder`,
//!   2. The setters of the `CoreSpecBuilder`, and
//!   3. The `CoreSpecBuilder::build` method to construct a [CoreSpec],
//! - The function to [start](CoreSpec::start) a [Core] given its specification,
//! - [The type](Core) which keeps the core, and its event bus thread, alive.
//!
//! ## Starting a core
//!
//! ```ignore
//! let core =
//!     CoreSpec::builder()
//!     .state_computer(state_computer)
//!     .time_supplier(SystemTimeSupplier)
//!     .safety_state_store(InMemorySafetyStateStore::new())
//!     .initial_proof(genesis_proof)
//!     .configuration(configuration)
//!     .on_commit_ledger(commit_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//!
//! - `.state_computer(...)`
//! - `.time_supplier(...)`
//! - `.safety_state_store(...)`
//! - `.initial_proof(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! `.initial_safety_state(...)` overrides the safety state that the core starts with. Without it, the core
//! resumes from the last state in the safety state store, or from [`SafetyState::initial`] if the store
//! is empty.
//!
//! The remaining optional setters register user-defined event handlers for events from [crate::events]:
//! - `.on_update_highest_qc_view(...)`
//! - `.on_update_locked_view(...)`
//! - `.on_commit_vertex(...)`
//! - `.on_vote(...)`
//! - `.on_reject_vote(...)`
//! - `.on_timeout_vote(...)`
//! - `.on_mempool_add(...)`
//! - `.on_prepare_vertex(...)`
//! - `.on_abstain_prepare(...)`
//! - `.on_commit_ledger(...)`
//! - `.on_ignore_stale_commit(...)`
//!
//! The core's [configuration](Configuration) can also be defined using the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(signing_key)
//!     .log_events(true)
//!     .build();
//! ```

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::accumulator::SimpleLedgerAccumulatorAndVerifier;
use crate::event_bus::*;
use crate::events::*;
use crate::ledger::{StateComputer, StateComputerLedger, SystemCounters, TimeSupplier};
use crate::safety::{PersistentSafetyStateStore, SafetyRules, SafetyState};
use crate::types::{
    crypto_primitives::{Keypair, Sha256Hasher, SigningKey},
    ledger::{LedgerProof, OrderByEpochViewAndVersion},
};

/// The ledger that a [`Core`] runs: SHA256 accumulator, ordered by epoch, view, and state version.
pub type CoreLedger<S, T> = StateComputerLedger<
    S,
    SimpleLedgerAccumulatorAndVerifier<Sha256Hasher>,
    T,
    OrderByEpochViewAndVersion,
>;

/// Stores the user-defined parameters required to start the core.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the node's signing key, used to sign votes and proposals. Required."))]
    pub me: SigningKey,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run the [Core].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [CoreSpec]. On the builder call the following methods to construct a valid [CoreSpec].

    Required:
    - `.state_computer(...)`
    - `.time_supplier(...)`
    - `.safety_state_store(...)`
    - `.initial_proof(...)`
    - `.configuration(...)`

    Optional:
    - `.initial_safety_state(...)`
    - `.on_update_highest_qc_view(...)`
    - `.on_update_locked_view(...)`
    - `.on_commit_vertex(...)`
    - `.on_vote(...)`
    - `.on_reject_vote(...)`
    - `.on_timeout_vote(...)`
    - `.on_mempool_add(...)`
    - `.on_prepare_vertex(...)`
    - `.on_abstain_prepare(...)`
    - `.on_commit_ledger(...)`
    - `.on_ignore_stale_commit(...)`
"))]
pub struct CoreSpec<S: StateComputer, T: TimeSupplier, P: PersistentSafetyStateStore> {
    // Required parameters
    #[builder(setter(doc = "Set the execution engine. The argument must implement the [StateComputer](crate::ledger::StateComputer) trait. Required."))]
    state_computer: S,
    #[builder(setter(doc = "Set the source of local time. The argument must implement the [TimeSupplier](crate::ledger::TimeSupplier) trait. Required."))]
    time_supplier: T,
    #[builder(setter(doc = "Set the store that persists the safety state. The argument must implement the [PersistentSafetyStateStore](crate::safety::PersistentSafetyStateStore) trait. Required."))]
    safety_state_store: P,
    #[builder(setter(doc = "Set the proof of the ledger state that the state computer has already committed. Required."))]
    initial_proof: LedgerProof,
    #[builder(setter(doc = "Set the [configuration](Configuration). Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(strip_option, doc = "Set the safety state to start with. Optional."))]
    initial_safety_state: Option<SafetyState>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateHighestQCViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateHighestQCViewEvent>),
    doc = "Register a handler closure to be invoked after the safety rules raise the highest QC view. Optional."))]
    on_update_highest_qc_view: Option<HandlerPtr<UpdateHighestQCViewEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateLockedViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateLockedViewEvent>),
    doc = "Register a handler closure to be invoked after the safety rules raise the locked view. Optional."))]
    on_update_locked_view: Option<HandlerPtr<UpdateLockedViewEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitVertexEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitVertexEvent>),
    doc = "Register a handler closure to be invoked after the safety rules see a QC that commits a vertex. Optional."))]
    on_commit_vertex: Option<HandlerPtr<CommitVertexEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&VoteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<VoteEvent>),
    doc = "Register a handler closure to be invoked after the node votes. Optional."))]
    on_vote: Option<HandlerPtr<VoteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectVoteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectVoteEvent>),
    doc = "Register a handler closure to be invoked after the safety rules refuse to sign. Optional."))]
    on_reject_vote: Option<HandlerPtr<RejectVoteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TimeoutVoteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TimeoutVoteEvent>),
    doc = "Register a handler closure to be invoked after the node times out a vote. Optional."))]
    on_timeout_vote: Option<HandlerPtr<TimeoutVoteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&MempoolAddEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<MempoolAddEvent>),
    doc = "Register a handler closure to be invoked after a transaction is added to the mempool. Optional."))]
    on_mempool_add: Option<HandlerPtr<MempoolAddEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PrepareVertexEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PrepareVertexEvent>),
    doc = "Register a handler closure to be invoked after the ledger prepares a vertex. Optional."))]
    on_prepare_vertex: Option<HandlerPtr<PrepareVertexEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AbstainPrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AbstainPrepareEvent>),
    doc = "Register a handler closure to be invoked after the ledger abstains from preparing a vertex. Optional."))]
    on_abstain_prepare: Option<HandlerPtr<AbstainPrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitLedgerEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitLedgerEvent>),
    doc = "Register a handler closure to be invoked after the ledger commits transactions. Optional."))]
    on_commit_ledger: Option<HandlerPtr<CommitLedgerEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&IgnoreStaleCommitEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<IgnoreStaleCommitEvent>),
    doc = "Register a handler closure to be invoked after the ledger ignores a stale commit request. Optional."))]
    on_ignore_stale_commit: Option<HandlerPtr<IgnoreStaleCommitEvent>>,
}

impl<S: StateComputer, T: TimeSupplier, P: PersistentSafetyStateStore> CoreSpec<S, T, P> {
    /// Start the event bus thread, if any handlers are registered, and return a [Core] that owns the
    /// safety rules and the ledger.
    pub fn start(self) -> Core<S, T, P> {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_update_highest_qc_view,
            self.on_update_locked_view,
            self.on_commit_vertex,
            self.on_vote,
            self.on_reject_vote,
            self.on_timeout_vote,
            self.on_mempool_add,
            self.on_prepare_vertex,
            self.on_abstain_prepare,
            self.on_commit_ledger,
            self.on_ignore_stale_commit,
        );

        let (event_publisher, event_bus, event_bus_shutdown) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus = start_event_bus(
                event_handlers,
                event_subscriber,
                event_bus_shutdown_receiver,
            );
            (Some(event_publisher), Some(event_bus), Some(event_bus_shutdown))
        } else {
            (None, None, None)
        };

        let initial_safety_state = self
            .initial_safety_state
            .or_else(|| self.safety_state_store.last_state())
            .unwrap_or_default();
        let safety_rules = SafetyRules::new(
            Sha256Hasher,
            Keypair::new(self.configuration.me),
            initial_safety_state,
            self.safety_state_store,
            event_publisher.clone(),
        );

        let counters = Arc::new(SystemCounters::new());
        let ledger = Arc::new(StateComputerLedger::new(
            self.initial_proof,
            self.state_computer,
            SimpleLedgerAccumulatorAndVerifier::new(Sha256Hasher),
            self.time_supplier,
            OrderByEpochViewAndVersion,
            counters,
            event_publisher,
        ));

        Core {
            safety_rules,
            ledger,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the safety rules and the ledger of a node. When this value is dropped, the event bus thread
/// is gracefully shut down.
pub struct Core<S: StateComputer, T: TimeSupplier, P: PersistentSafetyStateStore> {
    safety_rules: SafetyRules<Sha256Hasher, Keypair, P>,
    ledger: Arc<CoreLedger<S, T>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<S: StateComputer, T: TimeSupplier, P: PersistentSafetyStateStore> Core<S, T, P> {
    pub fn safety_rules(&self) -> &SafetyRules<Sha256Hasher, Keypair, P> {
        &self.safety_rules
    }

    pub fn safety_rules_mut(&mut self) -> &mut SafetyRules<Sha256Hasher, Keypair, P> {
        &mut self.safety_rules
    }

    /// Get a shared handle to the ledger, e.g., to hand to the ledger sync path.
    pub fn ledger(&self) -> Arc<CoreLedger<S, T>> {
        Arc::clone(&self.ledger)
    }
}

impl<S: StateComputer, T: TimeSupplier, P: PersistentSafetyStateStore> Drop for Core<S, T, P> {
    fn drop(&mut self) {
        if let Some(shutdown) = self.event_bus_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            if event_bus.join().is_err() {
                log::error!("Event bus thread panicked");
            }
        }
    }
}
