/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The safety-and-commit core of a HotStuff-style BFT ledger node.
//!
//! The crate covers three tightly coupled components:
//! 1. [Safety rules](safety): the per-node state machine that decides whether the node may vote for a
//!    vertex, and which ancestor becomes committed once a 3-chain forms.
//! 2. [Ledger accumulator](accumulator): an order-sensitive hash chain over committed transactions, and a
//!    verifier that checks whether a sequence of transactions extends one accumulator state to another.
//! 3. [State-computer ledger](ledger): the orchestrator that speculatively executes vertices before the
//!    node votes for them, and commits quorum-certified transactions after re-checking the accumulator.
//!
//! Leader election, the pacemaker, networking, and transaction execution live outside of this crate.
//! Execution and persistence are plugged in through the [`StateComputer`](ledger::StateComputer) trait.
//!
//! The [core] module wires the three components together and delivers their [events] to user-defined
//! handlers and, optionally, to the [logging] handlers.

pub mod accumulator;

pub mod core;

pub(crate) mod event_bus;

pub mod events;

pub mod ledger;

pub mod logging;

pub mod safety;

pub mod types;
