/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are shared by the safety rules, the accumulator, and the ledger.

pub mod crypto_primitives;

pub mod data_types;

pub mod ledger;

pub mod validator_set;

pub mod vertex;

pub mod voting;
