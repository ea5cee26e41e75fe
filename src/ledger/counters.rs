/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::sync::atomic::{AtomicU64, Ordering};

/// The counters that [`SystemCounters`] keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CounterType {
    /// State version of the current ledger proof.
    LedgerStateVersion,
    /// Transactions committed through the BFT path.
    LedgerBftTxnsProcessed,
    /// Transactions committed through ledger sync.
    LedgerSyncTxnsProcessed,
    /// Commit requests that were ignored for not being newer than the current ledger proof.
    LedgerStaleCommits,
    /// Prepare requests that the ledger abstained from.
    LedgerPrepareAbstains,
    MempoolAdds,
}

const COUNTER_TYPES: usize = 6;

/// Monotonic counters that the ledger updates as it works. Shared between threads.
#[derive(Debug, Default)]
pub struct SystemCounters {
    counters: [AtomicU64; COUNTER_TYPES],
}

impl SystemCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: CounterType) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub fn set(&self, counter: CounterType, value: u64) {
        self.counters[counter as usize].store(value, Ordering::Relaxed)
    }

    pub fn add(&self, counter: CounterType, amount: u64) {
        self.counters[counter as usize].fetch_add(amount, Ordering::Relaxed);
    }

    pub fn increment(&self, counter: CounterType) {
        self.add(counter, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let counters = SystemCounters::new();
        counters.increment(CounterType::MempoolAdds);
        counters.add(CounterType::LedgerBftTxnsProcessed, 3);
        counters.set(CounterType::LedgerStateVersion, 42);

        assert_eq!(counters.get(CounterType::MempoolAdds), 1);
        assert_eq!(counters.get(CounterType::LedgerBftTxnsProcessed), 3);
        assert_eq!(counters.get(CounterType::LedgerSyncTxnsProcessed), 0);
        assert_eq!(counters.get(CounterType::LedgerStateVersion), 42);
    }
}
