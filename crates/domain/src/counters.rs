// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kitchen aggregate counters (spec §3, §6): monotonic, bus-exposed `u32`s.

use std::sync::atomic::{AtomicU32, Ordering};

/// The Kitchen's four published counters. Each only ever increments; a
/// restart loses the count (spec §1 non-goal (c): no persistence).
#[derive(Debug, Default)]
pub struct KitchenCounters {
    received: AtomicU32,
    assigned: AtomicU32,
    dropped: AtomicU32,
    completed: AtomicU32,
}

impl KitchenCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u32 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn assigned(&self) -> u32 {
        self.assigned.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn record_received(&self) -> u32 {
        self.received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_assigned(&self) -> u32 {
        self.assigned.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_dropped(&self) -> u32 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_completed(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// In-flight orders per the *Conservation* property (spec §8):
    /// `received == assigned + dropped + in_flight`.
    pub fn in_flight(&self) -> u32 {
        self.received()
            .saturating_sub(self.assigned())
            .saturating_sub(self.dropped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservation_holds_as_counters_advance() {
        let counters = KitchenCounters::new();
        counters.record_received();
        counters.record_received();
        counters.record_assigned();
        assert_eq!(counters.in_flight(), 1);
        counters.record_dropped();
        assert_eq!(counters.in_flight(), 0);
        assert_eq!(counters.received(), counters.assigned() + counters.dropped());
    }
}
