// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated time constants (spec §4.2, §4.5, §5).
//!
//! The simulation runs on a monotonic scheduler driven by a configurable
//! `TIME_UNIT` wall-clock duration (`--time-unit-ms`, default 1000 ms — one
//! tick per second, matching the original's `TIME_UNIT`); every duration,
//! retool cost, and rate limit named below is expressed in ticks of that
//! unit, not raw milliseconds.

/// Retooling cost in ticks, charged once per tool change (spec §3, §4.2).
pub const RETOOL_COST: u32 = 1;

/// Number of `TIME_UNIT` ticks between releases of the Kitchen's admission
/// gate (spec §4.5, §9: "Rate-limited admission").
pub const PLACING_RATE_TICKS: u32 = 5;

/// Default `TIME_UNIT`, in milliseconds, when not overridden by
/// `--time-unit-ms`.
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

/// Default registration renewal interval with the discovery directory
/// (spec §4.1: T_RENEW).
pub const DEFAULT_T_RENEW_SECS: u64 = 50 * 60;

/// Default discovery scan interval for background membership trackers
/// (spec §4.4, §4.5: T_DISCOVER).
pub const DEFAULT_T_DISCOVER_SECS: u64 = 1;

/// Converts a tick count to a [`std::time::Duration`] given the configured
/// `TIME_UNIT`.
pub fn ticks(time_unit: std::time::Duration, count: u32) -> std::time::Duration {
    time_unit.saturating_mul(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ticks_scale_linearly() {
        let unit = Duration::from_millis(100);
        assert_eq!(ticks(unit, 5), Duration::from_millis(500));
    }
}
