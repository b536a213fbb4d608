// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared tracing setup for every agent binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from `RUST_LOG`, falling back to
/// `default_level`. Uses `try_init` so repeated calls (e.g. from tests) are
/// harmless.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
