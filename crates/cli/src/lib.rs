// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seatwatch: polls a transit carrier's seat-availability endpoint for one
//! train segment and raises a notification the moment a seat opens up.

pub mod agent;
pub mod channel;
pub mod client;
pub mod config;
pub mod event;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod notifier;
pub mod orchestrator;
pub mod query;
pub mod ratelimit;
pub mod scheduler;
pub mod station;
pub mod test_support;

use std::sync::Once;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
