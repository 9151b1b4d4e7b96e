// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Spindle crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake
//! - [`loopback`] - Board model that echoes writes and loops spikes back
//! - [`programs`] - Program fixtures and spike label helpers

pub mod config;
pub mod loopback;
pub mod programs;

pub use config::InMemoryConfigStore;
pub use loopback::{LoopbackTransport, DEFAULT_RESULT_MEMORY};
pub use programs::{
    distinct_spike_labels, spike_injection_program, write_read_wait, ROUND_TRIP_WAIT,
};

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
