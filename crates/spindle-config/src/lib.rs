// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config storage for Spindle tools.
//!
//! [`ConfigService`] serializes values as JSON and hands the bytes to a
//! [`ConfigStore`]. [`FsConfigStore`] keeps one file per key under the
//! platform config directory; tests use the in-memory store from
//! `spindle-dry-tests`.
#![forbid(unsafe_code)]

pub mod config;
mod fs;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use fs::FsConfigStore;
