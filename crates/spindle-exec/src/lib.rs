// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! spindle-exec: plays programs back on a board.
//!
//! A [`PlaybackProgramExecutor`] owns one [`Transport`] and walks each program
//! through transfer, trigger, a backoff poll of the execute flag, fetch and
//! decode. Results land in the program itself: tickets resolve and event
//! buffers fill. [`ExecutorHandle`] runs the same protocol from async code.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod backoff;
mod boards;
mod exception;
mod executor;
mod handle;
mod settings;
mod transport;

pub use backoff::{Backoff, BackoffConfig, BackoffStep};
pub use boards::{available_board_ids, parse_board_ids, BOARD_IDS_ENV};
pub use exception::{ExceptionFlags, ExceptionPolicy};
pub use executor::{ExecutorError, ExecutorState, PlaybackProgramExecutor};
pub use handle::ExecutorHandle;
pub use settings::{ExecuteOptions, ExecutorSettings};
pub use transport::{Transport, TransportError};
