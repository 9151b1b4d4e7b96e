// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Board link boundary.
use spindle_core::ExecutorBackend;
use thiserror::Error;

use crate::exception::ExceptionFlags;

/// Failures reported by a link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Host-side I/O failure.
    #[error("link i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The board refused an operation.
    #[error("board rejected {operation}: {detail}")]
    Rejected {
        /// Operation that failed.
        operation: &'static str,
        /// Board or driver message.
        detail: String,
    },
    /// The link went away.
    #[error("link disconnected")]
    Disconnected,
}

/// Blocking access to one board (or a model of it).
///
/// Calls are strictly sequential; the executor never overlaps them.
pub trait Transport: Send {
    /// Kind of executor behind this link.
    fn executor_backend(&self) -> ExecutorBackend;

    /// Replaces program memory with `blocks`, in order. Returns once the board
    /// confirmed the write.
    fn transmit(&mut self, blocks: &[&[u8]]) -> Result<(), TransportError>;

    /// Whether the chip is held in reset. Links without a reset line report `false`.
    fn chip_in_reset(&mut self) -> Result<bool, TransportError> {
        Ok(false)
    }

    /// Sets the execute flag.
    fn trigger(&mut self) -> Result<(), TransportError>;

    /// Execute flag; `true` while the program is still running.
    fn poll_status(&mut self) -> Result<bool, TransportError>;

    /// Latched exception register.
    fn read_exception_flags(&mut self) -> Result<ExceptionFlags, TransportError>;

    /// Bytes the last run wrote to result memory.
    fn read_result_size(&mut self) -> Result<usize, TransportError>;

    /// Capacity of result memory in bytes.
    fn max_result_size(&self) -> usize;

    /// Reads `len` bytes of result memory starting at `offset`.
    fn bulk_read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, TransportError>;
}
