// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The container contract consumed by the visitor engine and the builder.
//!
//! Every configuration value is a [`Container`]. Leaves additionally implement
//! [`Leaf`], which is the only place bit layouts live: addresses are pure
//! functions of the coordinate, and `decode(encode(x)) == x` for containers
//! that are both readable and writable.
use std::fmt;

use thiserror::Error;

use crate::backend::{Address, Backend, ExecutorBackend, Word};
use crate::coord::{Coordinate, TimerOnChip};
use crate::instruction::TimerValue;

/// A hardware-addressable configuration value.
pub trait Container: Clone + PartialEq + Default + fmt::Debug + Send + Sync + 'static {
    /// Coordinate type locating instances of this container.
    type Coord: Coordinate;

    /// Human-readable type name used in diagnostics.
    const NAME: &'static str;
}

/// A container that maps directly onto registers.
pub trait Leaf: Container {
    /// Backends through which the container can be accessed.
    const SUPPORTED_BACKENDS: &'static [Backend];
    /// Backend used when the caller does not pick one.
    const DEFAULT_BACKEND: Backend;
    /// Number of words produced by [`Leaf::encode`]; zero for read-only registers.
    const WRITE_WORDS: usize;
    /// Number of words consumed by [`Leaf::decode`]; zero for write-only registers.
    const READ_WORDS: usize;
    /// Executor the container can only be played back on, if any.
    const EXECUTOR_RESTRICTION: Option<ExecutorBackend> = None;

    /// Addresses written by [`Leaf::encode`], in word order.
    fn write_addresses(coord: &Self::Coord, backend: Backend) -> Vec<Address>;

    /// Addresses whose responses feed [`Leaf::decode`], in word order.
    fn read_addresses(coord: &Self::Coord, backend: Backend) -> Vec<Address>;

    /// Encodes the configuration into `WRITE_WORDS` words.
    fn encode(&self, backend: Backend) -> Vec<Word>;

    /// Replaces the configuration with the contents of `READ_WORDS` words.
    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError>;

    /// Timer restarted by writing this container, and its new value.
    fn timer_reset(&self, _coord: &Self::Coord) -> Option<(TimerOnChip, TimerValue)> {
        None
    }

    /// Whether `backend` is in [`Leaf::SUPPORTED_BACKENDS`].
    fn supports(backend: Backend) -> bool {
        Self::SUPPORTED_BACKENDS.contains(&backend)
    }
}

/// Failure to reconstruct a container from response words.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer or more words than the container reads.
    #[error("{container}: expected {expected} words, got {actual}")]
    WordCount {
        /// Container type name.
        container: &'static str,
        /// Words the container reads.
        expected: usize,
        /// Words supplied.
        actual: usize,
    },
    /// A word from a different backend than the read was issued on.
    #[error("{container}: word from {actual} backend, expected {expected}")]
    BackendMismatch {
        /// Container type name.
        container: &'static str,
        /// Backend of the read.
        expected: Backend,
        /// Backend of the offending word.
        actual: Backend,
    },
    /// Word content does not describe a valid configuration.
    #[error("{container}: invalid value: {detail}")]
    InvalidValue {
        /// Container type name.
        container: &'static str,
        /// What was wrong.
        detail: String,
    },
}

/// Checks count and backend of `words` and returns their raw payloads.
pub fn raw_words<T: Leaf>(backend: Backend, words: &[Word]) -> Result<Vec<u64>, DecodeError> {
    if words.len() != T::READ_WORDS {
        return Err(DecodeError::WordCount {
            container: T::NAME,
            expected: T::READ_WORDS,
            actual: words.len(),
        });
    }
    words
        .iter()
        .map(|w| {
            if w.backend() == backend {
                Ok(w.raw())
            } else {
                Err(DecodeError::BackendMismatch {
                    container: T::NAME,
                    expected: backend,
                    actual: w.backend(),
                })
            }
        })
        .collect()
}
