// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Append-only construction of playback programs.
//!
//! The builder lowers container writes and reads into instructions through the
//! visitor engine and never reorders anything: the finished stream is exactly
//! the interleaving of calls as issued. Every call is all-or-nothing; a call
//! that returns an error leaves the builder unchanged.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::backend::{Address, Backend, ExecutorBackend, Word, WriteAccess};
use crate::coord::TimerOnChip;
use crate::instruction::{Barrier, Instruction, TimerValue};
use crate::program::PlaybackProgram;
use crate::ticket::{ResolveSlot, Ticket, TicketSlot};
use crate::visit::{EncodeVisitor, Node, ReadAddressVisitor, UnsupportedBackend, WriteAddressVisitor};

/// Errors raised while appending to a builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A visited leaf does not support the requested backend.
    #[error(transparent)]
    UnsupportedBackend(#[from] UnsupportedBackend),
    /// A wait targets an earlier tick than a preceding wait on the same timer.
    #[error("wait_until({timer}, {requested}) after wait_until({timer}, {previous})")]
    NonMonotonicWait {
        /// Timer waited on.
        timer: TimerOnChip,
        /// Watermark before the call.
        previous: TimerValue,
        /// Rejected value.
        requested: TimerValue,
    },
    /// Containers restrict the program to different executors.
    #[error("{container} requires {requested} but the program is restricted to {existing}")]
    ConflictingRestriction {
        /// Container type name.
        container: &'static str,
        /// Restriction already in effect.
        existing: ExecutorBackend,
        /// Restriction of the new container.
        requested: ExecutorBackend,
    },
    /// Encoding produced a different number of words than addresses.
    #[error("{container} produced {words} words for {addresses} addresses")]
    WordCountMismatch {
        /// Container type name.
        container: &'static str,
        /// Addresses produced.
        addresses: usize,
        /// Words produced.
        words: usize,
    },
    /// An encoded word belongs to a different backend than its address.
    #[error("word {word} cannot be written to {address}")]
    BackendMismatch {
        /// Target address.
        address: Address,
        /// Offending word.
        word: Word,
    },
    /// The container has no read addresses.
    #[error("{0} is not readable")]
    NotReadable(&'static str),
    /// The container has no write addresses.
    #[error("{0} is not writable")]
    NotWritable(&'static str),
}

/// Records instructions and issues tickets; [`done`](Self::done) yields the program.
///
/// Not thread-safe by contract: use one builder per thread.
#[derive(Debug, Default)]
pub struct PlaybackProgramBuilder {
    instructions: Vec<Instruction>,
    slots: Vec<Arc<dyn ResolveSlot>>,
    restriction: Option<ExecutorBackend>,
    watermarks: BTreeMap<TimerOnChip, TimerValue>,
    // First wait per timer that no earlier timer write in this builder covers.
    leading_waits: BTreeMap<TimerOnChip, TimerValue>,
}

impl PlaybackProgramBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `config` at `coord`, each leaf through its default backend.
    pub fn write<T: Node>(&mut self, coord: T::Coord, config: &T) -> Result<(), BuildError> {
        self.write_impl(coord, config, None)
    }

    /// Writes `config` at `coord` through `backend`.
    ///
    /// Every leaf of a composite must support `backend`.
    pub fn write_with<T: Node>(
        &mut self,
        coord: T::Coord,
        config: &T,
        backend: Backend,
    ) -> Result<(), BuildError> {
        self.write_impl(coord, config, Some(backend))
    }

    fn write_impl<T: Node>(
        &mut self,
        coord: T::Coord,
        config: &T,
        backend: Option<Backend>,
    ) -> Result<(), BuildError> {
        let mut addresses = WriteAddressVisitor::new(backend);
        config.visit_preorder(&coord, &mut addresses);
        if let Some(e) = addresses.error {
            return Err(e.into());
        }
        if addresses.addresses.is_empty() {
            return Err(BuildError::NotWritable(T::NAME));
        }
        let mut encoded = EncodeVisitor::new(backend);
        config.visit_preorder(&coord, &mut encoded);
        if let Some(e) = encoded.error {
            return Err(e.into());
        }
        if addresses.addresses.len() != encoded.words.len() {
            return Err(BuildError::WordCountMismatch {
                container: T::NAME,
                addresses: addresses.addresses.len(),
                words: encoded.words.len(),
            });
        }
        let restriction = self.merged_restriction(T::NAME, &addresses.restrictions)?;
        let accesses = addresses
            .addresses
            .iter()
            .zip(&encoded.words)
            .map(|(&address, &word)| {
                WriteAccess::pair(address, word).ok_or(BuildError::BackendMismatch { address, word })
            })
            .collect::<Result<Vec<_>, _>>()?;

        trace!(container = T::NAME, ?coord, words = accesses.len(), "write");
        self.restriction = restriction;
        self.instructions.extend(accesses.into_iter().map(Instruction::Write));
        for (timer, value) in encoded.timer_resets {
            self.watermarks.insert(timer, value);
        }
        Ok(())
    }

    /// Reads the container at `coord`, each leaf through its default backend.
    pub fn read<T: Node>(&mut self, coord: T::Coord) -> Result<Ticket<T>, BuildError> {
        self.read_impl(coord, None)
    }

    /// Reads the container at `coord` through `backend`.
    pub fn read_with<T: Node>(
        &mut self,
        coord: T::Coord,
        backend: Backend,
    ) -> Result<Ticket<T>, BuildError> {
        self.read_impl(coord, Some(backend))
    }

    fn read_impl<T: Node>(
        &mut self,
        coord: T::Coord,
        backend: Option<Backend>,
    ) -> Result<Ticket<T>, BuildError> {
        let mut addresses = ReadAddressVisitor::new(backend);
        T::default().visit_preorder(&coord, &mut addresses);
        if let Some(e) = addresses.error {
            return Err(e.into());
        }
        if addresses.addresses.is_empty() {
            return Err(BuildError::NotReadable(T::NAME));
        }
        let restriction = self.merged_restriction(T::NAME, &addresses.restrictions)?;

        trace!(container = T::NAME, ?coord, words = addresses.addresses.len(), "read");
        self.restriction = restriction;
        let slot = Arc::new(TicketSlot::<T>::new(coord, backend, addresses.addresses.len()));
        self.slots.push(Arc::clone(&slot) as Arc<dyn ResolveSlot>);
        self.instructions
            .extend(addresses.addresses.into_iter().map(Instruction::ReadRequest));
        Ok(Ticket::new(coord, slot))
    }

    /// Blocks the stream until `timer` reaches `value`.
    ///
    /// Waits on one timer must not go backwards unless the timer was written
    /// in between; writing a timer restarts it at the written value.
    pub fn wait_until(&mut self, timer: TimerOnChip, value: TimerValue) -> Result<(), BuildError> {
        if let Some(&previous) = self.watermarks.get(&timer) {
            if value < previous {
                return Err(BuildError::NonMonotonicWait {
                    timer,
                    previous,
                    requested: value,
                });
            }
        } else {
            self.leading_waits.entry(timer).or_insert(value);
        }
        self.watermarks.insert(timer, value);
        self.instructions.push(Instruction::WaitUntil { timer, value });
        Ok(())
    }

    /// Appends a synchronisation barrier.
    pub fn barrier(&mut self, barrier: Barrier) {
        self.instructions.push(Instruction::Barrier(barrier));
    }

    /// Appends everything recorded in `other` after the instructions of `self`.
    ///
    /// Tickets issued by `other` stay valid and resolve with the merged program.
    pub fn merge_back(&mut self, other: PlaybackProgramBuilder) -> Result<(), BuildError> {
        for (&timer, &requested) in &other.leading_waits {
            if let Some(&previous) = self.watermarks.get(&timer) {
                if requested < previous {
                    return Err(BuildError::NonMonotonicWait {
                        timer,
                        previous,
                        requested,
                    });
                }
            }
        }
        let restriction = match (self.restriction, other.restriction) {
            (Some(existing), Some(requested)) if existing != requested => {
                return Err(BuildError::ConflictingRestriction {
                    container: "PlaybackProgramBuilder",
                    existing,
                    requested,
                });
            }
            (mine, theirs) => mine.or(theirs),
        };
        self.restriction = restriction;
        for (timer, value) in other.leading_waits {
            if !self.watermarks.contains_key(&timer) {
                self.leading_waits.entry(timer).or_insert(value);
            }
        }
        self.watermarks.extend(other.watermarks);
        self.instructions.extend(other.instructions);
        self.slots.extend(other.slots);
        Ok(())
    }

    /// Freezes the stream into a program. Consumes the builder.
    pub fn done(self) -> PlaybackProgram {
        trace!(
            instructions = self.instructions.len(),
            tickets = self.slots.len(),
            "done"
        );
        PlaybackProgram::new(self.instructions, self.restriction, self.slots)
    }

    /// Instructions recorded so far.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions recorded so far.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Restriction the program will carry.
    pub fn executable_restriction(&self) -> Option<ExecutorBackend> {
        self.restriction
    }

    fn merged_restriction(
        &self,
        container: &'static str,
        requested: &[ExecutorBackend],
    ) -> Result<Option<ExecutorBackend>, BuildError> {
        requested.iter().try_fold(self.restriction, |current, &r| match current {
            Some(existing) if existing != r => Err(BuildError::ConflictingRestriction {
                container,
                existing,
                requested: r,
            }),
            _ => Ok(Some(r)),
        })
    }
}

impl fmt::Display for PlaybackProgramBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PlaybackProgramBuilder({} instructions, {} tickets)",
            self.instructions.len(),
            self.slots.len()
        )?;
        for (i, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "  {i:>5}: {instruction}")?;
        }
        Ok(())
    }
}
