// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deferred read results.
//!
//! A [`Ticket`] and the program that issued it share one slot. The slot is
//! cleared when a run begins and filled at most once when the run completes.
use std::fmt;
use std::mem;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::backend::{Backend, Word};
use crate::container::DecodeError;
use crate::event::FpgaTime;
use crate::visit::{DecodeVisitor, Node};

/// A response word together with its time annotation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResponseWord {
    /// Payload.
    pub word: Word,
    /// FPGA time of the response, when time annotation is enabled.
    pub fpga_time: Option<FpgaTime>,
}

/// Errors returned by [`Ticket::get`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// The owning program has not completed a run since the last reset.
    #[error("ticket for {container} at {coordinate} is not yet available")]
    NotYetAvailable {
        /// Container type name.
        container: &'static str,
        /// Debug rendering of the coordinate.
        coordinate: String,
    },
    /// Response words did not decode into the container.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors raised while filling a slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    /// The slot was filled twice within one run.
    #[error("{0} ticket resolved twice in one run")]
    AlreadyResolved(&'static str),
    /// Response words did not decode into the container.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Executor-side view of a ticket slot, erased over the container type.
///
/// Resolution is two-phase: every slot of a program is [staged](Self::stage)
/// first, and only once all of them decoded are they [committed](Self::commit).
/// A run that fails halfway leaves no ticket valid.
pub trait ResolveSlot: Send + Sync + fmt::Debug {
    /// Number of response words the slot consumes.
    fn word_count(&self) -> usize;
    /// Clears the slot ahead of a run.
    fn reset(&self);
    /// Decodes the slot's words into a pending value.
    ///
    /// `sequence` is the index of the first word in the response stream. A
    /// decode failure is recorded in the slot and returned.
    fn stage(&self, words: &[ResponseWord], sequence: u64) -> Result<(), SlotError>;
    /// Publishes the pending value.
    fn commit(&self);
    /// Drops the pending value; the slot reads as not yet available.
    fn discard(&self);
}

#[derive(Debug)]
enum SlotState<T> {
    Empty,
    Staged { value: T, fpga_time: FpgaTime },
    Resolved { value: T, fpga_time: FpgaTime },
    Failed(DecodeError),
}

#[derive(Debug)]
pub(crate) struct TicketSlot<T: Node> {
    coord: T::Coord,
    backend: Option<Backend>,
    word_count: usize,
    state: RwLock<SlotState<T>>,
}

impl<T: Node> TicketSlot<T> {
    pub(crate) fn new(coord: T::Coord, backend: Option<Backend>, word_count: usize) -> Self {
        Self {
            coord,
            backend,
            word_count,
            state: RwLock::new(SlotState::Empty),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotState<T>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotState<T>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Node> ResolveSlot for TicketSlot<T> {
    fn word_count(&self) -> usize {
        self.word_count
    }

    fn reset(&self) {
        *self.write() = SlotState::Empty;
    }

    fn stage(&self, words: &[ResponseWord], sequence: u64) -> Result<(), SlotError> {
        let mut state = self.write();
        if !matches!(*state, SlotState::Empty) {
            return Err(SlotError::AlreadyResolved(T::NAME));
        }
        let raw: Vec<Word> = words.iter().map(|w| w.word).collect();
        let mut value = T::default();
        let mut visitor = DecodeVisitor::new(self.backend, &raw);
        value.visit_preorder_mut(&self.coord, &mut visitor);
        let consumed = visitor.consumed();
        let error = visitor.error.or_else(|| {
            (consumed != raw.len()).then(|| DecodeError::WordCount {
                container: T::NAME,
                expected: consumed,
                actual: raw.len(),
            })
        });
        if let Some(e) = error {
            *state = SlotState::Failed(e.clone());
            return Err(SlotError::Decode(e));
        }
        let fpga_time = words
            .first()
            .and_then(|w| w.fpga_time)
            .unwrap_or(FpgaTime(sequence));
        *state = SlotState::Staged { value, fpga_time };
        Ok(())
    }

    fn commit(&self) {
        let mut state = self.write();
        *state = match mem::replace(&mut *state, SlotState::Empty) {
            SlotState::Staged { value, fpga_time } => SlotState::Resolved { value, fpga_time },
            other => other,
        };
    }

    fn discard(&self) {
        let mut state = self.write();
        if matches!(*state, SlotState::Staged { .. }) {
            *state = SlotState::Empty;
        }
    }
}

/// Handle to the result of a read issued on a builder.
///
/// Only [`PlaybackProgramBuilder::read`](crate::PlaybackProgramBuilder::read)
/// creates tickets. Cloning a ticket shares the slot.
pub struct Ticket<T: Node> {
    coord: T::Coord,
    slot: Arc<TicketSlot<T>>,
}

impl<T: Node> Ticket<T> {
    pub(crate) fn new(coord: T::Coord, slot: Arc<TicketSlot<T>>) -> Self {
        Self { coord, slot }
    }

    /// Whether the owning program completed a run and the value decoded.
    pub fn valid(&self) -> bool {
        matches!(*self.slot.read(), SlotState::Resolved { .. })
    }

    /// Decoded value of the last completed run.
    pub fn get(&self) -> Result<T, TicketError> {
        match &*self.slot.read() {
            SlotState::Resolved { value, .. } => Ok(value.clone()),
            SlotState::Failed(e) => Err(TicketError::Decode(e.clone())),
            SlotState::Empty | SlotState::Staged { .. } => Err(self.not_yet_available()),
        }
    }

    /// Coordinate the read was issued for.
    pub fn coordinate(&self) -> &T::Coord {
        &self.coord
    }

    /// Backend the read was issued on; `None` means each leaf's default.
    pub fn backend(&self) -> Option<Backend> {
        self.slot.backend
    }

    /// FPGA time of the response that resolved the ticket.
    ///
    /// Without time annotation this is the position of the first response
    /// word in the stream, which still increases monotonically.
    pub fn fpga_time(&self) -> Result<FpgaTime, TicketError> {
        match &*self.slot.read() {
            SlotState::Resolved { fpga_time, .. } => Ok(*fpga_time),
            SlotState::Failed(e) => Err(TicketError::Decode(e.clone())),
            SlotState::Empty | SlotState::Staged { .. } => Err(self.not_yet_available()),
        }
    }

    fn not_yet_available(&self) -> TicketError {
        TicketError::NotYetAvailable {
            container: T::NAME,
            coordinate: format!("{:?}", self.coord),
        }
    }
}

impl<T: Node> Clone for Ticket<T> {
    fn clone(&self) -> Self {
        Self {
            coord: self.coord,
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Node> fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("container", &T::NAME)
            .field("coord", &self.coord)
            .field("valid", &self.valid())
            .finish()
    }
}
