// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! spindle-core: coordinate-addressed configuration containers lowered into
//! playback programs.
//!
//! Callers compose containers, record writes, reads and waits on a
//! [`PlaybackProgramBuilder`], and finish it into a [`PlaybackProgram`].
//! Reads hand out [`Ticket`]s that resolve once an executor has run the
//! program. Everything in this crate is pure data manipulation; transports
//! and execution live in `spindle-exec`.
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
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_possible_truncation
)]

mod backend;
mod builder;
mod container;
/// Reference register containers.
pub mod containers;
mod coord;
mod event;
mod generator;
mod instruction;
mod program;
mod ranged;
mod ticket;
/// Preorder traversal engine and the four lowering visitors.
pub mod visit;

pub use backend::{
    Address, Backend, ExecutorBackend, JtagAddress, JtagWord, OmnibusAddress, OmnibusWord, Word,
    WriteAccess,
};
pub use builder::{BuildError, PlaybackProgramBuilder};
pub use container::{raw_words, Container, DecodeError, Leaf};
pub use coord::{
    AdpllOnChip, Coordinate, CoordinateError, IndexedCoordinate, NeuronOnChip, SynapseQuadColumn,
    SynapseQuadOnChip, SynapseRowOnChip, SynramOnChip, TimerOnChip, Unique,
};
pub use event::{
    madc_samples_to_dtype, spikes_to_dtype, ChipTime, FpgaTime, MadcChannel, MadcSampleFromChip,
    MadcSampleFromChipDtype, SpikeFromChip, SpikeFromChipDtype, SpikeLabel,
};
pub use generator::{generate, InitGenerator, PlaybackGenerator};
pub use instruction::{Barrier, Instruction, TimerValue};
pub use program::{
    PlaybackProgram, ProgramError, ProgramId, ResponseStream, MADC_SAMPLE_PACK_SIZES,
    SPIKE_PACK_SIZES,
};
pub use ranged::RangeError;
pub use ticket::{ResolveSlot, ResponseWord, SlotError, Ticket, TicketError};
pub use visit::{visit_preorder, visit_preorder_mut, Node, Visitor, VisitorMut};
