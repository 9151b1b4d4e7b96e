// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The executable playback program.
//!
//! A program is a cheap-to-clone handle: clones share the instruction stream,
//! the ticket slots and the result buffers, and compare equal by [`ProgramId`].
//! The stream and restriction never change after
//! [`PlaybackProgramBuilder::done`](crate::PlaybackProgramBuilder::done);
//! result buffers are replaced by every completed run.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::backend::{Address, ExecutorBackend, WriteAccess};
use crate::event::{MadcSampleFromChip, SpikeFromChip};
use crate::instruction::Instruction;
use crate::ticket::{ResolveSlot, ResponseWord, SlotError};

/// Number of spike pack sizes (1, 2 or 3 spikes per record).
pub const SPIKE_PACK_SIZES: usize = 3;
/// Number of MADC sample pack sizes (1 or 2 samples per record).
pub const MADC_SAMPLE_PACK_SIZES: usize = 2;

/// Process-unique program identity.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProgramId(pub u64);

impl ProgramId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Demultiplexed response of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseStream {
    /// Response words in read-request order.
    pub words: Vec<ResponseWord>,
    /// Spike events in arrival order.
    pub spikes: Vec<SpikeFromChip>,
    /// Analog samples in arrival order.
    pub madc_samples: Vec<MadcSampleFromChip>,
    /// Records carrying 1, 2 and 3 spikes.
    pub spike_pack_counts: [u64; SPIKE_PACK_SIZES],
    /// Records carrying 1 and 2 samples.
    pub madc_sample_pack_counts: [u64; MADC_SAMPLE_PACK_SIZES],
}

/// Errors raised while storing a run's results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// The response carried a different number of words than the program reads.
    #[error("program {program} expects {expected} response words, got {actual}")]
    ResponseCount {
        /// Program identity.
        program: ProgramId,
        /// Words the program reads.
        expected: usize,
        /// Words received.
        actual: usize,
    },
    /// A ticket could not be resolved.
    #[error(transparent)]
    Slot(#[from] SlotError),
}

#[derive(Debug, Default)]
struct RunResults {
    runs: u64,
    spikes: Vec<SpikeFromChip>,
    madc_samples: Vec<MadcSampleFromChip>,
    spike_pack_counts: [u64; SPIKE_PACK_SIZES],
    madc_sample_pack_counts: [u64; MADC_SAMPLE_PACK_SIZES],
}

#[derive(Debug)]
struct ProgramInner {
    id: ProgramId,
    instructions: Vec<Instruction>,
    restriction: Option<ExecutorBackend>,
    slots: Vec<Arc<dyn ResolveSlot>>,
    results: RwLock<RunResults>,
}

/// Immutable instruction stream plus the buffers filled by running it.
#[derive(Clone)]
pub struct PlaybackProgram {
    inner: Arc<ProgramInner>,
}

impl PlaybackProgram {
    pub(crate) fn new(
        instructions: Vec<Instruction>,
        restriction: Option<ExecutorBackend>,
        slots: Vec<Arc<dyn ResolveSlot>>,
    ) -> Self {
        Self {
            inner: Arc::new(ProgramInner {
                id: ProgramId::next(),
                instructions,
                restriction,
                slots,
                results: RwLock::new(RunResults::default()),
            }),
        }
    }

    fn results(&self) -> RwLockReadGuard<'_, RunResults> {
        self.inner.results.read().unwrap_or_else(|e| e.into_inner())
    }

    fn results_mut(&self) -> RwLockWriteGuard<'_, RunResults> {
        self.inner.results.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Identity shared by all clones of this program.
    pub fn id(&self) -> ProgramId {
        self.inner.id
    }

    /// The instruction stream in execution order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.inner.instructions
    }

    /// Executor the program is restricted to, if any.
    pub fn executable_restriction(&self) -> Option<ExecutorBackend> {
        self.inner.restriction
    }

    /// Whether the program may run on `backend`.
    pub fn is_executable_on(&self, backend: ExecutorBackend) -> bool {
        self.inner.restriction.map_or(true, |r| r == backend)
    }

    /// Number of response words a run produces.
    pub fn read_word_count(&self) -> usize {
        self.inner.instructions.iter().filter(|i| i.is_read()).count()
    }

    /// Number of tickets issued for this program.
    pub fn ticket_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// Completed runs so far.
    pub fn run_count(&self) -> u64 {
        self.results().runs
    }

    /// Spikes received during the last run.
    pub fn spikes(&self) -> Vec<SpikeFromChip> {
        self.results().spikes.clone()
    }

    /// Analog samples received during the last run.
    pub fn madc_samples(&self) -> Vec<MadcSampleFromChip> {
        self.results().madc_samples.clone()
    }

    /// Records of the last run carrying 1, 2 and 3 spikes.
    pub fn spike_pack_counts(&self) -> [u64; SPIKE_PACK_SIZES] {
        self.results().spike_pack_counts
    }

    /// Records of the last run carrying 1 and 2 samples.
    pub fn madc_sample_pack_counts(&self) -> [u64; MADC_SAMPLE_PACK_SIZES] {
        self.results().madc_sample_pack_counts
    }

    /// Content hash of the instruction stream and restriction.
    ///
    /// Independent of identity: two builders issuing the same calls produce
    /// programs with equal digests.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"spindle:program:v1");
        hasher.update(&[match self.inner.restriction {
            None => 0,
            Some(ExecutorBackend::Hardware) => 1,
            Some(ExecutorBackend::Simulation) => 2,
        }]);
        hasher.update(&(self.inner.instructions.len() as u64).to_le_bytes());
        for instruction in &self.inner.instructions {
            hash_instruction(&mut hasher, instruction);
        }
        hasher.finalize().into()
    }

    /// Clears tickets and event buffers ahead of a run.
    pub fn begin_run(&self) {
        for slot in &self.inner.slots {
            slot.reset();
        }
        let mut results = self.results_mut();
        results.spikes.clear();
        results.madc_samples.clear();
        results.spike_pack_counts = [0; SPIKE_PACK_SIZES];
        results.madc_sample_pack_counts = [0; MADC_SAMPLE_PACK_SIZES];
    }

    /// Resolves tickets in request order and stores the run's events.
    ///
    /// All or nothing: the word count is checked before any ticket is
    /// touched, and tickets only become valid once every one of them decoded.
    /// On error no ticket is valid, the events are not stored and the run
    /// count is unchanged.
    pub fn complete_run(&self, response: ResponseStream) -> Result<(), ProgramError> {
        let expected = self.read_word_count();
        if response.words.len() != expected {
            return Err(ProgramError::ResponseCount {
                program: self.id(),
                expected,
                actual: response.words.len(),
            });
        }
        if let Err(e) = self.stage_slots(&response.words) {
            for slot in &self.inner.slots {
                slot.discard();
            }
            return Err(e);
        }

        let mut results = self.results_mut();
        for slot in &self.inner.slots {
            slot.commit();
        }
        results.runs += 1;
        results.spikes = response.spikes;
        results.madc_samples = response.madc_samples;
        results.spike_pack_counts = response.spike_pack_counts;
        results.madc_sample_pack_counts = response.madc_sample_pack_counts;
        Ok(())
    }

    fn stage_slots(&self, words: &[ResponseWord]) -> Result<(), ProgramError> {
        let mut offset = 0usize;
        for slot in &self.inner.slots {
            let n = slot.word_count();
            let chunk = words.get(offset..offset + n).ok_or(ProgramError::ResponseCount {
                program: self.id(),
                expected: offset + n,
                actual: words.len(),
            })?;
            slot.stage(chunk, offset as u64)?;
            offset += n;
        }
        Ok(())
    }
}

fn hash_instruction(hasher: &mut blake3::Hasher, instruction: &Instruction) {
    match instruction {
        Instruction::Write(WriteAccess::Omnibus(a, w)) => {
            hasher.update(&[0]);
            hasher.update(&a.0.to_le_bytes());
            hasher.update(&w.0.to_le_bytes());
        }
        Instruction::Write(WriteAccess::Jtag(a, w)) => {
            hasher.update(&[1]);
            hasher.update(&a.0.to_le_bytes());
            hasher.update(&w.0.to_le_bytes());
        }
        Instruction::ReadRequest(Address::Omnibus(a)) => {
            hasher.update(&[2]);
            hasher.update(&a.0.to_le_bytes());
        }
        Instruction::ReadRequest(Address::Jtag(a)) => {
            hasher.update(&[3]);
            hasher.update(&a.0.to_le_bytes());
        }
        Instruction::WaitUntil { timer, value } => {
            hasher.update(&[4]);
            hasher.update(&timer.value().to_le_bytes());
            hasher.update(&value.0.to_le_bytes());
        }
        Instruction::Barrier(b) => {
            hasher.update(&[5, b.mask()]);
        }
    }
}

impl PartialEq for PlaybackProgram {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for PlaybackProgram {}

impl fmt::Debug for PlaybackProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackProgram")
            .field("id", &self.inner.id)
            .field("instructions", &self.inner.instructions.len())
            .field("tickets", &self.inner.slots.len())
            .field("restriction", &self.inner.restriction)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PlaybackProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digest = self.digest();
        write!(
            f,
            "PlaybackProgram({}, digest {}, {} instructions, {} reads",
            self.inner.id,
            hex::encode(&digest[..4]),
            self.inner.instructions.len(),
            self.read_word_count(),
        )?;
        if let Some(r) = self.inner.restriction {
            write!(f, ", restricted to {r}")?;
        }
        writeln!(f, ")")?;
        for (i, instruction) in self.inner.instructions.iter().enumerate() {
            writeln!(f, "  {i:>5}: {instruction}")?;
        }
        let results = self.results();
        if results.runs > 0 {
            writeln!(
                f,
                "  last run: {} spikes {:?}, {} madc samples {:?}",
                results.spikes.len(),
                results.spike_pack_counts,
                results.madc_samples.len(),
                results.madc_sample_pack_counts,
            )?;
        }
        Ok(())
    }
}
