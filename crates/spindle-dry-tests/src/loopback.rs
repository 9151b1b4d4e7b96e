// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A board model that plays programs against a flat register file.
//!
//! Writes land in memory and reads echo them back, so writing a container
//! and reading it again yields the same value. Writes to the spike injection
//! registers come back as spike records. The FPGA clock advances one cycle
//! per instruction and jumps forward on `wait_until`; with time annotation
//! enabled every response record is preceded by a timestamp whenever the
//! clock moved.
//!
//! Knobs let tests simulate a stuck execute flag, latched exception bits,
//! oversized results and a chip held in reset.
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use spindle_core::containers::{SpikePack1ToChip, SpikePack2ToChip, SpikePack3ToChip, Timer};
use spindle_core::{
    Address, Backend, ChipTime, ExecutorBackend, FpgaTime, IndexedCoordinate, Instruction, Leaf,
    SpikeLabel, TimerOnChip, Unique, Word, WriteAccess, SPIKE_PACK_SIZES,
};
use spindle_exec::{ExceptionFlags, Transport, TransportError};
use spindle_proto::{decode_program, ProgramFlags, ResponseEncoder};

/// Result memory of the model, in bytes.
pub const DEFAULT_RESULT_MEMORY: usize = 1 << 20;

/// In-process board model.
#[derive(Debug)]
pub struct LoopbackTransport {
    backend: ExecutorBackend,
    memory: HashMap<Address, Word>,
    spike_slots: HashMap<Address, (usize, usize)>,
    program: Option<(Vec<Instruction>, ProgramFlags)>,
    result: Vec<u8>,
    clock: u64,
    timer_base: BTreeMap<TimerOnChip, u64>,
    max_result_size: usize,
    stuck: bool,
    busy_polls: u32,
    busy_remaining: u32,
    exception: ExceptionFlags,
    result_size_override: Option<usize>,
    reset_checks: u32,
    fail_transmit: bool,
    transmits: usize,
    triggers: usize,
    polls: usize,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// Simulation-backed model with empty memory.
    pub fn new() -> Self {
        Self::with_backend(ExecutorBackend::Simulation)
    }

    /// Model that claims to be `backend`.
    pub fn with_backend(backend: ExecutorBackend) -> Self {
        let mut spike_slots = HashMap::new();
        let packs = [
            SpikePack1ToChip::write_addresses(&Unique, Backend::Omnibus),
            SpikePack2ToChip::write_addresses(&Unique, Backend::Omnibus),
            SpikePack3ToChip::write_addresses(&Unique, Backend::Omnibus),
        ];
        for (size, addresses) in packs.into_iter().enumerate() {
            for (slot, address) in addresses.into_iter().enumerate() {
                spike_slots.insert(address, (size + 1, slot));
            }
        }
        Self {
            backend,
            memory: HashMap::new(),
            spike_slots,
            program: None,
            result: Vec::new(),
            clock: 0,
            timer_base: BTreeMap::new(),
            max_result_size: DEFAULT_RESULT_MEMORY,
            stuck: false,
            busy_polls: 0,
            busy_remaining: 0,
            exception: ExceptionFlags::empty(),
            result_size_override: None,
            reset_checks: 0,
            fail_transmit: false,
            transmits: 0,
            triggers: 0,
            polls: 0,
        }
    }

    /// Keep the execute flag set forever.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Report the program as running for `polls` status reads after each trigger.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Latch `flags` in the exception register.
    pub fn set_exception(&mut self, flags: ExceptionFlags) {
        self.exception = flags;
    }

    /// Report `size` as the result size instead of the real one.
    pub fn set_result_size_override(&mut self, size: Option<usize>) {
        self.result_size_override = size;
    }

    /// Shrink or grow result memory.
    pub fn set_max_result_size(&mut self, size: usize) {
        self.max_result_size = size;
    }

    /// Report the chip in reset for the next `checks` reset checks.
    pub fn set_in_reset_for(&mut self, checks: u32) {
        self.reset_checks = checks;
    }

    /// Refuse program transfers.
    pub fn set_fail_transmit(&mut self, fail: bool) {
        self.fail_transmit = fail;
    }

    /// Register content at `address`.
    pub fn peek(&self, address: Address) -> Option<Word> {
        self.memory.get(&address).copied()
    }

    /// Overwrite the register at `address`.
    pub fn poke(&mut self, address: Address, word: Word) {
        self.memory.insert(address, word);
    }

    /// Current FPGA clock.
    pub fn clock(&self) -> FpgaTime {
        FpgaTime(self.clock)
    }

    /// Programs received.
    pub fn transmit_count(&self) -> usize {
        self.transmits
    }

    /// Triggers received.
    pub fn trigger_count(&self) -> usize {
        self.triggers
    }

    /// Status reads received.
    pub fn poll_count(&self) -> usize {
        self.polls
    }

    /// Instructions of the resident program.
    pub fn program(&self) -> Option<&[Instruction]> {
        self.program.as_ref().map(|(instructions, _)| instructions.as_slice())
    }

    fn play(&mut self, instructions: &[Instruction], flags: ProgramFlags) -> Vec<u8> {
        let mut out = ResponseEncoder::new();
        let mut stamped: Option<u64> = None;
        let mut pending: [Vec<SpikeLabel>; SPIKE_PACK_SIZES] = Default::default();

        for instruction in instructions {
            self.clock += 1;
            let mut stamp = |clock: u64, out: &mut ResponseEncoder| {
                if flags.time_annotation() && stamped != Some(clock) {
                    out.timestamp(FpgaTime(clock));
                    stamped = Some(clock);
                }
            };
            match *instruction {
                Instruction::Write(access) => {
                    let address = access.address();
                    let word = access.word();
                    self.memory.insert(address, word);
                    if let Some(&(size, slot)) = self.spike_slots.get(&address) {
                        let buffer = &mut pending[size - 1];
                        buffer.truncate(slot);
                        buffer.push(SpikeLabel(word.raw() as u16));
                        if buffer.len() == size {
                            let chip_time = ChipTime(self.clock);
                            let spikes: Vec<_> = buffer.drain(..).map(|l| (l, chip_time)).collect();
                            stamp(self.clock, &mut out);
                            // Pack sizes come from the slot table and are always 1..=3.
                            let _ = out.spikes(&spikes);
                        }
                    }
                    self.reset_timer_on_write(access);
                }
                Instruction::ReadRequest(address) => {
                    let word = self
                        .memory
                        .get(&address)
                        .copied()
                        .unwrap_or_else(|| Word::new(address.backend(), 0));
                    stamp(self.clock, &mut out);
                    out.word(word);
                }
                Instruction::WaitUntil { timer, value } => {
                    let base = self.timer_base.get(&timer).copied().unwrap_or(0);
                    self.clock = self.clock.max(base + u64::from(value.0));
                }
                Instruction::Barrier(_) => {}
            }
        }
        out.halt();
        trace!(clock = self.clock, bytes = out.len(), "program played");
        out.finish()
    }

    fn reset_timer_on_write(&mut self, access: WriteAccess) {
        for timer in TimerOnChip::iter_all() {
            if Timer::write_addresses(&timer, Backend::Omnibus).contains(&access.address()) {
                let value = access.word().raw();
                if value > self.clock {
                    self.clock = value;
                }
                self.timer_base.insert(timer, self.clock - value);
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn executor_backend(&self) -> ExecutorBackend {
        self.backend
    }

    fn transmit(&mut self, blocks: &[&[u8]]) -> Result<(), TransportError> {
        self.transmits += 1;
        if self.fail_transmit {
            return Err(TransportError::Rejected {
                operation: "transmit",
                detail: "simulated transfer failure".into(),
            });
        }
        let bytes = blocks.concat();
        let program = decode_program(&bytes).map_err(|e| TransportError::Rejected {
            operation: "transmit",
            detail: e.to_string(),
        })?;
        debug!(instructions = program.0.len(), "program memory loaded");
        self.program = Some(program);
        Ok(())
    }

    fn chip_in_reset(&mut self) -> Result<bool, TransportError> {
        if self.reset_checks > 0 {
            self.reset_checks -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn trigger(&mut self) -> Result<(), TransportError> {
        self.triggers += 1;
        let (instructions, flags) = self.program.take().ok_or_else(|| TransportError::Rejected {
            operation: "trigger",
            detail: "program memory empty".into(),
        })?;
        self.result = self.play(&instructions, flags);
        self.program = Some((instructions, flags));
        self.busy_remaining = self.busy_polls;
        Ok(())
    }

    fn poll_status(&mut self) -> Result<bool, TransportError> {
        self.polls += 1;
        if self.stuck {
            return Ok(true);
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn read_exception_flags(&mut self) -> Result<ExceptionFlags, TransportError> {
        Ok(self.exception)
    }

    fn read_result_size(&mut self) -> Result<usize, TransportError> {
        Ok(self.result_size_override.unwrap_or(self.result.len()))
    }

    fn max_result_size(&self) -> usize {
        self.max_result_size
    }

    fn bulk_read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, TransportError> {
        self.result
            .get(offset..offset + len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| TransportError::Rejected {
                operation: "bulk_read",
                detail: format!(
                    "{len} bytes at {offset} beyond {} result bytes",
                    self.result.len()
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_core::{OmnibusAddress, OmnibusWord, TimerValue};
    use spindle_proto::demultiplex;

    fn omnibus_write(address: u32, word: u32) -> Instruction {
        Instruction::Write(WriteAccess::Omnibus(OmnibusAddress(address), OmnibusWord(word)))
    }

    #[test]
    fn reads_echo_writes_and_waits_advance_the_clock() {
        let mut model = LoopbackTransport::new();
        let program = [
            omnibus_write(0x10, 7),
            Instruction::WaitUntil {
                timer: TimerOnChip::MIN,
                value: TimerValue(100),
            },
            Instruction::ReadRequest(Address::Omnibus(OmnibusAddress(0x10))),
            Instruction::ReadRequest(Address::Omnibus(OmnibusAddress(0x20))),
        ];
        let bytes = model.play(&program, ProgramFlags::with_time_annotation(true));
        let stream = demultiplex(&bytes).unwrap();
        assert_eq!(stream.words.len(), 2);
        assert_eq!(stream.words[0].word.raw(), 7);
        assert_eq!(stream.words[1].word.raw(), 0);
        assert_eq!(stream.words[0].fpga_time, Some(FpgaTime(101)));
        assert_eq!(stream.words[1].fpga_time, Some(FpgaTime(102)));
    }

    #[test]
    fn spike_pack_writes_come_back_as_spikes() {
        let mut model = LoopbackTransport::new();
        let addresses = SpikePack2ToChip::write_addresses(&Unique, Backend::Omnibus);
        let program: Vec<Instruction> = addresses
            .iter()
            .zip([5u64, 6])
            .map(|(a, l)| {
                Instruction::Write(WriteAccess::pair(*a, Word::new(Backend::Omnibus, l)).unwrap())
            })
            .collect();
        let stream = demultiplex(&model.play(&program, ProgramFlags::default())).unwrap();
        let labels: Vec<u16> = stream.spikes.iter().map(|s| s.label.0).collect();
        assert_eq!(labels, vec![5, 6]);
        assert_eq!(stream.spike_pack_counts, [0, 1, 0]);
    }
}
