// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reusable program fragments.
//!
//! A generator records a fixed sequence onto a fresh builder and hands back
//! whatever the caller needs to interpret the run (tickets, for example).
//! The returned builder can be extended or merged into another one.
use tracing::debug;

use crate::backend::Backend;
use crate::builder::{BuildError, PlaybackProgramBuilder};
use crate::containers::{
    Chip, CommonSynramConfig, PllClockOutput, ResetChip, SystimeSync, SystimeSyncBase, Timer,
};
use crate::coord::{AdpllOnChip, IndexedCoordinate, SynramOnChip, TimerOnChip, Unique};
use crate::instruction::{Barrier, TimerValue};

/// Something that records a program fragment.
pub trait PlaybackGenerator {
    /// Value handed back next to the builder.
    type Output;

    /// Records the fragment onto a new builder.
    fn generate(&self) -> Result<(PlaybackProgramBuilder, Self::Output), BuildError>;
}

/// Runs `generator`.
pub fn generate<G: PlaybackGenerator + ?Sized>(
    generator: &G,
) -> Result<(PlaybackProgramBuilder, G::Output), BuildError> {
    generator.generate()
}

/// Chip bring-up sequence.
///
/// 1. assert and release chip reset, with settle waits
/// 2. configure PLL outputs over JTAG (restricts the program to hardware)
/// 3. load the systime base and sync FPGA and chip time
/// 4. write common synram configs
/// 5. optionally write a full [`Chip`] configuration
#[derive(Clone, Debug, PartialEq)]
pub struct InitGenerator {
    /// Timer used for all settle waits.
    pub timer: TimerOnChip,
    /// Time the reset line is held.
    pub reset_hold: TimerValue,
    /// Time to wait after releasing reset.
    pub reset_settle: TimerValue,
    /// PLL output configuration; `None` skips PLL setup, keeping the program
    /// runnable on simulation.
    pub pll_clock_output: Option<PllClockOutput>,
    /// Systime counter start value.
    pub systime_sync_base: SystimeSyncBase,
    /// Time to wait after the systime sync.
    pub systime_settle: TimerValue,
    /// Synram timing, written once per synram.
    pub common_synram_config: CommonSynramConfig,
    /// Backend for the synram timing writes.
    pub common_synram_backend: Backend,
    /// Full chip configuration written last.
    pub chip: Option<Chip>,
}

impl Default for InitGenerator {
    fn default() -> Self {
        Self {
            timer: TimerOnChip::MIN,
            reset_hold: TimerValue::from_us(10),
            reset_settle: TimerValue::from_us(100),
            pll_clock_output: Some(PllClockOutput::default()),
            systime_sync_base: SystimeSyncBase::default(),
            systime_settle: TimerValue::from_us(10),
            common_synram_config: CommonSynramConfig::default(),
            common_synram_backend: Backend::Jtag,
            chip: None,
        }
    }
}

impl InitGenerator {
    /// Bring-up without PLL setup, for simulation executors.
    pub fn for_simulation() -> Self {
        Self {
            pll_clock_output: None,
            ..Self::default()
        }
    }

    fn settle(
        &self,
        builder: &mut PlaybackProgramBuilder,
        duration: TimerValue,
    ) -> Result<(), BuildError> {
        builder.write(self.timer, &Timer::default())?;
        builder.wait_until(self.timer, duration)
    }
}

impl PlaybackGenerator for InitGenerator {
    type Output = ();

    fn generate(&self) -> Result<(PlaybackProgramBuilder, ()), BuildError> {
        let mut builder = PlaybackProgramBuilder::new();

        builder.write(Unique, &ResetChip::new(true))?;
        self.settle(&mut builder, self.reset_hold)?;
        builder.write(Unique, &ResetChip::new(false))?;
        self.settle(&mut builder, self.reset_settle)?;

        if let Some(pll) = &self.pll_clock_output {
            for adpll in AdpllOnChip::iter_all() {
                builder.write(adpll, pll)?;
            }
            builder.barrier(Barrier::Jtag);
        }

        builder.write(Unique, &self.systime_sync_base)?;
        builder.write(Unique, &SystimeSync::new(true))?;
        builder.barrier(Barrier::Systime);
        self.settle(&mut builder, self.systime_settle)?;

        for synram in SynramOnChip::iter_all() {
            builder.write_with(synram, &self.common_synram_config, self.common_synram_backend)?;
        }

        if let Some(chip) = &self.chip {
            builder.write(Unique, chip)?;
        }
        builder.barrier(Barrier::All);

        debug!(instructions = builder.len(), "init sequence generated");
        Ok((builder, ()))
    }
}
