// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference containers.
//!
//! A small but complete set of registers covering every shape the engine has
//! to handle: single- and multi-word leaves, write-only leaves, JTAG-only
//! leaves with an executor restriction, a leaf that restarts a timer, and
//! nested composites.
//!
//! Register map (on-chip bus):
//!
//! | Range | Container |
//! |-------|-----------|
//! | `0x0002_0000 + timer` | [`Timer`] |
//! | `0x0002_0100` | [`SystimeSync`] |
//! | `0x0002_0110..=0x0002_0111` | [`SystimeSyncBase`] |
//! | `0x0002_0200` | [`ResetChip`] |
//! | `0x0002_0300 + 4 * (N - 1) + i` | [`SpikePackToChip<N>`] |
//! | `0x0200_0000 + 0x10 * synram + i` | [`CommonSynramConfig`] |
//! | `0x0201_0000 + 2 * quad + i` | [`SynapseQuad`] |
//! | `0x0202_0000 + neuron` | [`NeuronConfig`] |
//!
//! JTAG registers: PLL outputs at `0x20 + adpll`, systime base at
//! `0x30..=0x31`, synram configs at `0x40 + 4 * synram + i`.
mod chip;
mod neuron;
mod pll;
mod reset;
mod spike;
mod synapse;
mod systime;
mod timer;

pub use chip::Chip;
pub use neuron::{NeuronConfig, NeuronThreshold};
pub use pll::{PllClockOutput, PllDivider};
pub use reset::ResetChip;
pub use spike::{SpikePack1ToChip, SpikePack2ToChip, SpikePack3ToChip, SpikePackToChip};
pub use synapse::{
    CommonSynramConfig, PrechargeConfig, Synapse, SynapseAddress, SynapseCalib, SynapseQuad,
    SynapseRow, SynapseWeight, WaitCounterClear,
};
pub use systime::{SystimeCount, SystimeSync, SystimeSyncBase};
pub use timer::Timer;

use crate::backend::{Address, Backend, JtagAddress, OmnibusAddress, Word};
use crate::container::DecodeError;
use crate::ranged::RangeError;

fn omnibus(address: u32) -> Address {
    Address::Omnibus(OmnibusAddress(address))
}

fn jtag(address: u16) -> Address {
    Address::Jtag(JtagAddress(address))
}

fn words(backend: Backend, raw: impl IntoIterator<Item = u64>) -> Vec<Word> {
    raw.into_iter().map(|r| Word::new(backend, r)).collect()
}

fn bit(raw: u64, index: u32) -> bool {
    (raw >> index) & 1 == 1
}

fn field(raw: u64, shift: u32, width: u32) -> u64 {
    (raw >> shift) & ((1 << width) - 1)
}

fn checked<T>(container: &'static str, value: Result<T, RangeError>) -> Result<T, DecodeError> {
    value.map_err(|e| DecodeError::InvalidValue {
        container,
        detail: e.to_string(),
    })
}
