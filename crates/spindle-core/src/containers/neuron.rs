// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::{IndexedCoordinate, NeuronOnChip};
use crate::ranged::ranged_value;

use super::{bit, checked, field, omnibus, words};

const BASE: u32 = 0x0202_0000;

ranged_value!(
    /// Firing threshold of a neuron (10 bits).
    NeuronThreshold: u16, 0, 1023
);

/// Digital configuration of one neuron.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NeuronConfig {
    /// Emit spikes on threshold crossing.
    pub enable_fire: bool,
    /// Firing threshold.
    pub threshold: NeuronThreshold,
    /// Refractory period in clock cycles.
    pub refractory_time: u8,
    /// Forward input spikes directly.
    pub enable_bypass: bool,
}

impl Container for NeuronConfig {
    type Coord = NeuronOnChip;
    const NAME: &'static str = "NeuronConfig";
}

impl Leaf for NeuronConfig {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 1;
    const READ_WORDS: usize = 1;

    fn write_addresses(coord: &NeuronOnChip, _backend: Backend) -> Vec<Address> {
        vec![omnibus(BASE + coord.index() as u32)]
    }

    fn read_addresses(coord: &NeuronOnChip, backend: Backend) -> Vec<Address> {
        Self::write_addresses(coord, backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        let raw = u64::from(self.enable_fire)
            | u64::from(self.threshold.value()) << 1
            | u64::from(self.refractory_time) << 11
            | u64::from(self.enable_bypass) << 19;
        words(backend, [raw])
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        let raw = raw_words::<Self>(backend, words)?[0];
        if raw >> 20 != 0 {
            return Err(DecodeError::InvalidValue {
                container: Self::NAME,
                detail: format!("reserved bits set in {raw:#x}"),
            });
        }
        let threshold = checked(Self::NAME, NeuronThreshold::new(field(raw, 1, 10) as u16))?;
        self.enable_fire = bit(raw, 0);
        self.threshold = threshold;
        self.refractory_time = field(raw, 11, 8) as u8;
        self.enable_bypass = bit(raw, 19);
        Ok(())
    }
}

crate::leaf_node!(NeuronConfig);
