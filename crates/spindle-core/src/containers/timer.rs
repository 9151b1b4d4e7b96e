// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::{IndexedCoordinate, TimerOnChip};
use crate::instruction::TimerValue;

use super::{omnibus, words};

const BASE: u32 = 0x0002_0000;

/// Playback timer. Writing it restarts the timer at `value`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timer {
    /// Current tick count.
    pub value: TimerValue,
}

impl Timer {
    /// Timer set to `value`.
    pub fn new(value: TimerValue) -> Self {
        Self { value }
    }
}

impl Container for Timer {
    type Coord = TimerOnChip;
    const NAME: &'static str = "Timer";
}

impl Leaf for Timer {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 1;
    const READ_WORDS: usize = 1;

    fn write_addresses(coord: &TimerOnChip, _backend: Backend) -> Vec<Address> {
        vec![omnibus(BASE + coord.index() as u32)]
    }

    fn read_addresses(coord: &TimerOnChip, backend: Backend) -> Vec<Address> {
        Self::write_addresses(coord, backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        words(backend, [u64::from(self.value.0)])
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        let raw = raw_words::<Self>(backend, words)?;
        self.value = TimerValue(raw[0] as u32);
        Ok(())
    }

    fn timer_reset(&self, coord: &TimerOnChip) -> Option<(TimerOnChip, TimerValue)> {
        Some((*coord, self.value))
    }
}

crate::leaf_node!(Timer);
