// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, ExecutorBackend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::{AdpllOnChip, IndexedCoordinate};
use crate::ranged::ranged_value;

use super::{bit, checked, field, jtag, words};

const JTAG_BASE: u16 = 0x20;

ranged_value!(
    /// Output divider of a PLL clock output (5 bits, never zero).
    PllDivider: u8, 1, 31
);

/// Clock output stage of one PLL.
///
/// Only reachable over JTAG and only meaningful on a physical board, so any
/// program touching it is restricted to hardware executors.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllClockOutput {
    /// Drive the output.
    pub enable_output: bool,
    /// Take the clock from the digital PLL instead of the bypass path.
    pub switch_to_adpll: bool,
    /// Output divider.
    pub divider: PllDivider,
}

impl Default for PllClockOutput {
    fn default() -> Self {
        Self {
            enable_output: true,
            switch_to_adpll: true,
            divider: PllDivider::saturating(2),
        }
    }
}

impl Container for PllClockOutput {
    type Coord = AdpllOnChip;
    const NAME: &'static str = "PllClockOutput";
}

impl Leaf for PllClockOutput {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Jtag];
    const DEFAULT_BACKEND: Backend = Backend::Jtag;
    const WRITE_WORDS: usize = 1;
    const READ_WORDS: usize = 1;
    const EXECUTOR_RESTRICTION: Option<ExecutorBackend> = Some(ExecutorBackend::Hardware);

    fn write_addresses(coord: &AdpllOnChip, _backend: Backend) -> Vec<Address> {
        vec![jtag(JTAG_BASE + coord.index() as u16)]
    }

    fn read_addresses(coord: &AdpllOnChip, backend: Backend) -> Vec<Address> {
        Self::write_addresses(coord, backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        let raw = u64::from(self.enable_output)
            | u64::from(self.switch_to_adpll) << 1
            | u64::from(self.divider.value()) << 2;
        words(backend, [raw])
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        let raw = raw_words::<Self>(backend, words)?[0];
        let divider = checked(Self::NAME, PllDivider::new(field(raw, 2, 5) as u8))?;
        self.enable_output = bit(raw, 0);
        self.switch_to_adpll = bit(raw, 1);
        self.divider = divider;
        Ok(())
    }
}

crate::leaf_node!(PllClockOutput);
