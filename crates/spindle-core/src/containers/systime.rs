// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::Unique;
use crate::ranged::ranged_value;

use super::{checked, field, jtag, omnibus, words};

const SYNC_ADDRESS: u32 = 0x0002_0100;
const BASE_ADDRESS: u32 = 0x0002_0110;
const BASE_JTAG: u16 = 0x30;
const COUNTER_WIDTH: u32 = 43;

ranged_value!(
    /// System time counter value (43 bits).
    SystimeCount: u64, 0, (1 << COUNTER_WIDTH) - 1
);

/// Value the chip's system time counter is loaded with on sync (43 bits).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystimeSyncBase {
    /// Counter start value.
    pub value: SystimeCount,
}

impl SystimeSyncBase {
    /// Width of the counter in bits.
    pub const WIDTH: u32 = COUNTER_WIDTH;
    /// Largest representable start value.
    pub const MAX: u64 = SystimeCount::MAX.value();

    /// Start value, truncated to the counter width.
    pub fn new(value: u64) -> Self {
        Self {
            value: SystimeCount::saturating(value & Self::MAX),
        }
    }
}

impl Container for SystimeSyncBase {
    type Coord = Unique;
    const NAME: &'static str = "SystimeSyncBase";
}

impl Leaf for SystimeSyncBase {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus, Backend::Jtag];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 2;
    const READ_WORDS: usize = 2;

    fn write_addresses(_coord: &Unique, backend: Backend) -> Vec<Address> {
        match backend {
            Backend::Omnibus => vec![omnibus(BASE_ADDRESS), omnibus(BASE_ADDRESS + 1)],
            Backend::Jtag => vec![jtag(BASE_JTAG), jtag(BASE_JTAG + 1)],
        }
    }

    fn read_addresses(coord: &Unique, backend: Backend) -> Vec<Address> {
        Self::write_addresses(coord, backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        let value = self.value.value();
        words(backend, [field(value, 0, 32), field(value, 32, 11)])
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        let raw = raw_words::<Self>(backend, words)?;
        let value = field(raw[0], 0, 32) | (field(raw[1], 0, 11) << 32);
        self.value = checked(Self::NAME, SystimeCount::new(value))?;
        Ok(())
    }
}

/// Triggers a system time sync between FPGA and chip. Write-only.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystimeSync {
    /// Perform the sync.
    pub do_sync: bool,
}

impl SystimeSync {
    /// Sync request.
    pub fn new(do_sync: bool) -> Self {
        Self { do_sync }
    }
}

impl Container for SystimeSync {
    type Coord = Unique;
    const NAME: &'static str = "SystimeSync";
}

impl Leaf for SystimeSync {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 1;
    const READ_WORDS: usize = 0;

    fn write_addresses(_coord: &Unique, _backend: Backend) -> Vec<Address> {
        vec![omnibus(SYNC_ADDRESS)]
    }

    fn read_addresses(_coord: &Unique, _backend: Backend) -> Vec<Address> {
        Vec::new()
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        words(backend, [u64::from(self.do_sync)])
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        raw_words::<Self>(backend, words).map(drop)
    }
}

crate::leaf_node!(SystimeSyncBase, SystimeSync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_splits_into_low_and_high_words() {
        let base = SystimeSyncBase::new(0x7ff_dead_beef);
        let w = base.encode(Backend::Omnibus);
        assert_eq!(w[0].raw(), 0xdead_beef);
        assert_eq!(w[1].raw(), 0x7ff);
        let mut back = SystimeSyncBase::default();
        back.decode(Backend::Omnibus, &w).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn new_truncates_to_counter_width() {
        assert_eq!(SystimeSyncBase::new(u64::MAX).value, SystimeCount::MAX);
        assert_eq!(SystimeSyncBase::new(1 << 43).value, SystimeCount::MIN);
    }
}
