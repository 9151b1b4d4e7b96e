// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::Unique;

use super::{omnibus, words};

const ADDRESS: u32 = 0x0002_0200;

/// Chip reset line. Write-only.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResetChip {
    /// Hold the chip in reset.
    pub reset: bool,
}

impl ResetChip {
    /// Reset line asserted (`true`) or released.
    pub fn new(reset: bool) -> Self {
        Self { reset }
    }
}

impl Container for ResetChip {
    type Coord = Unique;
    const NAME: &'static str = "ResetChip";
}

impl Leaf for ResetChip {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 1;
    const READ_WORDS: usize = 0;

    fn write_addresses(_coord: &Unique, _backend: Backend) -> Vec<Address> {
        vec![omnibus(ADDRESS)]
    }

    fn read_addresses(_coord: &Unique, _backend: Backend) -> Vec<Address> {
        Vec::new()
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        words(backend, [u64::from(self.reset)])
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        raw_words::<Self>(backend, words).map(drop)
    }
}

crate::leaf_node!(ResetChip);
