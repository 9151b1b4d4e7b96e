// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::Unique;
use crate::event::SpikeLabel;

use super::{omnibus, words};

const BASE: u32 = 0x0002_0300;
const NAMES: [&str; 3] = ["SpikePack1ToChip", "SpikePack2ToChip", "SpikePack3ToChip"];

/// Injects `N` spikes (1 to 3) into the chip in one bus transaction.
///
/// Write-only. The pack is sent once its last word is written.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SpikePackToChip<const N: usize> {
    /// Labels in injection order.
    pub labels: [SpikeLabel; N],
}

/// Single-spike pack.
pub type SpikePack1ToChip = SpikePackToChip<1>;
/// Two-spike pack.
pub type SpikePack2ToChip = SpikePackToChip<2>;
/// Three-spike pack.
pub type SpikePack3ToChip = SpikePackToChip<3>;

impl<const N: usize> SpikePackToChip<N> {
    /// Pack of `labels`.
    pub fn new(labels: [SpikeLabel; N]) -> Self {
        Self { labels }
    }
}

impl<const N: usize> Default for SpikePackToChip<N> {
    fn default() -> Self {
        Self {
            labels: [SpikeLabel::default(); N],
        }
    }
}

impl<const N: usize> Container for SpikePackToChip<N> {
    type Coord = Unique;
    const NAME: &'static str = NAMES[N - 1];
}

impl<const N: usize> Leaf for SpikePackToChip<N> {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = N;
    const READ_WORDS: usize = 0;

    fn write_addresses(_coord: &Unique, _backend: Backend) -> Vec<Address> {
        let base = BASE + 4 * (N as u32 - 1);
        (0..N as u32).map(|i| omnibus(base + i)).collect()
    }

    fn read_addresses(_coord: &Unique, _backend: Backend) -> Vec<Address> {
        Vec::new()
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        words(backend, self.labels.iter().map(|l| u64::from(l.0)))
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        raw_words::<Self>(backend, words).map(drop)
    }
}

crate::leaf_node!(SpikePack1ToChip, SpikePack2ToChip, SpikePack3ToChip);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_sizes_use_disjoint_addresses() {
        let one = SpikePack1ToChip::write_addresses(&Unique, Backend::Omnibus);
        let two = SpikePack2ToChip::write_addresses(&Unique, Backend::Omnibus);
        let three = SpikePack3ToChip::write_addresses(&Unique, Backend::Omnibus);
        assert_eq!((one.len(), two.len(), three.len()), (1, 2, 3));
        for a in &two {
            assert!(!one.contains(a) && !three.contains(a));
        }
        assert_eq!(SpikePack3ToChip::NAME, "SpikePack3ToChip");
    }
}
