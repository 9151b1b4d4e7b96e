// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::backend::{Address, Backend, Word};
use crate::container::{raw_words, Container, DecodeError, Leaf};
use crate::coord::{
    IndexedCoordinate, SynapseQuadColumn, SynapseQuadOnChip, SynapseRowOnChip, SynramOnChip,
};
use crate::ranged::ranged_value;
use crate::visit::{Node, Visitor, VisitorMut};

use super::{checked, field, jtag, omnibus, words};

const SYNRAM_BASE: u32 = 0x0200_0000;
const SYNRAM_JTAG_BASE: u16 = 0x40;
const QUAD_BASE: u32 = 0x0201_0000;

ranged_value!(
    /// Precharge setting of one synram half (4 bits).
    PrechargeConfig: u8, 0, 15
);

ranged_value!(
    /// Wait counter reset value (3 bits).
    WaitCounterClear: u8, 0, 7
);

ranged_value!(
    /// Synaptic weight (6 bits).
    SynapseWeight: u8, 0, 63
);

ranged_value!(
    /// Label a synapse responds to (6 bits).
    SynapseAddress: u8, 0, 63
);

ranged_value!(
    /// Calibration trim of a synapse (2 bits).
    SynapseCalib: u8, 0, 3
);

/// Timing configuration shared by all synapses of one synram.
///
/// Must be written before any synapse of that synram; composites visit it first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommonSynramConfig {
    /// Precharge setting of the west half.
    pub pc_conf_west: PrechargeConfig,
    /// Precharge setting of the east half.
    pub pc_conf_east: PrechargeConfig,
    /// Wordline delay of the west half.
    pub w_conf_west: u8,
    /// Wordline delay of the east half.
    pub w_conf_east: u8,
    /// Wait counter reset value.
    pub wait_ctr_clear: WaitCounterClear,
}

impl Default for CommonSynramConfig {
    fn default() -> Self {
        Self {
            pc_conf_west: PrechargeConfig::saturating(8),
            pc_conf_east: PrechargeConfig::saturating(8),
            w_conf_west: 3,
            w_conf_east: 3,
            wait_ctr_clear: WaitCounterClear::saturating(4),
        }
    }
}

impl Container for CommonSynramConfig {
    type Coord = SynramOnChip;
    const NAME: &'static str = "CommonSynramConfig";
}

impl Leaf for CommonSynramConfig {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus, Backend::Jtag];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 3;
    const READ_WORDS: usize = 3;

    fn write_addresses(coord: &SynramOnChip, backend: Backend) -> Vec<Address> {
        let synram = coord.index();
        (0..Self::WRITE_WORDS)
            .map(|i| match backend {
                Backend::Omnibus => omnibus(SYNRAM_BASE + (0x10 * synram + i) as u32),
                Backend::Jtag => jtag(SYNRAM_JTAG_BASE + (4 * synram + i) as u16),
            })
            .collect()
    }

    fn read_addresses(coord: &SynramOnChip, backend: Backend) -> Vec<Address> {
        Self::write_addresses(coord, backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        words(
            backend,
            [
                u64::from(self.pc_conf_west.value()) | u64::from(self.pc_conf_east.value()) << 4,
                u64::from(self.w_conf_west) | u64::from(self.w_conf_east) << 8,
                u64::from(self.wait_ctr_clear.value()),
            ],
        )
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        let raw = raw_words::<Self>(backend, words)?;
        *self = Self {
            pc_conf_west: checked(Self::NAME, PrechargeConfig::new(field(raw[0], 0, 4) as u8))?,
            pc_conf_east: checked(Self::NAME, PrechargeConfig::new(field(raw[0], 4, 4) as u8))?,
            w_conf_west: field(raw[1], 0, 8) as u8,
            w_conf_east: field(raw[1], 8, 8) as u8,
            wait_ctr_clear: checked(Self::NAME, WaitCounterClear::new(field(raw[2], 0, 3) as u8))?,
        };
        Ok(())
    }
}

/// One synapse of a quad. Packs into 16 bits.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Synapse {
    /// Weight.
    pub weight: SynapseWeight,
    /// Label the synapse responds to.
    pub address: SynapseAddress,
    /// Time constant calibration.
    pub time_calib: SynapseCalib,
    /// Amplitude calibration.
    pub amp_calib: SynapseCalib,
}

impl Synapse {
    fn pack(&self) -> u64 {
        u64::from(self.weight.value())
            | u64::from(self.address.value()) << 6
            | u64::from(self.time_calib.value()) << 12
            | u64::from(self.amp_calib.value()) << 14
    }

    fn unpack(raw: u64) -> Result<Self, DecodeError> {
        let name = SynapseQuad::NAME;
        Ok(Self {
            weight: checked(name, SynapseWeight::new(field(raw, 0, 6) as u8))?,
            address: checked(name, SynapseAddress::new(field(raw, 6, 6) as u8))?,
            time_calib: checked(name, SynapseCalib::new(field(raw, 12, 2) as u8))?,
            amp_calib: checked(name, SynapseCalib::new(field(raw, 14, 2) as u8))?,
        })
    }
}

/// Four adjacent synapses sharing two bus words.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynapseQuad {
    /// Synapses in column order.
    pub synapses: [Synapse; 4],
}

impl Container for SynapseQuad {
    type Coord = SynapseQuadOnChip;
    const NAME: &'static str = "SynapseQuad";
}

impl Leaf for SynapseQuad {
    const SUPPORTED_BACKENDS: &'static [Backend] = &[Backend::Omnibus];
    const DEFAULT_BACKEND: Backend = Backend::Omnibus;
    const WRITE_WORDS: usize = 2;
    const READ_WORDS: usize = 2;

    fn write_addresses(coord: &SynapseQuadOnChip, _backend: Backend) -> Vec<Address> {
        let base = QUAD_BASE + 2 * coord.index() as u32;
        vec![omnibus(base), omnibus(base + 1)]
    }

    fn read_addresses(coord: &SynapseQuadOnChip, backend: Backend) -> Vec<Address> {
        Self::write_addresses(coord, backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        let s = &self.synapses;
        words(
            backend,
            [s[0].pack() | s[1].pack() << 16, s[2].pack() | s[3].pack() << 16],
        )
    }

    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        let raw = raw_words::<Self>(backend, words)?;
        self.synapses = [
            Synapse::unpack(field(raw[0], 0, 16))?,
            Synapse::unpack(field(raw[0], 16, 16))?,
            Synapse::unpack(field(raw[1], 0, 16))?,
            Synapse::unpack(field(raw[1], 16, 16))?,
        ];
        Ok(())
    }
}

crate::leaf_node!(CommonSynramConfig, SynapseQuad);

/// All quads of one synapse row.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynapseRow {
    /// Quads in column order.
    pub quads: [SynapseQuad; SynapseQuadColumn::SIZE],
}

impl Container for SynapseRow {
    type Coord = SynapseRowOnChip;
    const NAME: &'static str = "SynapseRow";
}

macro_rules! synapse_row_children {
    ($this:ident, $coord:ident, $visitor:ident, $visit:ident $(, $mut:tt)?) => {
        for (column, quad) in SynapseQuadColumn::iter_all().zip(& $($mut)? $this.quads) {
            quad.$visit(&SynapseQuadOnChip::new(*$coord, column), &mut *$visitor);
        }
    };
}

impl Node for SynapseRow {
    fn visit_preorder<V: Visitor + ?Sized>(&self, coord: &SynapseRowOnChip, visitor: &mut V) {
        visitor.composite(Self::NAME, coord);
        synapse_row_children!(self, coord, visitor, visit_preorder);
    }

    fn visit_preorder_mut<V: VisitorMut + ?Sized>(
        &mut self,
        coord: &SynapseRowOnChip,
        visitor: &mut V,
    ) {
        visitor.composite(Self::NAME, coord);
        synapse_row_children!(self, coord, visitor, visit_preorder_mut, mut);
    }
}
