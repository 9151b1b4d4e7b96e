// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::container::Container;
use crate::coord::{IndexedCoordinate, NeuronOnChip, SynapseRowOnChip, SynramOnChip, Unique};
use crate::visit::{Node, Visitor, VisitorMut};

use super::{CommonSynramConfig, NeuronConfig, SynapseRow, SystimeSyncBase};

/// Digital configuration of a whole chip.
///
/// Children are visited in dependency order:
///
/// 1. common synram configs, which gate every synapse access,
/// 2. synapse rows,
/// 3. neuron configs,
/// 4. the systime sync base.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chip {
    /// Timing configuration per synram.
    pub common_synram_configs: [CommonSynramConfig; SynramOnChip::SIZE],
    /// Synapse array.
    pub synapse_rows: [SynapseRow; SynapseRowOnChip::SIZE],
    /// Neuron configuration per neuron.
    pub neurons: [NeuronConfig; NeuronOnChip::SIZE],
    /// Counter start value for the next systime sync.
    pub systime_sync_base: SystimeSyncBase,
}

impl Container for Chip {
    type Coord = Unique;
    const NAME: &'static str = "Chip";
}

macro_rules! chip_children {
    ($this:ident, $visitor:ident, $visit:ident $(, $mut:tt)?) => {
        for (synram, config) in SynramOnChip::iter_all().zip(& $($mut)? $this.common_synram_configs) {
            config.$visit(&synram, &mut *$visitor);
        }
        for (row, config) in SynapseRowOnChip::iter_all().zip(& $($mut)? $this.synapse_rows) {
            config.$visit(&row, &mut *$visitor);
        }
        for (neuron, config) in NeuronOnChip::iter_all().zip(& $($mut)? $this.neurons) {
            config.$visit(&neuron, &mut *$visitor);
        }
        $this.systime_sync_base.$visit(&Unique, &mut *$visitor);
    };
}

impl Node for Chip {
    fn visit_preorder<V: Visitor + ?Sized>(&self, coord: &Unique, visitor: &mut V) {
        visitor.composite(Self::NAME, coord);
        chip_children!(self, visitor, visit_preorder);
    }

    fn visit_preorder_mut<V: VisitorMut + ?Sized>(&mut self, coord: &Unique, visitor: &mut V) {
        visitor.composite(Self::NAME, coord);
        chip_children!(self, visitor, visit_preorder_mut, mut);
    }
}
