// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::fmt;

use proptest::prelude::*;
use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};

use spindle_core::containers::{
    Chip, NeuronThreshold, PrechargeConfig, SynapseAddress, SynapseRow, SynapseWeight,
    SystimeCount, WaitCounterClear,
};
use spindle_core::visit::{
    DecodeVisitor, EncodeVisitor, LeafMut, LeafRef, ReadAddressVisitor, WriteAddressVisitor,
};
use spindle_core::{
    visit_preorder, visit_preorder_mut, Address, Backend, IndexedCoordinate, SynapseRowOnChip,
    Unique, Visitor, VisitorMut,
};

#[derive(Default)]
struct Trace(Vec<String>);

impl Trace {
    fn push(&mut self, kind: &str, name: &str, coord: &dyn fmt::Debug) {
        self.0.push(format!("{kind} {name} {coord:?}"));
    }
}

impl Visitor for Trace {
    fn composite(&mut self, name: &'static str, coord: &dyn fmt::Debug) {
        self.push("composite", name, coord);
    }

    fn leaf(&mut self, leaf: &dyn LeafRef) {
        self.push("leaf", leaf.name(), leaf.coordinate());
    }
}

impl VisitorMut for Trace {
    fn composite(&mut self, name: &'static str, coord: &dyn fmt::Debug) {
        self.push("composite", name, coord);
    }

    fn leaf(&mut self, leaf: &mut dyn LeafMut) {
        self.push("leaf", leaf.name(), leaf.coordinate());
    }
}

#[test]
fn shared_and_mutable_traversals_agree() {
    let mut chip = Chip::default();
    let mut shared = Trace::default();
    visit_preorder(&chip, &Unique, &mut shared);
    let mut mutable = Trace::default();
    visit_preorder_mut(&mut chip, &Unique, &mut mutable);
    assert_eq!(shared.0, mutable.0);
    assert_eq!(shared.0.first().map(String::as_str), Some("composite Chip Unique"));
}

#[test]
fn synram_configs_precede_every_synapse() {
    let mut trace = Trace::default();
    visit_preorder(&Chip::default(), &Unique, &mut trace);
    let last_config = trace
        .0
        .iter()
        .rposition(|s| s.contains("CommonSynramConfig"))
        .unwrap();
    let first_quad = trace.0.iter().position(|s| s.contains("SynapseQuad")).unwrap();
    assert!(last_config < first_quad);

    let mut addresses = WriteAddressVisitor::new(None);
    visit_preorder(&Chip::default(), &Unique, &mut addresses);
    // Synram configs occupy the first six write addresses.
    assert!(addresses.addresses[..6]
        .iter()
        .all(|a| matches!(a, Address::Omnibus(o) if o.0 >> 16 == 0x0200)));
}

#[test]
fn nested_row_visits_columns_in_order() {
    let row = SynapseRowOnChip::from_index(3).unwrap();
    let mut trace = Trace::default();
    visit_preorder(&SynapseRow::default(), &row, &mut trace);
    assert_eq!(trace.0.len(), 3);
    assert!(trace.0[1].contains("column: SynapseQuadColumn(0)"));
    assert!(trace.0[2].contains("column: SynapseQuadColumn(1)"));
}

fn chip_strategy() -> impl Strategy<Value = Chip> {
    (
        prop::array::uniform2((0u8..16, any::<u8>(), 0u8..8)),
        prop::collection::vec((0u8..64, 0u8..64), 32),
        prop::array::uniform8((any::<bool>(), 0u16..1024, any::<u8>())),
        0u64..(1 << 43),
    )
        .prop_map(|(synram, synapses, neurons, base)| {
            let mut chip = Chip::default();
            for (config, (pc, w, wait)) in chip.common_synram_configs.iter_mut().zip(synram) {
                config.pc_conf_west = PrechargeConfig::saturating(pc);
                config.pc_conf_east = PrechargeConfig::saturating(15 - pc);
                config.w_conf_west = w;
                config.wait_ctr_clear = WaitCounterClear::saturating(wait);
            }
            let all = chip
                .synapse_rows
                .iter_mut()
                .flat_map(|r| r.quads.iter_mut())
                .flat_map(|q| q.synapses.iter_mut());
            for (synapse, (weight, address)) in all.zip(synapses) {
                synapse.weight = SynapseWeight::saturating(weight);
                synapse.address = SynapseAddress::saturating(address);
            }
            for (neuron, (fire, threshold, refractory)) in chip.neurons.iter_mut().zip(neurons) {
                neuron.enable_fire = fire;
                neuron.threshold = NeuronThreshold::saturating(threshold);
                neuron.refractory_time = refractory;
            }
            chip.systime_sync_base.value = SystimeCount::saturating(base);
            chip
        })
}

#[test]
fn encode_then_decode_over_independent_address_lists_reconstructs_chip() {
    const SEED_BYTES: [u8; 32] = [
        0x5e, 0xed, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0,
    ];
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);

    runner
        .run(&chip_strategy(), |chip| {
            let mut writes = WriteAddressVisitor::new(None);
            visit_preorder(&chip, &Unique, &mut writes);
            let mut reads = ReadAddressVisitor::new(None);
            visit_preorder(&Chip::default(), &Unique, &mut reads);
            prop_assert_eq!(&writes.addresses, &reads.addresses);

            let mut encoded = EncodeVisitor::new(None);
            visit_preorder(&chip, &Unique, &mut encoded);
            prop_assert_eq!(encoded.words.len(), writes.addresses.len());

            let mut decoded = Chip::default();
            let mut decoder = DecodeVisitor::new(None, &encoded.words);
            visit_preorder_mut(&mut decoded, &Unique, &mut decoder);
            prop_assert!(decoder.error.is_none());
            prop_assert_eq!(decoder.consumed(), encoded.words.len());
            prop_assert_eq!(decoded, chip);
            Ok(())
        })
        .expect("chip round trip");
}

#[test]
fn explicit_backend_applies_to_every_leaf() {
    let mut jtag = WriteAddressVisitor::new(Some(Backend::Jtag));
    visit_preorder(&Chip::default(), &Unique, &mut jtag);
    let err = jtag.error.expect("synapse quads are bus-only");
    assert_eq!(err.container, "SynapseQuad");
    assert_eq!(err.backend, Backend::Jtag);
}
