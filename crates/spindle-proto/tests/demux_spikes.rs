// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::collections::BTreeMap;

use rand::prelude::*;

use spindle_core::{Backend, ChipTime, FpgaTime, SpikeLabel, Word};
use spindle_proto::{demultiplex, ResponseEncoder};

#[test]
fn thousand_spikes_survive_mixed_pack_sizes_exactly_once() {
    let mut rng = StdRng::seed_from_u64(0x5b1d);
    let injected: Vec<(SpikeLabel, ChipTime)> = (0..1000u16)
        .map(|i| (SpikeLabel(i.wrapping_mul(37)), ChipTime(u64::from(i) * 13)))
        .collect();

    let mut encoder = ResponseEncoder::new();
    let mut packs = [0u64; 3];
    let mut rest = injected.as_slice();
    let mut tick = 0u64;
    while !rest.is_empty() {
        let n = rng.gen_range(1..=3).min(rest.len());
        let (pack, tail) = rest.split_at(n);
        if rng.gen_bool(0.2) {
            tick += 1;
            encoder.timestamp(FpgaTime(tick));
        }
        if rng.gen_bool(0.05) {
            encoder.word(Word::new(Backend::Omnibus, tick));
        }
        encoder.spikes(pack).unwrap();
        packs[n - 1] += 1;
        rest = tail;
    }
    let bytes = encoder.halt().finish();

    let stream = demultiplex(&bytes).unwrap();
    assert_eq!(stream.spikes.len(), injected.len());
    assert_eq!(stream.spike_pack_counts, packs);

    let mut expected: BTreeMap<u16, u64> =
        injected.iter().map(|(l, t)| (l.0, t.0)).collect();
    for spike in &stream.spikes {
        let time = expected
            .remove(&spike.label.0)
            .unwrap_or_else(|| panic!("unexpected or duplicated label {}", spike.label));
        assert_eq!(spike.chip_time.0, time & 0xffff);
    }
    assert!(expected.is_empty(), "lost {} spikes", expected.len());

    // Arrival order is preserved and timestamps never go backwards.
    let labels: Vec<u16> = stream.spikes.iter().map(|s| s.label.0).collect();
    let original: Vec<u16> = injected.iter().map(|(l, _)| l.0).collect();
    assert_eq!(labels, original);
    assert!(stream
        .spikes
        .windows(2)
        .all(|w| w[0].fpga_time <= w[1].fpga_time));
}

#[test]
fn response_words_interleaved_with_events_keep_their_order() {
    let mut encoder = ResponseEncoder::new();
    for i in 0..10u64 {
        encoder.timestamp(FpgaTime(i * 100));
        encoder.word(Word::new(Backend::Jtag, i));
        encoder
            .spikes(&[(SpikeLabel(i as u16), ChipTime(i))])
            .unwrap();
    }
    let stream = demultiplex(&encoder.finish()).unwrap();
    let words: Vec<u64> = stream.words.iter().map(|w| w.word.raw()).collect();
    assert_eq!(words, (0..10).collect::<Vec<_>>());
    assert_eq!(stream.words[3].fpga_time, Some(FpgaTime(300)));
    assert_eq!(stream.spikes[3].fpga_time, FpgaTime(300));
    assert_eq!(stream.spike_pack_counts, [10, 0, 0]);
}
