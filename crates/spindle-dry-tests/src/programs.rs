// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Program fixtures.

use spindle_core::containers::{SpikePack1ToChip, SpikePack2ToChip, SpikePack3ToChip, Timer};
use spindle_core::{
    BuildError, Node, PlaybackProgram, PlaybackProgramBuilder, SpikeLabel, Ticket, TimerOnChip,
    TimerValue, Unique,
};

/// Timer value the round-trip fixture waits for.
pub const ROUND_TRIP_WAIT: TimerValue = TimerValue(1000);

/// Writes `value` at `coord`, reads it back, then waits until the first
/// timer reaches [`ROUND_TRIP_WAIT`].
pub fn write_read_wait<T: Node>(
    coord: T::Coord,
    value: &T,
) -> Result<(PlaybackProgram, Ticket<T>), BuildError> {
    let mut builder = PlaybackProgramBuilder::new();
    builder.write(coord, value)?;
    let ticket = builder.read::<T>(coord)?;
    builder.wait_until(TimerOnChip::MIN, ROUND_TRIP_WAIT)?;
    Ok((builder.done(), ticket))
}

/// `count` distinct labels, scattered over the 16-bit label space.
pub fn distinct_spike_labels(count: u16) -> Vec<SpikeLabel> {
    // 40503 is odd, so multiplication is a bijection on u16.
    (0..count).map(|i| SpikeLabel(i.wrapping_mul(40503))).collect()
}

/// Injects `labels` in packs whose sizes cycle through `pattern`.
///
/// Resets the first timer, then writes one spike pack container per chunk.
/// Pattern entries outside 1..=3 are clamped; an empty pattern injects one
/// spike per pack.
pub fn spike_injection_program(
    labels: &[SpikeLabel],
    pattern: &[usize],
) -> Result<PlaybackProgram, BuildError> {
    let mut builder = PlaybackProgramBuilder::new();
    builder.write(TimerOnChip::MIN, &Timer::default())?;
    let pattern = if pattern.is_empty() { &[1][..] } else { pattern };
    let mut rest = labels;
    for &size in pattern.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let (pack, tail) = rest.split_at(size.clamp(1, 3).min(rest.len()));
        match *pack {
            [a] => builder.write(Unique, &SpikePack1ToChip::new([a]))?,
            [a, b] => builder.write(Unique, &SpikePack2ToChip::new([a, b]))?,
            [a, b, c, ..] => builder.write(Unique, &SpikePack3ToChip::new([a, b, c]))?,
            [] => {}
        }
        rest = tail;
    }
    Ok(builder.done())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn labels_are_distinct() {
        let labels = distinct_spike_labels(1000);
        let unique: BTreeSet<u16> = labels.iter().map(|l| l.0).collect();
        assert_eq!(unique.len(), 1000);
    }

    #[test]
    fn injection_writes_one_word_per_label() {
        let labels = distinct_spike_labels(10);
        let program = spike_injection_program(&labels, &[1, 2, 3]).unwrap();
        // One timer write plus one write per label.
        assert_eq!(program.instructions().len(), 11);
    }

    #[test]
    fn empty_pattern_still_injects_every_label() {
        let labels = distinct_spike_labels(4);
        let program = spike_injection_program(&labels, &[]).unwrap();
        assert_eq!(program.instructions().len(), 5);
        let clamped = spike_injection_program(&labels, &[0, 9]).unwrap();
        // Packs of 1 and 3.
        assert_eq!(clamped.instructions().len(), 5);
    }
}
