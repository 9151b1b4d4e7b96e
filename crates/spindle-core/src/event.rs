// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event records produced by a program run.
//!
//! Events arrive independently of any read request and carry their own
//! timestamps. Besides the typed records, each event has a fixed-size row
//! type for bit-exact export:
//!
//! - `#[repr(C)]` with explicit padding
//! - little-endian fields
//! - `bytemuck::Pod`, so a slice of rows casts to bytes without copying
use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Routing label of a spike.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpikeLabel(pub u16);

impl SpikeLabel {
    /// Neuron address part (low 14 bits).
    pub fn neuron_label(&self) -> u16 {
        self.0 & 0x3fff
    }

    /// Synapse-driver routing part (high 2 bits).
    pub fn crossbar_output(&self) -> u8 {
        (self.0 >> 14) as u8
    }
}

impl fmt::Display for SpikeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Time of an FPGA-side response, in FPGA clock cycles since systime sync.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FpgaTime(pub u64);

/// Time stamped by the chip, in chip clock cycles. Wraps at the counter width.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChipTime(pub u64);

/// Analog sampling channel.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MadcChannel(pub u8);

/// A spike emitted by the chip.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpikeFromChip {
    /// Routing label.
    pub label: SpikeLabel,
    /// FPGA time of arrival.
    pub fpga_time: FpgaTime,
    /// Chip time of emission.
    pub chip_time: ChipTime,
}

impl SpikeFromChip {
    /// Fixed-layout row for export.
    pub fn to_dtype(&self) -> SpikeFromChipDtype {
        SpikeFromChipDtype {
            label_le: self.label.0.to_le(),
            _pad: [0; 6],
            fpga_time_le: self.fpga_time.0.to_le(),
            chip_time_le: self.chip_time.0.to_le(),
        }
    }
}

impl fmt::Display for SpikeFromChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpikeFromChip(label: {}, fpga_time: {}, chip_time: {})",
            self.label, self.fpga_time.0, self.chip_time.0
        )
    }
}

/// One analog sample emitted by the chip.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MadcSampleFromChip {
    /// Sampled channel.
    pub channel: MadcChannel,
    /// Sample value (10 significant bits).
    pub value: u16,
    /// FPGA time of arrival.
    pub fpga_time: FpgaTime,
    /// Chip time of sampling.
    pub chip_time: ChipTime,
}

impl MadcSampleFromChip {
    /// Mask of the significant sample bits.
    pub const VALUE_MASK: u16 = 0x3ff;

    /// Fixed-layout row for export.
    pub fn to_dtype(&self) -> MadcSampleFromChipDtype {
        MadcSampleFromChipDtype {
            value_le: self.value.to_le(),
            channel: self.channel.0,
            _pad: [0; 5],
            fpga_time_le: self.fpga_time.0.to_le(),
            chip_time_le: self.chip_time.0.to_le(),
        }
    }
}

impl fmt::Display for MadcSampleFromChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MadcSampleFromChip(channel: {}, value: {}, fpga_time: {}, chip_time: {})",
            self.channel.0, self.value, self.fpga_time.0, self.chip_time.0
        )
    }
}

/// Export row of a spike (24 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct SpikeFromChipDtype {
    /// Label (little-endian).
    pub label_le: u16,
    _pad: [u8; 6],
    /// FPGA time (little-endian).
    pub fpga_time_le: u64,
    /// Chip time (little-endian).
    pub chip_time_le: u64,
}

const _: () = assert!(std::mem::size_of::<SpikeFromChipDtype>() == 24);

/// Export row of an analog sample (24 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct MadcSampleFromChipDtype {
    /// Sample value (little-endian).
    pub value_le: u16,
    /// Channel.
    pub channel: u8,
    _pad: [u8; 5],
    /// FPGA time (little-endian).
    pub fpga_time_le: u64,
    /// Chip time (little-endian).
    pub chip_time_le: u64,
}

const _: () = assert!(std::mem::size_of::<MadcSampleFromChipDtype>() == 24);

/// Converts spikes into export rows.
pub fn spikes_to_dtype(spikes: &[SpikeFromChip]) -> Vec<SpikeFromChipDtype> {
    spikes.iter().map(SpikeFromChip::to_dtype).collect()
}

/// Converts samples into export rows.
pub fn madc_samples_to_dtype(samples: &[MadcSampleFromChip]) -> Vec<MadcSampleFromChipDtype> {
    samples.iter().map(MadcSampleFromChip::to_dtype).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_row_layout_is_little_endian() {
        let spike = SpikeFromChip {
            label: SpikeLabel(0x1234),
            fpga_time: FpgaTime(0x0102_0304),
            chip_time: ChipTime(7),
        };
        let rows = spikes_to_dtype(&[spike]);
        let bytes: &[u8] = bytemuck::cast_slice(&rows);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..2], &[0x34, 0x12]);
        assert_eq!(&bytes[2..8], &[0; 6]);
        assert_eq!(&bytes[8..12], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(bytes[16], 7);
    }

    #[test]
    fn madc_row_keeps_channel() {
        let sample = MadcSampleFromChip {
            channel: MadcChannel(1),
            value: 0x3ff,
            fpga_time: FpgaTime(9),
            chip_time: ChipTime(3),
        };
        let row = sample.to_dtype();
        assert_eq!(row.channel, 1);
        assert_eq!(u16::from_le(row.value_le), 0x3ff);
    }

    #[test]
    fn label_splits_into_routing_fields() {
        let l = SpikeLabel(0b1100_0000_0000_0101);
        assert_eq!(l.neuron_label(), 5);
        assert_eq!(l.crossbar_output(), 3);
    }
}
