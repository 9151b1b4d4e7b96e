// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Response records and the demultiplexer.
//!
//! The board writes a flat stream of tagged records into result memory
//! (big-endian):
//!
//! ```text
//! tag   record            payload                                  size
//! 0x10  omnibus word      word u32                                    5
//! 0x11  jtag word         word u64                                    9
//! 0x12  timestamp         fpga time u64                               9
//! 0x20  spike pack 1      1 x (label u16, chip time u16)              5
//! 0x21  spike pack 2      2 x (label u16, chip time u16)              9
//! 0x22  spike pack 3      3 x (label u16, chip time u16)             13
//! 0x30  madc pack 1       1 x (channel u8, value u16, chip time u16)  6
//! 0x31  madc pack 2       2 x (channel u8, value u16, chip time u16) 11
//! 0x7f  halt              -                                           1
//! ```
//!
//! A timestamp record annotates every following record until the next one.
//! Anything after `halt` is padding.
use spindle_core::{
    ChipTime, FpgaTime, MadcChannel, MadcSampleFromChip, ResponseStream, ResponseWord,
    SpikeFromChip, SpikeLabel, Word, MADC_SAMPLE_PACK_SIZES, SPIKE_PACK_SIZES,
};
use tracing::trace;

use crate::wire::{Reader, WireError};

const TAG_OMNIBUS_WORD: u8 = 0x10;
const TAG_JTAG_WORD: u8 = 0x11;
const TAG_TIMESTAMP: u8 = 0x12;
const TAG_SPIKE_PACK: u8 = 0x20;
const TAG_MADC_PACK: u8 = 0x30;
const TAG_HALT: u8 = 0x7f;

/// Builds response byte streams; used by simulators and tests.
#[derive(Debug, Default, Clone)]
pub struct ResponseEncoder {
    out: Vec<u8>,
}

impl ResponseEncoder {
    /// Empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a response word.
    pub fn word(&mut self, word: Word) -> &mut Self {
        match word {
            Word::Omnibus(w) => {
                self.out.push(TAG_OMNIBUS_WORD);
                self.out.extend_from_slice(&w.0.to_be_bytes());
            }
            Word::Jtag(w) => {
                self.out.push(TAG_JTAG_WORD);
                self.out.extend_from_slice(&w.0.to_be_bytes());
            }
        }
        self
    }

    /// Appends a timestamp annotating the following records.
    pub fn timestamp(&mut self, time: FpgaTime) -> &mut Self {
        self.out.push(TAG_TIMESTAMP);
        self.out.extend_from_slice(&time.0.to_be_bytes());
        self
    }

    /// Appends one spike pack of 1 to 3 spikes. Chip times keep their low 16 bits.
    pub fn spikes(&mut self, spikes: &[(SpikeLabel, ChipTime)]) -> Result<&mut Self, WireError> {
        if spikes.is_empty() || spikes.len() > SPIKE_PACK_SIZES {
            return Err(WireError::PackSize {
                kind: "spike",
                size: spikes.len(),
            });
        }
        self.out.push(TAG_SPIKE_PACK + (spikes.len() - 1) as u8);
        for (label, time) in spikes {
            self.out.extend_from_slice(&label.0.to_be_bytes());
            self.out.extend_from_slice(&(time.0 as u16).to_be_bytes());
        }
        Ok(self)
    }

    /// Appends one sample pack of 1 or 2 samples. Chip times keep their low 16 bits.
    pub fn madc_samples(
        &mut self,
        samples: &[(MadcChannel, u16, ChipTime)],
    ) -> Result<&mut Self, WireError> {
        if samples.is_empty() || samples.len() > MADC_SAMPLE_PACK_SIZES {
            return Err(WireError::PackSize {
                kind: "madc sample",
                size: samples.len(),
            });
        }
        self.out.push(TAG_MADC_PACK + (samples.len() - 1) as u8);
        for (channel, value, time) in samples {
            self.out.push(channel.0);
            self.out.extend_from_slice(&(value & MadcSampleFromChip::VALUE_MASK).to_be_bytes());
            self.out.extend_from_slice(&(time.0 as u16).to_be_bytes());
        }
        Ok(self)
    }

    /// Appends the end-of-stream marker.
    pub fn halt(&mut self) -> &mut Self {
        self.out.push(TAG_HALT);
        self
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Finished byte stream.
    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

/// Splits a response byte stream into ordered response words and event records.
///
/// Response words keep their order so they can be matched positionally to the
/// program's read requests. Events carry the most recent timestamp
/// (zero before the first one) and are counted per pack size.
pub fn demultiplex(bytes: &[u8]) -> Result<ResponseStream, WireError> {
    let mut reader = Reader::new(bytes);
    let mut stream = ResponseStream::default();
    let mut now: Option<FpgaTime> = None;

    while !reader.is_empty() {
        let tag = reader.tag()?;
        let offset = reader.record_start();
        match tag {
            TAG_OMNIBUS_WORD => stream.words.push(ResponseWord {
                word: Word::new(spindle_core::Backend::Omnibus, u64::from(reader.u32()?)),
                fpga_time: now,
            }),
            TAG_JTAG_WORD => stream.words.push(ResponseWord {
                word: Word::new(spindle_core::Backend::Jtag, reader.u64()?),
                fpga_time: now,
            }),
            TAG_TIMESTAMP => now = Some(FpgaTime(reader.u64()?)),
            t if (TAG_SPIKE_PACK..TAG_SPIKE_PACK + SPIKE_PACK_SIZES as u8).contains(&t) => {
                let n = usize::from(t - TAG_SPIKE_PACK) + 1;
                for _ in 0..n {
                    let label = SpikeLabel(reader.u16()?);
                    let chip_time = ChipTime(u64::from(reader.u16()?));
                    stream.spikes.push(SpikeFromChip {
                        label,
                        fpga_time: now.unwrap_or_default(),
                        chip_time,
                    });
                }
                stream.spike_pack_counts[n - 1] += 1;
            }
            t if (TAG_MADC_PACK..TAG_MADC_PACK + MADC_SAMPLE_PACK_SIZES as u8).contains(&t) => {
                let n = usize::from(t - TAG_MADC_PACK) + 1;
                for _ in 0..n {
                    let channel = MadcChannel(reader.u8()?);
                    let value = reader.u16()?;
                    if value > MadcSampleFromChip::VALUE_MASK {
                        return Err(WireError::InvalidOperand {
                            offset,
                            detail: format!("madc value {value:#x} exceeds 10 bits"),
                        });
                    }
                    let chip_time = ChipTime(u64::from(reader.u16()?));
                    stream.madc_samples.push(MadcSampleFromChip {
                        channel,
                        value,
                        fpga_time: now.unwrap_or_default(),
                        chip_time,
                    });
                }
                stream.madc_sample_pack_counts[n - 1] += 1;
            }
            TAG_HALT => break,
            tag => return Err(WireError::UnknownTag { tag, offset }),
        }
    }

    trace!(
        words = stream.words.len(),
        spikes = stream.spikes.len(),
        madc_samples = stream.madc_samples.len(),
        "demultiplexed response"
    );
    Ok(stream)
}
