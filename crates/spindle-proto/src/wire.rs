// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Program packet framing.
//!
//! Packet layout (big-endian):
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || COUNT(4) || BODY || CHECKSUM(32)``
//!
//! * COUNT is the number of instructions in BODY
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || BODY
//!
//! Body records:
//!
//! ```text
//! opcode  operands                         size
//! 0x01    omnibus write  addr u32, word u32   9
//! 0x02    omnibus read   addr u32             5
//! 0x03    jtag write     addr u16, word u64  11
//! 0x04    jtag read      addr u16             3
//! 0x05    wait until     timer u16, value u32 7
//! 0x06    barrier        mask u8              2
//! ```
//!
//! Packets are pushed to the board in [`TRANSFER_BLOCK_SIZE`] chunks.
use blake3::Hasher;
use thiserror::Error;

use spindle_core::{
    Address, Barrier, IndexedCoordinate, Instruction, JtagAddress, JtagWord, OmnibusAddress,
    OmnibusWord, TimerOnChip, TimerValue, WriteAccess,
};

/// Protocol magic constant "SPPB".
pub const MAGIC: [u8; 4] = [b'S', b'P', b'P', b'B'];
/// Packet format version.
pub const VERSION: u16 = 0x0001;
/// Header size in bytes.
pub const HEADER_SIZE: usize = 12;
/// Checksum size in bytes.
pub const CHECKSUM_SIZE: usize = 32;
/// Size of one transfer block.
pub const TRANSFER_BLOCK_SIZE: usize = 4096;

const OP_OMNIBUS_WRITE: u8 = 0x01;
const OP_OMNIBUS_READ: u8 = 0x02;
const OP_JTAG_WRITE: u8 = 0x03;
const OP_JTAG_READ: u8 = 0x04;
const OP_WAIT_UNTIL: u8 = 0x05;
const OP_BARRIER: u8 = 0x06;

/// Packet flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramFlags(pub u16);

impl ProgramFlags {
    /// Flag: annotate responses with FPGA timestamps.
    pub const TIME_ANNOTATION: u16 = 1 << 0;

    /// Flags with time annotation on or off.
    pub const fn with_time_annotation(enabled: bool) -> Self {
        Self(if enabled { Self::TIME_ANNOTATION } else { 0 })
    }

    /// Check if TIME_ANNOTATION is set.
    #[inline]
    pub const fn time_annotation(self) -> bool {
        self.0 & Self::TIME_ANNOTATION != 0
    }
}

/// Wire decode/encode errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input shorter than header plus checksum.
    #[error("incomplete packet: need at least {needed} bytes, got {got}")]
    Incomplete {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        got: usize,
    },
    /// Magic bytes did not match.
    #[error("bad magic")]
    BadMagic,
    /// Unknown packet version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// Checksum over header and body did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// A record was cut off.
    #[error("truncated record at offset {offset}")]
    Truncated {
        /// Offset of the record start.
        offset: usize,
    },
    /// Unknown instruction opcode or response tag.
    #[error("unknown tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// Offending byte.
        tag: u8,
        /// Offset of the record start.
        offset: usize,
    },
    /// Operand out of range.
    #[error("invalid operand at offset {offset}: {detail}")]
    InvalidOperand {
        /// Offset of the record start.
        offset: usize,
        /// What was wrong.
        detail: String,
    },
    /// Declared instruction count does not match the body.
    #[error("packet declares {declared} instructions, body holds {actual}")]
    CountMismatch {
        /// Count from the header.
        declared: usize,
        /// Records found in the body.
        actual: usize,
    },
    /// More instructions than the header can count.
    #[error("program of {0} instructions does not fit the packet header")]
    TooLarge(usize),
    /// An encoder was asked for a pack size the format does not have.
    #[error("{kind} pack of {size} entries is not encodable")]
    PackSize {
        /// Record kind.
        kind: &'static str,
        /// Requested entry count.
        size: usize,
    },
}

/// Big-endian cursor over a byte slice.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    record_start: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            record_start: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    /// Marks the start of a record for error offsets and returns its tag.
    pub(crate) fn tag(&mut self) -> Result<u8, WireError> {
        self.record_start = self.offset;
        self.u8()
    }

    pub(crate) fn record_start(&self) -> usize {
        self.record_start
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let end = self.offset + N;
        let slice = self.bytes.get(self.offset..end).ok_or(WireError::Truncated {
            offset: self.record_start,
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.offset = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, WireError> {
        self.take().map(u16::from_be_bytes)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, WireError> {
        self.take().map(u32::from_be_bytes)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, WireError> {
        self.take().map(u64::from_be_bytes)
    }
}

fn encode_instruction(out: &mut Vec<u8>, instruction: &Instruction) {
    match instruction {
        Instruction::Write(WriteAccess::Omnibus(a, w)) => {
            out.push(OP_OMNIBUS_WRITE);
            out.extend_from_slice(&a.0.to_be_bytes());
            out.extend_from_slice(&w.0.to_be_bytes());
        }
        Instruction::ReadRequest(Address::Omnibus(a)) => {
            out.push(OP_OMNIBUS_READ);
            out.extend_from_slice(&a.0.to_be_bytes());
        }
        Instruction::Write(WriteAccess::Jtag(a, w)) => {
            out.push(OP_JTAG_WRITE);
            out.extend_from_slice(&a.0.to_be_bytes());
            out.extend_from_slice(&w.0.to_be_bytes());
        }
        Instruction::ReadRequest(Address::Jtag(a)) => {
            out.push(OP_JTAG_READ);
            out.extend_from_slice(&a.0.to_be_bytes());
        }
        Instruction::WaitUntil { timer, value } => {
            out.push(OP_WAIT_UNTIL);
            out.extend_from_slice(&timer.value().to_be_bytes());
            out.extend_from_slice(&value.0.to_be_bytes());
        }
        Instruction::Barrier(b) => {
            out.push(OP_BARRIER);
            out.push(b.mask());
        }
    }
}

fn decode_instruction(reader: &mut Reader<'_>) -> Result<Instruction, WireError> {
    let tag = reader.tag()?;
    let offset = reader.record_start();
    Ok(match tag {
        OP_OMNIBUS_WRITE => Instruction::Write(WriteAccess::Omnibus(
            OmnibusAddress(reader.u32()?),
            OmnibusWord(reader.u32()?),
        )),
        OP_OMNIBUS_READ => Instruction::ReadRequest(Address::Omnibus(OmnibusAddress(reader.u32()?))),
        OP_JTAG_WRITE => Instruction::Write(WriteAccess::Jtag(
            JtagAddress(reader.u16()?),
            JtagWord(reader.u64()?),
        )),
        OP_JTAG_READ => Instruction::ReadRequest(Address::Jtag(JtagAddress(reader.u16()?))),
        OP_WAIT_UNTIL => {
            let raw = reader.u16()?;
            let timer = TimerOnChip::from_index(usize::from(raw)).map_err(|e| {
                WireError::InvalidOperand {
                    offset,
                    detail: e.to_string(),
                }
            })?;
            Instruction::WaitUntil {
                timer,
                value: TimerValue(reader.u32()?),
            }
        }
        OP_BARRIER => {
            let mask = reader.u8()?;
            let barrier = Barrier::from_mask(mask).ok_or_else(|| WireError::InvalidOperand {
                offset,
                detail: format!("barrier mask {mask:#05b}"),
            })?;
            Instruction::Barrier(barrier)
        }
        tag => return Err(WireError::UnknownTag { tag, offset }),
    })
}

/// Encodes an instruction stream into a checksummed packet.
pub fn encode_program(
    instructions: &[Instruction],
    flags: ProgramFlags,
) -> Result<Vec<u8>, WireError> {
    let count =
        u32::try_from(instructions.len()).map_err(|_| WireError::TooLarge(instructions.len()))?;
    let mut out = Vec::with_capacity(HEADER_SIZE + instructions.len() * 11 + CHECKSUM_SIZE);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&flags.0.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    for instruction in instructions {
        encode_instruction(&mut out, instruction);
    }
    let mut hasher = Hasher::new();
    hasher.update(&out);
    out.extend_from_slice(hasher.finalize().as_bytes());
    Ok(out)
}

/// Decodes a packet produced by [`encode_program`].
pub fn decode_program(bytes: &[u8]) -> Result<(Vec<Instruction>, ProgramFlags), WireError> {
    if bytes.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(WireError::Incomplete {
            needed: HEADER_SIZE + CHECKSUM_SIZE,
            got: bytes.len(),
        });
    }
    if bytes[0..4] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let flags = ProgramFlags(u16::from_be_bytes([bytes[6], bytes[7]]));
    let declared = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

    let (signed, checksum) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
    let mut hasher = Hasher::new();
    hasher.update(signed);
    if hasher.finalize().as_bytes() != checksum {
        return Err(WireError::ChecksumMismatch);
    }

    let mut reader = Reader::new(&signed[HEADER_SIZE..]);
    let mut instructions = Vec::with_capacity(declared.min(signed.len()));
    while !reader.is_empty() {
        instructions.push(decode_instruction(&mut reader).map_err(offset_by_header)?);
    }
    if instructions.len() != declared {
        return Err(WireError::CountMismatch {
            declared,
            actual: instructions.len(),
        });
    }
    Ok((instructions, flags))
}

fn offset_by_header(e: WireError) -> WireError {
    match e {
        WireError::Truncated { offset } => WireError::Truncated {
            offset: offset + HEADER_SIZE,
        },
        WireError::UnknownTag { tag, offset } => WireError::UnknownTag {
            tag,
            offset: offset + HEADER_SIZE,
        },
        WireError::InvalidOperand { offset, detail } => WireError::InvalidOperand {
            offset: offset + HEADER_SIZE,
            detail,
        },
        other => other,
    }
}

/// Splits a packet into transfer blocks; the last block may be short.
pub fn transfer_blocks(packet: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    packet.chunks(TRANSFER_BLOCK_SIZE)
}
