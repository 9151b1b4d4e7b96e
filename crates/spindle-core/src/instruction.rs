// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Instruction stream model.
//!
//! A program is a flat `Vec<Instruction>`; insertion order is execution order.
use std::fmt;

use crate::backend::{Address, WriteAccess};
use crate::coord::TimerOnChip;

/// Tick count of a playback timer.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerValue(pub u32);

impl TimerValue {
    /// Timer ticks per microsecond at the nominal FPGA clock.
    pub const FPGA_CLOCK_CYCLES_PER_US: u32 = 125;

    /// Converts microseconds into ticks, saturating at `u32::MAX`.
    pub fn from_us(us: u64) -> Self {
        let ticks = us.saturating_mul(u64::from(Self::FPGA_CLOCK_CYCLES_PER_US));
        Self(u32::try_from(ticks).unwrap_or(u32::MAX))
    }

    /// Raw tick count.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream synchronisation point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Barrier {
    /// Wait until all outstanding on-chip bus transactions completed.
    Omnibus,
    /// Wait until all outstanding JTAG shifts completed.
    Jtag,
    /// Wait until the high-speed link has settled.
    Systime,
    /// All of the above.
    All,
}

impl Barrier {
    /// Wire encoding of the barrier mask.
    pub fn mask(&self) -> u8 {
        match self {
            Barrier::Omnibus => 0b001,
            Barrier::Jtag => 0b010,
            Barrier::Systime => 0b100,
            Barrier::All => 0b111,
        }
    }

    /// Inverse of [`Barrier::mask`].
    pub fn from_mask(mask: u8) -> Option<Self> {
        match mask {
            0b001 => Some(Barrier::Omnibus),
            0b010 => Some(Barrier::Jtag),
            0b100 => Some(Barrier::Systime),
            0b111 => Some(Barrier::All),
            _ => None,
        }
    }
}

/// One step of a playback program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    /// Register write.
    Write(WriteAccess),
    /// Register read; produces one response word.
    ReadRequest(Address),
    /// Block the stream until `timer` reaches `value`.
    WaitUntil {
        /// Timer to compare against.
        timer: TimerOnChip,
        /// Target tick count.
        value: TimerValue,
    },
    /// Synchronisation point.
    Barrier(Barrier),
}

impl Instruction {
    /// Whether the instruction produces a response word.
    pub fn is_read(&self) -> bool {
        matches!(self, Instruction::ReadRequest(_))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Write(access) => {
                write!(f, "write {} <- {}", access.address(), access.word())
            }
            Instruction::ReadRequest(address) => write!(f, "read {address}"),
            Instruction::WaitUntil { timer, value } => {
                write!(f, "wait_until {timer} >= {value}")
            }
            Instruction::Barrier(b) => write!(f, "barrier {b:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{OmnibusAddress, OmnibusWord};
    use crate::coord::IndexedCoordinate;

    #[test]
    fn barrier_mask_round_trips() {
        for b in [Barrier::Omnibus, Barrier::Jtag, Barrier::Systime, Barrier::All] {
            assert_eq!(Barrier::from_mask(b.mask()), Some(b));
        }
        assert_eq!(Barrier::from_mask(0b011), None);
    }

    #[test]
    fn display_is_readable() {
        let w = Instruction::Write(WriteAccess::Omnibus(OmnibusAddress(0x10), OmnibusWord(3)));
        assert_eq!(w.to_string(), "write omnibus:0x00000010 <- 0x00000003");
        let t = Instruction::WaitUntil {
            timer: TimerOnChip::from_index(0).unwrap(),
            value: TimerValue(1000),
        };
        assert_eq!(t.to_string(), "wait_until TimerOnChip(0) >= 1000");
    }

    #[test]
    fn from_us_saturates() {
        assert_eq!(TimerValue::from_us(8), TimerValue(1000));
        assert_eq!(TimerValue::from_us(u64::MAX), TimerValue(u32::MAX));
    }
}
