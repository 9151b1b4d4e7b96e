// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! FPGA exception register.
//!
//! ```text
//! bit  flag
//!  0   result_read_error
//!  1   result_read_overflow
//!  2   result_write_error
//!  3   result_write_underrun
//!  4   playback_read_error
//!  5   playback_read_overflow
//!  6   playback_write_error
//!  7   playback_write_underrun
//!  8   program_exception
//! 16   serdes_overflow
//! 17   serdes_pll_unlocked
//! 18   serdes_race
//! 20   encode_overflow
//! ```
//!
//! Other bits are reserved and ignored.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Latched exception bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExceptionFlags(u32);

impl ExceptionFlags {
    /// Result memory read error.
    pub const RESULT_READ_ERROR: Self = Self(1 << 0);
    /// Result memory read overflow.
    pub const RESULT_READ_OVERFLOW: Self = Self(1 << 1);
    /// Result memory write error.
    pub const RESULT_WRITE_ERROR: Self = Self(1 << 2);
    /// Result memory write underrun.
    pub const RESULT_WRITE_UNDERRUN: Self = Self(1 << 3);
    /// Program memory read error.
    pub const PLAYBACK_READ_ERROR: Self = Self(1 << 4);
    /// Program memory read overflow.
    pub const PLAYBACK_READ_OVERFLOW: Self = Self(1 << 5);
    /// Program memory write error.
    pub const PLAYBACK_WRITE_ERROR: Self = Self(1 << 6);
    /// Program memory write underrun.
    pub const PLAYBACK_WRITE_UNDERRUN: Self = Self(1 << 7);
    /// Malformed instruction in the program.
    pub const PROGRAM_EXCEPTION: Self = Self(1 << 8);
    /// High-speed link buffer overflow.
    pub const SERDES_OVERFLOW: Self = Self(1 << 16);
    /// High-speed link PLL lost lock.
    pub const SERDES_PLL_UNLOCKED: Self = Self(1 << 17);
    /// High-speed link race condition.
    pub const SERDES_RACE: Self = Self(1 << 18);
    /// Response encoder overflow.
    pub const ENCODE_OVERFLOW: Self = Self(1 << 20);

    const NAMED: [(Self, &'static str); 13] = [
        (Self::RESULT_READ_ERROR, "result_read_error"),
        (Self::RESULT_READ_OVERFLOW, "result_read_overflow"),
        (Self::RESULT_WRITE_ERROR, "result_write_error"),
        (Self::RESULT_WRITE_UNDERRUN, "result_write_underrun"),
        (Self::PLAYBACK_READ_ERROR, "playback_read_error"),
        (Self::PLAYBACK_READ_OVERFLOW, "playback_read_overflow"),
        (Self::PLAYBACK_WRITE_ERROR, "playback_write_error"),
        (Self::PLAYBACK_WRITE_UNDERRUN, "playback_write_underrun"),
        (Self::PROGRAM_EXCEPTION, "program_exception"),
        (Self::SERDES_OVERFLOW, "serdes_overflow"),
        (Self::SERDES_PLL_UNLOCKED, "serdes_pll_unlocked"),
        (Self::SERDES_RACE, "serdes_race"),
        (Self::ENCODE_OVERFLOW, "encode_overflow"),
    ];

    const KNOWN: u32 = 0x0017_01ff;

    /// No flag set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Decodes a raw register value; reserved bits are dropped.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & Self::KNOWN)
    }

    /// Register value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags set in `self` but not in `other`.
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Names of the set flags, lowest bit first.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl std::ops::BitOr for ExceptionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ExceptionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Which exception flags fail a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionPolicy {
    /// Log `serdes_overflow` as a warning instead of failing the run.
    pub tolerate_serdes_overflow: bool,
}

impl Default for ExceptionPolicy {
    fn default() -> Self {
        Self {
            tolerate_serdes_overflow: true,
        }
    }
}

impl ExceptionPolicy {
    /// Fails on every flag.
    pub const fn strict() -> Self {
        Self {
            tolerate_serdes_overflow: false,
        }
    }

    /// Flags the policy does not fail on.
    pub const fn tolerated(&self) -> ExceptionFlags {
        if self.tolerate_serdes_overflow {
            ExceptionFlags::SERDES_OVERFLOW
        } else {
            ExceptionFlags::empty()
        }
    }

    /// Subset of `flags` that fails the run.
    pub const fn fatal(&self, flags: ExceptionFlags) -> ExceptionFlags {
        flags.difference(self.tolerated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_bits_are_dropped() {
        let flags = ExceptionFlags::from_raw(0xffff_ffff);
        assert_eq!(flags.raw(), 0x0017_01ff);
        assert_eq!(flags.names().count(), 13);
        assert_eq!(ExceptionFlags::from_raw(1 << 19), ExceptionFlags::empty());
    }

    #[test]
    fn display_lists_set_flags() {
        let flags = ExceptionFlags::PROGRAM_EXCEPTION | ExceptionFlags::SERDES_RACE;
        assert_eq!(flags.to_string(), "program_exception|serdes_race");
        assert_eq!(ExceptionFlags::empty().to_string(), "none");
    }

    #[test]
    fn default_policy_tolerates_only_serdes_overflow() {
        let policy = ExceptionPolicy::default();
        assert!(policy.fatal(ExceptionFlags::SERDES_OVERFLOW).is_empty());
        let mixed = ExceptionFlags::SERDES_OVERFLOW | ExceptionFlags::ENCODE_OVERFLOW;
        assert_eq!(policy.fatal(mixed), ExceptionFlags::ENCODE_OVERFLOW);
        assert_eq!(
            ExceptionPolicy::strict().fatal(ExceptionFlags::SERDES_OVERFLOW),
            ExceptionFlags::SERDES_OVERFLOW
        );
    }
}
