// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Backends and their address/word spaces.
//!
//! Each backend is a physically distinct register space reachable through its
//! own transport path:
//!
//! | Backend | Address | Word |
//! |---------|---------|------|
//! | [`Backend::Omnibus`] | 32-bit bus address | 32-bit |
//! | [`Backend::Jtag`] | 16-bit register index | 64-bit |
//!
//! Addresses and words carry their backend in the type, and a write can only
//! be formed from an address/word pair of the same backend (see
//! [`WriteAccess::pair`]).
use std::fmt;

/// Register space selector for container reads and writes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Backend {
    /// On-chip bus reached through the high-speed link.
    Omnibus,
    /// Scan-chain registers reached through the JTAG port.
    Jtag,
}

impl Backend {
    /// All backends in canonical order.
    pub const ALL: [Backend; 2] = [Backend::Omnibus, Backend::Jtag];
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Omnibus => f.write_str("Omnibus"),
            Backend::Jtag => f.write_str("Jtag"),
        }
    }
}

/// Kind of executor a program can be played back on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutorBackend {
    /// Physical board.
    Hardware,
    /// Software model of the board.
    Simulation,
}

impl fmt::Display for ExecutorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorBackend::Hardware => f.write_str("Hardware"),
            ExecutorBackend::Simulation => f.write_str("Simulation"),
        }
    }
}

/// Address on the on-chip bus.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OmnibusAddress(pub u32);

/// Data word on the on-chip bus.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OmnibusWord(pub u32);

/// Index of a JTAG scan register.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JtagAddress(pub u16);

/// Payload shifted through a JTAG scan register.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JtagWord(pub u64);

/// Address in one of the backend spaces.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    /// On-chip bus address.
    Omnibus(OmnibusAddress),
    /// JTAG register index.
    Jtag(JtagAddress),
}

impl Address {
    /// Backend this address belongs to.
    pub fn backend(&self) -> Backend {
        match self {
            Address::Omnibus(_) => Backend::Omnibus,
            Address::Jtag(_) => Backend::Jtag,
        }
    }

    /// Builds an address in `backend`'s space from a raw value.
    ///
    /// JTAG register indices are 16 bits wide; higher bits are dropped.
    pub fn new(backend: Backend, raw: u32) -> Self {
        match backend {
            Backend::Omnibus => Address::Omnibus(OmnibusAddress(raw)),
            Backend::Jtag => Address::Jtag(JtagAddress(raw as u16)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Omnibus(a) => write!(f, "omnibus:{:#010x}", a.0),
            Address::Jtag(a) => write!(f, "jtag:{:#06x}", a.0),
        }
    }
}

/// Data word in one of the backend spaces.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Word {
    /// On-chip bus word.
    Omnibus(OmnibusWord),
    /// JTAG register payload.
    Jtag(JtagWord),
}

impl Word {
    /// Backend this word belongs to.
    pub fn backend(&self) -> Backend {
        match self {
            Word::Omnibus(_) => Backend::Omnibus,
            Word::Jtag(_) => Backend::Jtag,
        }
    }

    /// Builds a word in `backend`'s space. Omnibus words keep the low 32 bits.
    pub fn new(backend: Backend, raw: u64) -> Self {
        match backend {
            Backend::Omnibus => Word::Omnibus(OmnibusWord(raw as u32)),
            Backend::Jtag => Word::Jtag(JtagWord(raw)),
        }
    }

    /// Raw payload widened to 64 bits.
    pub fn raw(&self) -> u64 {
        match self {
            Word::Omnibus(w) => u64::from(w.0),
            Word::Jtag(w) => w.0,
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Omnibus(w) => write!(f, "{:#010x}", w.0),
            Word::Jtag(w) => write!(f, "{:#018x}", w.0),
        }
    }
}

/// A single register write. Address and word always share a backend.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteAccess {
    /// Bus write.
    Omnibus(OmnibusAddress, OmnibusWord),
    /// Scan register write.
    Jtag(JtagAddress, JtagWord),
}

impl WriteAccess {
    /// Pairs an address with a word; `None` when their backends differ.
    pub fn pair(address: Address, word: Word) -> Option<Self> {
        match (address, word) {
            (Address::Omnibus(a), Word::Omnibus(w)) => Some(WriteAccess::Omnibus(a, w)),
            (Address::Jtag(a), Word::Jtag(w)) => Some(WriteAccess::Jtag(a, w)),
            _ => None,
        }
    }

    /// Target address.
    pub fn address(&self) -> Address {
        match self {
            WriteAccess::Omnibus(a, _) => Address::Omnibus(*a),
            WriteAccess::Jtag(a, _) => Address::Jtag(*a),
        }
    }

    /// Written word.
    pub fn word(&self) -> Word {
        match self {
            WriteAccess::Omnibus(_, w) => Word::Omnibus(*w),
            WriteAccess::Jtag(_, w) => Word::Jtag(*w),
        }
    }

    /// Backend of the access.
    pub fn backend(&self) -> Backend {
        self.address().backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_rejects_mixed_backends() {
        let a = Address::Omnibus(OmnibusAddress(0x10));
        let w = Word::Jtag(JtagWord(1));
        assert!(WriteAccess::pair(a, w).is_none());
        let ok = WriteAccess::pair(a, Word::Omnibus(OmnibusWord(7))).unwrap();
        assert_eq!(ok.address(), a);
        assert_eq!(ok.word().raw(), 7);
        assert_eq!(ok.backend(), Backend::Omnibus);
    }

    #[test]
    fn raw_constructors_follow_backend_width() {
        assert_eq!(
            Address::new(Backend::Jtag, 0x1_0002),
            Address::Jtag(JtagAddress(2))
        );
        assert_eq!(
            Word::new(Backend::Omnibus, 0x1_0000_0003),
            Word::Omnibus(OmnibusWord(3))
        );
    }
}
