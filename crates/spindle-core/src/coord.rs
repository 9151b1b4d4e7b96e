// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed coordinates for hardware-addressable locations.
//!
//! A coordinate is a pure key: it never owns configuration data. Every
//! container names the coordinate type it is addressed by, so a neuron config
//! can never be written to a synapse location by accident.
use std::fmt;
use std::hash::Hash;

use thiserror::Error;

/// Marker for identifiers of hardware locations.
///
/// Coordinates are immutable `Copy` values with a total order; the order is
/// the canonical enumeration order used by composite traversals.
pub trait Coordinate: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {}

/// Coordinates drawn from a dense, fixed-size index range.
pub trait IndexedCoordinate: Coordinate {
    /// Number of distinct locations.
    const SIZE: usize;

    /// Converts a linear index back into a coordinate.
    fn from_index(index: usize) -> Result<Self, CoordinateError>;

    /// Linear index of this coordinate in `0..SIZE`.
    fn index(&self) -> usize;

    /// All coordinates in ascending index order.
    fn iter_all() -> impl Iterator<Item = Self> {
        (0..Self::SIZE).filter_map(|i| Self::from_index(i).ok())
    }
}

/// Errors raised when constructing coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// The requested index is outside the coordinate's range.
    #[error("{kind} index {index} out of range (size {size})")]
    OutOfRange {
        /// Coordinate type name.
        kind: &'static str,
        /// Rejected index.
        index: usize,
        /// Number of valid locations.
        size: usize,
    },
}

/// Unit coordinate for chip-wide singleton registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unique;

impl Coordinate for Unique {}

impl fmt::Display for Unique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unique")
    }
}

/// Declares a dense index coordinate newtype with a checked constructor.
///
/// ```
/// spindle_core::indexed_coordinate!(
///     /// Example lane.
///     LaneOnChip, 4
/// );
/// use spindle_core::IndexedCoordinate;
/// assert_eq!(LaneOnChip::iter_all().count(), 4);
/// assert!(LaneOnChip::new(4).is_err());
/// ```
#[macro_export]
macro_rules! indexed_coordinate {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(u16);

        impl $name {
            /// Number of distinct locations.
            pub const SIZE: usize = $size;

            /// Lowest coordinate.
            pub const MIN: Self = Self(0);

            /// Checked constructor.
            pub fn new(index: usize) -> Result<Self, $crate::CoordinateError> {
                <Self as $crate::IndexedCoordinate>::from_index(index)
            }

            /// Raw index value.
            pub fn value(&self) -> u16 {
                self.0
            }
        }

        impl $crate::Coordinate for $name {}

        impl $crate::IndexedCoordinate for $name {
            const SIZE: usize = $size;

            fn from_index(index: usize) -> Result<Self, $crate::CoordinateError> {
                if index < $size {
                    Ok(Self(index as u16))
                } else {
                    Err($crate::CoordinateError::OutOfRange {
                        kind: stringify!($name),
                        index,
                        size: $size,
                    })
                }
            }

            fn index(&self) -> usize {
                usize::from(self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

indexed_coordinate!(
    /// Free-running playback timer. Each timer has its own wait watermark.
    TimerOnChip,
    2
);

indexed_coordinate!(
    /// Synapse array half; each owns one common synram configuration.
    SynramOnChip,
    2
);

indexed_coordinate!(
    /// Digital configuration slot of one neuron.
    NeuronOnChip,
    8
);

indexed_coordinate!(
    /// Row of the synapse array.
    SynapseRowOnChip,
    4
);

indexed_coordinate!(
    /// Column block of four synapses within a row.
    SynapseQuadColumn,
    2
);

indexed_coordinate!(
    /// Digital PLL clock generator.
    AdpllOnChip,
    2
);

/// Serializes index coordinates as their raw index; deserializing checks
/// the range.
#[cfg(feature = "serde")]
macro_rules! serde_as_index {
    ($($name:ident),* $(,)?) => {
        $(
            impl serde::Serialize for $name {
                fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_u16(self.0)
                }
            }

            impl<'de> serde::Deserialize<'de> for $name {
                fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let raw = <u16 as serde::Deserialize<'de>>::deserialize(deserializer)?;
                    Self::new(usize::from(raw)).map_err(serde::de::Error::custom)
                }
            }
        )*
    };
}

#[cfg(feature = "serde")]
serde_as_index!(
    TimerOnChip,
    SynramOnChip,
    NeuronOnChip,
    SynapseRowOnChip,
    SynapseQuadColumn,
    AdpllOnChip,
);

/// Location of one synapse quad: a row and a column block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynapseQuadOnChip {
    /// Row the quad lives in.
    pub row: SynapseRowOnChip,
    /// Column block within the row.
    pub column: SynapseQuadColumn,
}

impl SynapseQuadOnChip {
    /// Builds a quad coordinate from its row and column block.
    pub fn new(row: SynapseRowOnChip, column: SynapseQuadColumn) -> Self {
        Self { row, column }
    }
}

impl Coordinate for SynapseQuadOnChip {}

impl IndexedCoordinate for SynapseQuadOnChip {
    const SIZE: usize = SynapseRowOnChip::SIZE * SynapseQuadColumn::SIZE;

    fn from_index(index: usize) -> Result<Self, CoordinateError> {
        if index >= Self::SIZE {
            return Err(CoordinateError::OutOfRange {
                kind: "SynapseQuadOnChip",
                index,
                size: Self::SIZE,
            });
        }
        Ok(Self {
            row: SynapseRowOnChip::from_index(index / SynapseQuadColumn::SIZE)?,
            column: SynapseQuadColumn::from_index(index % SynapseQuadColumn::SIZE)?,
        })
    }

    fn index(&self) -> usize {
        self.row.index() * SynapseQuadColumn::SIZE + self.column.index()
    }
}

impl fmt::Display for SynapseQuadOnChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SynapseQuadOnChip({}, {})", self.row.value(), self.column.value())
    }
}
