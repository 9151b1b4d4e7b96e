// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Integers restricted to the range of a register field.
//!
//! Container fields narrower than their primitive carry one of these
//! newtypes, so every value a container can hold survives encode and decode
//! unchanged.
use thiserror::Error;

/// A value outside the range of a register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} value {value} out of range {min}..={max}")]
pub struct RangeError {
    /// Field type name.
    pub kind: &'static str,
    /// Rejected value.
    pub value: u64,
    /// Smallest valid value.
    pub min: u64,
    /// Largest valid value.
    pub max: u64,
}

macro_rules! ranged_value {
    ($(#[$meta:meta])* $name:ident: $repr:ty, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name($repr);

        impl $name {
            /// Smallest valid value.
            pub const MIN: Self = Self($min);
            /// Largest valid value.
            pub const MAX: Self = Self($max);

            /// Checked constructor.
            #[allow(clippy::useless_conversion)]
            pub fn new(value: $repr) -> Result<Self, $crate::ranged::RangeError> {
                if (Self::MIN.0..=Self::MAX.0).contains(&value) {
                    Ok(Self(value))
                } else {
                    Err($crate::ranged::RangeError {
                        kind: stringify!($name),
                        value: u64::from(value),
                        min: u64::from(Self::MIN.0),
                        max: u64::from(Self::MAX.0),
                    })
                }
            }

            /// Clamps `value` into the valid range.
            pub fn saturating(value: $repr) -> Self {
                Self(value.clamp(Self::MIN.0, Self::MAX.0))
            }

            /// Raw value.
            pub const fn value(&self) -> $repr {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::MIN
            }
        }

        impl TryFrom<$repr> for $name {
            type Error = $crate::ranged::RangeError;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serde::Serialize::serialize(&self.0, serializer)
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <$repr as serde::Deserialize<'de>>::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use ranged_value;
