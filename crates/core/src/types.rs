//! Core scalar types for serialbox
//!
//! This module defines:
//! - ElementType: the element kinds a field buffer may hold
//! - Precision: session-global floating point width
//! - Endianness: byte order used by the binary encoding

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of a field
///
/// Byte width is implied by the type; [`DataFieldInfo`](crate::DataFieldInfo)
/// stores it explicitly and checks that the two agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit IEEE-754 float
    Float32,
    /// 64-bit IEEE-754 float
    Float64,
}

impl ElementType {
    /// Natural byte width of one element
    pub fn byte_width(self) -> usize {
        match self {
            ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Float64 => 8,
        }
    }

    /// True for Float32 and Float64
    pub fn is_floating(self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::Float64)
    }

    /// The floating type selected by a precision policy
    pub fn real(precision: Precision) -> Self {
        match precision {
            Precision::Single => ElementType::Float32,
            Precision::Double => ElementType::Float64,
        }
    }

    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Floating point precision applied uniformly to every real field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// 32-bit reals
    Single,
    /// 64-bit reals (default)
    #[default]
    Double,
}

impl Precision {
    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Single => "single",
            Precision::Double => "double",
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Precision::Single),
            "double" => Ok(Precision::Double),
            other => Err(format!(
                "unknown precision '{}', expected \"single\" or \"double\"",
                other
            )),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order of encoded field data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    /// Little-endian (default)
    #[default]
    Little,
    /// Big-endian
    Big,
}

impl Endianness {
    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "little" => Ok(Endianness::Little),
            "big" => Ok(Endianness::Big),
            other => Err(format!(
                "unknown endianness '{}', expected \"little\" or \"big\"",
                other
            )),
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
