//! Element type system for Level-3 operands
//!
//! This module provides the `DType` enum representing the element types a
//! Level-3 call can carry, along with the `Element` trait used for byte-level
//! buffer access. The variant set is closed: precision dispatch in the
//! Level-3 layer matches exhaustively over it.

pub mod complex;
mod element;

pub use complex::{Complex64, Complex128};
pub use element::Element;

use std::fmt;

/// Element types supported by Level-3 operands
///
/// Using an enum (rather than generics) at the dispatch surface allows one
/// code path per routine, parameterized by the variant, with runtime
/// precision selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 16-bit floating point (IEEE 754 half)
    F16 = 2,
    /// 64-bit complex (two f32: re, im)
    Complex64 = 40,
    /// 128-bit complex (two f64: re, im)
    Complex128 = 41,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Complex128 => 16,
            Self::F64 | Self::Complex64 => 8,
            Self::F32 => 4,
            Self::F16 => 2,
        }
    }

    /// Returns true if this is a complex number type
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Returns true if this is a real floating point type
    #[inline]
    pub const fn is_real(self) -> bool {
        !self.is_complex()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
        };
        write!(f, "{}", name)
    }
}
