//! BLAS Level-3 dispatch surface
//!
//! Flag enums follow the standard BLAS conventions (order, transpose, which
//! triangle, multiply side, implicit unit diagonal). Scalar coefficients are
//! a closed tagged variant mirroring [`DType`]; the variant establishes the
//! precision a call is validated against.

mod level3;
pub(crate) mod validate;

pub use level3::Level3;

use crate::dtype::{Complex64, Complex128, DType};
use half::f16;

// ============================================================================
// Flags
// ============================================================================

/// Memory layout of the operand matrices
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Order {
    /// Row-major (C-style) storage
    RowMajor,
    /// Column-major (Fortran/cuBLAS-style) storage
    ColMajor,
}

/// Transpose interpretation of an operand
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transpose {
    /// Use the operand as stored
    None,
    /// Use the transpose
    Trans,
    /// Use the conjugate transpose (same as `Trans` for real types)
    ConjTrans,
}

impl Transpose {
    /// Toggle between `None` and `Trans` (row-major adaptation for rank-k
    /// updates). `ConjTrans` only occurs on complex paths, which never reach
    /// the adaptation step.
    pub(crate) fn toggled(self) -> Self {
        match self {
            Self::None => Self::Trans,
            Self::Trans | Self::ConjTrans => Self::None,
        }
    }
}

/// Which triangle of a symmetric/triangular operand is referenced
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Uplo {
    /// Upper triangle
    Upper,
    /// Lower triangle
    Lower,
}

impl Uplo {
    pub(crate) fn flipped(self) -> Self {
        match self {
            Self::Upper => Self::Lower,
            Self::Lower => Self::Upper,
        }
    }
}

/// Which side a symmetric/triangular operand multiplies from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    /// Operand on the left: op(A) * B
    Left,
    /// Operand on the right: B * op(A)
    Right,
}

impl Side {
    pub(crate) fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Whether a triangular operand has an implicit unit diagonal
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Diag {
    /// Diagonal elements are read from the operand
    NonUnit,
    /// Diagonal elements are taken as 1, not read
    Unit,
}

// ============================================================================
// Scalar
// ============================================================================

/// A scalar coefficient (alpha or beta) tagged with its element type.
///
/// The representation must match the operand element type exactly; a
/// half-precision coefficient is carried as `f16` so it reaches the kernel
/// bit-converted, never merely cast.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    /// Half-precision coefficient
    F16(f16),
    /// Single-precision coefficient
    F32(f32),
    /// Double-precision coefficient
    F64(f64),
    /// Single-precision complex coefficient
    Complex64(Complex64),
    /// Double-precision complex coefficient
    Complex128(Complex128),
}

impl Scalar {
    /// The element type this coefficient is encoded as
    #[inline]
    pub fn dtype(&self) -> DType {
        match self {
            Self::F16(_) => DType::F16,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
            Self::Complex64(_) => DType::Complex64,
            Self::Complex128(_) => DType::Complex128,
        }
    }

    /// Encode an f32 value as a half-precision coefficient
    #[inline]
    pub fn half(v: f32) -> Self {
        Self::F16(f16::from_f32(v))
    }

    pub(crate) fn as_f16(self) -> f16 {
        match self {
            Self::F16(v) => v,
            // Precision validation runs before any path uses the value.
            _ => unreachable!("coefficient validated as f16"),
        }
    }

    pub(crate) fn as_f32(self) -> f32 {
        match self {
            Self::F32(v) => v,
            _ => unreachable!("coefficient validated as f32"),
        }
    }

    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Self::F64(v) => v,
            _ => unreachable!("coefficient validated as f64"),
        }
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<f16> for Scalar {
    fn from(v: f16) -> Self {
        Self::F16(v)
    }
}

impl From<Complex64> for Scalar {
    fn from(v: Complex64) -> Self {
        Self::Complex64(v)
    }
}

impl From<Complex128> for Scalar {
    fn from(v: Complex128) -> Self {
        Self::Complex128(v)
    }
}
