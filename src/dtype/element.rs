//! The `Element` trait: byte-compatible operand element types

use super::{Complex64, Complex128, DType};

/// Trait for types that can populate an operand buffer.
///
/// Elements are plain-old-data so buffers can be viewed as raw bytes when
/// staged to or from device memory.
pub trait Element:
    bytemuck::Pod + Copy + Send + Sync + PartialEq + std::fmt::Debug + 'static
{
    /// The runtime dtype tag for this element type
    const DTYPE: DType;

    /// Convert to f64 (real part for complex types)
    fn to_f64(self) -> f64;

    /// Convert from f64
    fn from_f64(v: f64) -> Self;

    /// Additive identity
    fn zero() -> Self;

    /// Multiplicative identity
    fn one() -> Self;

    /// Returns true if the element is exactly zero
    fn is_zero(&self) -> bool;
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        self.to_f64()
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::f16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::f16::ONE
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == half::f16::ZERO
    }
}

impl Element for Complex64 {
    const DTYPE: DType = DType::Complex64;

    #[inline]
    fn to_f64(self) -> f64 {
        self.re as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        Complex64::new(v as f32, 0.0)
    }

    #[inline]
    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }

    #[inline]
    fn one() -> Self {
        Complex64::new(1.0, 0.0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }
}

impl Element for Complex128 {
    const DTYPE: DType = DType::Complex128;

    #[inline]
    fn to_f64(self) -> f64 {
        self.re
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        Complex128::new(v, 0.0)
    }

    #[inline]
    fn zero() -> Self {
        Complex128::new(0.0, 0.0)
    }

    #[inline]
    fn one() -> Self {
        Complex128::new(1.0, 0.0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }
}
