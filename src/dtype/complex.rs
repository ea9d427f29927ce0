//! Complex number types for the complex Level-3 operand variants
//!
//! Complex numbers are stored in interleaved format (re, im, re, im...),
//! matching the layout expected by cuBLAS `cuComplex`/`cuDoubleComplex`.
//! Both types are bytemuck-`Pod` so operand buffers can be staged as raw
//! bytes.

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Macro to implement a complex number type.
///
/// Avoids duplicating the type definition between Complex64 and Complex128.
macro_rules! impl_complex {
    ($name:ident, $float:ty, $doc_bits:literal) => {
        #[doc = concat!($doc_bits, "-bit complex number, interleaved (re, im) layout")]
        #[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
        #[repr(C)]
        pub struct $name {
            /// Real part
            pub re: $float,
            /// Imaginary part
            pub im: $float,
        }

        impl $name {
            /// Create a complex number from real and imaginary parts
            #[inline]
            pub const fn new(re: $float, im: $float) -> Self {
                Self { re, im }
            }

            /// Complex conjugate
            #[inline]
            pub fn conj(self) -> Self {
                Self::new(self.re, -self.im)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.im < 0.0 {
                    write!(f, "{}{}i", self.re, self.im)
                } else {
                    write!(f, "{}+{}i", self.re, self.im)
                }
            }
        }
    };
}

impl_complex!(Complex64, f32, "64");
impl_complex!(Complex128, f64, "128");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjugate_negates_imaginary() {
        let z = Complex64::new(3.0, 4.0);
        assert_eq!(z.conj(), Complex64::new(3.0, -4.0));

        let w = Complex128::new(-1.0, -2.0);
        assert_eq!(w.conj(), Complex128::new(-1.0, 2.0));
    }

    #[test]
    fn interleaved_byte_layout() {
        let z = Complex64::new(1.0, 2.0);
        let bytes: [u8; 8] = bytemuck::cast(z);
        let parts: [f32; 2] = bytemuck::cast(bytes);
        assert_eq!(parts, [1.0, 2.0]);
    }
}
