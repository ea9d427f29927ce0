//! Post-execution numeric diagnostics
//!
//! After an operation commits, its output is scanned for NaN/Inf. The scan
//! is advisory: it reports through the `log` facade and never affects the
//! call's own success or failure.

use crate::buffer::MatrixOperand;
use crate::dtype::DType;
use half::f16;

fn count_non_finite_f16(bytes: &[u8]) -> usize {
    bytemuck::cast_slice::<u8, u16>(bytes)
        .iter()
        .filter(|&&bits| !f16::from_bits(bits).is_finite())
        .count()
}

fn count_non_finite_f32(bytes: &[u8]) -> usize {
    bytemuck::cast_slice::<u8, f32>(bytes)
        .iter()
        .filter(|v| !v.is_finite())
        .count()
}

fn count_non_finite_f64(bytes: &[u8]) -> usize {
    bytemuck::cast_slice::<u8, f64>(bytes)
        .iter()
        .filter(|v| !v.is_finite())
        .count()
}

/// Scan an operand for NaN/Inf elements, returning how many were found.
///
/// Complex operands are scanned component-wise. A nonzero count is reported
/// via `log::warn!`; the caller's result is unaffected either way.
pub fn check_for_invalid(routine: &'static str, operand: &MatrixOperand) -> usize {
    let bytes = operand.buffer().as_bytes();
    let bad = match operand.dtype() {
        DType::F16 => count_non_finite_f16(bytes),
        DType::F32 | DType::Complex64 => count_non_finite_f32(bytes),
        DType::F64 | DType::Complex128 => count_non_finite_f64(bytes),
    };
    if bad > 0 {
        log::warn!(
            "{}: output contains {} non-finite element(s) ({} buffer of {})",
            routine,
            bad,
            operand.dtype(),
            operand.buffer().len()
        );
    }
    bad
}
