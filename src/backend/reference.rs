//! Host reference kernels
//!
//! Textbook column-major BLAS-3 semantics over host-resident bindings. This
//! backend stands in for the vendor kernels when no GPU is present and is
//! the ground truth the orchestration tests run against.
//!
//! Each kernel reconstructs element slices from the raw binding pointers.
//! That is sound under the dispatch protocol: the output binding never
//! aliases an input binding (validated), and the caller holds the device
//! handle, so no other kernel touches these buffers concurrently.

use std::ops::{Add, Div, Mul, Sub};

use super::Level3Kernels;
use crate::blas::{Diag, Side, Transpose, Uplo};
use crate::buffer::Binding;
use crate::context::ExecHandle;
use crate::dtype::Element;
use crate::error::Result;
use half::f16;

/// The host reference backend
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceKernels;

impl ReferenceKernels {
    /// Create the reference backend
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// Slice reconstruction
// ============================================================================

/// SAFETY: `b.ptr` addresses `b.len` elements of `E` (bindings are produced
/// from dtype-tagged buffers) and the dispatch protocol guarantees exclusive
/// access for the duration of the kernel call.
unsafe fn input<'a, E: Element>(b: &Binding) -> &'a [E] {
    debug_assert_eq!(b.dtype(), E::DTYPE);
    unsafe { std::slice::from_raw_parts(b.ptr() as *const E, b.len()) }
}

/// SAFETY: as [`input`], plus the binding is the call's output operand and
/// aliases no input binding.
unsafe fn output<'a, E: Element>(b: &Binding) -> &'a mut [E] {
    debug_assert_eq!(b.dtype(), E::DTYPE);
    unsafe { std::slice::from_raw_parts_mut(b.ptr() as *mut E, b.len()) }
}

// ============================================================================
// Element access helpers (column-major)
// ============================================================================

#[inline]
fn at<T: Copy>(m: &[T], ld: usize, i: usize, j: usize) -> T {
    m[i + j * ld]
}

/// op(A)(i, j) under a transpose flag. ConjTrans equals Trans for the real
/// types these kernels serve.
#[inline]
fn op_at<T: Copy>(a: &[T], lda: usize, trans: Transpose, i: usize, j: usize) -> T {
    match trans {
        Transpose::None => at(a, lda, i, j),
        Transpose::Trans | Transpose::ConjTrans => at(a, lda, j, i),
    }
}

/// A(i, j) with A symmetric, only the `uplo` triangle stored
#[inline]
fn sym_at<T: Copy>(a: &[T], lda: usize, uplo: Uplo, i: usize, j: usize) -> T {
    let in_triangle = match uplo {
        Uplo::Upper => i <= j,
        Uplo::Lower => i >= j,
    };
    if in_triangle {
        at(a, lda, i, j)
    } else {
        at(a, lda, j, i)
    }
}

/// op(A)(i, j) with A triangular; elements outside the triangle are zero and
/// a unit diagonal is implicit, never read.
#[inline]
fn tri_at<T: Element>(
    a: &[T],
    lda: usize,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    i: usize,
    j: usize,
) -> T {
    // Resolve the transpose first, then apply the triangle of the stored A.
    let (si, sj) = match trans {
        Transpose::None => (i, j),
        Transpose::Trans | Transpose::ConjTrans => (j, i),
    };
    if si == sj {
        return match diag {
            Diag::Unit => T::one(),
            Diag::NonUnit => at(a, lda, si, si),
        };
    }
    let stored = match uplo {
        Uplo::Upper => si < sj,
        Uplo::Lower => si > sj,
    };
    if stored {
        at(a, lda, si, sj)
    } else {
        T::zero()
    }
}

// ============================================================================
// Generic kernel bodies
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn gemm_kernel<T>(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) where
    T: Element + Add<Output = T> + Mul<Output = T>,
{
    for j in 0..n {
        for i in 0..m {
            let mut acc = T::zero();
            for p in 0..k {
                acc = acc + op_at(a, lda, trans_a, i, p) * op_at(b, ldb, trans_b, p, j);
            }
            let idx = i + j * ldc;
            // beta == 0 means C is not read (BLAS contract), so an
            // uninitialized C cannot poison the result.
            c[idx] = if beta.is_zero() {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn symm_kernel<T>(
    side: Side,
    uplo: Uplo,
    m: usize,
    n: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) where
    T: Element + Add<Output = T> + Mul<Output = T>,
{
    for j in 0..n {
        for i in 0..m {
            let mut acc = T::zero();
            match side {
                Side::Left => {
                    for p in 0..m {
                        acc = acc + sym_at(a, lda, uplo, i, p) * at(b, ldb, p, j);
                    }
                }
                Side::Right => {
                    for p in 0..n {
                        acc = acc + at(b, ldb, i, p) * sym_at(a, lda, uplo, p, j);
                    }
                }
            }
            let idx = i + j * ldc;
            c[idx] = if beta.is_zero() {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn syrk_kernel<T>(
    uplo: Uplo,
    trans: Transpose,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) where
    T: Element + Add<Output = T> + Mul<Output = T>,
{
    for j in 0..n {
        let (lo, hi) = match uplo {
            Uplo::Upper => (0, j + 1),
            Uplo::Lower => (j, n),
        };
        for i in lo..hi {
            let mut acc = T::zero();
            for p in 0..k {
                acc = acc + op_at(a, lda, trans, i, p) * op_at(a, lda, trans, j, p);
            }
            let idx = i + j * ldc;
            c[idx] = if beta.is_zero() {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn syr2k_kernel<T>(
    uplo: Uplo,
    trans: Transpose,
    n: usize,
    k: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &[T],
    ldb: usize,
    beta: T,
    c: &mut [T],
    ldc: usize,
) where
    T: Element + Add<Output = T> + Mul<Output = T>,
{
    for j in 0..n {
        let (lo, hi) = match uplo {
            Uplo::Upper => (0, j + 1),
            Uplo::Lower => (j, n),
        };
        for i in lo..hi {
            let mut acc = T::zero();
            for p in 0..k {
                acc = acc
                    + op_at(a, lda, trans, i, p) * op_at(b, ldb, trans, j, p)
                    + op_at(b, ldb, trans, i, p) * op_at(a, lda, trans, j, p);
            }
            let idx = i + j * ldc;
            c[idx] = if beta.is_zero() {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn trmm_kernel<T>(
    side: Side,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    m: usize,
    n: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &mut [T],
    ldb: usize,
) where
    T: Element + Add<Output = T> + Mul<Output = T>,
{
    // B is both input and output; compute into a scratch matrix first.
    let mut scratch = vec![T::zero(); m * n];
    for j in 0..n {
        for i in 0..m {
            let mut acc = T::zero();
            match side {
                Side::Left => {
                    for p in 0..m {
                        acc = acc + tri_at(a, lda, uplo, trans, diag, i, p) * at(b, ldb, p, j);
                    }
                }
                Side::Right => {
                    for p in 0..n {
                        acc = acc + at(b, ldb, i, p) * tri_at(a, lda, uplo, trans, diag, p, j);
                    }
                }
            }
            scratch[i + j * m] = alpha * acc;
        }
    }
    for j in 0..n {
        for i in 0..m {
            b[i + j * ldb] = scratch[i + j * m];
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn trsm_kernel<T>(
    side: Side,
    uplo: Uplo,
    trans: Transpose,
    diag: Diag,
    m: usize,
    n: usize,
    alpha: T,
    a: &[T],
    lda: usize,
    b: &mut [T],
    ldb: usize,
) where
    T: Element + Add<Output = T> + Mul<Output = T> + Sub<Output = T> + Div<Output = T>,
{
    for j in 0..n {
        for i in 0..m {
            b[i + j * ldb] = alpha * b[i + j * ldb];
        }
    }

    // t(i, j) is op(A)(i, j); whether it is effectively lower or upper
    // triangular decides the substitution order.
    let lower = (uplo == Uplo::Lower) == (trans == Transpose::None);

    match side {
        // Solve op(A) * X = B column by column.
        Side::Left => {
            for j in 0..n {
                if lower {
                    for i in 0..m {
                        let mut v = b[i + j * ldb];
                        for p in 0..i {
                            v = v - tri_at(a, lda, uplo, trans, diag, i, p) * b[p + j * ldb];
                        }
                        if diag == Diag::NonUnit {
                            v = v / at(a, lda, i, i);
                        }
                        b[i + j * ldb] = v;
                    }
                } else {
                    for i in (0..m).rev() {
                        let mut v = b[i + j * ldb];
                        for p in (i + 1)..m {
                            v = v - tri_at(a, lda, uplo, trans, diag, i, p) * b[p + j * ldb];
                        }
                        if diag == Diag::NonUnit {
                            v = v / at(a, lda, i, i);
                        }
                        b[i + j * ldb] = v;
                    }
                }
            }
        }
        // Solve X * op(A) = B: column j of X depends on columns before it
        // (effective upper) or after it (effective lower).
        Side::Right => {
            let cols: Vec<usize> = if lower {
                (0..n).rev().collect()
            } else {
                (0..n).collect()
            };
            for &j in &cols {
                for p in 0..n {
                    if p == j {
                        continue;
                    }
                    let depends = if lower { p > j } else { p < j };
                    if !depends {
                        continue;
                    }
                    let t = tri_at(a, lda, uplo, trans, diag, p, j);
                    for i in 0..m {
                        b[i + j * ldb] = b[i + j * ldb] - b[i + p * ldb] * t;
                    }
                }
                if diag == Diag::NonUnit {
                    let d = at(a, lda, j, j);
                    for i in 0..m {
                        b[i + j * ldb] = b[i + j * ldb] / d;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Level3Kernels implementation
// ============================================================================

macro_rules! real_gemm {
    ($name:ident, $t:ty) => {
        fn $name(
            &self,
            _handle: &mut ExecHandle,
            trans_a: Transpose,
            trans_b: Transpose,
            m: i32,
            n: i32,
            k: i32,
            alpha: $t,
            a: &Binding,
            lda: i32,
            b: &Binding,
            ldb: i32,
            beta: $t,
            c: &Binding,
            ldc: i32,
        ) -> Result<()> {
            // SAFETY: see module docs; bindings are dtype-tagged and
            // exclusive for this call.
            let (a, b, c) = unsafe { (input::<$t>(a), input::<$t>(b), output::<$t>(c)) };
            gemm_kernel(
                trans_a,
                trans_b,
                m as usize,
                n as usize,
                k as usize,
                alpha,
                a,
                lda as usize,
                b,
                ldb as usize,
                beta,
                c,
                ldc as usize,
            );
            Ok(())
        }
    };
}

impl Level3Kernels for ReferenceKernels {
    real_gemm!(gemm_f16, f16);
    real_gemm!(gemm_f32, f32);
    real_gemm!(gemm_f64, f64);

    fn gemm_f16_f32acc(
        &self,
        _handle: &mut ExecHandle,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
        n: i32,
        k: i32,
        alpha: f32,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
        beta: f32,
        c: &Binding,
        ldc: i32,
    ) -> Result<()> {
        // SAFETY: see module docs.
        let (a, b, c) = unsafe { (input::<f16>(a), input::<f16>(b), output::<f16>(c)) };
        let (m, n, k) = (m as usize, n as usize, k as usize);
        let (lda, ldb, ldc) = (lda as usize, ldb as usize, ldc as usize);
        for j in 0..n {
            for i in 0..m {
                // Single-precision accumulation over half operands, one
                // rounding at the store.
                let mut acc = 0.0f32;
                for p in 0..k {
                    acc += op_at(a, lda, trans_a, i, p).to_f32()
                        * op_at(b, ldb, trans_b, p, j).to_f32();
                }
                let idx = i + j * ldc;
                let v = if beta == 0.0 {
                    alpha * acc
                } else {
                    alpha * acc + beta * c[idx].to_f32()
                };
                c[idx] = f16::from_f32(v);
            }
        }
        Ok(())
    }

    fn symm_f32(
        &self,
        _handle: &mut ExecHandle,
        side: Side,
        uplo: Uplo,
        m: i32,
        n: i32,
        alpha: f32,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
        beta: f32,
        c: &Binding,
        ldc: i32,
    ) -> Result<()> {
        // SAFETY: see module docs.
        let (a, b, c) = unsafe { (input::<f32>(a), input::<f32>(b), output::<f32>(c)) };
        symm_kernel(
            side, uplo, m as usize, n as usize, alpha, a, lda as usize, b, ldb as usize, beta, c,
            ldc as usize,
        );
        Ok(())
    }

    fn symm_f64(
        &self,
        _handle: &mut ExecHandle,
        side: Side,
        uplo: Uplo,
        m: i32,
        n: i32,
        alpha: f64,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
        beta: f64,
        c: &Binding,
        ldc: i32,
    ) -> Result<()> {
        // SAFETY: see module docs.
        let (a, b, c) = unsafe { (input::<f64>(a), input::<f64>(b), output::<f64>(c)) };
        symm_kernel(
            side, uplo, m as usize, n as usize, alpha, a, lda as usize, b, ldb as usize, beta, c,
            ldc as usize,
        );
        Ok(())
    }

    fn syrk_f32(
        &self,
        _handle: &mut ExecHandle,
        uplo: Uplo,
        trans: Transpose,
        n: i32,
        k: i32,
        alpha: f32,
        a: &Binding,
        lda: i32,
        beta: f32,
        c: &Binding,
        ldc: i32,
    ) -> Result<()> {
        // SAFETY: see module docs.
        let (a, c) = unsafe { (input::<f32>(a), output::<f32>(c)) };
        syrk_kernel(
            uplo, trans, n as usize, k as usize, alpha, a, lda as usize, beta, c, ldc as usize,
        );
        Ok(())
    }

    fn syrk_f64(
        &self,
        _handle: &mut ExecHandle,
        uplo: Uplo,
        trans: Transpose,
        n: i32,
        k: i32,
        alpha: f64,
        a: &Binding,
        lda: i32,
        beta: f64,
        c: &Binding,
        ldc: i32,
    ) -> Result<()> {
        // SAFETY: see module docs.
        let (a, c) = unsafe { (input::<f64>(a), output::<f64>(c)) };
        syrk_kernel(
            uplo, trans, n as usize, k as usize, alpha, a, lda as usize, beta, c, ldc as usize,
        );
        Ok(())
    }

    fn syr2k_f64(
        &self,
        _handle: &mut ExecHandle,
        uplo: Uplo,
        trans: Transpose,
        n: i32,
        k: i32,
        alpha: f64,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
        beta: f64,
        c: &Binding,
        ldc: i32,
    ) -> Result<()> {
        // SAFETY: see module docs.
        let (a, b, c) = unsafe { (input::<f64>(a), input::<f64>(b), output::<f64>(c)) };
        syr2k_kernel(
            uplo, trans, n as usize, k as usize, alpha, a, lda as usize, b, ldb as usize, beta, c,
            ldc as usize,
        );
        Ok(())
    }

    fn trmm_f64(
        &self,
        _handle: &mut ExecHandle,
        side: Side,
        uplo: Uplo,
        trans: Transpose,
        diag: Diag,
        m: i32,
        n: i32,
        alpha: f64,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
    ) -> Result<()> {
        // SAFETY: see module docs; B is the sole output operand.
        let (a, b) = unsafe { (input::<f64>(a), output::<f64>(b)) };
        trmm_kernel(
            side, uplo, trans, diag, m as usize, n as usize, alpha, a, lda as usize, b,
            ldb as usize,
        );
        Ok(())
    }

    fn trsm_f32(
        &self,
        _handle: &mut ExecHandle,
        side: Side,
        uplo: Uplo,
        trans: Transpose,
        diag: Diag,
        m: i32,
        n: i32,
        alpha: f32,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
    ) -> Result<()> {
        // SAFETY: see module docs; B is the sole output operand.
        let (a, b) = unsafe { (input::<f32>(a), output::<f32>(b)) };
        trsm_kernel(
            side, uplo, trans, diag, m as usize, n as usize, alpha, a, lda as usize, b,
            ldb as usize,
        );
        Ok(())
    }

    fn trsm_f64(
        &self,
        _handle: &mut ExecHandle,
        side: Side,
        uplo: Uplo,
        trans: Transpose,
        diag: Diag,
        m: i32,
        n: i32,
        alpha: f64,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
    ) -> Result<()> {
        // SAFETY: see module docs; B is the sole output operand.
        let (a, b) = unsafe { (input::<f64>(a), output::<f64>(b)) };
        trsm_kernel(
            side, uplo, trans, diag, m as usize, n as usize, alpha, a, lda as usize, b,
            ldb as usize,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemm_transposed_operands() {
        // A stored 3x2 = [[1, 4], [2, 5], [3, 6]] col-major; op(A) is 2x3
        let a = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        // B 3x2 picks the first two columns of op(A)
        let b = [1.0f64, 0.0, 0.0, 0.0, 1.0, 0.0];
        let mut c = [0.0f64; 4];
        gemm_kernel(
            Transpose::Trans,
            Transpose::None,
            2,
            2,
            3,
            1.0,
            &a,
            3,
            &b,
            3,
            0.0,
            &mut c,
            2,
        );
        // op(A) * B picks the first two columns of op(A)
        assert_eq!(c, [1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn symm_reflects_triangle() {
        // A symmetric 2x2 = [[1, 2], [2, 3]], only upper stored; the lower
        // slot holds garbage that must never be read.
        let a = [1.0f64, f64::NAN, 2.0, 3.0];
        let b = [1.0f64, 0.0, 0.0, 1.0];
        let mut c = [0.0f64; 4];
        symm_kernel(
            Side::Left,
            Uplo::Upper,
            2,
            2,
            1.0,
            &a,
            2,
            &b,
            2,
            0.0,
            &mut c,
            2,
        );
        assert_eq!(c, [1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn trsm_left_lower_solves() {
        // A = [[2, 0], [1, 3]] lower, col-major [2, 1, 0, 3]
        let a = [2.0f64, 1.0, 0.0, 3.0];
        // B = A * X with X = [[1, 2], [3, 4]]: col-major
        let mut b = [2.0f64, 10.0, 4.0, 14.0];
        trsm_kernel(
            Side::Left,
            Uplo::Lower,
            Transpose::None,
            Diag::NonUnit,
            2,
            2,
            1.0,
            &a,
            2,
            &mut b,
            2,
        );
        assert_eq!(b, [1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn trsm_right_upper_solves() {
        // X * A = B with A = [[1, 2], [0, 3]] upper, X = [[1, 2], [3, 4]]
        // B = X * A = [[1, 8], [3, 18]] -> col-major [1, 3, 8, 18]
        let a = [1.0f64, 0.0, 2.0, 3.0];
        let mut b = [1.0f64, 3.0, 8.0, 18.0];
        trsm_kernel(
            Side::Right,
            Uplo::Upper,
            Transpose::None,
            Diag::NonUnit,
            2,
            2,
            1.0,
            &a,
            2,
            &mut b,
            2,
        );
        assert_eq!(b, [1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn trsm_unit_diagonal_skips_division() {
        // A = [[7, 0], [1, 9]] but Unit diag: effective [[1, 0], [1, 1]]
        let a = [7.0f64, 1.0, 0.0, 9.0];
        // B = eff(A) * X with X = [[5], [6]] -> [5, 11]
        let mut b = [5.0f64, 11.0];
        trsm_kernel(
            Side::Left,
            Uplo::Lower,
            Transpose::None,
            Diag::Unit,
            2,
            1,
            1.0,
            &a,
            2,
            &mut b,
            2,
        );
        assert_eq!(b, [5.0, 6.0]);
    }

    #[test]
    fn trmm_right_side() {
        // B := B * op(A), A = [[1, 2], [0, 1]] upper unit, B = [[1, 1], [1, 1]]
        let a = [1.0f64, 0.0, 2.0, 1.0];
        let mut b = [1.0f64, 1.0, 1.0, 1.0];
        trmm_kernel(
            Side::Right,
            Uplo::Upper,
            Transpose::None,
            Diag::Unit,
            2,
            2,
            1.0,
            &a,
            2,
            &mut b,
            2,
        );
        // B * A = [[1, 3], [1, 3]] col-major [1, 1, 3, 3]
        assert_eq!(b, [1.0, 1.0, 3.0, 3.0]);
    }

    #[test]
    fn syr2k_matches_definition() {
        // A = [[1, 0], [0, 2]], B = [[0, 1], [1, 0]] (col-major, 2x2, k=2)
        let a = [1.0f64, 0.0, 0.0, 2.0];
        let b = [0.0f64, 1.0, 1.0, 0.0];
        let mut c = [0.0f64; 4];
        syr2k_kernel(
            Uplo::Upper,
            Transpose::None,
            2,
            2,
            1.0,
            &a,
            2,
            &b,
            2,
            0.0,
            &mut c,
            2,
        );
        // A*B^T + B*A^T = [[0, 1], [2, 0]] + [[0, 2], [1, 0]] = [[0, 3], [3, 0]]
        // upper triangle: C(0,0)=0, C(0,1)=3, C(1,1)=0
        assert_eq!(c[0], 0.0);
        assert_eq!(c[2], 3.0);
        assert_eq!(c[3], 0.0);
        assert_eq!(c[1], 0.0); // lower untouched (was zero)
    }
}
