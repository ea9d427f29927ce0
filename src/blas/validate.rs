//! Call-site validation: precision, dimensions, leading dimensions
//!
//! Everything here runs before any operand is bound or any context acquired.
//! All dimension checks assume column-major storage; row-major calls are
//! adapted by the dispatcher before validation.

use super::{Scalar, Side, Transpose};
use crate::buffer::MatrixOperand;
use crate::dtype::DType;
use crate::error::{Error, Result};

/// Establish the call's precision from its coefficients and check every
/// operand against it. Mismatches are hard failures.
pub(crate) fn uniform_dtype(
    routine: &'static str,
    alpha: &Scalar,
    beta: Option<&Scalar>,
    operands: &[(&'static str, &MatrixOperand)],
) -> Result<DType> {
    let expected = alpha.dtype();
    if let Some(beta) = beta {
        if beta.dtype() != expected {
            return Err(Error::precision(routine, "beta", expected, beta.dtype()));
        }
    }
    for (name, op) in operands {
        if op.dtype() != expected {
            return Err(Error::precision(routine, name, expected, op.dtype()));
        }
    }
    Ok(expected)
}

/// The output buffer must not alias any input buffer; the kernels assume
/// disjoint read and write ranges.
pub(crate) fn no_alias(
    routine: &'static str,
    output: &MatrixOperand,
    inputs: &[&MatrixOperand],
) -> Result<()> {
    for input in inputs {
        if std::sync::Arc::ptr_eq(output.buffer(), input.buffer()) {
            return Err(Error::dimension(
                routine,
                "output",
                "output operand aliases an input operand",
            ));
        }
    }
    Ok(())
}

pub(crate) fn dim(routine: &'static str, arg: &'static str, value: i32) -> Result<()> {
    if value < 0 {
        return Err(Error::dimension(
            routine,
            arg,
            format!("must be non-negative, got {}", value),
        ));
    }
    Ok(())
}

fn leading_dim(
    routine: &'static str,
    arg: &'static str,
    ld: i32,
    stored_rows: i32,
) -> Result<()> {
    if ld < stored_rows.max(1) {
        return Err(Error::dimension(
            routine,
            arg,
            format!("leading dimension {} < extent {}", ld, stored_rows.max(1)),
        ));
    }
    Ok(())
}

fn capacity(
    routine: &'static str,
    arg: &'static str,
    operand: &MatrixOperand,
    ld: i32,
    stored_cols: i32,
) -> Result<()> {
    let needed = ld as usize * stored_cols as usize;
    if operand.buffer().len() < needed {
        return Err(Error::dimension(
            routine,
            arg,
            format!(
                "buffer holds {} elements, call addresses {}",
                operand.buffer().len(),
                needed
            ),
        ));
    }
    Ok(())
}

/// Stored extents of a (rows x cols)-shaped operand under a transpose flag
fn stored(trans: Transpose, rows: i32, cols: i32) -> (i32, i32) {
    match trans {
        Transpose::None => (rows, cols),
        Transpose::Trans | Transpose::ConjTrans => (cols, rows),
    }
}

fn operand(
    routine: &'static str,
    arg: &'static str,
    op: &MatrixOperand,
    ld: i32,
    stored_rows: i32,
    stored_cols: i32,
) -> Result<()> {
    leading_dim(routine, arg, ld, stored_rows)?;
    capacity(routine, arg, op, ld, stored_cols)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn gemm_dims(
    routine: &'static str,
    trans_a: Transpose,
    trans_b: Transpose,
    m: i32,
    n: i32,
    k: i32,
    a: &MatrixOperand,
    lda: i32,
    b: &MatrixOperand,
    ldb: i32,
    c: &MatrixOperand,
    ldc: i32,
) -> Result<()> {
    dim(routine, "m", m)?;
    dim(routine, "n", n)?;
    dim(routine, "k", k)?;
    let (ar, ac) = stored(trans_a, m, k);
    let (br, bc) = stored(trans_b, k, n);
    operand(routine, "lda", a, lda, ar, ac)?;
    operand(routine, "ldb", b, ldb, br, bc)?;
    operand(routine, "ldc", c, ldc, m, n)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn symm_dims(
    routine: &'static str,
    side: Side,
    m: i32,
    n: i32,
    a: &MatrixOperand,
    lda: i32,
    b: &MatrixOperand,
    ldb: i32,
    c: &MatrixOperand,
    ldc: i32,
) -> Result<()> {
    dim(routine, "m", m)?;
    dim(routine, "n", n)?;
    let ka = match side {
        Side::Left => m,
        Side::Right => n,
    };
    operand(routine, "lda", a, lda, ka, ka)?;
    operand(routine, "ldb", b, ldb, m, n)?;
    operand(routine, "ldc", c, ldc, m, n)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn syrk_dims(
    routine: &'static str,
    trans: Transpose,
    n: i32,
    k: i32,
    a: &MatrixOperand,
    lda: i32,
    c: &MatrixOperand,
    ldc: i32,
) -> Result<()> {
    dim(routine, "n", n)?;
    dim(routine, "k", k)?;
    let (ar, ac) = stored(trans, n, k);
    operand(routine, "lda", a, lda, ar, ac)?;
    operand(routine, "ldc", c, ldc, n, n)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn syr2k_dims(
    routine: &'static str,
    trans: Transpose,
    n: i32,
    k: i32,
    a: &MatrixOperand,
    lda: i32,
    b: &MatrixOperand,
    ldb: i32,
    c: &MatrixOperand,
    ldc: i32,
) -> Result<()> {
    syrk_dims(routine, trans, n, k, a, lda, c, ldc)?;
    let (br, bc) = stored(trans, n, k);
    operand(routine, "ldb", b, ldb, br, bc)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn trmm_dims(
    routine: &'static str,
    side: Side,
    m: i32,
    n: i32,
    a: &MatrixOperand,
    lda: i32,
    b: &MatrixOperand,
    ldb: i32,
) -> Result<()> {
    dim(routine, "m", m)?;
    dim(routine, "n", n)?;
    let ka = match side {
        Side::Left => m,
        Side::Right => n,
    };
    operand(routine, "lda", a, lda, ka, ka)?;
    operand(routine, "ldb", b, ldb, m, n)
}
