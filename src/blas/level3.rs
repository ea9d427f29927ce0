//! The Level-3 dispatcher
//!
//! One entry point per BLAS-3 routine. Every call follows the same
//! orchestration protocol:
//!
//! 1. validate precision and dimensions (before anything is acquired),
//! 2. `prepare`: resolve hazards, obtain the device context,
//! 3. bind operand buffers,
//! 4. critical section: lock the handle, associate the stream, select the
//!    precision path, issue the kernel,
//! 5. `commit`: record the output's in-flight write and the input reads,
//! 6. scan the output for non-finite values (advisory only).
//!
//! The handle guard is released before any failure propagates, so an
//! erroring call can never deadlock the device.
//!
//! Row-major calls are adapted to the column-major kernel convention up
//! front via the standard identities (operand swap for GEMM, side/uplo flips
//! for the symmetric and triangular routines).

use std::sync::Arc;

use super::validate;
use super::{Diag, Order, Scalar, Side, Transpose, Uplo};
use crate::backend::{Level3Kernels, ReferenceKernels};
use crate::buffer::MatrixOperand;
use crate::context::{ContextBroker, ContextRegistry};
use crate::diagnostics;
use crate::dtype::DType;
use crate::error::{Error, Result};

/// Dispatches Level-3 operations onto a kernel backend.
///
/// Cheap to share behind an `Arc`; all per-device state lives in the
/// [`ContextRegistry`] the dispatcher was built over.
#[derive(Debug)]
pub struct Level3<K: Level3Kernels> {
    kernels: K,
    broker: ContextBroker,
}

impl Level3<ReferenceKernels> {
    /// Dispatcher over the host reference backend
    pub fn reference(registry: Arc<ContextRegistry>) -> Self {
        Self::new(ReferenceKernels::new(), registry)
    }
}

impl<K: Level3Kernels> Level3<K> {
    /// Create a dispatcher over a kernel backend and a context registry
    pub fn new(kernels: K, registry: Arc<ContextRegistry>) -> Self {
        Self {
            kernels,
            broker: ContextBroker::new(registry),
        }
    }

    /// The broker used for hazard resolution and context lookup
    pub fn broker(&self) -> &ContextBroker {
        &self.broker
    }

    /// General matrix-matrix product: C := alpha*op(A)*op(B) + beta*C.
    ///
    /// Supported for f16 (architecture-dependent path), f32 and f64. The
    /// half-precision path uses the direct half kernel only on architectures
    /// with native half arithmetic; everywhere else it falls back to the
    /// mixed-precision kernel with single-precision accumulation.
    #[allow(clippy::too_many_arguments)]
    pub fn gemm(
        &self,
        order: Order,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
        n: i32,
        k: i32,
        alpha: Scalar,
        a: &MatrixOperand,
        lda: i32,
        b: &MatrixOperand,
        ldb: i32,
        beta: Scalar,
        c: &MatrixOperand,
        ldc: i32,
    ) -> Result<()> {
        const ROUTINE: &str = "gemm";
        if order == Order::RowMajor {
            // C row-major is C^T col-major: compute C^T = op(B)^T * op(A)^T
            // by swapping the operand roles.
            return self.gemm(
                Order::ColMajor,
                trans_b,
                trans_a,
                n,
                m,
                k,
                alpha,
                b,
                ldb,
                a,
                lda,
                beta,
                c,
                ldc,
            );
        }

        let dtype = validate::uniform_dtype(
            ROUTINE,
            &alpha,
            Some(&beta),
            &[("a", a), ("b", b), ("c", c)],
        )?;
        if dtype.is_complex() {
            return Err(Error::unsupported(ROUTINE, dtype));
        }
        validate::no_alias(ROUTINE, c, &[a, b])?;
        validate::gemm_dims(ROUTINE, trans_a, trans_b, m, n, k, a, lda, b, ldb, c, ldc)?;
        if m == 0 || n == 0 {
            return Ok(());
        }

        let ctx = self.broker.prepare(&[c], &[a, b])?;
        let a_bind = a.bind(&ctx)?;
        let b_bind = b.bind(&ctx)?;
        let c_bind = c.bind(&ctx)?;

        let ticket;
        {
            let mut handle = ctx.lock_handle();
            handle.bind_stream(ctx.stream());
            ticket = ctx.stream().begin_issue();
            match dtype {
                DType::F16 => {
                    if ctx.capability().supports_native_half() {
                        log::debug!("gemm: native half path on {}", ctx.capability());
                        self.kernels.gemm_f16(
                            &mut handle,
                            trans_a,
                            trans_b,
                            m,
                            n,
                            k,
                            alpha.as_f16(),
                            &a_bind,
                            lda,
                            &b_bind,
                            ldb,
                            beta.as_f16(),
                            &c_bind,
                            ldc,
                        )?;
                    } else {
                        log::debug!(
                            "gemm: mixed-precision half path (f32 accumulation) on {}",
                            ctx.capability()
                        );
                        self.kernels.gemm_f16_f32acc(
                            &mut handle,
                            trans_a,
                            trans_b,
                            m,
                            n,
                            k,
                            alpha.as_f16().to_f32(),
                            &a_bind,
                            lda,
                            &b_bind,
                            ldb,
                            beta.as_f16().to_f32(),
                            &c_bind,
                            ldc,
                        )?;
                    }
                }
                DType::F32 => self.kernels.gemm_f32(
                    &mut handle,
                    trans_a,
                    trans_b,
                    m,
                    n,
                    k,
                    alpha.as_f32(),
                    &a_bind,
                    lda,
                    &b_bind,
                    ldb,
                    beta.as_f32(),
                    &c_bind,
                    ldc,
                )?,
                DType::F64 => self.kernels.gemm_f64(
                    &mut handle,
                    trans_a,
                    trans_b,
                    m,
                    n,
                    k,
                    alpha.as_f64(),
                    &a_bind,
                    lda,
                    &b_bind,
                    ldb,
                    beta.as_f64(),
                    &c_bind,
                    ldc,
                )?,
                DType::Complex64 | DType::Complex128 => unreachable!("complex rejected above"),
            }
        }

        self.broker.commit(&ctx, ticket, &[c], &[a, b]);
        diagnostics::check_for_invalid(ROUTINE, c);
        Ok(())
    }

    /// Symmetric matrix-matrix product: C := alpha*A*B + beta*C (Left) or
    /// C := alpha*B*A + beta*C (Right), with A symmetric and only the
    /// `uplo` triangle referenced.
    #[allow(clippy::too_many_arguments)]
    pub fn symm(
        &self,
        order: Order,
        side: Side,
        uplo: Uplo,
        m: i32,
        n: i32,
        alpha: Scalar,
        a: &MatrixOperand,
        lda: i32,
        b: &MatrixOperand,
        ldb: i32,
        beta: Scalar,
        c: &MatrixOperand,
        ldc: i32,
    ) -> Result<()> {
        const ROUTINE: &str = "symm";
        if order == Order::RowMajor {
            return self.symm(
                Order::ColMajor,
                side.flipped(),
                uplo.flipped(),
                n,
                m,
                alpha,
                a,
                lda,
                b,
                ldb,
                beta,
                c,
                ldc,
            );
        }

        let dtype = validate::uniform_dtype(
            ROUTINE,
            &alpha,
            Some(&beta),
            &[("a", a), ("b", b), ("c", c)],
        )?;
        if !matches!(dtype, DType::F32 | DType::F64) {
            return Err(Error::unsupported(ROUTINE, dtype));
        }
        validate::no_alias(ROUTINE, c, &[a, b])?;
        validate::symm_dims(ROUTINE, side, m, n, a, lda, b, ldb, c, ldc)?;
        if m == 0 || n == 0 {
            return Ok(());
        }

        let ctx = self.broker.prepare(&[c], &[a, b])?;
        let a_bind = a.bind(&ctx)?;
        let b_bind = b.bind(&ctx)?;
        let c_bind = c.bind(&ctx)?;

        let ticket;
        {
            let mut handle = ctx.lock_handle();
            handle.bind_stream(ctx.stream());
            ticket = ctx.stream().begin_issue();
            match dtype {
                DType::F32 => self.kernels.symm_f32(
                    &mut handle,
                    side,
                    uplo,
                    m,
                    n,
                    alpha.as_f32(),
                    &a_bind,
                    lda,
                    &b_bind,
                    ldb,
                    beta.as_f32(),
                    &c_bind,
                    ldc,
                )?,
                DType::F64 => self.kernels.symm_f64(
                    &mut handle,
                    side,
                    uplo,
                    m,
                    n,
                    alpha.as_f64(),
                    &a_bind,
                    lda,
                    &b_bind,
                    ldb,
                    beta.as_f64(),
                    &c_bind,
                    ldc,
                )?,
                _ => unreachable!("unsupported dtypes rejected above"),
            }
        }

        self.broker.commit(&ctx, ticket, &[c], &[a, b]);
        diagnostics::check_for_invalid(ROUTINE, c);
        Ok(())
    }

    /// Symmetric rank-k update: C := alpha*A*Aᵗ + beta*C (trans = None) or
    /// C := alpha*Aᵗ*A + beta*C, updating only the `uplo` triangle of C.
    #[allow(clippy::too_many_arguments)]
    pub fn syrk(
        &self,
        order: Order,
        uplo: Uplo,
        trans: Transpose,
        n: i32,
        k: i32,
        alpha: Scalar,
        a: &MatrixOperand,
        lda: i32,
        beta: Scalar,
        c: &MatrixOperand,
        ldc: i32,
    ) -> Result<()> {
        const ROUTINE: &str = "syrk";
        if order == Order::RowMajor {
            return self.syrk(
                Order::ColMajor,
                uplo.flipped(),
                trans.toggled(),
                n,
                k,
                alpha,
                a,
                lda,
                beta,
                c,
                ldc,
            );
        }

        let dtype =
            validate::uniform_dtype(ROUTINE, &alpha, Some(&beta), &[("a", a), ("c", c)])?;
        if !matches!(dtype, DType::F32 | DType::F64) {
            return Err(Error::unsupported(ROUTINE, dtype));
        }
        validate::no_alias(ROUTINE, c, &[a])?;
        validate::syrk_dims(ROUTINE, trans, n, k, a, lda, c, ldc)?;
        if n == 0 {
            return Ok(());
        }

        let ctx = self.broker.prepare(&[c], &[a])?;
        let a_bind = a.bind(&ctx)?;
        let c_bind = c.bind(&ctx)?;

        let ticket;
        {
            let mut handle = ctx.lock_handle();
            handle.bind_stream(ctx.stream());
            ticket = ctx.stream().begin_issue();
            match dtype {
                DType::F32 => self.kernels.syrk_f32(
                    &mut handle,
                    uplo,
                    trans,
                    n,
                    k,
                    alpha.as_f32(),
                    &a_bind,
                    lda,
                    beta.as_f32(),
                    &c_bind,
                    ldc,
                )?,
                DType::F64 => self.kernels.syrk_f64(
                    &mut handle,
                    uplo,
                    trans,
                    n,
                    k,
                    alpha.as_f64(),
                    &a_bind,
                    lda,
                    beta.as_f64(),
                    &c_bind,
                    ldc,
                )?,
                _ => unreachable!("unsupported dtypes rejected above"),
            }
        }

        self.broker.commit(&ctx, ticket, &[c], &[a]);
        diagnostics::check_for_invalid(ROUTINE, c);
        Ok(())
    }

    /// Symmetric rank-2k update: C := alpha*(A*Bᵗ + B*Aᵗ) + beta*C,
    /// updating only the `uplo` triangle of C.
    ///
    /// Implemented for f64 only; the single-precision variant has no kernel.
    #[allow(clippy::too_many_arguments)]
    pub fn syr2k(
        &self,
        order: Order,
        uplo: Uplo,
        trans: Transpose,
        n: i32,
        k: i32,
        alpha: Scalar,
        a: &MatrixOperand,
        lda: i32,
        b: &MatrixOperand,
        ldb: i32,
        beta: Scalar,
        c: &MatrixOperand,
        ldc: i32,
    ) -> Result<()> {
        const ROUTINE: &str = "syr2k";
        if order == Order::RowMajor {
            return self.syr2k(
                Order::ColMajor,
                uplo.flipped(),
                trans.toggled(),
                n,
                k,
                alpha,
                a,
                lda,
                b,
                ldb,
                beta,
                c,
                ldc,
            );
        }

        let dtype = validate::uniform_dtype(
            ROUTINE,
            &alpha,
            Some(&beta),
            &[("a", a), ("b", b), ("c", c)],
        )?;
        if dtype != DType::F64 {
            return Err(Error::unsupported(ROUTINE, dtype));
        }
        validate::no_alias(ROUTINE, c, &[a, b])?;
        validate::syr2k_dims(ROUTINE, trans, n, k, a, lda, b, ldb, c, ldc)?;
        if n == 0 {
            return Ok(());
        }

        let ctx = self.broker.prepare(&[c], &[a, b])?;
        let a_bind = a.bind(&ctx)?;
        let b_bind = b.bind(&ctx)?;
        let c_bind = c.bind(&ctx)?;

        let ticket;
        {
            let mut handle = ctx.lock_handle();
            handle.bind_stream(ctx.stream());
            ticket = ctx.stream().begin_issue();
            self.kernels.syr2k_f64(
                &mut handle,
                uplo,
                trans,
                n,
                k,
                alpha.as_f64(),
                &a_bind,
                lda,
                &b_bind,
                ldb,
                beta.as_f64(),
                &c_bind,
                ldc,
            )?;
        }

        self.broker.commit(&ctx, ticket, &[c], &[a, b]);
        diagnostics::check_for_invalid(ROUTINE, c);
        Ok(())
    }

    /// Triangular matrix-matrix product, in place:
    /// B := alpha*op(A)*B (Left) or B := alpha*B*op(A) (Right).
    ///
    /// Implemented for f64 only; the single-precision variant has no kernel.
    #[allow(clippy::too_many_arguments)]
    pub fn trmm(
        &self,
        order: Order,
        side: Side,
        uplo: Uplo,
        trans_a: Transpose,
        diag: Diag,
        m: i32,
        n: i32,
        alpha: Scalar,
        a: &MatrixOperand,
        lda: i32,
        b: &MatrixOperand,
        ldb: i32,
    ) -> Result<()> {
        const ROUTINE: &str = "trmm";
        if order == Order::RowMajor {
            return self.trmm(
                Order::ColMajor,
                side.flipped(),
                uplo.flipped(),
                trans_a,
                diag,
                n,
                m,
                alpha,
                a,
                lda,
                b,
                ldb,
            );
        }

        let dtype = validate::uniform_dtype(ROUTINE, &alpha, None, &[("a", a), ("b", b)])?;
        if dtype != DType::F64 {
            return Err(Error::unsupported(ROUTINE, dtype));
        }
        validate::no_alias(ROUTINE, b, &[a])?;
        validate::trmm_dims(ROUTINE, side, m, n, a, lda, b, ldb)?;
        if m == 0 || n == 0 {
            return Ok(());
        }

        let ctx = self.broker.prepare(&[b], &[a])?;
        let a_bind = a.bind(&ctx)?;
        let b_bind = b.bind(&ctx)?;

        let ticket;
        {
            let mut handle = ctx.lock_handle();
            handle.bind_stream(ctx.stream());
            ticket = ctx.stream().begin_issue();
            self.kernels.trmm_f64(
                &mut handle,
                side,
                uplo,
                trans_a,
                diag,
                m,
                n,
                alpha.as_f64(),
                &a_bind,
                lda,
                &b_bind,
                ldb,
            )?;
        }

        self.broker.commit(&ctx, ticket, &[b], &[a]);
        diagnostics::check_for_invalid(ROUTINE, b);
        Ok(())
    }

    /// Triangular solve, in place: finds X with op(A)*X = alpha*B (Left) or
    /// X*op(A) = alpha*B (Right), overwriting B with X.
    ///
    /// Supported for f32 and f64. The complex variants are an explicit
    /// unsupported-operation failure, never a silent return.
    #[allow(clippy::too_many_arguments)]
    pub fn trsm(
        &self,
        order: Order,
        side: Side,
        uplo: Uplo,
        trans_a: Transpose,
        diag: Diag,
        m: i32,
        n: i32,
        alpha: Scalar,
        a: &MatrixOperand,
        lda: i32,
        b: &MatrixOperand,
        ldb: i32,
    ) -> Result<()> {
        const ROUTINE: &str = "trsm";
        if order == Order::RowMajor {
            return self.trsm(
                Order::ColMajor,
                side.flipped(),
                uplo.flipped(),
                trans_a,
                diag,
                n,
                m,
                alpha,
                a,
                lda,
                b,
                ldb,
            );
        }

        let dtype = validate::uniform_dtype(ROUTINE, &alpha, None, &[("a", a), ("b", b)])?;
        if !matches!(dtype, DType::F32 | DType::F64) {
            return Err(Error::unsupported(ROUTINE, dtype));
        }
        validate::no_alias(ROUTINE, b, &[a])?;
        validate::trmm_dims(ROUTINE, side, m, n, a, lda, b, ldb)?;
        if m == 0 || n == 0 {
            return Ok(());
        }

        let ctx = self.broker.prepare(&[b], &[a])?;
        let a_bind = a.bind(&ctx)?;
        let b_bind = b.bind(&ctx)?;

        let ticket;
        {
            let mut handle = ctx.lock_handle();
            handle.bind_stream(ctx.stream());
            ticket = ctx.stream().begin_issue();
            match dtype {
                DType::F32 => self.kernels.trsm_f32(
                    &mut handle,
                    side,
                    uplo,
                    trans_a,
                    diag,
                    m,
                    n,
                    alpha.as_f32(),
                    &a_bind,
                    lda,
                    &b_bind,
                    ldb,
                )?,
                DType::F64 => self.kernels.trsm_f64(
                    &mut handle,
                    side,
                    uplo,
                    trans_a,
                    diag,
                    m,
                    n,
                    alpha.as_f64(),
                    &a_bind,
                    lda,
                    &b_bind,
                    ldb,
                )?,
                _ => unreachable!("unsupported dtypes rejected above"),
            }
        }

        self.broker.commit(&ctx, ticket, &[b], &[a]);
        diagnostics::check_for_invalid(ROUTINE, b);
        Ok(())
    }

    /// Hermitian matrix-matrix product. No kernel exists; always fails with
    /// an unsupported-operation error before any resource acquisition.
    #[allow(clippy::too_many_arguments)]
    pub fn hemm(
        &self,
        _order: Order,
        _side: Side,
        _uplo: Uplo,
        _m: i32,
        _n: i32,
        _alpha: Scalar,
        a: &MatrixOperand,
        _lda: i32,
        _b: &MatrixOperand,
        _ldb: i32,
        _beta: Scalar,
        _c: &MatrixOperand,
        _ldc: i32,
    ) -> Result<()> {
        Err(Error::unsupported("hemm", a.dtype()))
    }

    /// Hermitian rank-k update. No kernel exists; always fails with an
    /// unsupported-operation error before any resource acquisition.
    #[allow(clippy::too_many_arguments)]
    pub fn herk(
        &self,
        _order: Order,
        _uplo: Uplo,
        _trans: Transpose,
        _n: i32,
        _k: i32,
        _alpha: Scalar,
        a: &MatrixOperand,
        _lda: i32,
        _beta: Scalar,
        _c: &MatrixOperand,
        _ldc: i32,
    ) -> Result<()> {
        Err(Error::unsupported("herk", a.dtype()))
    }

    /// Hermitian rank-2k update. No kernel exists; always fails with an
    /// unsupported-operation error before any resource acquisition.
    #[allow(clippy::too_many_arguments)]
    pub fn her2k(
        &self,
        _order: Order,
        _uplo: Uplo,
        _trans: Transpose,
        _n: i32,
        _k: i32,
        _alpha: Scalar,
        a: &MatrixOperand,
        _lda: i32,
        _b: &MatrixOperand,
        _ldb: i32,
        _beta: Scalar,
        _c: &MatrixOperand,
        _ldc: i32,
    ) -> Result<()> {
        Err(Error::unsupported("her2k", a.dtype()))
    }
}
