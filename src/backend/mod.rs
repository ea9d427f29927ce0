//! The vendor kernel boundary
//!
//! [`Level3Kernels`] is the black-box interface to the numeric kernels. Each
//! method mirrors one concrete kernel entry point (per routine, per
//! precision path), takes column-major arguments, and receives the device's
//! execution handle mutably, proof that the caller holds the per-device
//! critical section from stream association through issuance.
//!
//! Two implementations ship:
//! - [`ReferenceKernels`]: host kernels with textbook BLAS semantics, the
//!   default backend and the one the test suite runs against.
//! - `CudaKernels` (feature `cuda`): cuBLAS via cudarc.

pub mod reference;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use reference::ReferenceKernels;

#[cfg(feature = "cuda")]
pub use cuda::CudaKernels;

use crate::buffer::Binding;
use crate::blas::{Diag, Side, Transpose, Uplo};
use crate::context::ExecHandle;
use crate::error::Result;
use half::f16;

/// Kernel entry points for the supported Level-3 precision paths.
///
/// All arguments are column-major; dimensions are validated by the
/// dispatcher before any method is invoked. Methods enqueue work on the
/// stream currently associated with `handle` and may return before the
/// device has executed it.
#[allow(clippy::too_many_arguments)]
pub trait Level3Kernels: Send + Sync {
    /// C := alpha*op(A)*op(B) + beta*C, half precision, half accumulation.
    ///
    /// Only invoked on architectures with a native half compute path.
    fn gemm_f16(
        &self,
        handle: &mut ExecHandle,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
        n: i32,
        k: i32,
        alpha: f16,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
        beta: f16,
        c: &Binding,
        ldc: i32,
    ) -> Result<()>;

    /// Mixed-precision GEMM: half operands, single-precision accumulation.
    ///
    /// The fallback path for architectures without native half arithmetic;
    /// coefficients arrive up-converted to f32.
    fn gemm_f16_f32acc(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// C := alpha*op(A)*op(B) + beta*C, single precision
    fn gemm_f32(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// C := alpha*op(A)*op(B) + beta*C, double precision
    fn gemm_f64(
        &self,
        handle: &mut ExecHandle,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
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
    ) -> Result<()>;

    /// C := alpha*A*B + beta*C (or B*A), A symmetric, single precision
    fn symm_f32(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// C := alpha*A*B + beta*C (or B*A), A symmetric, double precision
    fn symm_f64(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// C := alpha*A*Aᵗ + beta*C (or Aᵗ*A), triangle only, single precision
    fn syrk_f32(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// C := alpha*A*Aᵗ + beta*C (or Aᵗ*A), triangle only, double precision
    fn syrk_f64(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// C := alpha*(A*Bᵗ + B*Aᵗ) + beta*C, triangle only, double precision
    fn syr2k_f64(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// B := alpha*op(A)*B (or B*op(A)), A triangular, in place, double
    /// precision
    fn trmm_f64(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// Solve op(A)*X = alpha*B (or X*op(A) = alpha*B), X overwrites B,
    /// single precision
    fn trsm_f32(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;

    /// Solve op(A)*X = alpha*B (or X*op(A) = alpha*B), X overwrites B,
    /// double precision
    fn trsm_f64(
        &self,
        handle: &mut ExecHandle,
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
    ) -> Result<()>;
}
