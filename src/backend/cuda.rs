//! cuBLAS backend via cudarc
//!
//! Operand bindings arrive host-resident; each kernel call stages them to
//! stream-ordered device allocations, issues the cuBLAS routine on the
//! client stream, and copies the output back. Allocation uses
//! `cuMemAllocAsync`/`cuMemFreeAsync` so staging is ordered on the same
//! stream as the kernel.
//!
//! The cuBLAS handle's stream association is set inside each call, which is
//! why the dispatcher must hold the execution handle exclusively across the
//! whole issuance.

use std::ffi::c_void;
use std::sync::Arc;

use cudarc::cublas::sys::{
    cublasComputeType_t, cublasDiagType_t, cublasFillMode_t, cublasGemmAlgo_t, cublasOperation_t,
    cublasSideMode_t, cublasStatus_t, cudaDataType_t,
};
use cudarc::cublas::CudaBlas;
use cudarc::driver::safe::{CudaContext, CudaStream};

use super::Level3Kernels;
use crate::blas::{Diag, Side, Transpose, Uplo};
use crate::buffer::Binding;
use crate::context::{capability::ComputeCapability, ExecHandle};
use crate::error::{Error, Result};
use half::f16;

// ============================================================================
// Capability probing
// ============================================================================

/// Query the compute capability of a CUDA device.
pub fn probe_capability(index: usize) -> Result<ComputeCapability> {
    let device = cudarc::driver::result::device::get(index as i32).map_err(|e| {
        Error::ResourceAcquisition(format!("failed to get CUDA device {}: {:?}", index, e))
    })?;

    let major = unsafe {
        cudarc::driver::result::device::get_attribute(
            device,
            cudarc::driver::sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR,
        )
    }
    .map_err(|e| Error::ResourceAcquisition(format!("compute capability major: {:?}", e)))?;

    let minor = unsafe {
        cudarc::driver::result::device::get_attribute(
            device,
            cudarc::driver::sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR,
        )
    }
    .map_err(|e| Error::ResourceAcquisition(format!("compute capability minor: {:?}", e)))?;

    Ok(ComputeCapability::new(major as u32, minor as u32))
}

// ============================================================================
// CudaKernels
// ============================================================================

/// cuBLAS kernel backend for one device.
#[derive(Clone)]
pub struct CudaKernels {
    // Held so the primary context outlives the stream and the cuBLAS handle.
    #[allow(dead_code)]
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    blas: Arc<CudaBlas>,
}

impl std::fmt::Debug for CudaKernels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaKernels").finish_non_exhaustive()
    }
}

impl CudaKernels {
    /// Initialize context, stream and cuBLAS handle for a device.
    pub fn new(index: usize) -> Result<Self> {
        let context = CudaContext::new(index).map_err(|e| {
            Error::ResourceAcquisition(format!(
                "failed to create CUDA context for device {}: {:?}",
                index, e
            ))
        })?;

        context.bind_to_thread().map_err(|e| {
            Error::ResourceAcquisition(format!("failed to bind CUDA context to thread: {:?}", e))
        })?;

        let stream = context.new_stream().map_err(|e| {
            Error::ResourceAcquisition(format!("failed to create CUDA stream: {:?}", e))
        })?;

        let blas = CudaBlas::new(stream.clone())
            .map_err(|e| Error::ResourceAcquisition(format!("cuBLAS init failed: {:?}", e)))?;

        Ok(Self {
            context,
            stream,
            blas: Arc::new(blas),
        })
    }

    fn cu_stream(&self) -> cudarc::driver::sys::CUstream {
        self.stream.cu_stream()
    }

    /// Associate the cuBLAS handle with the client stream.
    ///
    /// Must be called with the dispatcher's execution handle held; the
    /// association is shared mutable state on the cuBLAS handle.
    fn set_stream(&self) -> Result<()> {
        let status = unsafe {
            cudarc::cublas::sys::cublasSetStream_v2(
                *self.blas.handle(),
                self.cu_stream() as cudarc::cublas::sys::cudaStream_t,
            )
        };
        cublas_ok("cublasSetStream_v2", status)
    }

    fn upload(&self, binding: &Binding) -> Result<Staged> {
        let bytes = binding.len() * binding.dtype().size_in_bytes();
        let host = binding.ptr() as *const u8;
        let mut dptr: u64 = 0;
        unsafe {
            cu_ok(
                "cuMemAllocAsync",
                cudarc::driver::sys::cuMemAllocAsync(&mut dptr, bytes, self.cu_stream()),
            )?;
            let copy = cudarc::driver::sys::cuMemcpyHtoDAsync_v2(
                dptr,
                host as *const c_void,
                bytes,
                self.cu_stream(),
            );
            if let Err(e) = cu_ok("cuMemcpyHtoDAsync", copy) {
                let _ = cudarc::driver::sys::cuMemFreeAsync(dptr, self.cu_stream());
                return Err(e);
            }
        }
        Ok(Staged {
            dptr,
            bytes,
            host: binding.ptr() as *mut u8,
        })
    }

    /// Copy a staged output back to its host binding and wait for the
    /// stream to drain.
    fn download(&self, staged: &Staged) -> Result<()> {
        unsafe {
            cu_ok(
                "cuMemcpyDtoHAsync",
                cudarc::driver::sys::cuMemcpyDtoHAsync_v2(
                    staged.host as *mut c_void,
                    staged.dptr,
                    staged.bytes,
                    self.cu_stream(),
                ),
            )?;
            cu_ok(
                "cuStreamSynchronize",
                cudarc::driver::sys::cuStreamSynchronize(self.cu_stream()),
            )
        }
    }

    fn release(&self, staged: Staged) {
        unsafe {
            let result = cudarc::driver::sys::cuMemFreeAsync(staged.dptr, self.cu_stream());
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
                log::warn!("cuMemFreeAsync failed for 0x{:x}: {:?}", staged.dptr, result);
            }
        }
    }
}

/// A host binding staged into a stream-ordered device allocation.
struct Staged {
    dptr: u64,
    bytes: usize,
    host: *mut u8,
}

// ============================================================================
// Status helpers and flag conversion
// ============================================================================

fn cublas_ok(what: &'static str, status: cublasStatus_t) -> Result<()> {
    if status == cublasStatus_t::CUBLAS_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(Error::Backend(format!("{} failed: {:?}", what, status)))
    }
}

fn cu_ok(what: &'static str, result: cudarc::driver::sys::CUresult) -> Result<()> {
    if result == cudarc::driver::sys::CUresult::CUDA_SUCCESS {
        Ok(())
    } else {
        Err(Error::ResourceAcquisition(format!(
            "{} failed: {:?}",
            what, result
        )))
    }
}

fn convert_transpose(t: Transpose) -> cublasOperation_t {
    match t {
        Transpose::None => cublasOperation_t::CUBLAS_OP_N,
        Transpose::Trans => cublasOperation_t::CUBLAS_OP_T,
        Transpose::ConjTrans => cublasOperation_t::CUBLAS_OP_C,
    }
}

fn convert_uplo(u: Uplo) -> cublasFillMode_t {
    match u {
        Uplo::Upper => cublasFillMode_t::CUBLAS_FILL_MODE_UPPER,
        Uplo::Lower => cublasFillMode_t::CUBLAS_FILL_MODE_LOWER,
    }
}

fn convert_side(s: Side) -> cublasSideMode_t {
    match s {
        Side::Left => cublasSideMode_t::CUBLAS_SIDE_LEFT,
        Side::Right => cublasSideMode_t::CUBLAS_SIDE_RIGHT,
    }
}

fn convert_diag(d: Diag) -> cublasDiagType_t {
    match d {
        Diag::NonUnit => cublasDiagType_t::CUBLAS_DIAG_NON_UNIT,
        Diag::Unit => cublasDiagType_t::CUBLAS_DIAG_UNIT,
    }
}

// ============================================================================
// Level3Kernels implementation
// ============================================================================

impl CudaKernels {
    /// Shared body for both half-precision GEMM paths via cublasGemmEx.
    ///
    /// `compute_16f` selects native half accumulation; otherwise the
    /// operands stay CUDA_R_16F but accumulation is CUBLAS_COMPUTE_32F, with
    /// alpha/beta pointers typed accordingly.
    #[allow(clippy::too_many_arguments)]
    fn gemm_ex_f16(
        &self,
        trans_a: Transpose,
        trans_b: Transpose,
        m: i32,
        n: i32,
        k: i32,
        alpha: *const c_void,
        a: &Binding,
        lda: i32,
        b: &Binding,
        ldb: i32,
        beta: *const c_void,
        c: &Binding,
        ldc: i32,
        compute_16f: bool,
    ) -> Result<()> {
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let sc = self.upload(c)?;

        let compute = if compute_16f {
            cublasComputeType_t::CUBLAS_COMPUTE_16F
        } else {
            cublasComputeType_t::CUBLAS_COMPUTE_32F
        };

        let status = unsafe {
            cudarc::cublas::sys::cublasGemmEx(
                *self.blas.handle(),
                convert_transpose(trans_a),
                convert_transpose(trans_b),
                m,
                n,
                k,
                alpha,
                sa.dptr as *const c_void,
                cudaDataType_t::CUDA_R_16F,
                lda,
                sb.dptr as *const c_void,
                cudaDataType_t::CUDA_R_16F,
                ldb,
                beta,
                sc.dptr as *mut c_void,
                cudaDataType_t::CUDA_R_16F,
                ldc,
                compute,
                cublasGemmAlgo_t::CUBLAS_GEMM_DEFAULT,
            )
        };
        let result = cublas_ok("cublasGemmEx", status).and_then(|_| self.download(&sc));

        self.release(sa);
        self.release(sb);
        self.release(sc);
        result
    }
}

impl Level3Kernels for CudaKernels {
    fn gemm_f16(
        &self,
        _handle: &mut ExecHandle,
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
    ) -> Result<()> {
        // Native path: CUBLAS_COMPUTE_16F takes half-typed coefficients, so
        // the bit-converted f16 values go straight through.
        self.gemm_ex_f16(
            trans_a,
            trans_b,
            m,
            n,
            k,
            &alpha as *const f16 as *const c_void,
            a,
            lda,
            b,
            ldb,
            &beta as *const f16 as *const c_void,
            c,
            ldc,
            true,
        )
    }

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
        self.gemm_ex_f16(
            trans_a,
            trans_b,
            m,
            n,
            k,
            &alpha as *const f32 as *const c_void,
            a,
            lda,
            b,
            ldb,
            &beta as *const f32 as *const c_void,
            c,
            ldc,
            false,
        )
    }

    fn gemm_f32(
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasSgemm_v2(
                *self.blas.handle(),
                convert_transpose(trans_a),
                convert_transpose(trans_b),
                m,
                n,
                k,
                &alpha,
                sa.dptr as *const f32,
                lda,
                sb.dptr as *const f32,
                ldb,
                &beta,
                sc.dptr as *mut f32,
                ldc,
            )
        };
        let result = cublas_ok("cublasSgemm_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sb);
        self.release(sc);
        result
    }

    fn gemm_f64(
        &self,
        _handle: &mut ExecHandle,
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
    ) -> Result<()> {
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasDgemm_v2(
                *self.blas.handle(),
                convert_transpose(trans_a),
                convert_transpose(trans_b),
                m,
                n,
                k,
                &alpha,
                sa.dptr as *const f64,
                lda,
                sb.dptr as *const f64,
                ldb,
                &beta,
                sc.dptr as *mut f64,
                ldc,
            )
        };
        let result = cublas_ok("cublasDgemm_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sb);
        self.release(sc);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasSsymm_v2(
                *self.blas.handle(),
                convert_side(side),
                convert_uplo(uplo),
                m,
                n,
                &alpha,
                sa.dptr as *const f32,
                lda,
                sb.dptr as *const f32,
                ldb,
                &beta,
                sc.dptr as *mut f32,
                ldc,
            )
        };
        let result = cublas_ok("cublasSsymm_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sb);
        self.release(sc);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasDsymm_v2(
                *self.blas.handle(),
                convert_side(side),
                convert_uplo(uplo),
                m,
                n,
                &alpha,
                sa.dptr as *const f64,
                lda,
                sb.dptr as *const f64,
                ldb,
                &beta,
                sc.dptr as *mut f64,
                ldc,
            )
        };
        let result = cublas_ok("cublasDsymm_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sb);
        self.release(sc);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasSsyrk_v2(
                *self.blas.handle(),
                convert_uplo(uplo),
                convert_transpose(trans),
                n,
                k,
                &alpha,
                sa.dptr as *const f32,
                lda,
                &beta,
                sc.dptr as *mut f32,
                ldc,
            )
        };
        let result = cublas_ok("cublasSsyrk_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sc);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasDsyrk_v2(
                *self.blas.handle(),
                convert_uplo(uplo),
                convert_transpose(trans),
                n,
                k,
                &alpha,
                sa.dptr as *const f64,
                lda,
                &beta,
                sc.dptr as *mut f64,
                ldc,
            )
        };
        let result = cublas_ok("cublasDsyrk_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sc);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let sc = self.upload(c)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasDsyr2k_v2(
                *self.blas.handle(),
                convert_uplo(uplo),
                convert_transpose(trans),
                n,
                k,
                &alpha,
                sa.dptr as *const f64,
                lda,
                sb.dptr as *const f64,
                ldb,
                &beta,
                sc.dptr as *mut f64,
                ldc,
            )
        };
        let result = cublas_ok("cublasDsyr2k_v2", status).and_then(|_| self.download(&sc));
        self.release(sa);
        self.release(sb);
        self.release(sc);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        // In-place form: B is both the input and the output operand.
        let status = unsafe {
            cudarc::cublas::sys::cublasDtrmm_v2(
                *self.blas.handle(),
                convert_side(side),
                convert_uplo(uplo),
                convert_transpose(trans),
                convert_diag(diag),
                m,
                n,
                &alpha,
                sa.dptr as *const f64,
                lda,
                sb.dptr as *const f64,
                ldb,
                sb.dptr as *mut f64,
                ldb,
            )
        };
        let result = cublas_ok("cublasDtrmm_v2", status).and_then(|_| self.download(&sb));
        self.release(sa);
        self.release(sb);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasStrsm_v2(
                *self.blas.handle(),
                convert_side(side),
                convert_uplo(uplo),
                convert_transpose(trans),
                convert_diag(diag),
                m,
                n,
                &alpha,
                sa.dptr as *const f32,
                lda,
                sb.dptr as *mut f32,
                ldb,
            )
        };
        let result = cublas_ok("cublasStrsm_v2", status).and_then(|_| self.download(&sb));
        self.release(sa);
        self.release(sb);
        result
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
        self.set_stream()?;
        let sa = self.upload(a)?;
        let sb = self.upload(b)?;
        let status = unsafe {
            cudarc::cublas::sys::cublasDtrsm_v2(
                *self.blas.handle(),
                convert_side(side),
                convert_uplo(uplo),
                convert_transpose(trans),
                convert_diag(diag),
                m,
                n,
                &alpha,
                sa.dptr as *const f64,
                lda,
                sb.dptr as *mut f64,
                ldb,
            )
        };
        let result = cublas_ok("cublasDtrsm_v2", status).and_then(|_| self.download(&sb));
        self.release(sa);
        self.release(sb);
        result
    }
}
