//! # gpublas
//!
//! **BLAS Level-3 dispatch onto GPU-resident kernels, with the orchestration
//! done right.**
//!
//! The numeric kernels themselves are a black box behind the
//! [`backend::Level3Kernels`] trait; what this crate owns is everything
//! around them:
//!
//! - **Operand residency**: operand buffers are bound to device pointers at
//!   call entry and committed at call exit; no binding outlives one call.
//! - **Hazard resolution**: before a kernel issues, all outstanding
//!   asynchronous work touching its operands is ordered against it, blocking
//!   on the device stream when a pending write is detected.
//! - **Handle serialization**: each device's execution handle carries
//!   mutable stream association and is held exclusively from stream
//!   configuration through kernel issuance; independent devices run fully in
//!   parallel.
//! - **Precision paths**: one dispatch surface over f16/f32/f64 and the
//!   complex tags, with architecture-conditional selection of the native
//!   half-precision kernel versus the mixed-precision fallback.
//! - **Post-execution diagnostics**: outputs are scanned for NaN/Inf and
//!   reported through `log`, without gating the call's success.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use gpublas::blas::{Level3, Order, Scalar, Transpose};
//! use gpublas::buffer::{DeviceBuffer, MatrixOperand};
//! use gpublas::context::{ComputeCapability, ContextRegistry};
//!
//! # fn main() -> gpublas::error::Result<()> {
//! let registry = Arc::new(ContextRegistry::new());
//! registry.register(0, ComputeCapability::new(8, 6));
//! let blas = Level3::reference(registry);
//!
//! let a = MatrixOperand::new(DeviceBuffer::from_slice(0, &[1.0f32, 3.0, 2.0, 4.0]), 2, 2)?;
//! let b = MatrixOperand::new(DeviceBuffer::from_slice(0, &[5.0f32, 7.0, 6.0, 8.0]), 2, 2)?;
//! let c = MatrixOperand::new(DeviceBuffer::zeros(0, gpublas::dtype::DType::F32, 4), 2, 2)?;
//!
//! blas.gemm(
//!     Order::ColMajor, Transpose::None, Transpose::None,
//!     2, 2, 2,
//!     Scalar::from(1.0f32), &a, 2, &b, 2,
//!     Scalar::from(0.0f32), &c, 2,
//! )?;
//! assert_eq!(c.buffer().to_vec::<f32>(), vec![19.0, 43.0, 22.0, 50.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `cuda`: cuBLAS backend via cudarc. Without it the host reference
//!   backend stands in for the vendor kernels.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod blas;
pub mod buffer;
pub mod context;
pub mod diagnostics;
pub mod dtype;
pub mod error;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{Level3Kernels, ReferenceKernels};
    pub use crate::blas::{Diag, Level3, Order, Scalar, Side, Transpose, Uplo};
    pub use crate::buffer::{DeviceBuffer, MatrixOperand};
    pub use crate::context::{ComputeCapability, ContextRegistry};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};

    #[cfg(feature = "cuda")]
    pub use crate::backend::CudaKernels;
}
