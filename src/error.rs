//! Error types for gpublas

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using gpublas's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching a Level-3 operation
#[derive(Error, Debug)]
pub enum Error {
    /// The requested routine has no implementation for the given element type.
    ///
    /// Raised before any resource acquisition; operand buffers are left
    /// untouched.
    #[error("Unsupported operation: '{routine}' is not implemented for {dtype}")]
    UnsupportedOperation {
        /// The BLAS routine name
        routine: &'static str,
        /// The element type the routine was invoked with
        dtype: DType,
    },

    /// Operand or coefficient element type does not match the call's precision
    #[error("Precision mismatch in '{routine}': expected {expected}, got {got} for '{arg}'")]
    PrecisionMismatch {
        /// The BLAS routine name
        routine: &'static str,
        /// The argument with the mismatched type
        arg: &'static str,
        /// The precision established by the coefficients
        expected: DType,
        /// The actual element type
        got: DType,
    },

    /// Caller-supplied dimensions or leading dimensions are inconsistent
    #[error("Invalid dimension in '{routine}' for '{arg}': {reason}")]
    DimensionMismatch {
        /// The BLAS routine name
        routine: &'static str,
        /// The offending argument
        arg: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Operands do not all live on the same device
    #[error("Device mismatch: all operands of one call must live on one device")]
    DeviceMismatch,

    /// A collaborator (buffer binding, context broker) failed to acquire a resource.
    ///
    /// Propagated as-is; retry policy belongs to the collaborator.
    #[error("Resource acquisition failed: {0}")]
    ResourceAcquisition(String),

    /// The underlying kernel invocation failed
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create an unsupported-operation error
    pub fn unsupported(routine: &'static str, dtype: DType) -> Self {
        Self::UnsupportedOperation { routine, dtype }
    }

    /// Create a precision-mismatch error
    pub fn precision(routine: &'static str, arg: &'static str, expected: DType, got: DType) -> Self {
        Self::PrecisionMismatch {
            routine,
            arg,
            expected,
            got,
        }
    }

    /// Create a dimension-mismatch error
    pub fn dimension(routine: &'static str, arg: &'static str, reason: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            routine,
            arg,
            reason: reason.into(),
        }
    }
}
