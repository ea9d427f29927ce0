//! Device-resident operand buffers and logical matrix views
//!
//! `DeviceBuffer` stands in for one device allocation: a dtype-tagged element
//! buffer tied to a device ordinal, carrying the hazard-tracking state the
//! context broker uses to order asynchronous operations. The dispatcher
//! never owns buffers; it borrows them through [`MatrixOperand`] views for
//! the duration of one call and accesses their memory only through short-term
//! [`Binding`]s.
//!
//! Without the `cuda` feature the backing store is host memory playing the
//! device's role; the binding protocol (bind at call entry, commit at call
//! exit, no binding persists across calls) is identical either way.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::DeviceContext;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};

// ============================================================================
// DeviceBuffer
// ============================================================================

/// A dtype-tagged element buffer resident on one device.
///
/// # Synchronization protocol
///
/// The buffer's memory is mutated through raw pointers obtained from
/// [`Binding`]s while the device context's handle is held. Single-writer
/// ordering is enforced by the context broker's hazard resolution, not by
/// this type; reading the buffer while a kernel writes it is a protocol
/// violation.
#[derive(Debug)]
pub struct DeviceBuffer {
    dtype: DType,
    len: usize,
    device: usize,
    // Word-backed storage so byte views cast to any element type stay
    // aligned.
    data: UnsafeCell<Box<[u64]>>,
    last_write: AtomicU64,
    last_read: AtomicU64,
    binds: AtomicUsize,
}

// SAFETY: access to `data` is serialized by the per-device handle mutex and
// the broker's hazard resolution; the atomics are inherently thread-safe.
unsafe impl Send for DeviceBuffer {}
unsafe impl Sync for DeviceBuffer {}

impl DeviceBuffer {
    /// Allocate a zero-filled buffer of `len` elements on `device`
    pub fn zeros(device: usize, dtype: DType, len: usize) -> Arc<Self> {
        let words = (len * dtype.size_in_bytes()).div_ceil(8);
        Arc::new(Self {
            dtype,
            len,
            device,
            data: UnsafeCell::new(vec![0u64; words].into_boxed_slice()),
            last_write: AtomicU64::new(0),
            last_read: AtomicU64::new(0),
            binds: AtomicUsize::new(0),
        })
    }

    /// Allocate a buffer on `device` initialized from host data
    pub fn from_slice<E: Element>(device: usize, data: &[E]) -> Arc<Self> {
        let buf = Self::zeros(device, E::DTYPE, data.len());
        // SAFETY: freshly allocated, no other reference exists yet.
        unsafe {
            let bytes =
                std::slice::from_raw_parts_mut(buf.base_ptr() as *mut u8, buf.byte_len());
            bytes.copy_from_slice(bytemuck::cast_slice(data));
        }
        buf
    }

    /// Size of the element payload in bytes (excluding alignment padding)
    #[inline]
    fn byte_len(&self) -> usize {
        self.len * self.dtype.size_in_bytes()
    }

    /// Base address of the element storage
    #[inline]
    fn base_ptr(&self) -> *const u64 {
        // SAFETY: only the address is taken; no reference to the contents
        // is formed here.
        unsafe { (*self.data.get()).as_ptr() }
    }

    /// Element type of the buffer
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Device ordinal the buffer is resident on
    #[inline]
    pub fn device(&self) -> usize {
        self.device
    }

    /// Copy the buffer contents back to host memory.
    ///
    /// The caller must have ordered any in-flight writes via the broker (or
    /// a stream synchronize) first.
    ///
    /// # Panics
    ///
    /// Panics if `E` does not match the buffer's dtype.
    pub fn to_vec<E: Element>(&self) -> Vec<E> {
        assert_eq!(
            E::DTYPE,
            self.dtype,
            "requested element type does not match buffer dtype"
        );
        bytemuck::cast_slice(self.as_bytes()).to_vec()
    }

    /// View the raw bytes of the buffer.
    ///
    /// Same ordering requirement as [`to_vec`](Self::to_vec).
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: protocol requires no concurrent kernel write.
        unsafe { std::slice::from_raw_parts(self.base_ptr() as *const u8, self.byte_len()) }
    }

    /// Ticket of the last enqueued write, 0 if none
    pub(crate) fn last_write_ticket(&self) -> u64 {
        self.last_write.load(Ordering::SeqCst)
    }

    /// Ticket of the last enqueued read, 0 if none
    pub(crate) fn last_read_ticket(&self) -> u64 {
        self.last_read.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_write(&self, ticket: u64) {
        self.last_write.fetch_max(ticket, Ordering::SeqCst);
    }

    pub(crate) fn mark_read(&self, ticket: u64) {
        self.last_read.fetch_max(ticket, Ordering::SeqCst);
    }

    /// How many times this buffer has been bound.
    ///
    /// Validation must reject a call before any operand is bound; tests
    /// assert on this counter.
    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    fn bind(&self, ctx: &DeviceContext) -> Result<Binding> {
        if ctx.device() != self.device {
            return Err(Error::ResourceAcquisition(format!(
                "buffer on device {} bound against context for device {}",
                self.device,
                ctx.device()
            )));
        }
        self.binds.fetch_add(1, Ordering::SeqCst);
        Ok(Binding {
            ptr: self.base_ptr() as u64,
            len: self.len,
            dtype: self.dtype,
        })
    }
}

// ============================================================================
// MatrixOperand
// ============================================================================

/// A logical 2D view over a device buffer.
///
/// Carries the storage extents used for validation; leading dimensions and
/// transpose/side/uplo/diag interpretation are per-call parameters, BLAS
/// style. Cloning is cheap (the buffer is shared).
#[derive(Debug, Clone)]
pub struct MatrixOperand {
    buffer: Arc<DeviceBuffer>,
    rows: usize,
    cols: usize,
}

impl MatrixOperand {
    /// Create a `rows` x `cols` view over `buffer`.
    ///
    /// Fails if the buffer cannot hold the view.
    pub fn new(buffer: Arc<DeviceBuffer>, rows: usize, cols: usize) -> Result<Self> {
        if rows * cols > buffer.len() {
            return Err(Error::dimension(
                "operand",
                "extent",
                format!(
                    "{}x{} view exceeds buffer of {} elements",
                    rows,
                    cols,
                    buffer.len()
                ),
            ));
        }
        Ok(Self { buffer, rows, cols })
    }

    /// The underlying device buffer
    #[inline]
    pub fn buffer(&self) -> &Arc<DeviceBuffer> {
        &self.buffer
    }

    /// Row extent of the view
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column extent of the view
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Element type of the underlying buffer
    #[inline]
    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    /// Obtain a device pointer for this operand, valid for one operation.
    ///
    /// Part of the buffer-binding service boundary: acquired at call entry
    /// after hazard resolution, released implicitly at call exit.
    pub fn bind(&self, ctx: &DeviceContext) -> Result<Binding> {
        self.buffer.bind(ctx)
    }
}

// ============================================================================
// Binding
// ============================================================================

/// A device pointer staged for one operation.
///
/// Valid only between `prepare` and `commit` of the operation it was bound
/// for; never stored across calls.
#[derive(Copy, Clone, Debug)]
pub struct Binding {
    pub(crate) ptr: u64,
    pub(crate) len: usize,
    pub(crate) dtype: DType,
}

impl Binding {
    /// The raw device address
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Number of elements reachable from the pointer
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the binding covers no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element type behind the pointer
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }
}
