//! Per-device execution contexts and the context broker
//!
//! # Architecture
//!
//! ```text
//! ContextRegistry (process-wide, one live context per device)
//! └── DeviceContext
//!     ├── Stream       (ticketed async-work tracking)
//!     ├── ExecHandle   (mutable stream association, behind a Mutex)
//!     └── ComputeCapability
//! ```
//!
//! The execution handle's stream association is mutable shared state: two
//! operations on the same device must never interleave stream configuration
//! with kernel issuance. `DeviceContext::lock_handle` hands out a guard that
//! spans that critical section, and instruments entry/exit so serialization
//! is observable.

pub mod capability;
mod stream;

pub use capability::ComputeCapability;
pub use stream::Stream;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::buffer::MatrixOperand;
use crate::error::{Error, Result};

// ============================================================================
// ExecHandle
// ============================================================================

/// The per-device execution handle.
///
/// Holds the mutable stream association that kernel issuance depends on.
/// Only reachable through [`DeviceContext::lock_handle`], so all access is
/// serialized.
#[derive(Debug)]
pub struct ExecHandle {
    device: usize,
    bound_stream: Option<u64>,
}

impl ExecHandle {
    /// Associate the handle with a stream before issuing a kernel.
    pub fn bind_stream(&mut self, stream: &Stream) {
        self.bound_stream = Some(stream.id());
    }

    /// The stream currently associated with this handle, if any
    pub fn bound_stream(&self) -> Option<u64> {
        self.bound_stream
    }

    /// Device ordinal this handle issues onto
    pub fn device(&self) -> usize {
        self.device
    }
}

// ============================================================================
// DeviceContext
// ============================================================================

/// One device's execution context.
///
/// Exactly one live context exists per device (enforced by
/// [`ContextRegistry`]); it is shared across all concurrent callers targeting
/// that device. Independent devices operate fully in parallel.
#[derive(Debug)]
pub struct DeviceContext {
    device: usize,
    capability: ComputeCapability,
    stream: Stream,
    handle: Mutex<ExecHandle>,
    issuers: AtomicUsize,
    max_issuers: AtomicUsize,
}

impl DeviceContext {
    fn new(device: usize, capability: ComputeCapability) -> Self {
        Self {
            device,
            capability,
            stream: Stream::new(device),
            handle: Mutex::new(ExecHandle {
                device,
                bound_stream: None,
            }),
            issuers: AtomicUsize::new(0),
            max_issuers: AtomicUsize::new(0),
        }
    }

    /// Device ordinal
    #[inline]
    pub fn device(&self) -> usize {
        self.device
    }

    /// Architecture capability of the device
    #[inline]
    pub fn capability(&self) -> ComputeCapability {
        self.capability
    }

    /// The device's current stream
    #[inline]
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Acquire the execution handle exclusively.
    ///
    /// The guard must be held from stream association through kernel
    /// issuance. Blocks until any other holder on this device releases.
    pub fn lock_handle(&self) -> HandleGuard<'_> {
        let guard = match self.handle.lock() {
            Ok(g) => g,
            // A poisoned handle only means another issuer panicked; the
            // stream association is rewritten on every entry.
            Err(poisoned) => poisoned.into_inner(),
        };
        let active = self.issuers.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_issuers.fetch_max(active, Ordering::SeqCst);
        HandleGuard { ctx: self, guard }
    }

    /// High-water mark of concurrent critical-section holders.
    ///
    /// Stays at 1 when handle serialization works; tests assert on this.
    pub fn max_concurrent_issuers(&self) -> usize {
        self.max_issuers.load(Ordering::SeqCst)
    }
}

/// Exclusive access to a device's [`ExecHandle`].
///
/// Dropping the guard releases the handle, also on early exit paths, so a
/// failed kernel invocation cannot deadlock later callers.
pub struct HandleGuard<'a> {
    ctx: &'a DeviceContext,
    guard: MutexGuard<'a, ExecHandle>,
}

impl Deref for HandleGuard<'_> {
    type Target = ExecHandle;

    fn deref(&self) -> &ExecHandle {
        &self.guard
    }
}

impl DerefMut for HandleGuard<'_> {
    fn deref_mut(&mut self) -> &mut ExecHandle {
        &mut self.guard
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.ctx.issuers.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// ContextRegistry
// ============================================================================

/// Process-wide registry holding the single live context per device.
///
/// Contexts are created at device initialization and live until shutdown;
/// the dispatcher only ever borrows them.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: RwLock<HashMap<usize, Arc<DeviceContext>>>,
}

impl ContextRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device, returning its context.
    ///
    /// If the device already has a live context, that context is returned
    /// unchanged; the "one live context per device" invariant holds even
    /// under concurrent registration.
    pub fn register(&self, device: usize, capability: ComputeCapability) -> Arc<DeviceContext> {
        let mut contexts = match self.contexts.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        contexts
            .entry(device)
            .or_insert_with(|| Arc::new(DeviceContext::new(device, capability)))
            .clone()
    }

    /// Look up the live context for a device
    pub fn context(&self, device: usize) -> Option<Arc<DeviceContext>> {
        let contexts = match self.contexts.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        contexts.get(&device).cloned()
    }
}

// ============================================================================
// ContextBroker
// ============================================================================

/// Resolves hazards and supplies the execution context for one operation.
///
/// `prepare` orders the new operation against all outstanding asynchronous
/// work touching its operands; `commit` records the operation's own writes
/// and reads so later operations order against it.
#[derive(Debug, Clone)]
pub struct ContextBroker {
    registry: Arc<ContextRegistry>,
}

impl ContextBroker {
    /// Create a broker over a context registry
    pub fn new(registry: Arc<ContextRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this broker resolves contexts from
    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    /// Resolve hazards on the given operands and return the device's context.
    ///
    /// All operands must live on one device. If any operand has a pending
    /// write, or an output operand has pending readers, this blocks on the
    /// device stream until the outstanding work has drained. Readers overlap
    /// freely when no write is pending.
    pub fn prepare(
        &self,
        outputs: &[&MatrixOperand],
        inputs: &[&MatrixOperand],
    ) -> Result<Arc<DeviceContext>> {
        let first = outputs
            .first()
            .or_else(|| inputs.first())
            .ok_or_else(|| Error::ResourceAcquisition("operation has no operands".into()))?;
        let device = first.buffer().device();

        for op in outputs.iter().chain(inputs.iter()) {
            if op.buffer().device() != device {
                return Err(Error::DeviceMismatch);
            }
        }

        let ctx = self.registry.context(device).ok_or_else(|| {
            Error::ResourceAcquisition(format!("no live execution context for device {}", device))
        })?;

        // Write-after-read hazards only matter for outputs; write hazards
        // matter for every operand.
        let mut hazard = false;
        for op in outputs.iter().chain(inputs.iter()) {
            if !ctx.stream().is_complete(op.buffer().last_write_ticket()) {
                hazard = true;
                break;
            }
        }
        if !hazard {
            for op in outputs {
                if !ctx.stream().is_complete(op.buffer().last_read_ticket()) {
                    hazard = true;
                    break;
                }
            }
        }
        if hazard {
            ctx.stream().synchronize();
        }

        Ok(ctx)
    }

    /// Record the operation's buffer effects after kernel issuance.
    ///
    /// Outputs are tagged with an in-flight write under `ticket`; inputs are
    /// tagged as read. Later operations on these buffers order against the
    /// ticket via `prepare`.
    pub fn commit(
        &self,
        _ctx: &DeviceContext,
        ticket: u64,
        outputs: &[&MatrixOperand],
        inputs: &[&MatrixOperand],
    ) {
        for op in outputs {
            op.buffer().mark_write(ticket);
        }
        for op in inputs {
            op.buffer().mark_read(ticket);
        }
    }
}
