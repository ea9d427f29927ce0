//! Device architecture capability queries
//!
//! Precision-path selection is architecture dependent: only a restricted set
//! of device generations implements a native half-precision compute path at
//! full rate. The set is centralized here rather than hardcoded at call
//! sites.

/// Compute capability of a CUDA-class device.
///
/// # Examples
/// - (5, 3): Maxwell (Tegra X1)
/// - (6, 0): Pascal (P100)
/// - (7, 5): Turing (RTX 20xx, T4)
/// - (8, 0): Ampere (A100)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputeCapability {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

/// Architectures with a native half-precision compute path.
///
/// sm_53 (Tegra Maxwell) and sm_60 (Pascal P100) run FP16 arithmetic at full
/// rate; other generations go through the mixed-precision kernel with
/// single-precision accumulation.
const NATIVE_HALF_SM: &[u32] = &[53, 60];

impl ComputeCapability {
    /// Create a capability from major/minor version numbers
    #[inline]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The sm number, e.g. 86 for (8, 6)
    #[inline]
    pub const fn sm(self) -> u32 {
        self.major * 10 + self.minor
    }

    /// Whether the direct half-precision GEMM kernel is usable on this
    /// architecture.
    #[inline]
    pub fn supports_native_half(self) -> bool {
        NATIVE_HALF_SM.contains(&self.sm())
    }
}

impl std::fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sm_{}{}", self.major, self.minor)
    }
}
