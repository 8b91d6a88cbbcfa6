//! # attest-posture — Device Posture Gates
//!
//! Two independent gates sit between a finished bundle and the outside
//! world:
//!
//! - [`SecurityValidator`] scores the device (tamper, debugger, key store,
//!   emulation, hardware key store) and combines that posture with a
//!   bundle's own validity into an accept / warn / reject recommendation.
//! - [`PerformanceOptimizer`] decides from a resource snapshot whether
//!   zero-knowledge proof generation should run now, later, or never, and
//!   scales batch sizes under memory pressure.
//!
//! Device signals come in through [`DeviceEnvironment`] and
//! [`SystemMonitor`], with host-backed and static implementations of each.

pub mod performance;
pub mod security;

pub use performance::{
    decide_zkp, optimal_batch_size, DeferReason, DeviceCapabilities, DeviceClass, HostMonitor,
    MemoryPressure, PerformanceOptimizer, PerformancePolicy, ProofLevel, SkipReason,
    StaticMonitor, SystemMonitor, SystemStatus, ThermalState, ZkpDecision,
};
pub use security::{
    BundleValidation, CheckContext, DeviceEnvironment, HostEnvironment, SecurityCheck,
    SecurityLevel, SecurityPosture, SecurityThresholds, SecurityValidator, StaticEnvironment,
    VerificationDecision,
};
