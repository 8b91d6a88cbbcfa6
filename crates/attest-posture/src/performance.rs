//! # Performance Optimizer
//!
//! Decides whether zero-knowledge proof generation may run now, and how large
//! analysis batches should be, from a snapshot of device resources. Every
//! decision is a pure function of [`SystemStatus`] and the static
//! [`PerformancePolicy`].
//!
//! ## Decision order
//!
//! 1. unsupported device class, or total memory below `min_memory_mb` ⇒ skip
//! 2. thermal state serious or critical ⇒ defer (thermal)
//! 3. memory pressure critical ⇒ defer (memory)
//! 4. battery below `min_battery_level` and not charging ⇒ defer (battery)
//! 5. low-power mode ⇒ defer (low-power mode)
//! 6. high class, nominal thermal and normal memory ⇒ proceed (full),
//!    otherwise proceed (reduced)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Unsupported,
    Low,
    Medium,
    High,
}

impl DeviceClass {
    /// Static class policy from core count and installed memory.
    pub fn classify(cpu_cores: usize, total_memory_mb: u64) -> Self {
        match (cpu_cores, total_memory_mb) {
            (c, m) if c >= 8 && m >= 8_192 => Self::High,
            (c, m) if c >= 4 && m >= 4_096 => Self::Medium,
            (c, m) if c >= 2 && m >= 2_048 => Self::Low,
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub device_class: DeviceClass,
    pub cpu_cores: usize,
    pub total_memory_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalState {
    Nominal,
    Fair,
    Serious,
    Critical,
}

impl ThermalState {
    fn from_millidegrees(milli: i64) -> Self {
        match milli {
            t if t < 60_000 => Self::Nominal,
            t if t < 75_000 => Self::Fair,
            t if t < 90_000 => Self::Serious,
            _ => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    Normal,
    Warning,
    Critical,
}

impl MemoryPressure {
    fn from_available(available_mb: u64, total_mb: u64) -> Self {
        if total_mb == 0 {
            return Self::Critical;
        }
        let ratio = available_mb as f64 / total_mb as f64;
        if ratio < 0.10 {
            Self::Critical
        } else if ratio < 0.25 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Snapshot of device resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub device_capabilities: DeviceCapabilities,
    /// Fraction of full charge in `[0, 1]`.
    pub battery_level: f64,
    pub is_charging: bool,
    pub thermal_state: ThermalState,
    pub memory_pressure: MemoryPressure,
    pub low_power_mode: bool,
}

// ---------------------------------------------------------------------------
// Monitors
// ---------------------------------------------------------------------------

/// Source of [`SystemStatus`] snapshots.
pub trait SystemMonitor: Send + Sync {
    fn system_status(&self) -> SystemStatus;
}

/// Reads the running Linux host.
///
/// Memory from `/proc/meminfo`, battery from `/sys/class/power_supply`,
/// temperature from the first thermal zone, low-power mode from the ACPI
/// platform profile. Missing sources read as a mains-powered, cool device.
#[derive(Debug, Clone)]
pub struct HostMonitor {
    root: PathBuf,
}

impl Default for HostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMonitor {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Resolve `/proc` and `/sys` below `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, relative: impl AsRef<Path>) -> Option<String> {
        std::fs::read_to_string(self.root.join(relative)).ok()
    }

    /// `(total_mb, available_mb)`.
    fn memory(&self) -> Option<(u64, u64)> {
        let meminfo = self.read("proc/meminfo")?;
        let field = |name: &str| {
            meminfo
                .lines()
                .find_map(|line| line.strip_prefix(name))
                .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
        };
        let total_kb = field("MemTotal:")?;
        let available_kb = field("MemAvailable:").or_else(|| field("MemFree:"))?;
        Some((total_kb / 1024, available_kb / 1024))
    }

    /// `(level, charging)` of the first battery, if any.
    fn battery(&self) -> Option<(f64, bool)> {
        let supplies = std::fs::read_dir(self.root.join("sys/class/power_supply")).ok()?;
        let mut batteries: Vec<PathBuf> = supplies
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                std::fs::read_to_string(path.join("type"))
                    .is_ok_and(|t| t.trim() == "Battery")
            })
            .collect();
        batteries.sort();
        let battery = batteries.first()?;

        let capacity = std::fs::read_to_string(battery.join("capacity"))
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()?;
        let status = std::fs::read_to_string(battery.join("status")).unwrap_or_default();
        let charging = matches!(status.trim(), "Charging" | "Full");
        Some(((capacity / 100.0).clamp(0.0, 1.0), charging))
    }

    fn thermal(&self) -> ThermalState {
        self.read("sys/class/thermal/thermal_zone0/temp")
            .and_then(|t| t.trim().parse::<i64>().ok())
            .map(ThermalState::from_millidegrees)
            .unwrap_or(ThermalState::Nominal)
    }

    fn low_power_mode(&self) -> bool {
        self.read("sys/firmware/acpi/platform_profile")
            .is_some_and(|profile| profile.trim() == "low-power")
    }
}

impl SystemMonitor for HostMonitor {
    fn system_status(&self) -> SystemStatus {
        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let (total_memory_mb, memory_pressure) = match self.memory() {
            Some((total, available)) => (total, MemoryPressure::from_available(available, total)),
            None => {
                tracing::debug!("meminfo unavailable, reporting zero memory");
                (0, MemoryPressure::Critical)
            }
        };
        let (battery_level, is_charging) = self.battery().unwrap_or((1.0, true));

        SystemStatus {
            device_capabilities: DeviceCapabilities {
                device_class: DeviceClass::classify(cpu_cores, total_memory_mb),
                cpu_cores,
                total_memory_mb,
            },
            battery_level,
            is_charging,
            thermal_state: self.thermal(),
            memory_pressure,
            low_power_mode: self.low_power_mode(),
        }
    }
}

/// Returns one fixed snapshot.
#[derive(Debug, Clone)]
pub struct StaticMonitor(pub SystemStatus);

impl SystemMonitor for StaticMonitor {
    fn system_status(&self) -> SystemStatus {
        self.0.clone()
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Static device policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePolicy {
    pub min_battery_level: f64,
    pub min_memory_mb: u64,
}

impl Default for PerformancePolicy {
    fn default() -> Self {
        Self {
            min_battery_level: 0.2,
            min_memory_mb: 2_048,
        }
    }
}

/// How much proving work the device can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofLevel {
    Full,
    Reduced,
}

/// Conditions a later retry is likely to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeferReason {
    Thermal,
    Memory,
    Battery,
    LowPowerMode,
}

/// Conditions no retry will clear on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    UnsupportedDevice,
    InsufficientMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "camelCase")]
pub enum ZkpDecision {
    Proceed(ProofLevel),
    DeferUntilLater(DeferReason),
    Skip(SkipReason),
}

impl std::fmt::Display for ZkpDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proceed(level) => write!(f, "proceed({level:?})"),
            Self::DeferUntilLater(reason) => write!(f, "deferUntilLater({reason:?})"),
            Self::Skip(reason) => write!(f, "skip({reason:?})"),
        }
    }
}

/// Decide from one snapshot. See the module docs for the order.
pub fn decide_zkp(status: &SystemStatus, policy: &PerformancePolicy) -> ZkpDecision {
    let caps = &status.device_capabilities;
    if caps.device_class == DeviceClass::Unsupported {
        return ZkpDecision::Skip(SkipReason::UnsupportedDevice);
    }
    if caps.total_memory_mb < policy.min_memory_mb {
        return ZkpDecision::Skip(SkipReason::InsufficientMemory);
    }
    if matches!(status.thermal_state, ThermalState::Serious | ThermalState::Critical) {
        return ZkpDecision::DeferUntilLater(DeferReason::Thermal);
    }
    if status.memory_pressure == MemoryPressure::Critical {
        return ZkpDecision::DeferUntilLater(DeferReason::Memory);
    }
    // NaN battery readings count as low.
    let battery_ok = status.battery_level >= policy.min_battery_level;
    if !status.is_charging && !battery_ok {
        return ZkpDecision::DeferUntilLater(DeferReason::Battery);
    }
    if status.low_power_mode {
        return ZkpDecision::DeferUntilLater(DeferReason::LowPowerMode);
    }
    if caps.device_class == DeviceClass::High
        && status.thermal_state == ThermalState::Nominal
        && status.memory_pressure == MemoryPressure::Normal
    {
        ZkpDecision::Proceed(ProofLevel::Full)
    } else {
        ZkpDecision::Proceed(ProofLevel::Reduced)
    }
}

/// Shrink `requested` for the device. Always in `1..=max(requested, 1)`.
pub fn optimal_batch_size(requested: usize, status: &SystemStatus) -> usize {
    let requested = requested.max(1);
    let mut factor = match status.memory_pressure {
        MemoryPressure::Normal => 1.0,
        MemoryPressure::Warning => 0.5,
        MemoryPressure::Critical => 0.25,
    };
    if status.device_capabilities.device_class <= DeviceClass::Low {
        factor *= 0.5;
    }
    let scaled = (requested as f64 * factor).floor() as usize;
    scaled.clamp(1, requested)
}

/// Resource gate for proof generation and batch sizing.
pub struct PerformanceOptimizer {
    monitor: Arc<dyn SystemMonitor>,
    policy: PerformancePolicy,
}

impl std::fmt::Debug for PerformanceOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceOptimizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl PerformanceOptimizer {
    pub fn new(monitor: Arc<dyn SystemMonitor>, policy: PerformancePolicy) -> Self {
        Self { monitor, policy }
    }

    pub fn policy(&self) -> &PerformancePolicy {
        &self.policy
    }

    pub fn get_system_status(&self) -> SystemStatus {
        self.monitor.system_status()
    }

    pub fn should_perform_zkp_generation(&self) -> ZkpDecision {
        let status = self.get_system_status();
        let decision = decide_zkp(&status, &self.policy);
        match decision {
            ZkpDecision::Proceed(level) => {
                tracing::debug!(?level, "zk proof generation approved");
            }
            ZkpDecision::DeferUntilLater(reason) => {
                tracing::warn!(?reason, battery = status.battery_level, "zk proof generation deferred");
            }
            ZkpDecision::Skip(reason) => {
                tracing::warn!(
                    ?reason,
                    class = ?status.device_capabilities.device_class,
                    memory_mb = status.device_capabilities.total_memory_mb,
                    "zk proof generation skipped"
                );
            }
        }
        decision
    }

    pub fn calculate_optimal_batch_size(&self, requested: usize) -> usize {
        let size = optimal_batch_size(requested, &self.get_system_status());
        if size != requested {
            tracing::debug!(requested, size, "batch size lowered for device");
        }
        size
    }
}
