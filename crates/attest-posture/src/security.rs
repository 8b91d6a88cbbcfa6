//! # Security Validator
//!
//! Classifies the device the bundle was produced on and turns that posture,
//! together with the bundle's own validity, into an upload recommendation.
//!
//! ## Checks
//!
//! | check                | weight | critical |
//! |----------------------|--------|----------|
//! | `tamper_detection`   | 0.35   | yes      |
//! | `debugger_detection` | 0.20   | no       |
//! | `key_store_integrity`| 0.30   | yes      |
//! | `emulator_detection` | 0.10   | no       |
//! | `hardware_keystore`  | 0.05   | no       |
//!
//! `overallScore` is the passed weight over the total weight. A failed
//! critical check makes the device `compromised` regardless of score.
//!
//! Checks the context stops before are recorded as failed with detail
//! "not evaluated". They never count as passed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use attest_bundle::{Attestation, BatchVerificationBundle, VerificationBundle};
use attest_core::{AttestError, CanonicalBytes};
use attest_crypto::KeyProvider;

/// Environment variables that inject code into the process.
const INJECTION_VARS: [&str; 2] = ["LD_PRELOAD", "DYLD_INSERT_LIBRARIES"];

const KEY_STORE_PROBE_TAG: &str = "attest.keystore.probe.v1";

// ---------------------------------------------------------------------------
// Device signals
// ---------------------------------------------------------------------------

/// Raw device signals the validator scores.
pub trait DeviceEnvironment: Send + Sync {
    /// Human-readable tamper findings. Empty means none.
    fn tamper_indicators(&self) -> Vec<String>;
    fn debugger_attached(&self) -> bool;
    /// Whether the signing key store can still sign and verify.
    fn key_store_intact(&self) -> bool;
    fn is_emulator(&self) -> bool;
    fn hardware_keystore_available(&self) -> bool;
}

/// Signals of the current host process.
///
/// Debugger attachment comes from `TracerPid` in `/proc/self/status`,
/// emulation from the `hypervisor` CPU flag, tamper from code-injection
/// environment variables. The key store is probed with a sign/verify round
/// trip on the configured provider. Host key providers are software keys,
/// so no hardware key store is reported.
pub struct HostEnvironment {
    keys: Arc<dyn KeyProvider>,
    proc_root: PathBuf,
}

impl HostEnvironment {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            keys,
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Read process information below `root` instead of `/proc`.
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    fn read_proc(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.proc_root.join(relative)).ok()
    }
}

impl std::fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEnvironment")
            .field("key_provider", &self.keys.provider_name())
            .field("proc_root", &self.proc_root)
            .finish()
    }
}

impl DeviceEnvironment for HostEnvironment {
    fn tamper_indicators(&self) -> Vec<String> {
        INJECTION_VARS
            .iter()
            .filter(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
            .map(|var| format!("{var} is set"))
            .collect()
    }

    fn debugger_attached(&self) -> bool {
        self.read_proc("self/status")
            .as_deref()
            .and_then(|status| {
                status
                    .lines()
                    .find_map(|line| line.strip_prefix("TracerPid:"))
                    .and_then(|pid| pid.trim().parse::<u32>().ok())
            })
            .is_some_and(|pid| pid != 0)
    }

    fn key_store_intact(&self) -> bool {
        let probe = match CanonicalBytes::new(&(KEY_STORE_PROBE_TAG,)) {
            Ok(p) => p,
            Err(_) => return false,
        };
        match self.keys.sign_with_public_key(&probe) {
            Ok((signature, public_key)) => public_key.verify(&probe, &signature).is_ok(),
            Err(e) => {
                tracing::warn!(provider = self.keys.provider_name(), error = %e, "key store probe failed");
                false
            }
        }
    }

    fn is_emulator(&self) -> bool {
        self.read_proc("cpuinfo").is_some_and(|cpuinfo| {
            cpuinfo
                .lines()
                .filter(|line| line.starts_with("flags"))
                .any(|line| line.split_whitespace().any(|flag| flag == "hypervisor"))
        })
    }

    fn hardware_keystore_available(&self) -> bool {
        false
    }
}

/// Fixed signals, for tests and for hosts that gather them elsewhere.
///
/// `StaticEnvironment::default()` is a clean device with a hardware key store.
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    tamper: Vec<String>,
    debugger: bool,
    key_store: bool,
    emulator: bool,
    hardware_keystore: bool,
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self {
            tamper: Vec::new(),
            debugger: false,
            key_store: true,
            emulator: false,
            hardware_keystore: true,
        }
    }
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tamper_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.tamper.push(indicator.into());
        self
    }

    pub fn with_debugger(mut self, attached: bool) -> Self {
        self.debugger = attached;
        self
    }

    pub fn with_key_store(mut self, intact: bool) -> Self {
        self.key_store = intact;
        self
    }

    pub fn with_emulator(mut self, emulator: bool) -> Self {
        self.emulator = emulator;
        self
    }

    pub fn with_hardware_keystore(mut self, available: bool) -> Self {
        self.hardware_keystore = available;
        self
    }
}

impl DeviceEnvironment for StaticEnvironment {
    fn tamper_indicators(&self) -> Vec<String> {
        self.tamper.clone()
    }

    fn debugger_attached(&self) -> bool {
        self.debugger
    }

    fn key_store_intact(&self) -> bool {
        self.key_store
    }

    fn is_emulator(&self) -> bool {
        self.emulator
    }

    fn hardware_keystore_available(&self) -> bool {
        self.hardware_keystore
    }
}

// ---------------------------------------------------------------------------
// Posture
// ---------------------------------------------------------------------------

/// Coarse device trust level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Trusted,
    Degraded,
    Compromised,
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trusted => write!(f, "trusted"),
            Self::Degraded => write!(f, "degraded"),
            Self::Compromised => write!(f, "compromised"),
        }
    }
}

/// One named check and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCheck {
    pub name: String,
    pub passed: bool,
    pub weight: f64,
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of a full device validation. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPosture {
    pub security_level: SecurityLevel,
    pub checks: Vec<SecurityCheck>,
    pub overall_score: f64,
    pub validation_time: Duration,
}

impl SecurityPosture {
    pub fn failed_checks(&self) -> impl Iterator<Item = &SecurityCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Score cut-offs between levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecurityThresholds {
    pub trusted: f64,
    pub degraded: f64,
}

impl Default for SecurityThresholds {
    fn default() -> Self {
        Self {
            trusted: 0.9,
            degraded: 0.6,
        }
    }
}

/// Recommended handling of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationDecision {
    Accept,
    Warn,
    Reject,
}

impl std::fmt::Display for VerificationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Warn => write!(f, "warn"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Bundle validity combined with device posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleValidation {
    pub is_valid: bool,
    pub recommended_action: VerificationDecision,
    pub posture: SecurityPosture,
}

/// Cancellation and deadline for one device validation.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CheckContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Why the remaining checks must not run, if they must not.
    fn stop_reason(&self) -> Option<&'static str> {
        if self.cancel.is_cancelled() {
            Some("cancelled")
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some("deadline exceeded")
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

struct CheckSpec {
    name: &'static str,
    weight: f64,
    critical: bool,
    run: fn(&dyn DeviceEnvironment) -> (bool, Option<String>),
}

const CHECKS: [CheckSpec; 5] = [
    CheckSpec {
        name: "tamper_detection",
        weight: 0.35,
        critical: true,
        run: check_tamper,
    },
    CheckSpec {
        name: "debugger_detection",
        weight: 0.20,
        critical: false,
        run: check_debugger,
    },
    CheckSpec {
        name: "key_store_integrity",
        weight: 0.30,
        critical: true,
        run: check_key_store,
    },
    CheckSpec {
        name: "emulator_detection",
        weight: 0.10,
        critical: false,
        run: check_emulator,
    },
    CheckSpec {
        name: "hardware_keystore",
        weight: 0.05,
        critical: false,
        run: check_hardware_keystore,
    },
];

fn check_tamper(env: &dyn DeviceEnvironment) -> (bool, Option<String>) {
    let indicators = env.tamper_indicators();
    if indicators.is_empty() {
        (true, None)
    } else {
        (false, Some(indicators.join("; ")))
    }
}

fn check_debugger(env: &dyn DeviceEnvironment) -> (bool, Option<String>) {
    flag(!env.debugger_attached(), "debugger attached")
}

fn check_key_store(env: &dyn DeviceEnvironment) -> (bool, Option<String>) {
    flag(env.key_store_intact(), "signing key store unusable")
}

fn check_emulator(env: &dyn DeviceEnvironment) -> (bool, Option<String>) {
    flag(!env.is_emulator(), "running under emulation")
}

fn check_hardware_keystore(env: &dyn DeviceEnvironment) -> (bool, Option<String>) {
    flag(env.hardware_keystore_available(), "no hardware key store")
}

fn flag(passed: bool, failure: &str) -> (bool, Option<String>) {
    (passed, (!passed).then(|| failure.to_string()))
}

/// Gates trust decisions on device posture.
pub struct SecurityValidator {
    env: Arc<dyn DeviceEnvironment>,
    thresholds: SecurityThresholds,
}

impl std::fmt::Debug for SecurityValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityValidator")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl SecurityValidator {
    pub fn new(env: Arc<dyn DeviceEnvironment>) -> Self {
        Self::with_thresholds(env, SecurityThresholds::default())
    }

    pub fn with_thresholds(env: Arc<dyn DeviceEnvironment>, thresholds: SecurityThresholds) -> Self {
        Self { env, thresholds }
    }

    pub fn thresholds(&self) -> SecurityThresholds {
        self.thresholds
    }

    /// Run every check and classify the device.
    pub fn validate_device_security(&self, ctx: &CheckContext) -> SecurityPosture {
        let started = Instant::now();
        let env = self.env.as_ref();

        let checks: Vec<SecurityCheck> = CHECKS
            .iter()
            .map(|spec| {
                let (passed, detail) = match ctx.stop_reason() {
                    Some(reason) => {
                        tracing::debug!(check = spec.name, reason, "security check skipped");
                        (false, Some(format!("not evaluated ({reason})")))
                    }
                    None => (spec.run)(env),
                };
                SecurityCheck {
                    name: spec.name.to_string(),
                    passed,
                    weight: spec.weight,
                    critical: spec.critical,
                    detail,
                }
            })
            .collect();

        let (overall_score, security_level) = self.classify(&checks);
        for check in checks.iter().filter(|c| !c.passed) {
            tracing::warn!(
                check = %check.name,
                critical = check.critical,
                detail = check.detail.as_deref().unwrap_or(""),
                "security check failed"
            );
        }
        tracing::info!(level = %security_level, score = overall_score, "device posture evaluated");

        SecurityPosture {
            security_level,
            checks,
            overall_score,
            validation_time: started.elapsed().max(Duration::from_nanos(1)),
        }
    }

    fn classify(&self, checks: &[SecurityCheck]) -> (f64, SecurityLevel) {
        let total: f64 = checks.iter().map(|c| c.weight).sum();
        let passed: f64 = checks.iter().filter(|c| c.passed).map(|c| c.weight).sum();
        let score = if total > 0.0 {
            (passed / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let level = if checks.iter().any(|c| c.critical && !c.passed) {
            SecurityLevel::Compromised
        } else if score >= self.thresholds.trusted {
            SecurityLevel::Trusted
        } else if score >= self.thresholds.degraded {
            SecurityLevel::Degraded
        } else {
            SecurityLevel::Compromised
        };
        (score, level)
    }

    /// Critical checks only, for hot paths before bundle creation.
    pub fn quick_security_check(&self) -> bool {
        let tamper_free = self.env.tamper_indicators().is_empty();
        tamper_free && self.env.key_store_intact()
    }

    /// Like [`quick_security_check`](Self::quick_security_check) but typed
    /// for propagation.
    pub fn require_quick_check(&self) -> Result<(), AttestError> {
        if self.quick_security_check() {
            Ok(())
        } else {
            tracing::warn!("quick security check failed");
            Err(AttestError::DeviceCompromised(
                "tamper indicators present or signing key store unusable".into(),
            ))
        }
    }

    /// Combine an attestation's own validity with current device posture.
    pub fn validate_attestation(
        &self,
        attestation: &dyn Attestation,
        ctx: &CheckContext,
    ) -> BundleValidation {
        let is_valid = attestation.verify();
        let posture = self.validate_device_security(ctx);

        let recommended_action = if !is_valid {
            VerificationDecision::Reject
        } else {
            match posture.security_level {
                SecurityLevel::Trusted => VerificationDecision::Accept,
                SecurityLevel::Degraded => VerificationDecision::Warn,
                SecurityLevel::Compromised => VerificationDecision::Reject,
            }
        };

        if recommended_action == VerificationDecision::Reject {
            metrics::counter!("attest_bundle_rejections_total", "kind" => attestation.kind().to_string())
                .increment(1);
            tracing::warn!(
                kind = %attestation.kind(),
                bundle_valid = is_valid,
                level = %posture.security_level,
                "bundle rejected by security gate"
            );
        }

        BundleValidation {
            is_valid,
            recommended_action,
            posture,
        }
    }

    pub fn validate_verification_bundle(
        &self,
        bundle: &VerificationBundle,
        ctx: &CheckContext,
    ) -> BundleValidation {
        self.validate_attestation(bundle, ctx)
    }

    pub fn validate_batch_bundle(
        &self,
        bundle: &BatchVerificationBundle,
        ctx: &CheckContext,
    ) -> BundleValidation {
        self.validate_attestation(bundle, ctx)
    }
}
