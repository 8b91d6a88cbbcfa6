//! # Posture Subcommand
//!
//! Reports what the pipeline would see on this host: the full security
//! posture, the quick gate, resource status, the proof decision and the
//! scaled batch size.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use attest_posture::{
    CheckContext, DeviceEnvironment, HostEnvironment, HostMonitor, PerformanceOptimizer,
    SecurityPosture, SecurityValidator, SystemMonitor, SystemStatus, ZkpDecision,
};

use crate::config::AttestConfig;
use crate::keys::load_key_provider;

/// Arguments for `attest posture`.
#[derive(Args, Debug)]
pub struct PostureArgs {
    /// Signing key file (hex seed) used for the key-store probe.
    #[arg(long)]
    pub key: Option<std::path::PathBuf>,
    /// Abandon the security checks after this many ms.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureReport {
    pub posture: SecurityPosture,
    pub quick_check_passed: bool,
    pub system_status: SystemStatus,
    pub zk_decision: ZkpDecision,
    pub optimal_batch_size: usize,
}

pub fn run_posture(args: &PostureArgs, config: &AttestConfig) -> Result<u8> {
    let keys = load_key_provider(args.key.as_deref())?;
    let mut ctx = CheckContext::new();
    if let Some(ms) = args.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let report = build_report(
        Arc::new(HostEnvironment::new(keys)),
        Arc::new(HostMonitor::new()),
        config,
        &ctx,
    );
    crate::write_output(&report, None)?;
    Ok(0)
}

/// Evaluate `env` and `monitor` under `config`.
pub fn build_report(
    env: Arc<dyn DeviceEnvironment>,
    monitor: Arc<dyn SystemMonitor>,
    config: &AttestConfig,
    ctx: &CheckContext,
) -> PostureReport {
    let validator = SecurityValidator::with_thresholds(env, config.security_thresholds());
    let optimizer = PerformanceOptimizer::new(monitor, config.performance_policy());

    PostureReport {
        posture: validator.validate_device_security(ctx),
        quick_check_passed: validator.quick_security_check(),
        system_status: optimizer.get_system_status(),
        zk_decision: optimizer.should_perform_zkp_generation(),
        optimal_batch_size: optimizer
            .calculate_optimal_batch_size(config.batching.target_batch_size),
    }
}
