//! # Configuration
//!
//! `attest.yaml` layout. Every section and field is optional; absent values
//! take the defaults below.
//!
//! ```yaml
//! batching:
//!   target_batch_size: 1000
//!   single_shot_threshold: 1000
//! zk:
//!   min_messages: 50
//!   max_messages: 100000
//!   min_confidence: 0.5
//!   trait_ranges:            # openness, conscientiousness, extraversion,
//!     - { min: 0.0, max: 1.0 } # agreeableness, neuroticism
//!     - { min: 0.0, max: 1.0 }
//!     - { min: 0.0, max: 1.0 }
//!     - { min: 0.0, max: 1.0 }
//!     - { min: 0.0, max: 1.0 }
//!   committed_model_hash: null
//! performance:
//!   min_battery_level: 0.2
//!   min_memory_mb: 2048
//! security:
//!   trusted_threshold: 0.9
//!   degraded_threshold: 0.6
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use attest_core::ModelHash;
use attest_pipeline::PipelineConfig;
use attest_posture::{PerformancePolicy, SecurityThresholds};
use attest_zkp::{Bound, CircuitParams, PersonalityProofGenerator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttestConfig {
    pub batching: BatchingSection,
    pub zk: ZkSection,
    pub performance: PerformanceSection,
    pub security: SecuritySection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchingSection {
    pub target_batch_size: usize,
    pub single_shot_threshold: usize,
}

impl Default for BatchingSection {
    fn default() -> Self {
        Self {
            target_batch_size: 1_000,
            single_shot_threshold: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZkSection {
    pub min_messages: u64,
    pub max_messages: u64,
    pub min_confidence: f64,
    pub trait_ranges: [Bound; 5],
    pub committed_model_hash: Option<String>,
}

impl Default for ZkSection {
    fn default() -> Self {
        let params = CircuitParams::default();
        Self {
            min_messages: params.min_messages,
            max_messages: params.max_messages,
            min_confidence: params.min_confidence,
            trait_ranges: params.trait_ranges,
            committed_model_hash: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerformanceSection {
    pub min_battery_level: f64,
    pub min_memory_mb: u64,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        let policy = PerformancePolicy::default();
        Self {
            min_battery_level: policy.min_battery_level,
            min_memory_mb: policy.min_memory_mb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecuritySection {
    pub trusted_threshold: f64,
    pub degraded_threshold: f64,
}

impl Default for SecuritySection {
    fn default() -> Self {
        let thresholds = SecurityThresholds::default();
        Self {
            trusted_threshold: thresholds.trusted,
            degraded_threshold: thresholds.degraded,
        }
    }
}

impl AttestConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty file parses as YAML null.
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).context("failed to parse YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.security;
        if !(0.0..=1.0).contains(&s.degraded_threshold)
            || !(0.0..=1.0).contains(&s.trusted_threshold)
            || s.degraded_threshold > s.trusted_threshold
        {
            bail!(
                "security thresholds must satisfy 0 <= degraded ({}) <= trusted ({}) <= 1",
                s.degraded_threshold,
                s.trusted_threshold
            );
        }
        let p = &self.performance;
        if !(0.0..=1.0).contains(&p.min_battery_level) {
            bail!("performance.min_battery_level must be in [0, 1], got {}", p.min_battery_level);
        }
        self.circuit_params()
            .validate()
            .map_err(|e| anyhow::anyhow!("zk: {e}"))?;
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            single_shot_threshold: self.batching.single_shot_threshold,
            target_batch_size: self.batching.target_batch_size,
        }
    }

    pub fn circuit_params(&self) -> CircuitParams {
        CircuitParams {
            min_messages: self.zk.min_messages,
            max_messages: self.zk.max_messages,
            min_confidence: self.zk.min_confidence,
            trait_ranges: self.zk.trait_ranges,
        }
    }

    pub fn proof_generator(&self) -> PersonalityProofGenerator {
        let generator = PersonalityProofGenerator::new(self.circuit_params());
        match &self.zk.committed_model_hash {
            Some(hash) => generator.with_committed_model_hash(ModelHash::new(hash.clone())),
            None => generator,
        }
    }

    pub fn performance_policy(&self) -> PerformancePolicy {
        PerformancePolicy {
            min_battery_level: self.performance.min_battery_level,
            min_memory_mb: self.performance.min_memory_mb,
        }
    }

    pub fn security_thresholds(&self) -> SecurityThresholds {
        SecurityThresholds {
            trusted: self.security.trusted_threshold,
            degraded: self.security.degraded_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AttestConfig::default();
        assert_eq!(c.batching.target_batch_size, 1_000);
        assert_eq!(c.batching.single_shot_threshold, 1_000);
        assert_eq!(c.zk.min_messages, 50);
        assert_eq!(c.zk.max_messages, 100_000);
        assert_eq!(c.zk.min_confidence, 0.5);
        assert_eq!(c.performance.min_memory_mb, 2_048);
        assert_eq!(c.security.trusted_threshold, 0.9);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let c = AttestConfig::from_yaml("zk:\n  min_messages: 10\n").unwrap();
        assert_eq!(c.zk.min_messages, 10);
        assert_eq!(c.zk.max_messages, 100_000);
        assert_eq!(c.batching, BatchingSection::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AttestConfig::from_yaml("").unwrap(), AttestConfig::default());
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(AttestConfig::from_yaml("batching:\n  target_size: 5\n").is_err());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let yaml = "security:\n  trusted_threshold: 0.5\n  degraded_threshold: 0.8\n";
        assert!(AttestConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn malformed_trait_range_rejected() {
        let yaml = "zk:\n  trait_ranges:\n    - {min: 0.9, max: 0.1}\n    - {min: 0, max: 1}\n    - {min: 0, max: 1}\n    - {min: 0, max: 1}\n    - {min: 0, max: 1}\n";
        assert!(AttestConfig::from_yaml(yaml).is_err());
    }
}
