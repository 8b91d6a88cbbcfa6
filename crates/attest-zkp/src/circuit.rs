//! # Personality Trait Circuit
//!
//! The logical contract every backend proves, independent of how it is
//! arithmetized:
//!
//! 1. the number of committed messages lies in `[min_messages, max_messages]`;
//! 2. the declared model hash equals the hash of the committed model;
//! 3. every trait lies within its declared public bound;
//! 4. the analysis confidence is at least `min_confidence`.
//!
//! Failing a constraint is not an error. The proof is still produced and
//! verifies as invalid.
//!
//! Public inputs carry the bounds, the message commitment and the model
//! hash. Raw trait values and message content stay in the witness.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use attest_core::{sha256_hex, CanonicalBytes, PersonalityTraits, TraitKind};

use crate::traits::ProofError;

pub const CIRCUIT_NAME: &str = "personality-traits";
pub const CIRCUIT_VERSION: u32 = 1;

/// Constraint identifiers, in evaluation order.
pub const CONSTRAINTS: [&str; 4] = [
    "messageCountInRange",
    "modelHashMatches",
    "traitsWithinBounds",
    "confidenceAboveThreshold",
];

/// Inclusive bound for one value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
}

impl Bound {
    pub const UNIT: Bound = Bound { min: 0.0, max: 1.0 };

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Declared bound for one personality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitRange {
    #[serde(rename = "trait")]
    pub kind: TraitKind,
    pub min: f64,
    pub max: f64,
}

impl TraitRange {
    pub fn bound(&self) -> Bound {
        Bound {
            min: self.min,
            max: self.max,
        }
    }
}

/// Inclusive bounds on the committed message count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBounds {
    pub min: u64,
    pub max: u64,
}

/// Proof-acceptance thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitParams {
    pub min_messages: u64,
    pub max_messages: u64,
    pub min_confidence: f64,
    /// One bound per dimension, in `TraitKind::ALL` order.
    pub trait_ranges: [Bound; 5],
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self {
            min_messages: 50,
            max_messages: 100_000,
            min_confidence: 0.5,
            trait_ranges: [Bound::UNIT; 5],
        }
    }
}

impl CircuitParams {
    /// Reject thresholds no proof could be checked against.
    pub fn validate(&self) -> Result<(), ProofError> {
        if self.min_messages > self.max_messages {
            return Err(ProofError::CircuitError(format!(
                "min_messages {} exceeds max_messages {}",
                self.min_messages, self.max_messages
            )));
        }
        if !self.min_confidence.is_finite() {
            return Err(ProofError::CircuitError("min_confidence must be finite".into()));
        }
        for (kind, bound) in TraitKind::ALL.iter().zip(&self.trait_ranges) {
            if !bound.is_well_formed() {
                return Err(ProofError::CircuitError(format!(
                    "trait range for {} is malformed: [{}, {}]",
                    kind.as_str(),
                    bound.min,
                    bound.max
                )));
            }
        }
        Ok(())
    }

    pub fn trait_ranges(&self) -> Vec<TraitRange> {
        TraitKind::ALL
            .iter()
            .zip(&self.trait_ranges)
            .map(|(kind, bound)| TraitRange {
                kind: *kind,
                min: bound.min,
                max: bound.max,
            })
            .collect()
    }
}

/// Public inputs of a personality proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicInputs {
    pub trait_ranges: Vec<TraitRange>,
    /// Privacy-preserving hash of the committed message set.
    pub message_commitment: String,
    /// Model hash declared by the caller.
    pub model_hash: String,
    pub min_confidence: f64,
    pub message_bounds: MessageBounds,
}

/// What a verifier checks a proof against.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub circuit_hash: String,
    pub public_inputs: PublicInputs,
}

/// Identity of the circuit definition. Changes whenever the version or the
/// constraint set changes.
pub fn circuit_hash() -> Result<String, ProofError> {
    let definition = serde_json::json!({
        "name": CIRCUIT_NAME,
        "version": CIRCUIT_VERSION,
        "constraints": CONSTRAINTS,
    });
    let bytes = CanonicalBytes::from_value(definition)
        .map_err(|e| ProofError::CircuitError(format!("circuit definition: {e}")))?;
    Ok(sha256_hex(&bytes))
}

/// Private inputs. Never serialized into a proof.
pub struct Witness {
    pub traits: PersonalityTraits,
    pub message_count: u64,
    /// Hash of the model weights actually used for the analysis.
    pub committed_model_hash: String,
}

impl Witness {
    /// Canonical trait bytes, wiped on drop.
    pub(crate) fn trait_bytes(&self) -> Result<Zeroizing<Vec<u8>>, ProofError> {
        CanonicalBytes::new(&self.traits)
            .map(|b| Zeroizing::new(b.into_bytes()))
            .map_err(|e| ProofError::WitnessError(format!("trait canonicalization: {e}")))
    }
}

impl std::fmt::Debug for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Witness")
            .field("message_count", &self.message_count)
            .finish_non_exhaustive()
    }
}

/// Outcome of each constraint for one witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintResults {
    pub message_count: bool,
    pub model_hash: bool,
    pub trait_bounds: bool,
    pub confidence: bool,
}

impl ConstraintResults {
    pub fn all_satisfied(&self) -> bool {
        self.message_count && self.model_hash && self.trait_bounds && self.confidence
    }

    /// One bit per constraint, in `CONSTRAINTS` order.
    pub fn bits(&self) -> u8 {
        [self.message_count, self.model_hash, self.trait_bounds, self.confidence]
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, set)| acc | (u8::from(*set) << i))
    }

    /// Names of the constraints that do not hold.
    pub fn unsatisfied(&self) -> Vec<&'static str> {
        [self.message_count, self.model_hash, self.trait_bounds, self.confidence]
            .iter()
            .zip(CONSTRAINTS)
            .filter(|(set, _)| !**set)
            .map(|(_, name)| name)
            .collect()
    }
}

/// A fully specified proving task.
#[derive(Debug)]
pub struct PersonalityCircuit {
    pub circuit_hash: String,
    pub public_inputs: PublicInputs,
    pub witness: Witness,
}

impl PersonalityCircuit {
    /// Evaluate every constraint against the witness.
    pub fn evaluate(&self) -> ConstraintResults {
        let inputs = &self.public_inputs;
        let w = &self.witness;

        let trait_bounds = inputs.trait_ranges.len() == TraitKind::ALL.len()
            && inputs
                .trait_ranges
                .iter()
                .all(|range| range.bound().contains(w.traits.get(range.kind).value()));

        let confidence = w.traits.confidence.value();
        ConstraintResults {
            message_count: (inputs.message_bounds.min..=inputs.message_bounds.max)
                .contains(&w.message_count),
            model_hash: !inputs.model_hash.is_empty()
                && inputs.model_hash == w.committed_model_hash,
            trait_bounds,
            confidence: confidence.is_finite() && confidence >= inputs.min_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::Score;

    fn traits() -> PersonalityTraits {
        PersonalityTraits {
            openness: Score(0.6),
            conscientiousness: Score(0.5),
            extraversion: Score(0.4),
            agreeableness: Score(0.7),
            neuroticism: Score(0.2),
            confidence: Score(0.8),
        }
    }

    fn circuit(count: u64, declared: &str, committed: &str, traits: PersonalityTraits) -> PersonalityCircuit {
        let params = CircuitParams::default();
        PersonalityCircuit {
            circuit_hash: circuit_hash().unwrap(),
            public_inputs: PublicInputs {
                trait_ranges: params.trait_ranges(),
                message_commitment: "00".repeat(32),
                model_hash: declared.into(),
                min_confidence: params.min_confidence,
                message_bounds: MessageBounds {
                    min: params.min_messages,
                    max: params.max_messages,
                },
            },
            witness: Witness {
                traits,
                message_count: count,
                committed_model_hash: committed.into(),
            },
        }
    }

    #[test]
    fn circuit_hash_is_stable() {
        assert_eq!(circuit_hash().unwrap(), circuit_hash().unwrap());
        assert_eq!(circuit_hash().unwrap().len(), 64);
    }

    #[test]
    fn all_constraints_hold() {
        let r = circuit(100, "m1", "m1", traits()).evaluate();
        assert!(r.all_satisfied());
        assert_eq!(r.bits(), 0b1111);
        assert!(r.unsatisfied().is_empty());
    }

    #[test]
    fn message_count_bounds_are_inclusive() {
        assert!(circuit(50, "m1", "m1", traits()).evaluate().message_count);
        assert!(circuit(100_000, "m1", "m1", traits()).evaluate().message_count);
        assert!(!circuit(49, "m1", "m1", traits()).evaluate().message_count);
        assert!(!circuit(100_001, "m1", "m1", traits()).evaluate().message_count);
    }

    #[test]
    fn model_mismatch_fails() {
        let r = circuit(100, "m1", "m2", traits()).evaluate();
        assert!(!r.model_hash);
        assert_eq!(r.unsatisfied(), vec!["modelHashMatches"]);
    }

    #[test]
    fn trait_out_of_bounds_fails() {
        let mut t = traits();
        t.neuroticism = Score(1.2);
        assert!(!circuit(100, "m1", "m1", t.clone()).evaluate().trait_bounds);
        t.neuroticism = Score(f64::NAN);
        assert!(!circuit(100, "m1", "m1", t).evaluate().trait_bounds);
    }

    #[test]
    fn low_confidence_fails() {
        let mut t = traits();
        t.confidence = Score(0.49);
        let r = circuit(100, "m1", "m1", t).evaluate();
        assert!(!r.confidence);
        assert_eq!(r.bits(), 0b0111);
    }

    #[test]
    fn malformed_params_rejected() {
        let mut p = CircuitParams::default();
        p.trait_ranges[2] = Bound { min: 0.9, max: 0.1 };
        assert!(matches!(p.validate(), Err(ProofError::CircuitError(_))));
        let p = CircuitParams {
            min_messages: 10,
            max_messages: 5,
            ..CircuitParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn witness_debug_hides_traits() {
        let c = circuit(100, "m1", "m1", traits());
        let debug = format!("{:?}", c.witness);
        assert!(!debug.contains("0.6"));
    }
}
