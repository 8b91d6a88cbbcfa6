//! # Data Model
//!
//! The externally supplied payloads that bundles attest to. This crate never
//! computes trait values or partitions messages; it only gives those
//! payloads one typed, canonically serializable shape.
//!
//! Wire names are camelCase to match the upload format.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::{BatchId, MessageId};
use crate::temporal::Timestamp;

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// A scalar that is expected to lie in `[0, 1]`.
///
/// Construction never clamps or rejects: out-of-range and non-finite values
/// are representable so that they can be hashed faithfully and reported as
/// invalid by [`Score::is_bounded`].
///
/// Finite values serialize as JSON numbers. Non-finite values serialize as
/// the strings `"NaN"`, `"Infinity"`, and `"-Infinity"`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Score(pub f64);

impl Score {
    /// Wrap a raw value.
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// The raw value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the value is finite and within `[0, 1]`.
    pub fn is_bounded(self) -> bool {
        self.0.is_finite() && (0.0..=1.0).contains(&self.0)
    }

    /// The value clamped into `[0, 1]`, with non-finite values mapped to 0.
    pub fn clamped(self) -> f64 {
        if self.0.is_finite() {
            self.0.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else if self.0.is_nan() {
            serializer.serialize_str("NaN")
        } else if self.0 > 0.0 {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreVisitor;

        impl serde::de::Visitor<'_> for ScoreVisitor {
            type Value = Score;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\"")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Score, E> {
                Ok(Score(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Score, E> {
                Ok(Score(v as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Score, E> {
                Ok(Score(v as f64))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Score, E> {
                match v {
                    "NaN" => Ok(Score(f64::NAN)),
                    "Infinity" => Ok(Score(f64::INFINITY)),
                    "-Infinity" => Ok(Score(f64::NEG_INFINITY)),
                    other => Err(E::custom(format!("invalid score string {other:?}"))),
                }
            }
        }

        deserializer.deserialize_any(ScoreVisitor)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Direction of a message relative to the device owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    /// Received by the device owner.
    Incoming,
    /// Sent by the device owner.
    Outgoing,
}

/// One private message. Consumed read-only; only its hash reaches a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Stable message identifier.
    pub id: MessageId,
    /// Message text. The only field the privacy-preserving hash reads.
    pub content: String,
    /// When the message was sent.
    pub timestamp: Timestamp,
    /// Author handle.
    pub sender: String,
    /// Addressee handle.
    pub recipient: String,
    /// Incoming or outgoing, from the owner's side.
    pub direction: MessageDirection,
}

impl Message {
    /// Convenience constructor with a fresh id.
    pub fn new(
        content: impl Into<String>,
        timestamp: Timestamp,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        direction: MessageDirection,
    ) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            timestamp,
            sender: sender.into(),
            recipient: recipient.into(),
            direction,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis result
// ---------------------------------------------------------------------------

/// The five personality dimensions, in their fixed public order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitKind {
    /// Openness to experience.
    Openness,
    /// Conscientiousness.
    Conscientiousness,
    /// Extraversion.
    Extraversion,
    /// Agreeableness.
    Agreeableness,
    /// Neuroticism.
    Neuroticism,
}

impl TraitKind {
    /// All dimensions in public-input order.
    pub const ALL: [TraitKind; 5] = [
        TraitKind::Openness,
        TraitKind::Conscientiousness,
        TraitKind::Extraversion,
        TraitKind::Agreeableness,
        TraitKind::Neuroticism,
    ];

    /// Wire name of the dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openness => "openness",
            Self::Conscientiousness => "conscientiousness",
            Self::Extraversion => "extraversion",
            Self::Agreeableness => "agreeableness",
            Self::Neuroticism => "neuroticism",
        }
    }
}

/// Big Five traits plus the analysis confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityTraits {
    /// Openness to experience.
    pub openness: Score,
    /// Conscientiousness.
    pub conscientiousness: Score,
    /// Extraversion.
    pub extraversion: Score,
    /// Agreeableness.
    pub agreeableness: Score,
    /// Neuroticism.
    pub neuroticism: Score,
    /// Confidence of the analysis as a whole, not a personality dimension.
    pub confidence: Score,
}

impl PersonalityTraits {
    /// Value of one dimension.
    pub fn get(&self, kind: TraitKind) -> Score {
        match kind {
            TraitKind::Openness => self.openness,
            TraitKind::Conscientiousness => self.conscientiousness,
            TraitKind::Extraversion => self.extraversion,
            TraitKind::Agreeableness => self.agreeableness,
            TraitKind::Neuroticism => self.neuroticism,
        }
    }

    /// All five dimensions in public-input order.
    pub fn dimensions(&self) -> [(TraitKind, Score); 5] {
        TraitKind::ALL.map(|k| (k, self.get(k)))
    }

    /// Every dimension and the confidence lie in `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        self.dimensions().iter().all(|(_, s)| s.is_bounded()) && self.confidence.is_bounded()
    }
}

/// Trustworthiness score with its contributing factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustworthinessScore {
    /// Overall score.
    pub score: Score,
    /// Named contributing factors. Ordered so the canonical form is stable.
    pub factors: BTreeMap<String, Score>,
    /// Human-readable rationale. Must not be blank.
    pub explanation: String,
}

impl TrustworthinessScore {
    /// Score and factors bounded, explanation non-blank.
    pub fn is_valid(&self) -> bool {
        self.score.is_bounded()
            && self.factors.values().all(|f| f.is_bounded())
            && !self.explanation.trim().is_empty()
    }
}

/// A completed analysis, treated as an opaque hashable payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Inferred traits.
    pub personality_traits: PersonalityTraits,
    /// Inferred trustworthiness.
    pub trustworthiness_score: TrustworthinessScore,
    /// Messages the analysis consumed.
    pub message_count: u64,
    /// Wall-clock analysis time.
    pub processing_time_ms: u64,
}

impl AnalysisResult {
    /// Internal validity: bounded fields and a non-empty explanation.
    pub fn is_valid(&self) -> bool {
        self.personality_traits.is_valid() && self.trustworthiness_score.is_valid()
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Earliest and latest message timestamp in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSpan {
    /// Earliest timestamp.
    pub start: Timestamp,
    /// Latest timestamp.
    pub end: Timestamp,
}

impl TimeSpan {
    /// Length of the span in seconds.
    pub fn duration_secs(&self) -> i64 {
        self.end.epoch_secs() - self.start.epoch_secs()
    }
}

/// Descriptive statistics the Batch Manager attaches to each batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    /// Messages in the batch.
    pub message_count: usize,
    /// `None` for an empty batch.
    pub time_span: Option<TimeSpan>,
    /// Rough token estimate over all contents.
    pub estimated_token_count: u64,
    /// Distinct senders divided by message count.
    pub sender_diversity: Score,
    /// Most frequent keywords and their counts.
    pub keyword_frequency: BTreeMap<String, u32>,
}

/// A read-only, ordered partition of the full message set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBatch {
    /// Identifier, unique within the run.
    pub id: BatchId,
    /// Zero-based position in the run.
    pub batch_index: usize,
    /// Batches in the run.
    pub total_batches: usize,
    /// The batch's messages, in input order.
    pub messages: Vec<Message>,
    /// Statistics over `messages`.
    pub metadata: BatchMetadata,
}
