//! # Batch Manager
//!
//! Partitioning of a large message set is a collaborator concern. The core
//! only relies on batches being non-overlapping, ordered, and stable for one
//! run. [`ChunkingBatchManager`] is the reference implementation: it chunks
//! messages in their given order and derives the descriptive metadata the
//! quality score reads.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use attest_core::{BatchId, BatchMetadata, Message, MessageBatch, Score, TimeSpan};

/// Maximum number of keywords recorded per batch.
const KEYWORD_LIMIT: usize = 20;
/// Shortest word counted as a keyword.
const MIN_KEYWORD_CHARS: usize = 4;

/// Partitioning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    /// Upper bound on messages per batch. Zero is treated as one.
    pub target_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            target_batch_size: 1000,
        }
    }
}

/// Splits a full message list into an ordered batch sequence.
pub trait BatchManager: Send + Sync {
    fn create_batches(&self, messages: &[Message], config: &BatchConfig) -> Vec<MessageBatch>;
}

/// Order-preserving fixed-size chunking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkingBatchManager;

impl ChunkingBatchManager {
    pub fn new() -> Self {
        Self
    }
}

impl BatchManager for ChunkingBatchManager {
    fn create_batches(&self, messages: &[Message], config: &BatchConfig) -> Vec<MessageBatch> {
        let size = config.target_batch_size.max(1);
        let total_batches = messages.len().div_ceil(size);

        let batches: Vec<MessageBatch> = messages
            .chunks(size)
            .enumerate()
            .map(|(batch_index, chunk)| MessageBatch {
                id: BatchId::new(),
                batch_index,
                total_batches,
                messages: chunk.to_vec(),
                metadata: batch_metadata(chunk),
            })
            .collect();

        tracing::debug!(
            message_count = messages.len(),
            batch_size = size,
            batch_count = batches.len(),
            "messages partitioned into batches"
        );
        batches
    }
}

/// Descriptive statistics for one chunk of messages.
pub fn batch_metadata(messages: &[Message]) -> BatchMetadata {
    let time_span = messages
        .iter()
        .map(|m| m.timestamp)
        .min()
        .zip(messages.iter().map(|m| m.timestamp).max())
        .map(|(start, end)| TimeSpan { start, end });

    let chars: u64 = messages.iter().map(|m| m.content.chars().count() as u64).sum();

    let sender_diversity = if messages.is_empty() {
        Score(0.0)
    } else {
        let senders: BTreeSet<&str> = messages.iter().map(|m| m.sender.as_str()).collect();
        Score(senders.len() as f64 / messages.len() as f64)
    };

    BatchMetadata {
        message_count: messages.len(),
        time_span,
        estimated_token_count: chars.div_ceil(4),
        sender_diversity,
        keyword_frequency: keyword_frequency(messages),
    }
}

fn keyword_frequency(messages: &[Message]) -> BTreeMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for message in messages {
        for word in message.content.split(|c: char| !c.is_alphabetic()) {
            if word.chars().count() >= MIN_KEYWORD_CHARS {
                *counts.entry(word.to_lowercase()).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    // Highest count first; ties alphabetical so the selection is deterministic.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(KEYWORD_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::{MessageDirection, Timestamp};

    fn msg(i: usize, content: &str, sender: &str) -> Message {
        Message::new(
            content,
            Timestamp::from_epoch_secs(1_760_000_000 + i as i64).unwrap(),
            sender,
            "owner",
            MessageDirection::Incoming,
        )
    }

    fn corpus(n: usize) -> Vec<Message> {
        (0..n).map(|i| msg(i, &format!("message number {i}"), "alice")).collect()
    }

    #[test]
    fn test_chunks_in_order_with_bounded_size() {
        let messages = corpus(2_500);
        let batches =
            ChunkingBatchManager.create_batches(&messages, &BatchConfig { target_batch_size: 1000 });
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].messages.len(), 1000);
        assert_eq!(batches[2].messages.len(), 500);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.batch_index, i);
            assert_eq!(batch.total_batches, 3);
            assert_eq!(batch.metadata.message_count, batch.messages.len());
        }
        let rejoined: Vec<&Message> = batches.iter().flat_map(|b| &b.messages).collect();
        assert!(rejoined.iter().zip(&messages).all(|(a, b)| a.id == b.id));
    }

    #[test]
    fn test_batch_ids_are_distinct() {
        let batches = ChunkingBatchManager.create_batches(&corpus(30), &BatchConfig {
            target_batch_size: 10,
        });
        let ids: BTreeSet<String> = batches.iter().map(|b| b.id.to_string()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_zero_batch_size_treated_as_one() {
        let batches =
            ChunkingBatchManager.create_batches(&corpus(3), &BatchConfig { target_batch_size: 0 });
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        assert!(ChunkingBatchManager.create_batches(&[], &BatchConfig::default()).is_empty());
    }

    #[test]
    fn test_metadata_statistics() {
        let messages = vec![
            msg(10, "Hello there, wonderful wonderful world", "alice"),
            msg(5, "hey", "bob"),
            msg(20, "WONDERFUL news", "alice"),
            msg(15, "ok", "carol"),
        ];
        let meta = batch_metadata(&messages);
        assert_eq!(meta.message_count, 4);
        assert_eq!(meta.sender_diversity, Score(0.75));
        let span = meta.time_span.unwrap();
        assert_eq!(span.duration_secs(), 15);
        assert_eq!(meta.keyword_frequency.get("wonderful"), Some(&3));
        assert_eq!(meta.keyword_frequency.get("hello"), Some(&1));
        assert!(!meta.keyword_frequency.contains_key("hey"));
        let chars: u64 = messages.iter().map(|m| m.content.chars().count() as u64).sum();
        assert_eq!(meta.estimated_token_count, chars.div_ceil(4));
    }

    #[test]
    fn test_keyword_limit() {
        let words: Vec<String> = (0..30).map(|i| format!("word{}", "x".repeat(i + 1))).collect();
        let content = words.join(" ");
        let meta = batch_metadata(&[msg(0, &content, "a")]);
        assert_eq!(meta.keyword_frequency.len(), KEYWORD_LIMIT);
    }
}
