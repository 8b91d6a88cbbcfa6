//! # Content Hashing
//!
//! The `hash(bytes) -> hex` primitive and the privacy-preserving hash over an
//! ordered message set.
//!
//! ## Message-set hash construction
//!
//! ```text
//! SHA256( "attest.messages.v1"
//!       || u64be(n)
//!       || for each message, in order: u64be(len(content)) || content )
//! ```
//!
//! Only message content participates. Sender, recipient, identifiers and
//! timestamps never do, so the server can later confirm "this exact input set
//! produced this result" without learning who wrote it. Length prefixes make
//! the encoding injective: moving a byte across a message boundary changes
//! the hash.

use attest_core::{CryptoError, Message, Sha256Accumulator};

const MESSAGE_SET_TAG: &[u8] = b"attest.messages.v1";

/// Hash arbitrary bytes to 64 lowercase hex characters.
pub fn hash_bytes(data: &[u8]) -> String {
    attest_core::sha256_hex_bytes(data)
}

/// Privacy-preserving hash of an ordered message sequence.
///
/// An empty sequence is legal and yields a fixed, well-defined digest.
pub fn privacy_preserving_message_hash(messages: &[Message]) -> String {
    content_hash(messages.iter().map(|m| m.content.as_str()))
}

/// The same construction over bare content strings.
pub fn content_hash<'a>(contents: impl IntoIterator<Item = &'a str>) -> String {
    let contents: Vec<&str> = contents.into_iter().collect();
    let mut acc = message_set_accumulator(contents.len());
    for content in contents {
        acc.update_prefixed(content.as_bytes());
    }
    acc.finalize_hex()
}

fn message_set_accumulator(message_count: usize) -> Sha256Accumulator {
    let mut acc = Sha256Accumulator::new();
    acc.update(MESSAGE_SET_TAG);
    acc.update_u64(message_count as u64);
    acc
}

/// Incremental form of the message-set hash, for callers that need to stop
/// between messages (cancellation checkpoints).
///
/// The count is fixed up front because it is hashed before any content.
#[derive(Debug)]
pub struct MessageSetHasher {
    acc: Sha256Accumulator,
    expected: usize,
    pushed: usize,
}

impl MessageSetHasher {
    /// Start a set of exactly `message_count` messages.
    pub fn new(message_count: usize) -> Self {
        Self {
            acc: message_set_accumulator(message_count),
            expected: message_count,
            pushed: 0,
        }
    }

    /// Append the next message's content.
    pub fn push(&mut self, content: &str) {
        self.acc.update_prefixed(content.as_bytes());
        self.pushed += 1;
    }

    /// Messages pushed so far.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    /// The digest, once exactly the declared number of messages was pushed.
    pub fn finish(self) -> Result<String, CryptoError> {
        if self.pushed != self.expected {
            return Err(CryptoError::DigestError(format!(
                "message set declared {} messages, {} pushed",
                self.expected, self.pushed
            )));
        }
        Ok(self.acc.finalize_hex())
    }
}
