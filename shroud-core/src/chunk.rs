// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fragmentation of oversized payloads and their reassembly at the
//! destination.
//!
//! Payloads larger than the chunk size are split into numbered chunks which
//! travel independently, each inside its own envelope, possibly along
//! different paths and in any order. The [`ChunkAssembler`] on the receiving
//! side collects them per message id and hands back the original bytes once
//! every sequence number has arrived.
//!
//! Partially assembled messages are purged after a TTL measured from the
//! arrival of their first chunk, bounding the memory a peer can bind on us
//! by sending incomplete messages.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The length of a message id in bytes.
pub const MESSAGE_ID_LEN: usize = 16;

/// How long a partially assembled message is retained before being purged.
pub const DEFAULT_ASSEMBLY_TTL: Duration = Duration::from_secs(5 * 60);

/// Random identifier tying the chunks of one message together.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(#[serde(with = "serde_bytes")] [u8; MESSAGE_ID_LEN]);

impl MessageId {
    /// Generate a fresh random message id.
    pub fn random() -> Result<Self, ChunkError> {
        let mut bytes = [0u8; MESSAGE_ID_LEN];
        getrandom::fill(&mut bytes).map_err(|_| ChunkError::NotEnoughRandomness)?;
        Ok(Self(bytes))
    }

    /// Create a `MessageId` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; MESSAGE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Bytes of the message id.
    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_LEN] {
        &self.0
    }

    /// Convert the message id to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for MessageId {
    type Err = ChunkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(value).map_err(|_| ChunkError::InvalidMessageId)?;
        let checked: [u8; MESSAGE_ID_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChunkError::InvalidMessageId)?;
        Ok(Self(checked))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageId").field(&self.to_hex()).finish()
    }
}

/// One fragment of a larger message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier of the complete message.
    pub message_id: MessageId,

    /// Position of this chunk, starting at 0.
    pub seq: u32,

    /// Total number of chunks of the message.
    pub total: u32,

    /// Fragment bytes; only the final chunk may be shorter than the chunk
    /// size.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl Chunk {
    /// Check structural validity of a single chunk.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.total == 0 {
            return Err(ChunkError::ZeroTotal);
        }
        if self.seq >= self.total {
            return Err(ChunkError::SequenceOutOfRange(self.seq, self.total));
        }
        if self.data.is_empty() {
            return Err(ChunkError::EmptyData);
        }
        Ok(())
    }
}

/// Split a payload into chunks of at most `chunk_size` bytes.
///
/// Yields ⌈len / chunk_size⌉ chunks with consecutive sequence numbers
/// starting at 0; the final chunk carries the remainder.
pub fn split_message(
    message_id: MessageId,
    data: &[u8],
    chunk_size: usize,
) -> Result<Vec<Chunk>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    if data.is_empty() {
        return Err(ChunkError::EmptyData);
    }

    let total = data.len().div_ceil(chunk_size);
    let total: u32 = total.try_into().map_err(|_| ChunkError::TooManyChunks)?;

    let chunks = data
        .chunks(chunk_size)
        .enumerate()
        .map(|(seq, fragment)| Chunk {
            message_id,
            seq: seq as u32,
            total,
            data: fragment.to_vec(),
        })
        .collect();

    Ok(chunks)
}

struct PartialMessage {
    total: u32,
    chunks: HashMap<u32, Vec<u8>>,
    first_seen: Instant,
}

/// Collects chunks per message id and reassembles complete messages.
///
/// Adding the same sequence number twice is an idempotent overwrite, so
/// duplicated deliveries are harmless. Chunks claiming a different total than
/// the ones already held for the same message are rejected.
pub struct ChunkAssembler {
    ttl: Duration,
    partial: HashMap<MessageId, PartialMessage>,
}

impl Default for ChunkAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_ASSEMBLY_TTL)
    }
}

impl ChunkAssembler {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            partial: HashMap::new(),
        }
    }

    /// Store a chunk, after validating it.
    ///
    /// Expired partial messages are purged on every insert to keep memory
    /// bounded; callers interested in which messages timed out use
    /// [`purge_expired`](Self::purge_expired) instead.
    pub fn add(&mut self, chunk: Chunk) -> Result<(), ChunkError> {
        chunk.validate()?;

        for message_id in self.purge_expired() {
            debug!(%message_id, "purged incomplete message after ttl");
        }

        let entry = self
            .partial
            .entry(chunk.message_id)
            .or_insert_with(|| PartialMessage {
                total: chunk.total,
                chunks: HashMap::new(),
                first_seen: Instant::now(),
            });

        if entry.total != chunk.total {
            return Err(ChunkError::TotalMismatch(entry.total, chunk.total));
        }

        entry.chunks.insert(chunk.seq, chunk.data);
        Ok(())
    }

    /// True iff every sequence number 0..total-1 of the message has arrived.
    pub fn is_complete(&self, message_id: &MessageId) -> bool {
        match self.partial.get(message_id) {
            // Stored sequence numbers are distinct and all below `total`, so
            // a full count means the set is exactly 0..total-1.
            Some(entry) => entry.chunks.len() as u32 == entry.total,
            None => false,
        }
    }

    /// Concatenate all chunks of a complete message in sequence order and
    /// drop the assembler entry.
    pub fn assemble(&mut self, message_id: &MessageId) -> Result<Vec<u8>, ChunkError> {
        if !self.is_complete(message_id) {
            return Err(ChunkError::Incomplete);
        }

        // Completeness was just checked.
        let mut entry = self
            .partial
            .remove(message_id)
            .ok_or(ChunkError::Incomplete)?;

        let mut assembled = Vec::new();
        for seq in 0..entry.total {
            let fragment = entry.chunks.remove(&seq).ok_or(ChunkError::Incomplete)?;
            assembled.extend_from_slice(&fragment);
        }

        Ok(assembled)
    }

    /// Drop all partial messages older than the TTL, returning their ids so
    /// callers can notify waiting listeners.
    pub fn purge_expired(&mut self) -> Vec<MessageId> {
        let ttl = self.ttl;
        let expired: Vec<MessageId> = self
            .partial
            .iter()
            .filter(|(_, entry)| entry.first_seen.elapsed() > ttl)
            .map(|(message_id, _)| *message_id)
            .collect();

        for message_id in &expired {
            self.partial.remove(message_id);
        }

        expired
    }

    /// Number of messages currently being assembled.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

#[derive(Debug, Error)]
pub enum ChunkError {
    /// The total chunk count must be positive.
    #[error("total chunks must be positive")]
    ZeroTotal,

    /// The sequence number must be below the total.
    #[error("sequence number {0} out of range for {1} chunks")]
    SequenceOutOfRange(u32, u32),

    /// Chunks never carry empty data.
    #[error("chunk data cannot be empty")]
    EmptyData,

    /// Splitting requires a positive chunk size.
    #[error("chunk size must be positive")]
    ZeroChunkSize,

    /// The payload would need more chunks than the sequence space allows.
    #[error("payload requires too many chunks")]
    TooManyChunks,

    /// The chunk disagrees with its siblings about the total count.
    #[error("chunk claims {1} total chunks, message has {0}")]
    TotalMismatch(u32, u32),

    /// Assembly was requested before all chunks arrived.
    #[error("message is not complete")]
    Incomplete,

    /// Message id string is not 16 hex-encoded bytes.
    #[error("invalid message id")]
    InvalidMessageId,

    /// The system entropy source failed.
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Chunk, ChunkAssembler, ChunkError, MessageId, split_message};

    #[test]
    fn split_counts_and_sequence() {
        let data = b"This is a test message that will be split into chunks";
        let chunks = split_message(MessageId::random().unwrap(), data, 10).unwrap();

        assert_eq!(chunks.len(), 6);
        for (expected_seq, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq, expected_seq as u32);
            assert_eq!(chunk.total, 6);
            assert!(chunk.validate().is_ok());
        }
        // The final chunk carries the remainder.
        assert_eq!(chunks[5].data.len(), data.len() - 50);
    }

    #[test]
    fn split_rejects_bad_input() {
        let message_id = MessageId::random().unwrap();
        assert!(matches!(
            split_message(message_id, b"", 10),
            Err(ChunkError::EmptyData)
        ));
        assert!(matches!(
            split_message(message_id, b"data", 0),
            Err(ChunkError::ZeroChunkSize)
        ));
    }

    #[test]
    fn assemble_in_reverse_order() {
        let data = b"This is a test message that will be split into chunks";
        let message_id = MessageId::random().unwrap();
        let chunks = split_message(message_id, data, 10).unwrap();

        let mut assembler = ChunkAssembler::default();
        for chunk in chunks.into_iter().rev() {
            assembler.add(chunk).unwrap();
        }

        assert!(assembler.is_complete(&message_id));
        assert_eq!(assembler.assemble(&message_id).unwrap(), data);
        // The entry is purged on assembly.
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn order_does_not_matter() {
        let data = b"order independence of chunk reassembly";
        let message_id = MessageId::random().unwrap();
        let chunks = split_message(message_id, data, 7).unwrap();

        // A few hand-picked permutations, including duplicates.
        let orders: [&[usize]; 3] = [
            &[0, 1, 2, 3, 4, 5],
            &[5, 3, 1, 0, 2, 4],
            &[2, 2, 0, 4, 1, 5, 3, 3],
        ];

        for order in orders {
            let mut assembler = ChunkAssembler::default();
            for &index in order {
                assembler.add(chunks[index].clone()).unwrap();
            }
            assert_eq!(assembler.assemble(&message_id).unwrap(), data);
        }
    }

    #[test]
    fn incomplete_message_cannot_be_assembled() {
        let message_id = MessageId::random().unwrap();
        let chunks = split_message(message_id, b"test message", 5).unwrap();

        let mut assembler = ChunkAssembler::default();
        assembler.add(chunks[0].clone()).unwrap();

        assert!(!assembler.is_complete(&message_id));
        assert!(matches!(
            assembler.assemble(&message_id),
            Err(ChunkError::Incomplete)
        ));
    }

    #[test]
    fn total_mismatch_is_rejected() {
        let message_id = MessageId::random().unwrap();
        let chunks = split_message(message_id, b"test message", 5).unwrap();

        let mut assembler = ChunkAssembler::default();
        assembler.add(chunks[0].clone()).unwrap();

        let mut forged = chunks[1].clone();
        forged.total = 7;
        assert!(matches!(
            assembler.add(forged),
            Err(ChunkError::TotalMismatch(3, 7))
        ));
    }

    #[test]
    fn expired_partials_are_purged() {
        let message_id = MessageId::random().unwrap();
        let chunks = split_message(message_id, b"test message", 5).unwrap();

        let mut assembler = ChunkAssembler::new(Duration::ZERO);
        assembler.add(chunks[0].clone()).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        let purged = assembler.purge_expired();
        assert_eq!(purged, vec![message_id]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn invalid_chunks_are_rejected() {
        let message_id = MessageId::random().unwrap();

        let chunk = Chunk {
            message_id,
            seq: 3,
            total: 3,
            data: b"data".to_vec(),
        };
        assert!(matches!(
            chunk.validate(),
            Err(ChunkError::SequenceOutOfRange(3, 3))
        ));

        let chunk = Chunk {
            message_id,
            seq: 0,
            total: 0,
            data: b"data".to_vec(),
        };
        assert!(matches!(chunk.validate(), Err(ChunkError::ZeroTotal)));

        let chunk = Chunk {
            message_id,
            seq: 0,
            total: 1,
            data: Vec::new(),
        };
        assert!(matches!(chunk.validate(), Err(ChunkError::EmptyData)));
    }
}
