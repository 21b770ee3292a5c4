// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random node identifiers.
//!
//! A node id is 20 random bytes, rendered on the wire and in logs as 40
//! lowercase hexadecimal characters.
//!
//! ## Example
//!
//! ```
//! use shroud_core::NodeId;
//!
//! let node_id: NodeId = "63b19e255ba7a8b36b43e5571bcbe6ccbc7b66d1".parse().unwrap();
//! assert_eq!(node_id.to_hex().len(), 40);
//! ```
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The length of a node id in bytes.
pub const NODE_ID_LEN: usize = 20;

/// 20-byte identifier of a node in the overlay.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(#[serde(with = "serde_bytes")] [u8; NODE_ID_LEN]);

impl NodeId {
    /// Generate a fresh random node id from the operating system's entropy
    /// source.
    pub fn random() -> Result<Self, NodeIdError> {
        let mut bytes = [0u8; NODE_ID_LEN];
        getrandom::fill(&mut bytes).map_err(|_| NodeIdError::NotEnoughRandomness)?;
        Ok(Self(bytes))
    }

    /// Create a `NodeId` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Bytes of the node id.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Convert the node id to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(value: [u8; NODE_ID_LEN]) -> Self {
        Self(value)
    }
}

impl From<NodeId> for [u8; NODE_ID_LEN] {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl TryFrom<&[u8]> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();
        let checked_value: [u8; NODE_ID_LEN] = value
            .try_into()
            .map_err(|_| NodeIdError::InvalidLength(value_len, NODE_ID_LEN))?;
        Ok(Self(checked_value))
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.to_hex()).finish()
    }
}

/// Error types for `NodeId` struct.
#[derive(Debug, Error)]
pub enum NodeIdError {
    /// Node id has an invalid length.
    #[error("invalid node id length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Node id string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in node id string")]
    InvalidHexEncoding(#[from] hex::FromHexError),

    /// The system entropy source failed.
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}
