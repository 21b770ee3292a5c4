// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shroud_core::{NodeId, PublicKey};
use tokio::sync::RwLock;
use tracing::debug;

/// Table of overlay nodes known to us.
///
/// Usually populated by a peer-discovery process, which is an opaque
/// collaborator of this crate: anything that delivers node ids with
/// addresses and keeps refreshing them is acceptable. The path builder reads
/// the live subset; the forwarder resolves next-hop addresses; the relay
/// looks up sender verification keys.
#[derive(Debug, Clone)]
pub struct NodeTable {
    inner: Arc<RwLock<NodeTableInner>>,
}

#[derive(Debug)]
struct NodeTableInner {
    entries: HashMap<NodeId, NodeEntry>,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    address: String,
    verifying_key: Option<PublicKey>,
    relaying: bool,
    last_seen: Instant,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTable {
    /// Return an empty node table.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(NodeTableInner {
                entries: HashMap::new(),
            })),
        }
    }

    /// Add or refresh a node entry. The node is marked as seen now.
    pub async fn insert(
        &self,
        node_id: NodeId,
        address: String,
        verifying_key: Option<PublicKey>,
    ) {
        let mut inner = self.inner.write().await;
        inner.entries.insert(
            node_id,
            NodeEntry {
                address,
                verifying_key,
                relaying: true,
                last_seen: Instant::now(),
            },
        );
    }

    /// Refresh the last-seen time of a node. Returns `false` for unknown
    /// nodes.
    pub async fn touch(&self, node_id: &NodeId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entries.get_mut(node_id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Mark whether a node is willing to relay for others.
    pub async fn set_relaying(&self, node_id: &NodeId, relaying: bool) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entries.get_mut(node_id) {
            Some(entry) => {
                entry.relaying = relaying;
                true
            }
            None => false,
        }
    }

    /// Remove a node entry. Returns `true` if it existed.
    pub async fn remove(&self, node_id: &NodeId) -> bool {
        let mut inner = self.inner.write().await;
        inner.entries.remove(node_id).is_some()
    }

    /// Ids of all relaying nodes seen within the freshness window.
    pub async fn live_nodes(&self, window: Duration) -> Vec<NodeId> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.relaying && entry.last_seen.elapsed() <= window)
            .map(|(node_id, _)| *node_id)
            .collect()
    }

    /// Transport address of a node, if known.
    pub async fn address_of(&self, node_id: &NodeId) -> Option<String> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(node_id)
            .map(|entry| entry.address.clone())
    }

    /// Identity verification key of a node, if known.
    pub async fn verifying_key_of(&self, node_id: &NodeId) -> Option<PublicKey> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(node_id)
            .and_then(|entry| entry.verifying_key)
    }

    /// Drop all entries not seen for longer than `cutoff`. Returns the
    /// number of removed entries.
    pub async fn prune_older_than(&self, cutoff: Duration) -> usize {
        let mut inner = self.inner.write().await;
        let stale: Vec<NodeId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() > cutoff)
            .map(|(node_id, _)| *node_id)
            .collect();

        for node_id in &stale {
            inner.entries.remove(node_id);
            debug!(node = %node_id, "pruned stale node entry");
        }
        stale.len()
    }

    /// Number of known nodes, live or not.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
