// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selection of relay paths through the live-node set.
//!
//! A path is an ordered, duplicate-free sequence of node ids: the first
//! element is the entry hop, the last the exit before the final recipient.
//! Lengths are drawn uniformly from the configured bounds and the hops
//! themselves are drawn uniformly without replacement, so over many messages
//! every live node carries an equal share of the traffic and no single hop
//! can predict its position in anyone's route.
use std::collections::HashSet;

use shroud_core::NodeId;
use shroud_encryption::{Rng, RngError};
use thiserror::Error;

use crate::config::{ConfigError, PathConfig};

/// Ordered, duplicate-free sequence of relay hops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path(Vec<NodeId>);

impl Path {
    /// Create a path from an ordered list of hops, rejecting empty lists and
    /// duplicates.
    pub fn new(nodes: Vec<NodeId>) -> Result<Self, PathError> {
        if nodes.is_empty() {
            return Err(PathError::Empty);
        }
        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(*node) {
                return Err(PathError::DuplicateNode(*node));
            }
        }
        Ok(Self(nodes))
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The entry hop.
    pub fn first(&self) -> NodeId {
        // Paths are non-empty by construction.
        self.0[0]
    }

    /// The final hop.
    pub fn last(&self) -> NodeId {
        self.0[self.0.len() - 1]
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.0.contains(node_id)
    }

    /// The same hops in opposite order, for return paths.
    pub fn reverse(&self) -> Self {
        let mut nodes = self.0.clone();
        nodes.reverse();
        Self(nodes)
    }

    /// Append a terminal node, typically the final recipient, yielding the
    /// full route a packet travels.
    pub fn with_terminal(&self, node_id: NodeId) -> Result<Self, PathError> {
        if self.contains(&node_id) {
            return Err(PathError::DuplicateNode(node_id));
        }
        let mut nodes = self.0.clone();
        nodes.push(node_id);
        Ok(Self(nodes))
    }
}

/// Draws random paths from a set of live nodes.
#[derive(Clone, Debug)]
pub struct PathBuilder {
    config: PathConfig,
}

impl PathBuilder {
    pub fn new(config: PathConfig) -> Result<Self, PathError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Build one path from `available`, never using nodes in `exclude`.
    ///
    /// The length is drawn uniformly from the configured bounds, capped by
    /// the number of usable nodes; the hops are then drawn without
    /// replacement by rejection sampling over a uniform index.
    pub fn build(
        &self,
        available: &[NodeId],
        exclude: &HashSet<NodeId>,
        rng: &Rng,
    ) -> Result<Path, PathError> {
        let usable: Vec<NodeId> = available
            .iter()
            .filter(|node_id| !exclude.contains(node_id))
            .copied()
            .collect();

        if usable.len() < self.config.min_hops {
            return Err(PathError::InsufficientNodes(
                usable.len(),
                self.config.min_hops,
            ));
        }

        let upper = self.config.max_hops.min(usable.len());
        let span = (upper - self.config.min_hops + 1) as u64;
        let length = self.config.min_hops + rng.random_bounded(span)? as usize;

        let mut selected = Vec::with_capacity(length);
        let mut used = HashSet::with_capacity(length);
        while selected.len() < length {
            let index = rng.random_bounded(usable.len() as u64)? as usize;
            if used.insert(index) {
                selected.push(usable[index]);
            }
        }

        Path::new(selected)
    }

    /// Build `count` independent paths; separate draws may share nodes.
    pub fn build_multiple(
        &self,
        count: usize,
        available: &[NodeId],
        exclude: &HashSet<NodeId>,
        rng: &Rng,
    ) -> Result<Vec<Path>, PathError> {
        if count == 0 {
            return Err(PathError::ZeroCount);
        }
        (0..count)
            .map(|_| self.build(available, exclude, rng))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum PathError {
    /// A path must contain at least one node.
    #[error("path must contain at least one node")]
    Empty,

    /// Paths never visit the same node twice.
    #[error("path contains node {0} twice")]
    DuplicateNode(NodeId),

    /// Not enough live nodes to satisfy the minimum hop count.
    #[error("only {0} usable nodes, need at least {1}")]
    InsufficientNodes(usize, usize),

    /// Asked for zero paths.
    #[error("path count must be positive")]
    ZeroCount,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Rng(#[from] RngError),
}
