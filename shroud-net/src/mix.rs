// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch-and-delay mixing of relayed packets.
//!
//! A mix node owns a bounded input queue and two cooperative activities. The
//! *batch former* wakes on a fixed tick, takes up to a batch worth of
//! packets from the queue head and releases them in a cryptographically
//! shuffled order. The *delayer* holds each released packet for an
//! independent random time before it appears on the output channel.
//!
//! The shuffle destroys arrival-order correlation within a batch; the random
//! delay destroys timing correlation across batches. Either alone leaves a
//! linkability channel, so both run on every packet. Callers must not assume
//! any ordering between enqueue and output.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shroud_core::NodeId;
use shroud_encryption::{Rng, RngError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ConfigError, MixConfig};

/// A packet travelling through the mix stage.
///
/// The next-hop id rides alongside the opaque bytes, outside both the
/// shuffle and the encrypted content, so shuffling batches never loses
/// routing information.
#[derive(Clone, Debug)]
pub struct MixPacket {
    pub next_hop: NodeId,
    pub bytes: Vec<u8>,
}

/// Handle to a running mix node.
///
/// Cheap to clone; all clones feed the same queue. Reading the output
/// channel returned by [`spawn`](MixNode::spawn) is the only way to observe
/// processed packets.
#[derive(Clone, Debug)]
pub struct MixNode {
    node_id: NodeId,
    config: MixConfig,
    queue: Arc<Mutex<VecDeque<MixPacket>>>,
    cancel: CancellationToken,
}

impl MixNode {
    /// Start the batch former and delayer activities and return the handle
    /// together with the output channel.
    pub fn spawn(
        node_id: NodeId,
        config: MixConfig,
        rng: Arc<Rng>,
    ) -> Result<(Self, mpsc::Receiver<MixPacket>), MixError> {
        config.validate()?;

        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(config.queue_capacity)));
        let (processing_tx, processing_rx) = mpsc::channel(config.queue_capacity);
        let (output_tx, output_rx) = mpsc::channel(config.queue_capacity);
        let cancel = CancellationToken::new();

        tokio::spawn(batch_former(
            node_id,
            config.clone(),
            queue.clone(),
            rng.clone(),
            processing_tx,
            cancel.clone(),
        ));
        tokio::spawn(delayer(
            config.clone(),
            rng,
            processing_rx,
            output_tx,
            cancel.clone(),
        ));

        let node = Self {
            node_id,
            config,
            queue,
            cancel,
        };
        Ok((node, output_rx))
    }

    /// Append a packet to the input queue.
    ///
    /// Returns immediately; the packet surfaces on the output channel after
    /// batching, shuffling and its random delay.
    pub fn enqueue(&self, packet: MixPacket) -> Result<(), MixError> {
        let mut queue = self.queue.lock().map_err(|_| MixError::LockPoisoned)?;
        if queue.len() >= self.config.queue_capacity {
            return Err(MixError::QueueFull(self.config.queue_capacity));
        }
        queue.push_back(packet);
        Ok(())
    }

    /// Number of packets waiting in the input queue.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Snapshot of the node's configuration and queue state.
    pub fn stats(&self) -> MixStats {
        MixStats {
            queue_len: self.queue_len(),
            queue_capacity: self.config.queue_capacity,
            batch_size: self.config.batch_size,
            min_delay: self.config.min_delay,
            max_delay: self.config.max_delay,
        }
    }

    /// Stop both activities. Packets that have not finished their delay are
    /// discarded; shutdown is best-effort fast, not a graceful drain.
    pub fn shutdown(&self) {
        debug!(node = %self.node_id, "stopping mix node");
        self.cancel.cancel();
    }
}

/// Point-in-time view of a mix node.
#[derive(Clone, Copy, Debug)]
pub struct MixStats {
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

/// Takes a batch from the queue head on every tick, shuffles it and pushes
/// it into the processing channel.
async fn batch_former(
    node_id: NodeId,
    config: MixConfig,
    queue: Arc<Mutex<VecDeque<MixPacket>>>,
    rng: Arc<Rng>,
    processing_tx: mpsc::Sender<MixPacket>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(config.batch_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }

        let batch: Vec<MixPacket> = {
            let Ok(mut queue) = queue.lock() else {
                warn!(node = %node_id, "mix queue lock poisoned, stopping batch former");
                break;
            };
            let take = config.batch_size.min(queue.len());
            queue.drain(..take).collect()
        };
        if batch.is_empty() {
            continue;
        }

        let batch = match shuffled(&batch, &rng) {
            Ok(shuffled) => shuffled,
            Err(err) => {
                // Correctness-safe, anonymity-degraded: keep the packets
                // moving in arrival order.
                warn!(node = %node_id, "batch shuffle failed, passing through: {err}");
                batch
            }
        };

        for packet in batch {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = processing_tx.send(packet) => {
                    if result.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Holds each packet for an independent random delay, then emits it.
async fn delayer(
    config: MixConfig,
    rng: Arc<Rng>,
    mut processing_rx: mpsc::Receiver<MixPacket>,
    output_tx: mpsc::Sender<MixPacket>,
    cancel: CancellationToken,
) {
    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            received = processing_rx.recv() => match received {
                Some(packet) => packet,
                None => break,
            },
        };

        let delay = match sample_delay(&rng, config.min_delay, config.max_delay) {
            Ok(delay) => delay,
            Err(err) => {
                warn!("delay sampling failed, using minimum delay: {err}");
                config.min_delay
            }
        };

        let output_tx = output_tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = output_tx.send(packet).await;
                }
            }
        });
    }
}

/// Fisher–Yates shuffle over a copy of the batch, driven by the CSPRNG.
fn shuffled(batch: &[MixPacket], rng: &Rng) -> Result<Vec<MixPacket>, RngError> {
    let mut shuffled: Vec<MixPacket> = batch.to_vec();
    for index in (1..shuffled.len()).rev() {
        let swap_with = rng.random_bounded((index + 1) as u64)? as usize;
        shuffled.swap(index, swap_with);
    }
    Ok(shuffled)
}

/// Uniform random delay from the inclusive `[min, max]` range.
fn sample_delay(rng: &Rng, min: Duration, max: Duration) -> Result<Duration, RngError> {
    if min == max {
        return Ok(min);
    }
    let span = (max - min).as_millis() as u64;
    let offset = rng.random_bounded(span + 1)?;
    Ok(min + Duration::from_millis(offset))
}

#[derive(Debug, Error)]
pub enum MixError {
    /// The input queue is at capacity; callers may shed or retry with
    /// backoff.
    #[error("mix queue is full at {0} packets")]
    QueueFull(usize),

    #[error("mix queue lock is poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
