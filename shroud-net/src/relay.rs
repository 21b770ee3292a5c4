// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-hop packet disposition.
//!
//! Every packet arriving at a node is peeled with the node's own layer key.
//! What comes out decides its fate: a `Forward` step goes through the mix
//! stage towards its successor, a `Deliver` step is validated (signature,
//! expiry, replay) and surfaced to the local application.
//!
//! Cryptographic and validation failures are absorbed here: the packet is
//! dropped, a counter ticks, and nothing else happens, so an attacker
//! probing with garbage learns nothing from our behavior. Only capacity
//! problems (a saturated mix queue, a closed delivery channel) travel back
//! to the caller, which may apply backpressure. No failure of one packet
//! ever disturbs another.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shroud_core::{Envelope, EnvelopeError, NodeId, PacketType};
use shroud_encryption::crypto::aead::AeadKey;
use shroud_encryption::{OnionPacket, peel};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::mix::{MixError, MixNode, MixPacket};
use crate::node_table::NodeTable;
use crate::replay::{DEFAULT_REPLAY_CAPACITY, ReplayCache};
use crate::route::RouteStep;
use crate::transport::Transport;

/// An envelope accepted for the local node, handed to the application.
#[derive(Clone, Debug)]
pub struct DeliveredMessage {
    pub sender: NodeId,
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

/// Why a packet was absorbed instead of forwarded or delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Our layer key did not authenticate the outer layer.
    AuthFailure,

    /// The peeled plaintext was not a route step, or the envelope did not
    /// parse or validate.
    Malformed,

    /// The envelope carried no signature.
    Unsigned,

    /// The signature did not verify against the claimed sender.
    BadSignature,

    /// No verification key is known for the claimed sender.
    UnknownSender,

    /// The envelope is older than the replay window.
    Expired,

    /// The `(sender, nonce)` pair was seen before.
    Replayed,

    /// The hop counter reached zero.
    HopLimitExceeded,

    /// A delivery step addressed to somebody else ended up here.
    Misrouted,
}

/// What happened to a processed packet.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The envelope was surfaced on the delivery channel.
    Delivered,

    /// The next layer was enqueued into the mix stage.
    Forwarded { next_hop: NodeId },

    /// The packet was absorbed.
    Dropped(DropReason),
}

/// Drop and throughput counters of one relay.
#[derive(Debug, Default)]
pub struct RelayCounters {
    auth_failures: AtomicU64,
    malformed: AtomicU64,
    unsigned: AtomicU64,
    bad_signatures: AtomicU64,
    unknown_senders: AtomicU64,
    expired: AtomicU64,
    replayed: AtomicU64,
    hop_limit_exceeded: AtomicU64,
    misrouted: AtomicU64,
    forwarded: AtomicU64,
    delivered: AtomicU64,
}

impl RelayCounters {
    fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::AuthFailure => &self.auth_failures,
            DropReason::Malformed => &self.malformed,
            DropReason::Unsigned => &self.unsigned,
            DropReason::BadSignature => &self.bad_signatures,
            DropReason::UnknownSender => &self.unknown_senders,
            DropReason::Expired => &self.expired,
            DropReason::Replayed => &self.replayed,
            DropReason::HopLimitExceeded => &self.hop_limit_exceeded,
            DropReason::Misrouted => &self.misrouted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayCountersSnapshot {
        RelayCountersSnapshot {
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unsigned: self.unsigned.load(Ordering::Relaxed),
            bad_signatures: self.bad_signatures.load(Ordering::Relaxed),
            unknown_senders: self.unknown_senders.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            hop_limit_exceeded: self.hop_limit_exceeded.load(Ordering::Relaxed),
            misrouted: self.misrouted.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayCountersSnapshot {
    pub auth_failures: u64,
    pub malformed: u64,
    pub unsigned: u64,
    pub bad_signatures: u64,
    pub unknown_senders: u64,
    pub expired: u64,
    pub replayed: u64,
    pub hop_limit_exceeded: u64,
    pub misrouted: u64,
    pub forwarded: u64,
    pub delivered: u64,
}

/// Relay state machine of one node.
///
/// The layer key is handed in explicitly from the node's key store; there is
/// no process-wide key registry.
pub struct Relay {
    node_id: NodeId,
    layer_key: AeadKey,
    replay_window: Duration,
    node_table: NodeTable,
    mix: MixNode,
    replay: Mutex<ReplayCache>,
    delivery_tx: mpsc::Sender<DeliveredMessage>,
    counters: RelayCounters,
}

impl Relay {
    pub fn new(
        node_id: NodeId,
        layer_key: AeadKey,
        replay_window: Duration,
        node_table: NodeTable,
        mix: MixNode,
        delivery_tx: mpsc::Sender<DeliveredMessage>,
    ) -> Self {
        Self {
            node_id,
            layer_key,
            replay_window,
            node_table,
            mix,
            replay: Mutex::new(ReplayCache::new(DEFAULT_REPLAY_CAPACITY, replay_window)),
            delivery_tx,
            counters: RelayCounters::default(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn counters(&self) -> &RelayCounters {
        &self.counters
    }

    /// Process one packet received from the wire.
    ///
    /// Validation failures are absorbed into [`RelayOutcome::Dropped`]; only
    /// capacity problems surface as errors.
    pub async fn process(&self, bytes: Vec<u8>) -> Result<RelayOutcome, RelayError> {
        let packet = OnionPacket::from_bytes(bytes);

        let peeled = match peel(&packet, &self.layer_key) {
            Ok(peeled) => peeled,
            Err(_) => {
                // Hostile or misrouted; drop without logging contents.
                return Ok(self.absorb(DropReason::AuthFailure));
            }
        };

        let step = match RouteStep::from_bytes(&peeled) {
            Ok(step) => step,
            Err(_) => return Ok(self.absorb(DropReason::Malformed)),
        };

        match step {
            RouteStep::Forward {
                next_hop,
                hops_left,
                packet,
            } => self.forward(next_hop, hops_left, packet),
            RouteStep::Deliver { envelope } => self.deliver(&envelope).await,
        }
    }

    fn forward(
        &self,
        next_hop: NodeId,
        hops_left: u8,
        packet: OnionPacket,
    ) -> Result<RelayOutcome, RelayError> {
        if hops_left == 0 {
            return Ok(self.absorb(DropReason::HopLimitExceeded));
        }

        self.mix.enqueue(MixPacket {
            next_hop,
            bytes: packet.into_bytes(),
        })?;

        self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
        Ok(RelayOutcome::Forwarded { next_hop })
    }

    async fn deliver(&self, envelope_bytes: &[u8]) -> Result<RelayOutcome, RelayError> {
        let envelope = match Envelope::from_bytes(envelope_bytes) {
            Ok(envelope) => envelope,
            Err(_) => return Ok(self.absorb(DropReason::Malformed)),
        };

        if envelope.validate().is_err() {
            return Ok(self.absorb(DropReason::Malformed));
        }
        if envelope.recipient != self.node_id {
            return Ok(self.absorb(DropReason::Misrouted));
        }

        let Some(verifying_key) = self.node_table.verifying_key_of(&envelope.sender).await else {
            return Ok(self.absorb(DropReason::UnknownSender));
        };
        match envelope.verify(&verifying_key) {
            Ok(()) => {}
            Err(EnvelopeError::Unsigned) => return Ok(self.absorb(DropReason::Unsigned)),
            Err(_) => return Ok(self.absorb(DropReason::BadSignature)),
        }

        if envelope.is_expired(self.replay_window) {
            return Ok(self.absorb(DropReason::Expired));
        }

        {
            let mut replay = self
                .replay
                .lock()
                .map_err(|_| RelayError::ReplayCacheUnavailable)?;
            if !replay.check_and_insert(envelope.sender, envelope.nonce) {
                return Ok(self.absorb(DropReason::Replayed));
            }
        }

        self.delivery_tx
            .send(DeliveredMessage {
                sender: envelope.sender,
                packet_type: envelope.packet_type,
                payload: envelope.payload,
            })
            .await
            .map_err(|_| RelayError::DeliveryClosed)?;

        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(RelayOutcome::Delivered)
    }

    fn absorb(&self, reason: DropReason) -> RelayOutcome {
        self.counters.record_drop(reason);
        debug!(node = %self.node_id, ?reason, "dropped packet");
        RelayOutcome::Dropped(reason)
    }
}

/// Pump the mix output into the transport, resolving next-hop addresses.
///
/// Packets whose next hop has no known address are logged and dropped, as
/// are transport failures inside `send`; fire-and-forget all the way down.
pub fn spawn_forwarder<T>(
    mut output_rx: mpsc::Receiver<MixPacket>,
    node_table: NodeTable,
    transport: Arc<T>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => break,
                received = output_rx.recv() => match received {
                    Some(packet) => packet,
                    None => break,
                },
            };

            match node_table.address_of(&packet.next_hop).await {
                Some(address) => transport.send(&address, packet.bytes),
                None => {
                    warn!(next_hop = %packet.next_hop, "dropping packet for unknown next hop");
                }
            }
        }
    })
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// The local application stopped consuming deliveries.
    #[error("delivery channel closed")]
    DeliveryClosed,

    /// The replay cache lock is poisoned.
    #[error("replay cache unavailable")]
    ReplayCacheUnavailable,

    /// The mix queue pushed back; the caller may retry.
    #[error(transparent)]
    Mix(#[from] MixError),
}
