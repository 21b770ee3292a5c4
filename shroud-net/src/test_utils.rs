// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for tests: an in-memory transport wiring node addresses to
//! channels.
use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::warn;

use crate::transport::Transport;

/// In-memory transport: every registered address owns a bounded inbox.
///
/// Sends to unregistered addresses or full inboxes are dropped, mirroring
/// the fire-and-forget contract of real transports.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inboxes: Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for MemoryTransport {
    fn listen(&self, address: &str) -> mpsc::Receiver<Vec<u8>> {
        let (inbox_tx, inbox_rx) = mpsc::channel(1024);
        self.inboxes
            .lock()
            .expect("memory transport lock")
            .insert(address.to_string(), inbox_tx);
        inbox_rx
    }

    fn send(&self, address: &str, bytes: Vec<u8>) {
        let inboxes = self.inboxes.lock().expect("memory transport lock");
        match inboxes.get(address) {
            Some(inbox) => {
                if inbox.try_send(bytes).is_err() {
                    warn!(%address, "memory transport inbox full or closed, dropping packet");
                }
            }
            None => {
                warn!(%address, "no listener at address, dropping packet");
            }
        }
    }
}
