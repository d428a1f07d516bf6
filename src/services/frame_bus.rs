//! Host-side message channel for embedded content frames.
//!
//! Frames post raw JSON messages; each attached listener receives every
//! message published after it attached. A listener detaches when dropped,
//! exactly once, however many messages it saw.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<Value>>>,
    detached: AtomicU64,
}

impl Registry {
    fn detach(&self, id: u64) {
        let removed = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            self.detached.fetch_add(1, Ordering::AcqRel);
            trace!(listener_id = id, "frame listener detached");
        }
    }
}

/// Fan-out bus for frame messages.
#[derive(Debug, Clone, Default)]
pub struct FrameMessageBus {
    registry: Arc<Registry>,
}

impl FrameMessageBus {
    /// Bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new listener.
    pub fn attach(&self) -> FrameListener {
        let id = self.registry.next_id.fetch_add(1, Ordering::AcqRel);
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        trace!(listener_id = id, "frame listener attached");
        FrameListener {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Deliver a message to every attached listener. Returns how many
    /// listeners received it.
    pub fn publish(&self, message: Value) -> usize {
        let listeners = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        listeners
            .values()
            .filter(|tx| tx.send(message.clone()).is_ok())
            .count()
    }

    /// Listeners currently attached.
    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total detaches over the bus lifetime.
    pub fn detached_count(&self) -> u64 {
        self.registry.detached.load(Ordering::Acquire)
    }
}

/// Receiving end of one attachment.
#[derive(Debug)]
pub struct FrameListener {
    id: u64,
    rx: mpsc::UnboundedReceiver<Value>,
    registry: Arc<Registry>,
}

impl FrameListener {
    /// Next message, or `None` once detached.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Registry id of this listener.
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for FrameListener {
    fn drop(&mut self) {
        self.registry.detach(self.id);
    }
}
