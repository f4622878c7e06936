//! Connection registry (§4.11, §11: "owner-held indices" rather than a
//! cyclic client/subscription reference graph). Every connection gets a
//! monotonic id; subscriptions are tracked symbol → connection ids, and
//! fan-out looks senders up by id rather than connections holding
//! references to each other.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use common::Symbol;

use crate::message::ServerFrame;

/// Per-connection outbound queue depth (§4.11: "bounded outbound
/// queue"). A connection whose queue is still full when a new update
/// arrives is closed rather than backpressuring the publisher.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1_024;

/// Tracks live connections and their symbol subscriptions.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    senders: DashMap<u64, mpsc::Sender<ServerFrame>>,
    subscribers: DashMap<Symbol, Vec<u64>>,
}

impl ConnectionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection, returning its id and the receiver end
    /// of its bounded outbound queue.
    pub fn register(&self) -> (u64, mpsc::Receiver<ServerFrame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.senders.insert(id, tx);
        (id, rx)
    }

    /// Drop a connection and every subscription it held.
    pub fn deregister(&self, connection_id: u64) {
        self.senders.remove(&connection_id);
        for mut entry in self.subscribers.iter_mut() {
            entry.value_mut().retain(|id| *id != connection_id);
        }
    }

    /// Add `connection_id` to `symbol`'s subscriber list.
    pub fn subscribe(&self, connection_id: u64, symbol: Symbol) {
        let mut ids = self.subscribers.entry(symbol).or_default();
        if !ids.contains(&connection_id) {
            ids.push(connection_id);
        }
    }

    /// Remove `connection_id` from `symbol`'s subscriber list.
    pub fn unsubscribe(&self, connection_id: u64, symbol: Symbol) {
        if let Some(mut ids) = self.subscribers.get_mut(&symbol) {
            ids.retain(|id| *id != connection_id);
        }
    }

    /// Push `frame` onto every subscriber of `symbol`'s outbound queue.
    /// A connection whose queue is full is dropped from the registry —
    /// its sender is removed, which closes its channel and, via that,
    /// its WebSocket task.
    pub fn publish(&self, symbol: Symbol, frame: &ServerFrame) {
        let Some(ids) = self.subscribers.get(&symbol) else { return };
        let mut to_drop = Vec::new();
        for &id in ids.iter() {
            let Some(sender) = self.senders.get(&id) else { continue };
            if let Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) =
                sender.try_send(clone_frame(frame))
            {
                to_drop.push(id);
            }
        }
        drop(ids);
        for id in to_drop {
            self.deregister(id);
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }
}

fn clone_frame(frame: &ServerFrame) -> ServerFrame {
    match frame {
        ServerFrame::Welcome { connection_id } => ServerFrame::Welcome { connection_id: *connection_id },
        ServerFrame::Success { request } => ServerFrame::Success { request },
        ServerFrame::Error { request, reason } => ServerFrame::Error { request, reason: reason.clone() },
        ServerFrame::Update { data } => ServerFrame::Update { data: *data },
        ServerFrame::Pong => ServerFrame::Pong,
    }
}
