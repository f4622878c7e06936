//! Per-symbol callback fan-out (§4.8): a symbol is subscribed once
//! upstream, through a single connector, no matter how many local
//! callbacks register for it; each pushed update is distributed to every
//! registered callback.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use common::market::MarketData;
use common::Symbol;

use crate::error::SourceResult;
use crate::manager::SourceManager;

/// A registered callback. Invoked synchronously from the hub's delivery
/// task; callbacks that need to do async work should hand off to their
/// own task rather than block here.
pub type Callback = Arc<dyn Fn(MarketData) + Send + Sync>;

struct SymbolSubscription {
    callbacks: Vec<(Uuid, Callback)>,
    /// Keeps the upstream subscription's delivery task alive; dropping
    /// this stops the bridge task and, via its drop, ends the upstream
    /// subscription too.
    _bridge: tokio::task::JoinHandle<()>,
}

/// Fans a single upstream subscription per symbol out to any number of
/// local callbacks, backed by a [`SourceManager`]'s active connector.
pub struct SubscriptionHub {
    manager: Arc<SourceManager>,
    subs: DashMap<Symbol, Mutex<SymbolSubscription>>,
}

impl SubscriptionHub {
    /// A hub with no active subscriptions, backed by `manager`.
    #[must_use]
    pub fn new(manager: Arc<SourceManager>) -> Self {
        Self { manager, subs: DashMap::new() }
    }

    /// Register `callback` for `symbol`, subscribing upstream through the
    /// manager's active connector if this is the first callback for that
    /// symbol. Returns an id for later [`Self::unsubscribe`].
    pub async fn subscribe(self: &Arc<Self>, symbol: Symbol, callback: Callback) -> SourceResult<Uuid> {
        let id = Uuid::new_v4();

        if let Some(existing) = self.subs.get(&symbol) {
            existing.lock().callbacks.push((id, callback));
            return Ok(id);
        }

        let connector = self
            .manager
            .active_connector()
            .ok_or(crate::error::SourceError::NotConnected)?;

        let (tx, mut rx) = mpsc::channel(1024);
        connector.subscribe(symbol, tx).await?;

        let hub = Arc::clone(self);
        let bridge = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if let Some(entry) = hub.subs.get(&symbol) {
                    for (_, cb) in &entry.lock().callbacks {
                        cb(update.clone());
                    }
                }
            }
        });

        self.subs.insert(symbol, Mutex::new(SymbolSubscription { callbacks: vec![(id, callback)], _bridge: bridge }));
        Ok(id)
    }

    /// Remove one callback. When it was the last one registered for
    /// `symbol`, tears the upstream subscription down.
    pub async fn unsubscribe(&self, symbol: Symbol, id: Uuid) -> SourceResult<()> {
        let now_empty = match self.subs.get(&symbol) {
            Some(entry) => {
                let mut guard = entry.lock();
                guard.callbacks.retain(|(cid, _)| *cid != id);
                guard.callbacks.is_empty()
            }
            None => return Ok(()),
        };

        if now_empty {
            if let Some((_, sub)) = self.subs.remove(&symbol) {
                sub.into_inner()._bridge.abort();
            }
            if let Some(connector) = self.manager.active_connector() {
                connector.unsubscribe(symbol).await?;
            }
        }
        Ok(())
    }

    /// Symbols with at least one active callback.
    #[must_use]
    pub fn subscribed_symbols(&self) -> Vec<Symbol> {
        self.subs.iter().map(|e| *e.key()).collect()
    }
}
