//! The distributor (§4.11): every inbound [`MarketData`] runs through the
//! processor chain, lands in the short-TTL cache, is written to the
//! historical store asynchronously, is published on the event bus keyed
//! by symbol, and is fanned out to subscribed WebSocket connections.

use std::sync::Arc;

use common::event_bus::{BusMessage, EventBus, EventBusConfig};
use common::market::MarketData;
use common::Symbol;
use tracing::warn;

use market_data_store::{CacheConfig, HistoricalStore, MarketDataCache};

use crate::message::ServerFrame;
use crate::processor::ProcessorChain;
use crate::registry::ConnectionRegistry;

/// Event bus message wrapping a distributed update. `BusMessage::topic`
/// keys on the symbol so subscribers can filter per instrument rather
/// than drinking from one firehose topic.
#[derive(Debug, Clone)]
pub struct DistributedUpdate {
    /// The processed market data.
    pub data: MarketData,
    topic: String,
}

impl DistributedUpdate {
    fn new(data: MarketData) -> Self {
        let topic = format!("symbol.{}", data.symbol.0);
        Self { data, topic }
    }
}

impl BusMessage for DistributedUpdate {
    fn topic(&self) -> &str {
        &self.topic
    }
}

/// Ties the processor chain, cache, store, event bus, and WebSocket
/// registry together for one inbound feed.
pub struct Distributor {
    chain: ProcessorChain,
    cache: Arc<MarketDataCache<Symbol, MarketData>>,
    store: Arc<HistoricalStore>,
    bus: Arc<EventBus<DistributedUpdate>>,
    registry: Arc<ConnectionRegistry>,
}

impl Distributor {
    /// Build a distributor over the given store and connection registry,
    /// using the standard normalize/enrich/aggregate processor chain and
    /// a cache sized per §4.9's ~5 second default TTL.
    #[must_use]
    pub fn new(store: Arc<HistoricalStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_cache_config(store, registry, CacheConfig::default())
    }

    /// As [`Distributor::new`], with an explicit cache configuration.
    #[must_use]
    pub fn with_cache_config(
        store: Arc<HistoricalStore>,
        registry: Arc<ConnectionRegistry>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            chain: ProcessorChain::standard(),
            cache: Arc::new(MarketDataCache::new(cache_config)),
            store,
            bus: Arc::new(EventBus::new(EventBusConfig::default())),
            registry,
        }
    }

    /// The shared cache, so callers can serve `getQuotes`-style reads
    /// straight off it without going through the pipeline.
    #[must_use]
    pub fn cache(&self) -> &Arc<MarketDataCache<Symbol, MarketData>> {
        &self.cache
    }

    /// The event bus, so other components can subscribe by symbol topic.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus<DistributedUpdate>> {
        &self.bus
    }

    /// Run `raw` through the full pipeline: process, cache, store
    /// (asynchronously), publish, and fan out to WebSocket subscribers.
    pub async fn ingest(&self, raw: MarketData) {
        let processed = self.chain.run(raw);

        self.cache.set(processed.symbol, &processed);

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.append_tick(&processed) {
                warn!(symbol = processed.symbol.0, error = %err, "failed to persist tick");
            }
        });

        if let Err(err) = self.bus.publish(DistributedUpdate::new(processed)).await {
            // No subscribers is routine — most symbols have none until a
            // client subscribes.
            tracing::trace!(symbol = processed.symbol.0, error = %err, "event bus publish");
        }

        self.registry.publish(processed.symbol, &ServerFrame::Update { data: processed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ExchangeId, Px, Qty, Ts};

    fn tick(symbol: Symbol) -> MarketData {
        MarketData {
            symbol,
            exchange: ExchangeId(1),
            timestamp: Ts::now(),
            last: Px::new(100.0),
            bid: Px::new(99.5),
            ask: Px::new(100.5),
            bid_size: Qty::from_units(1),
            ask_size: Qty::from_units(1),
            open: Px::ZERO,
            high: Px::ZERO,
            low: Px::ZERO,
            close: Px::ZERO,
            volume: Qty::from_units(5),
        }
    }

    #[tokio::test]
    async fn ingest_populates_cache_and_fans_out_to_subscribers() {
        let store = Arc::new(HistoricalStore::open_in_memory().unwrap());
        let registry = Arc::new(ConnectionRegistry::new());
        let distributor = Distributor::new(store, registry.clone());

        let (id, mut rx) = registry.register();
        registry.subscribe(id, Symbol(7));

        distributor.ingest(tick(Symbol(7))).await;

        assert!(distributor.cache().get(&Symbol(7)).is_some());
        let frame = rx.try_recv().expect("update should have been fanned out");
        match frame {
            ServerFrame::Update { data } => assert_eq!(data.symbol, Symbol(7)),
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ingest_persists_to_the_historical_store() {
        let store = Arc::new(HistoricalStore::open_in_memory().unwrap());
        let registry = Arc::new(ConnectionRegistry::new());
        let distributor = Distributor::new(Arc::clone(&store), registry);

        distributor.ingest(tick(Symbol(3))).await;
        // the store write happens on a spawned task; give it a turn
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(store.total_rows().unwrap(), 1);
    }
}
