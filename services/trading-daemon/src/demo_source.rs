//! A synthetic [`MarketDataSource`] (§4.8), in the same spirit as
//! [`broker::SimulatedAdapter`]: deterministic, in-process, and used to
//! drive the distribution pipeline when no real exchange feed is wired
//! in. Live pushes are generated by [`perf_harness::LoadGenerator`] on a
//! fixed interval and fanned out to every subscribed symbol.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use common::market::{Interval, MarketData, OhlcvBar};
use common::{Symbol, Ts};
use market_connector::error::SourceResult;
use market_connector::MarketDataSource;
use perf_harness::LoadGenerator;

/// In-memory demo connector. `get_quotes`/`get_history` synthesize data on
/// demand rather than replaying a recorded feed; `subscribe` hands its
/// sink to the caller's ingestion loop, which pushes into it directly.
pub struct DemoMarketDataSource {
    name: String,
    generator: Mutex<LoadGenerator>,
}

impl DemoMarketDataSource {
    /// A demo source seeded deterministically, covering `symbol_count`
    /// symbols.
    #[must_use]
    pub fn new(name: impl Into<String>, seed: u64, symbol_count: u32) -> Self {
        Self { name: name.into(), generator: Mutex::new(LoadGenerator::new(seed, symbol_count)) }
    }

    fn synthesize_bar(&self, symbol: Symbol, interval: Interval, timestamp: Ts) -> OhlcvBar {
        let tick = self.generator.lock().expect("demo generator mutex poisoned").next_tick();
        OhlcvBar::new(symbol, interval, timestamp, tick.last, tick.ask, tick.bid, tick.last, tick.volume)
            .expect("demo tick's bid/ask always bracket last")
    }
}

#[async_trait]
impl MarketDataSource for DemoMarketDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_quotes(&self, symbols: &[Symbol]) -> SourceResult<Vec<MarketData>> {
        let mut out = Vec::with_capacity(symbols.len());
        for &symbol in symbols {
            let mut tick = self.generator.lock().expect("demo generator mutex poisoned").next_tick();
            tick.symbol = symbol;
            out.push(tick);
        }
        Ok(out)
    }

    async fn get_history(
        &self,
        symbol: Symbol,
        interval: Interval,
        from: Ts,
        to: Ts,
    ) -> SourceResult<Vec<OhlcvBar>> {
        let step = bar_step_nanos(interval);
        let mut bars = Vec::new();
        let mut ts = from.as_nanos();
        while ts <= to.as_nanos() && bars.len() < 1_000 {
            bars.push(self.synthesize_bar(symbol, interval, Ts::from_nanos(ts)));
            ts += step;
        }
        Ok(bars)
    }

    async fn subscribe(&self, _symbol: Symbol, _sink: mpsc::Sender<MarketData>) -> SourceResult<()> {
        // The demo feed is pushed centrally by `run_demo_feed` rather than
        // per-symbol; nothing to start here.
        Ok(())
    }

    async fn unsubscribe(&self, _symbol: Symbol) -> SourceResult<()> {
        Ok(())
    }
}

fn bar_step_nanos(interval: Interval) -> u64 {
    let secs = match interval {
        Interval::OneMin => 60,
        Interval::FiveMin => 5 * 60,
        Interval::FifteenMin => 15 * 60,
        Interval::ThirtyMin => 30 * 60,
        Interval::OneHour => 60 * 60,
        Interval::OneDay => 24 * 60 * 60,
        Interval::OneWeek => 7 * 24 * 60 * 60,
        Interval::OneMonth => 30 * 24 * 60 * 60,
    };
    secs * 1_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_quotes_returns_one_tick_per_requested_symbol() {
        let source = DemoMarketDataSource::new("demo", 7, 10);
        let symbols = [Symbol(1), Symbol(2), Symbol(3)];
        let quotes = source.get_quotes(&symbols).await.unwrap();
        assert_eq!(quotes.len(), 3);
        for (quote, symbol) in quotes.iter().zip(symbols.iter()) {
            assert_eq!(quote.symbol, *symbol);
        }
    }

    #[tokio::test]
    async fn get_history_spans_the_requested_range_at_the_requested_interval() {
        let source = DemoMarketDataSource::new("demo", 7, 10);
        let from = Ts::from_nanos(0);
        let to = Ts::from_millis(5 * 60 * 1_000);
        let bars = source.get_history(Symbol(1), Interval::OneMin, from, to).await.unwrap();
        assert_eq!(bars.len(), 6);
        assert!(bars.windows(2).all(|w| w[1].timestamp.as_nanos() > w[0].timestamp.as_nanos()));
    }
}
