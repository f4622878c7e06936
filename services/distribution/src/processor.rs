//! The inbound processor chain every `MarketData` update flows through
//! before it's cached, stored, and published (§4.11: "normalize →
//! enrich → aggregate").

use dashmap::DashMap;

use common::market::MarketData;
use common::{Px, Qty, Symbol};

/// One stage of the chain. Stages run in the order they're pushed onto
/// a [`ProcessorChain`] and each sees the previous stage's output.
pub trait ProcessingStage: Send + Sync {
    /// Stage name, for logs/metrics.
    fn name(&self) -> &str;
    /// Transform `data` in place.
    fn process(&self, data: MarketData) -> MarketData;
}

/// Repairs an internally inconsistent quote: crossed book (bid > ask,
/// swapped back in line) and negative sizes (clamped to zero). Vendor
/// feeds occasionally emit both under load.
#[derive(Debug, Default)]
pub struct NormalizeStage;

impl ProcessingStage for NormalizeStage {
    fn name(&self) -> &str {
        "normalize"
    }

    fn process(&self, mut data: MarketData) -> MarketData {
        if data.bid > data.ask && data.ask != Px::ZERO {
            std::mem::swap(&mut data.bid, &mut data.ask);
        }
        if data.bid_size.as_i64() < 0 {
            data.bid_size = Qty::ZERO;
        }
        if data.ask_size.as_i64() < 0 {
            data.ask_size = Qty::ZERO;
        }
        data
    }
}

/// Fills in `last` from the mid of bid/ask when a feed only pushes
/// quotes, not trades.
#[derive(Debug, Default)]
pub struct EnrichStage;

impl ProcessingStage for EnrichStage {
    fn name(&self) -> &str {
        "enrich"
    }

    fn process(&self, mut data: MarketData) -> MarketData {
        if data.last == Px::ZERO && data.bid != Px::ZERO && data.ask != Px::ZERO {
            data.last = data.mid();
        }
        data
    }
}

#[derive(Default)]
struct SessionAggregate {
    open: Px,
    high: Px,
    low: Px,
    volume: Qty,
}

/// Rolls each symbol's session open/high/low/cumulative-volume into the
/// tick it stamps, keyed by symbol for the lifetime of the chain.
pub struct AggregateStage {
    sessions: DashMap<Symbol, SessionAggregate>,
}

impl Default for AggregateStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateStage {
    /// A fresh aggregator with no session state for any symbol yet.
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }
}

impl ProcessingStage for AggregateStage {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn process(&self, mut data: MarketData) -> MarketData {
        let mut session = self.sessions.entry(data.symbol).or_insert_with(|| SessionAggregate {
            open: data.last,
            high: data.last,
            low: data.last,
            volume: Qty::ZERO,
        });

        if data.last > session.high {
            session.high = data.last;
        }
        if session.low == Px::ZERO || data.last < session.low {
            session.low = data.last;
        }
        session.volume = session.volume.add(data.volume);

        data.open = session.open;
        data.high = session.high;
        data.low = session.low;
        data.volume = session.volume;
        data
    }
}

/// An ordered sequence of [`ProcessingStage`]s, run in registration
/// order. The default chain is normalize → enrich → aggregate.
pub struct ProcessorChain {
    stages: Vec<Box<dyn ProcessingStage>>,
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl ProcessorChain {
    /// The canonical normalize → enrich → aggregate chain.
    #[must_use]
    pub fn standard() -> Self {
        Self { stages: vec![Box::new(NormalizeStage), Box::new(EnrichStage), Box::new(AggregateStage::new())] }
    }

    /// An empty chain, for callers that want to assemble a custom order.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage to run after every stage already in the chain.
    #[must_use]
    pub fn push(mut self, stage: Box<dyn ProcessingStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run `data` through every stage in order.
    #[must_use]
    pub fn run(&self, mut data: MarketData) -> MarketData {
        for stage in &self.stages {
            data = stage.process(data);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ExchangeId;
    use common::Ts;

    fn raw(symbol: Symbol, last: f64, bid: f64, ask: f64) -> MarketData {
        MarketData {
            symbol,
            exchange: ExchangeId(1),
            timestamp: Ts::now(),
            last: Px::new(last),
            bid: Px::new(bid),
            ask: Px::new(ask),
            bid_size: Qty::from_units(1),
            ask_size: Qty::from_units(1),
            open: Px::ZERO,
            high: Px::ZERO,
            low: Px::ZERO,
            close: Px::ZERO,
            volume: Qty::from_units(10),
        }
    }

    #[test]
    fn normalize_uncrosses_a_crossed_book() {
        let stage = NormalizeStage;
        let crossed = raw(Symbol(1), 100.0, 101.0, 99.0);
        let fixed = stage.process(crossed);
        assert!(fixed.bid <= fixed.ask);
    }

    #[test]
    fn enrich_fills_last_from_mid_when_absent() {
        let stage = EnrichStage;
        let mut quote_only = raw(Symbol(1), 0.0, 99.0, 101.0);
        quote_only.last = Px::ZERO;
        let enriched = stage.process(quote_only);
        assert_eq!(enriched.last, Px::new(100.0));
    }

    #[test]
    fn aggregate_tracks_session_high_low_and_cumulative_volume() {
        let stage = AggregateStage::new();
        let first = stage.process(raw(Symbol(1), 100.0, 99.0, 101.0));
        assert_eq!(first.high, Px::new(100.0));
        assert_eq!(first.volume, Qty::from_units(10));

        let second = stage.process(raw(Symbol(1), 105.0, 104.0, 106.0));
        assert_eq!(second.high, Px::new(105.0));
        assert_eq!(second.low, Px::new(100.0));
        assert_eq!(second.volume, Qty::from_units(20));
    }

    #[test]
    fn standard_chain_runs_all_three_stages() {
        let chain = ProcessorChain::standard();
        let mut quote_only = raw(Symbol(1), 0.0, 99.0, 101.0);
        quote_only.last = Px::ZERO;
        let out = chain.run(quote_only);
        assert_eq!(out.last, Px::new(100.0));
        assert_eq!(out.high, out.last);
    }
}
