//! Smart order router (§4.2): selects a registered adapter for a candidate
//! order under one of six selection policies, optionally overridden per
//! symbol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use broker::BrokerAdapter;
use common::{Side, Symbol};
use dashmap::DashMap;
use rand::Rng;

use crate::error::{ExecutionError, ExecutionResult};
use crate::metrics::BrokerMetrics;

/// One adapter's current best bid/ask for a symbol, as reported by market
/// data. Supplied by the caller at selection time rather than fetched by
/// the router itself, so this crate carries no market-data-source
/// dependency of its own.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    /// Best bid.
    pub bid: common::Px,
    /// Best ask.
    pub ask: common::Px,
}

/// Venue/adapter selection strategy (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Lowest ask for a buy, highest bid for a sell; ties broken by latency.
    BestPrice,
    /// Smallest EMA latency.
    LowestLatency,
    /// Highest successful/total fill ratio.
    HighestFillRate,
    /// Smallest EMA cost.
    LowestCost,
    /// Strictly cyclic over the sorted adapter name list.
    RoundRobin,
    /// Probability proportional to reported available volume; falls back
    /// to round robin if every candidate reports zero.
    VolumeWeighted,
}

/// Registry of adapters, their metrics, and the routing policy. Shared by
/// the submission pipeline.
pub struct Router {
    adapters: DashMap<String, Arc<dyn BrokerAdapter>>,
    metrics: DashMap<String, Arc<BrokerMetrics>>,
    default_policy: RoutingPolicy,
    overrides: DashMap<Symbol, RoutingPolicy>,
    rr_counter: AtomicUsize,
}

impl Router {
    /// A router with no adapters registered yet.
    #[must_use]
    pub fn new(default_policy: RoutingPolicy) -> Self {
        Self {
            adapters: DashMap::new(),
            metrics: DashMap::new(),
            default_policy,
            overrides: DashMap::new(),
            rr_counter: AtomicUsize::new(0),
        }
    }

    /// Register an adapter, creating a fresh metrics entry for it.
    pub fn register(&self, adapter: Arc<dyn BrokerAdapter>) {
        let name = adapter.name().to_string();
        self.metrics.insert(name.clone(), Arc::new(BrokerMetrics::new()));
        self.adapters.insert(name, adapter);
    }

    /// Override the selection policy for a specific symbol.
    pub fn set_policy_for_symbol(&self, symbol: Symbol, policy: RoutingPolicy) {
        self.overrides.insert(symbol, policy);
    }

    /// The registered adapter with this name, if any.
    #[must_use]
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn BrokerAdapter>> {
        self.adapters.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Metrics for a registered adapter.
    #[must_use]
    pub fn metrics(&self, name: &str) -> Option<Arc<BrokerMetrics>> {
        self.metrics.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Record the result of a submission, for the router's own future
    /// selections.
    pub fn record_submission(&self, name: &str, latency_ms: f64, cost_bps: f64, success: bool) {
        if let Some(m) = self.metrics.get(name) {
            m.record_submission(latency_ms, cost_bps, success);
        }
    }

    fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn policy_for(&self, symbol: Symbol) -> RoutingPolicy {
        self.overrides.get(&symbol).map_or(self.default_policy, |p| *p)
    }

    /// Choose an adapter for `symbol`/`side`. `quotes` carries best bid/ask
    /// per adapter name, needed only by [`RoutingPolicy::BestPrice`]; pass
    /// an empty map if unused.
    pub fn select(
        &self,
        symbol: Symbol,
        side: Side,
        quotes: &rustc_hash::FxHashMap<String, Quote>,
    ) -> ExecutionResult<String> {
        let names = self.sorted_names();
        if names.is_empty() {
            return Err(ExecutionError::NoAdapterAvailable { symbol });
        }

        let chosen = match self.policy_for(symbol) {
            RoutingPolicy::BestPrice => self.select_best_price(&names, side, quotes),
            RoutingPolicy::LowestLatency => self.select_by(&names, |m| m.latency_ms(), f64::min),
            RoutingPolicy::HighestFillRate => self.select_by(&names, |m| m.fill_rate(), f64::max),
            RoutingPolicy::LowestCost => self.select_by(&names, |m| m.cost_bps(), f64::min),
            RoutingPolicy::RoundRobin => Some(self.select_round_robin(&names)),
            RoutingPolicy::VolumeWeighted => self.select_volume_weighted(&names, symbol),
        };

        chosen.ok_or(ExecutionError::NoAdapterAvailable { symbol })
    }

    fn select_best_price(
        &self,
        names: &[String],
        side: Side,
        quotes: &rustc_hash::FxHashMap<String, Quote>,
    ) -> Option<String> {
        let mut best: Option<(String, common::Px, f64)> = None;
        for name in names {
            let Some(quote) = quotes.get(name) else { continue };
            let price = match side {
                Side::Bid => quote.ask,
                Side::Ask => quote.bid,
            };
            let latency = self.metrics(name).map_or(0.0, |m| m.latency_ms());
            let better = match &best {
                None => true,
                Some((_, best_price, best_latency)) => match side {
                    Side::Bid => price < *best_price || (price == *best_price && latency < *best_latency),
                    Side::Ask => price > *best_price || (price == *best_price && latency < *best_latency),
                },
            };
            if better {
                best = Some((name.clone(), price, latency));
            }
        }
        best.map(|(name, _, _)| name)
    }

    fn select_by(
        &self,
        names: &[String],
        score: impl Fn(&BrokerMetrics) -> f64,
        pick: impl Fn(f64, f64) -> f64,
    ) -> Option<String> {
        let mut best: Option<(String, f64)> = None;
        for name in names {
            let Some(m) = self.metrics(name) else { continue };
            let value = score(&m);
            best = match best {
                None => Some((name.clone(), value)),
                Some((best_name, best_value)) => {
                    if pick(best_value, value) == value && value != best_value {
                        Some((name.clone(), value))
                    } else {
                        Some((best_name, best_value))
                    }
                }
            };
        }
        best.map(|(name, _)| name)
    }

    fn select_round_robin(&self, names: &[String]) -> String {
        let idx = self.rr_counter.fetch_add(1, Ordering::Relaxed) % names.len();
        names[idx].clone()
    }

    fn select_volume_weighted(&self, names: &[String], symbol: Symbol) -> Option<String> {
        let volumes: Vec<(String, i64)> = names
            .iter()
            .map(|n| (n.clone(), self.metrics(n).map_or(0, |m| m.available_volume(symbol).max(0))))
            .collect();
        let total: i64 = volumes.iter().map(|(_, v)| v).sum();
        if total <= 0 {
            return Some(self.select_round_robin(names));
        }
        let mut pick = rand::thread_rng().gen_range(0..total);
        for (name, v) in volumes {
            if pick < v {
                return Some(name);
            }
            pick -= v;
        }
        names.last().cloned()
    }
}
