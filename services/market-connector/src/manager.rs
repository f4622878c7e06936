//! Primary-plus-backups failover over a list of [`MarketDataSource`]s
//! (§4.8). `get_quotes`/`get_history` try the active connector first; on
//! error they walk the remaining connectors in order and promote the
//! first one that succeeds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::market::{Interval, MarketData, OhlcvBar};
use common::{CircuitBreaker, Symbol, Ts};

use crate::error::{ManagerError, ManagerResult, SourceError};
use crate::source::MarketDataSource;

const BREAKER_MAX_FAILURES: u64 = 5;
const BREAKER_RESET_MS: u64 = 30_000;
const BREAKER_HALF_OPEN_PROBES: u64 = 1;

struct Registered {
    source: Arc<dyn MarketDataSource>,
    breaker: CircuitBreaker,
}

/// Holds the primary connector plus an ordered list of backups, and
/// tracks which one is currently active.
pub struct SourceManager {
    connectors: Vec<Registered>,
    active: AtomicUsize,
}

impl SourceManager {
    /// Build a manager over `connectors`, in priority order (index 0 is
    /// the primary, used as the initial active connector).
    #[must_use]
    pub fn new(connectors: Vec<Arc<dyn MarketDataSource>>) -> Self {
        let connectors = connectors
            .into_iter()
            .map(|source| Registered {
                source,
                breaker: CircuitBreaker::new(BREAKER_MAX_FAILURES, BREAKER_RESET_MS, BREAKER_HALF_OPEN_PROBES),
            })
            .collect();
        Self { connectors, active: AtomicUsize::new(0) }
    }

    /// Name of the currently active connector, if any are configured.
    #[must_use]
    pub fn active_name(&self) -> Option<&str> {
        self.connectors.get(self.active.load(Ordering::Acquire)).map(|r| r.source.name())
    }

    fn order(&self) -> Vec<usize> {
        let active = self.active.load(Ordering::Acquire);
        let n = self.connectors.len();
        (0..n).map(|i| (active + i) % n).collect()
    }

    async fn try_each<T, F, Fut>(&self, op: F) -> ManagerResult<T>
    where
        F: Fn(&Arc<dyn MarketDataSource>) -> Fut,
        Fut: std::future::Future<Output = Result<T, SourceError>>,
    {
        if self.connectors.is_empty() {
            return Err(ManagerError::NoConnectorsConfigured);
        }

        let mut last_err: Option<SourceError> = None;
        let mut last_name = String::new();
        for idx in self.order() {
            let reg = &self.connectors[idx];
            if !reg.breaker.allow() {
                continue;
            }
            match op(&reg.source).await {
                Ok(value) => {
                    reg.breaker.record_success();
                    self.active.store(idx, Ordering::Release);
                    return Ok(value);
                }
                Err(err) => {
                    reg.breaker.record_failure();
                    last_name = reg.source.name().to_string();
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(source) => Err(ManagerError::AllFailed { attempted: self.connectors.len(), last_name, source }),
            // every connector's breaker was open
            None => Err(ManagerError::AllFailed {
                attempted: self.connectors.len(),
                last_name: "<none>".into(),
                source: SourceError::NotConnected,
            }),
        }
    }

    /// Quotes for `symbols`, from the active connector or the first
    /// backup that succeeds.
    pub async fn get_quotes(&self, symbols: &[Symbol]) -> ManagerResult<Vec<MarketData>> {
        self.try_each(|source| source.get_quotes(symbols)).await
    }

    /// History for `symbol` over `[from, to]`, from the active connector
    /// or the first backup that succeeds.
    pub async fn get_history(
        &self,
        symbol: Symbol,
        interval: Interval,
        from: Ts,
        to: Ts,
    ) -> ManagerResult<Vec<OhlcvBar>> {
        self.try_each(|source| source.get_history(symbol, interval, from, to)).await
    }

    /// Look up a registered connector by name, for use by the
    /// subscription hub (which always subscribes through a specific
    /// connector rather than the failover path).
    #[must_use]
    pub fn connector(&self, name: &str) -> Option<Arc<dyn MarketDataSource>> {
        self.connectors.iter().find(|r| r.source.name() == name).map(|r| r.source.clone())
    }

    /// The active connector, for subscription fan-out.
    #[must_use]
    pub fn active_connector(&self) -> Option<Arc<dyn MarketDataSource>> {
        self.connectors.get(self.active.load(Ordering::Acquire)).map(|r| r.source.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::mpsc;

    struct FlakySource {
        name: &'static str,
        fail_first_n: AtomicU32,
    }

    #[async_trait]
    impl MarketDataSource for FlakySource {
        fn name(&self) -> &str {
            self.name
        }

        async fn get_quotes(&self, _symbols: &[Symbol]) -> Result<Vec<MarketData>, SourceError> {
            let remaining = self.fail_first_n.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                return Err(SourceError::Transient("down".into()));
            }
            Ok(vec![])
        }

        async fn get_history(
            &self,
            _symbol: Symbol,
            _interval: Interval,
            _from: Ts,
            _to: Ts,
        ) -> Result<Vec<OhlcvBar>, SourceError> {
            Ok(vec![])
        }

        async fn subscribe(&self, _symbol: Symbol, _sink: mpsc::Sender<MarketData>) -> Result<(), SourceError> {
            Ok(())
        }

        async fn unsubscribe(&self, _symbol: Symbol) -> Result<(), SourceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn promotes_backup_on_primary_failure() {
        let primary: Arc<dyn MarketDataSource> =
            Arc::new(FlakySource { name: "primary", fail_first_n: AtomicU32::new(u32::MAX) });
        let backup: Arc<dyn MarketDataSource> =
            Arc::new(FlakySource { name: "backup", fail_first_n: AtomicU32::new(0) });
        let manager = SourceManager::new(vec![primary, backup]);

        assert_eq!(manager.active_name(), Some("primary"));
        manager.get_quotes(&[Symbol(1)]).await.unwrap();
        assert_eq!(manager.active_name(), Some("backup"));
    }

    #[tokio::test]
    async fn all_connectors_failing_surfaces_last_error() {
        let a: Arc<dyn MarketDataSource> = Arc::new(FlakySource { name: "a", fail_first_n: AtomicU32::new(u32::MAX) });
        let b: Arc<dyn MarketDataSource> = Arc::new(FlakySource { name: "b", fail_first_n: AtomicU32::new(u32::MAX) });
        let manager = SourceManager::new(vec![a, b]);

        let err = manager.get_quotes(&[Symbol(1)]).await.unwrap_err();
        assert!(matches!(err, ManagerError::AllFailed { attempted: 2, .. }));
    }

    #[tokio::test]
    async fn empty_manager_errors_without_panicking() {
        let manager = SourceManager::new(vec![]);
        assert!(matches!(manager.get_quotes(&[]).await, Err(ManagerError::NoConnectorsConfigured)));
    }
}
