//! Generic three-state circuit breaker (§4.5 step 5), shared by the
//! submission pipeline (per-adapter) and the market data source manager
//! (per-connector failover).

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Accepting operations normally.
    Closed,
    /// Rejecting all operations until `reset_timeout` elapses.
    Open,
    /// Admitting a bounded number of probe operations.
    HalfOpen,
}

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Per-target (adapter, connector, ...) circuit breaker. Opens after
/// `max_failures` consecutive failures, stays open for `reset_timeout_ms`,
/// then allows up to `half_open_max_ops` probes; any probe failure reopens
/// it, any probe success closes it.
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    opened_at_ms: AtomicU64,
    half_open_probes: AtomicU64,
    max_failures: u64,
    reset_timeout_ms: u64,
    half_open_max_ops: u64,
}

impl CircuitBreaker {
    /// Build a new breaker with the given thresholds.
    #[must_use]
    pub const fn new(max_failures: u64, reset_timeout_ms: u64, half_open_max_ops: u64) -> Self {
        Self {
            state: AtomicU8::new(CLOSED),
            consecutive_failures: AtomicU64::new(0),
            opened_at_ms: AtomicU64::new(0),
            half_open_probes: AtomicU64::new(0),
            max_failures,
            reset_timeout_ms,
            half_open_max_ops,
        }
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Whether a new operation may proceed. Transitions Open → HalfOpen
    /// once `reset_timeout_ms` has elapsed.
    pub fn allow(&self) -> bool {
        match self.state.load(Ordering::Acquire) {
            CLOSED => true,
            OPEN => {
                let opened_at = self.opened_at_ms.load(Ordering::Acquire);
                if Self::now_ms().saturating_sub(opened_at) >= self.reset_timeout_ms {
                    self.state.store(HALF_OPEN, Ordering::Release);
                    self.half_open_probes.store(0, Ordering::Release);
                    true
                } else {
                    false
                }
            }
            _ => {
                let probes = self.half_open_probes.fetch_add(1, Ordering::AcqRel);
                probes < self.half_open_max_ops
            }
        }
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.state.store(CLOSED, Ordering::Release);
    }

    /// Record a failed operation; opens (or reopens, from `HalfOpen`) the
    /// breaker once `max_failures` consecutive failures are observed.
    pub fn record_failure(&self) {
        match self.state.load(Ordering::Acquire) {
            HALF_OPEN => self.open(),
            _ => {
                let count = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if count >= self.max_failures {
                    self.open();
                }
            }
        }
    }

    fn open(&self) {
        self.state.store(OPEN, Ordering::Release);
        self.opened_at_ms.store(Self::now_ms(), Ordering::Release);
    }

    /// Current state, for monitoring/tests.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            CLOSED => BreakerState::Closed,
            OPEN => BreakerState::Open,
            _ => BreakerState::HalfOpen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_max_failures() {
        let cb = CircuitBreaker::new(3, 10_000, 1);
        assert!(cb.allow());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow());
    }

    #[test]
    fn success_in_half_open_closes_breaker() {
        let cb = CircuitBreaker::new(1, 0, 2);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(cb.allow());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn failure_in_half_open_reopens_breaker() {
        let cb = CircuitBreaker::new(1, 0, 5);
        cb.record_failure();
        assert!(cb.allow());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
    }
}
