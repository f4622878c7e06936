//! Order submission pipeline (§4.5): admission, validate, route, circuit
//! breaker, submit+retry, post. Batching accumulates orders off an
//! `mpsc::Receiver` up to `batch_size` or `batch_interval_ms`, whichever
//! comes first, then flushes the accumulated group through the same
//! per-order path concurrently — nothing below admission needs to know an
//! order arrived as part of a batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::Mutex;
use rand::Rng;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use common::CircuitBreaker;
use oms::order::{NewOrder, OrderType as OmsOrderType, Validity as OmsValidity};
use oms::OrderRegistry;
use risk_manager::{OrderCandidate, PortfolioSnapshot, RiskManager, RiskProfileId};

use broker::{BrokerError, PlaceOrderRequest};

use crate::config::PipelineConfig;
use crate::dead_letter::DeadLetterQueue;
use crate::error::{ExecutionError, ExecutionResult};
use crate::policy::{Quote, Router};

fn to_broker_order_type(order_type: OmsOrderType) -> broker::OrderType {
    match order_type {
        OmsOrderType::Market => broker::OrderType::Market,
        OmsOrderType::Limit => broker::OrderType::Limit,
        OmsOrderType::StopLoss => broker::OrderType::StopLoss,
        OmsOrderType::StopLossMarket => broker::OrderType::StopLossMarket,
    }
}

fn to_broker_validity(validity: OmsValidity) -> broker::Validity {
    match validity {
        OmsValidity::Day => broker::Validity::Day,
        OmsValidity::Ioc => broker::Validity::Ioc,
        OmsValidity::Gtc => broker::Validity::Gtc,
        OmsValidity::Gtd => broker::Validity::Gtd,
    }
}

fn to_common_side(side: oms::order::OrderSide) -> common::Side {
    match side {
        oms::order::OrderSide::Buy => common::Side::Bid,
        oms::order::OrderSide::Sell => common::Side::Ask,
    }
}

/// Token-bucket admission limiter (§4.5 step 1). Offers both call modes the
/// stage requires: [`Self::try_acquire`] fails fast, [`Self::acquire`] blocks
/// until a token frees up or the caller's `CancellationToken` fires.
struct AdmissionLimiter {
    rate: f64,
    capacity: f64,
    state: Mutex<(f64, Instant)>,
}

/// How often a blocking [`AdmissionLimiter::acquire`] rechecks the bucket
/// while it waits. The bucket refills continuously rather than via a
/// wakeable event, so polling is the only option.
const ADMISSION_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl AdmissionLimiter {
    fn new(rate: f64, capacity: f64) -> Self {
        Self { rate, capacity, state: Mutex::new((capacity, Instant::now())) }
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let (tokens, last) = &mut *state;
        let now = Instant::now();
        *tokens = (*tokens + now.duration_since(*last).as_secs_f64() * self.rate).min(self.capacity);
        *last = now;
        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Block until a token is available, polling at [`ADMISSION_POLL_INTERVAL`].
    /// Returns `Err(ExecutionError::AdmissionCancelled)` as soon as `cancel`
    /// fires rather than the poll interval elapsing.
    async fn acquire(&self, cancel: &CancellationToken) -> ExecutionResult<()> {
        loop {
            if self.try_acquire() {
                return Ok(());
            }
            tokio::select! {
                () = tokio::time::sleep(ADMISSION_POLL_INTERVAL) => {}
                () = cancel.cancelled() => return Err(ExecutionError::AdmissionCancelled),
            }
        }
    }
}

/// One order queued for a shared batch submission (§4.5 step 3).
pub struct BatchOrder {
    /// The order to create.
    pub new_order: NewOrder,
    /// Its risk candidate.
    pub candidate: OrderCandidate,
    /// Risk profile to validate it against.
    pub profile_id: RiskProfileId,
    /// Portfolio snapshot to validate it against.
    pub portfolio: PortfolioSnapshot,
}

/// Ties the OMS lifecycle, risk manager, and smart router together behind a
/// single `submit` entry point implementing the full seven-stage pipeline.
pub struct SubmissionPipeline {
    oms: Arc<OrderRegistry>,
    risk: Arc<RiskManager>,
    router: Arc<Router>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    dlq: DeadLetterQueue,
    admission: AdmissionLimiter,
    config: PipelineConfig,
}

impl SubmissionPipeline {
    /// A pipeline wired to the given OMS, risk manager, and router.
    #[must_use]
    pub fn new(
        oms: Arc<OrderRegistry>,
        risk: Arc<RiskManager>,
        router: Arc<Router>,
        config: PipelineConfig,
    ) -> Self {
        let capacity = config.admission.rate * config.admission.burst_factor;
        Self {
            oms,
            risk,
            router,
            breakers: DashMap::new(),
            dlq: DeadLetterQueue::new(),
            admission: AdmissionLimiter::new(config.admission.rate, capacity),
            config,
        }
    }

    /// Parked submissions awaiting manual retry.
    #[must_use]
    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dlq
    }

    fn breaker_for(&self, name: &str) -> Arc<CircuitBreaker> {
        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                self.config.circuit.max_failures,
                self.config.circuit.reset_timeout_ms,
                self.config.circuit.half_open_max_ops,
            ))
        });
        Arc::clone(entry.value())
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.retry.base_delay_ms as f64;
        let exp = base * 2f64.powi(attempt as i32);
        let jitter = self.config.retry.jitter;
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::from_millis((exp * factor).max(0.0) as u64)
    }

    /// Run one candidate order through the full pipeline, returning its
    /// order id once acknowledged. Admission fails fast with `QueueFull`
    /// when the token bucket is empty (§4.5 step 1); use
    /// [`Self::submit_blocking`] to wait for a token instead.
    pub async fn submit(
        &self,
        new_order: NewOrder,
        candidate: OrderCandidate,
        profile_id: RiskProfileId,
        portfolio: PortfolioSnapshot,
        quotes: &FxHashMap<String, Quote>,
    ) -> ExecutionResult<Uuid> {
        if !self.admission.try_acquire() {
            return Err(ExecutionError::QueueFull);
        }
        self.submit_after_admission(new_order, candidate, profile_id, portfolio, quotes).await
    }

    /// Run one candidate order through the full pipeline, blocking for
    /// admission rather than failing fast (§4.5 step 1's other call mode).
    /// Returns `Err(ExecutionError::AdmissionCancelled)` if `cancel` fires
    /// before a token frees up.
    pub async fn submit_blocking(
        &self,
        new_order: NewOrder,
        candidate: OrderCandidate,
        profile_id: RiskProfileId,
        portfolio: PortfolioSnapshot,
        quotes: &FxHashMap<String, Quote>,
        cancel: &CancellationToken,
    ) -> ExecutionResult<Uuid> {
        self.admission.acquire(cancel).await?;
        self.submit_after_admission(new_order, candidate, profile_id, portfolio, quotes).await
    }

    /// Stages 2-7 (risk validate, route, circuit breaker, submit+retry,
    /// post) shared by [`Self::submit`] and [`Self::submit_blocking`] once
    /// admission has been granted by whichever mode the caller chose.
    async fn submit_after_admission(
        &self,
        new_order: NewOrder,
        candidate: OrderCandidate,
        profile_id: RiskProfileId,
        portfolio: PortfolioSnapshot,
        quotes: &FxHashMap<String, Quote>,
    ) -> ExecutionResult<Uuid> {
        let order = self.oms.create_order(new_order)?;

        if let Err(err) = self.risk.validate_order(&candidate, profile_id, portfolio) {
            self.oms.reject(order.id, err.to_string())?;
            return Err(ExecutionError::RiskRejected(err));
        }
        self.oms.validate(order.id)?;

        self.route_and_submit(order.id, quotes).await
    }

    /// Run stages 4-7 (route, circuit breaker, submit+retry, post) for an
    /// order already sitting in `Validated`. Used both by [`Self::submit`]
    /// and for a dependency-triggered [`oms::dependency::DependencyAction::Submit`]
    /// (e.g. a bracket take-profit/stop-loss child, or a sequential child),
    /// which arrives already created and validated via its parent's link.
    async fn route_and_submit(&self, order_id: Uuid, quotes: &FxHashMap<String, Quote>) -> ExecutionResult<Uuid> {
        let order = self.oms.get(order_id).ok_or(oms::error::OmsError::OrderNotFound(order_id))?;
        let side = to_common_side(order.side);
        let adapter_name = self.router.select(order.symbol, side, quotes)?;
        let adapter = self
            .router
            .adapter(&adapter_name)
            .ok_or_else(|| ExecutionError::AdapterNotFound { adapter_name: adapter_name.clone() })?;

        let breaker = self.breaker_for(&adapter_name);
        if !breaker.allow() {
            return Err(ExecutionError::CircuitOpen { adapter_name });
        }

        self.oms.submit(order_id)?;

        let request = PlaceOrderRequest {
            client_order_id: order.id.to_string(),
            symbol: order.symbol,
            side,
            order_type: to_broker_order_type(order.order_type),
            validity: to_broker_validity(order.validity),
            quantity: order.quantity,
            price: order.price,
            trigger_price: order.trigger_price,
        };

        let mut attempt = 0u32;
        loop {
            let started = Instant::now();
            match adapter.place(&request).await {
                Ok(broker_id) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    breaker.record_success();
                    self.router.record_submission(&adapter_name, latency_ms, 0.0, true);
                    self.oms.acknowledge(order_id, broker_id.0)?;
                    return Ok(order_id);
                }
                Err(err) if err.is_retryable() && attempt < self.config.retry.max_retries => {
                    breaker.record_failure();
                    self.router.record_submission(
                        &adapter_name,
                        started.elapsed().as_secs_f64() * 1000.0,
                        0.0,
                        false,
                    );
                    let delay = self.backoff_delay(attempt);
                    warn!(order_id = %order_id, attempt, %err, "retrying order submission");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    breaker.record_failure();
                    self.router.record_submission(
                        &adapter_name,
                        started.elapsed().as_secs_f64() * 1000.0,
                        0.0,
                        false,
                    );
                    return Err(self.park_failed_order(order_id, adapter_name, attempt, err));
                }
            }
        }
    }

    /// Carry out every [`oms::dependency::DependencyAction::Submit`] a
    /// terminal transition returned (`Cancel` actions are already applied
    /// inside the OMS itself). Each child is routed and submitted
    /// independently; one child's failure doesn't stop the others.
    pub async fn process_dependency_actions(
        &self,
        actions: Vec<oms::dependency::DependencyAction>,
        quotes: &FxHashMap<String, Quote>,
    ) -> Vec<ExecutionResult<Uuid>> {
        let submits: Vec<Uuid> = actions
            .into_iter()
            .filter_map(|a| match a {
                oms::dependency::DependencyAction::Submit(id) => Some(id),
                oms::dependency::DependencyAction::Cancel(_) => None,
            })
            .collect();
        join_all(submits.into_iter().map(|id| self.route_and_submit(id, quotes))).await
    }

    /// Submit a group of orders concurrently, sharing this pipeline's
    /// admission limiter, circuit breakers, and router bookkeeping (§4.5
    /// step 3). Each order's outcome is independent.
    pub async fn submit_batch(
        &self,
        orders: Vec<BatchOrder>,
        quotes: &FxHashMap<String, Quote>,
    ) -> Vec<ExecutionResult<Uuid>> {
        let futures = orders
            .into_iter()
            .map(|o| self.submit(o.new_order, o.candidate, o.profile_id, o.portfolio, quotes));
        join_all(futures).await
    }

    /// Spawn the batching stage (§4.5 step 3): orders arriving on `rx` are
    /// accumulated until either `config.batch.batch_size` have queued up or
    /// `config.batch.batch_interval_ms` elapses since the first one in the
    /// current batch, whichever comes first, then flushed through
    /// [`Self::submit_batch`]. Runs until `rx` is closed.
    pub fn spawn_batcher(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<BatchOrder>,
        quotes: Arc<FxHashMap<String, Quote>>,
    ) -> tokio::task::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let Some(first) = rx.recv().await else { break };
                let mut buffer = vec![first];
                let batch_size = pipeline.config.batch.batch_size.max(1);
                let deadline = tokio::time::sleep(Duration::from_millis(pipeline.config.batch.batch_interval_ms));
                tokio::pin!(deadline);
                let mut closed = false;
                while buffer.len() < batch_size {
                    tokio::select! {
                        () = &mut deadline => break,
                        order = rx.recv() => match order {
                            Some(order) => buffer.push(order),
                            None => {
                                closed = true;
                                break;
                            }
                        },
                    }
                }

                let results = pipeline.submit_batch(buffer, &quotes).await;
                for result in &results {
                    if let Err(err) = result {
                        warn!(%err, "batched order submission failed");
                    }
                }

                if closed {
                    break;
                }
            }
        })
    }

    /// Resubmit a previously dead-lettered order through the pipeline again,
    /// using freshly supplied candidate/portfolio data (the original order
    /// is gone; the caller must reconstruct a fresh [`NewOrder`]).
    pub async fn retry_dead_letter(
        &self,
        order_id: Uuid,
        new_order: NewOrder,
        candidate: OrderCandidate,
        profile_id: RiskProfileId,
        portfolio: PortfolioSnapshot,
        quotes: &FxHashMap<String, Quote>,
    ) -> ExecutionResult<Uuid> {
        self.dlq.retry_one(order_id)?;
        self.submit(new_order, candidate, profile_id, portfolio, quotes).await
    }

    fn park_failed_order(
        &self,
        order_id: Uuid,
        adapter_name: String,
        attempt: u32,
        err: BrokerError,
    ) -> ExecutionError {
        let reason = err.to_string();
        if err.is_retryable() {
            let _ = self.oms.fail(order_id, reason.clone());
            self.dlq.push(order_id, reason);
            ExecutionError::RetriesExhausted { adapter_name, attempts: attempt + 1, source: err }
        } else {
            let _ = self.oms.reject(order_id, reason.clone());
            self.dlq.push(order_id, reason);
            ExecutionError::SubmissionRejected { adapter_name, source: err }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::mock::{MockAdapter, Scripted};
    use common::{Px, Qty, Side, Symbol};
    use oms::order::{NewOrder, OrderSide, OrderType, ProductType, Validity};
    use oms::OmsConfig;
    use risk_manager::{RiskConfig, RiskProfile};

    fn pipeline_with_one_adapter(config: PipelineConfig) -> Arc<SubmissionPipeline> {
        let oms = Arc::new(OrderRegistry::new(OmsConfig::default()));
        let risk = Arc::new(RiskManager::new(RiskConfig::default()));
        let router = Arc::new(Router::new(crate::policy::RoutingPolicy::RoundRobin));
        router.register(Arc::new(MockAdapter::new("m", vec![Scripted::Ack])));
        Arc::new(SubmissionPipeline::new(oms, risk, router, config))
    }

    fn batch_order() -> BatchOrder {
        let id = Uuid::new_v4();
        let portfolio_id = Uuid::new_v4();
        BatchOrder {
            new_order: NewOrder {
                id,
                portfolio_id,
                strategy_id: Uuid::new_v4(),
                symbol: Symbol(1),
                exchange: "NSE".into(),
                side: OrderSide::Buy,
                order_type: OrderType::Market,
                product_type: ProductType::Intraday,
                validity: Validity::Day,
                quantity: Qty::from_units(1),
                price: None,
                trigger_price: None,
                parent_order_id: None,
                tags: vec![],
                expires_at: None,
            },
            candidate: OrderCandidate {
                portfolio_id,
                strategy_id: Uuid::new_v4(),
                symbol: Symbol(1),
                side: Side::Bid,
                qty: Qty::from_units(1),
                price: Px::new(100.0),
            },
            profile_id: RiskProfileId(Uuid::nil()),
            portfolio: PortfolioSnapshot { equity: 10_000_000, peak_equity: 10_000_000, gross_exposure: 0, volatility: 0.2 },
        }
    }

    #[tokio::test]
    async fn batch_flushes_as_soon_as_batch_size_is_reached() {
        let pipeline =
            pipeline_with_one_adapter(PipelineConfig { batch: crate::config::BatchConfig { batch_size: 2, batch_interval_ms: 5_000 }, ..PipelineConfig::default() });
        pipeline.risk.set_profile(RiskProfileId(Uuid::nil()), RiskProfile::default());

        let (tx, rx) = mpsc::channel(8);
        let handle = pipeline.spawn_batcher(rx, Arc::new(FxHashMap::default()));

        tx.send(batch_order()).await.unwrap();
        tx.send(batch_order()).await.unwrap();

        // Both orders accumulate and flush well before the 5s interval would,
        // since batch_size (2) is reached first.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pipeline.oms.active_orders().len(), 2);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn blocking_admission_is_cancelled_when_no_token_ever_frees_up() {
        let config = PipelineConfig {
            admission: crate::config::AdmissionConfig { rate: 0.0, burst_factor: 0.0 },
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with_one_adapter(config);
        pipeline.risk.set_profile(RiskProfileId(Uuid::nil()), RiskProfile::default());

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let order = batch_order();
        let err = pipeline
            .submit_blocking(order.new_order, order.candidate, order.profile_id, order.portfolio, &FxHashMap::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::AdmissionCancelled));
    }

    #[tokio::test]
    async fn a_lone_order_flushes_once_the_batch_interval_elapses() {
        let pipeline =
            pipeline_with_one_adapter(PipelineConfig { batch: crate::config::BatchConfig { batch_size: 8, batch_interval_ms: 20 }, ..PipelineConfig::default() });
        pipeline.risk.set_profile(RiskProfileId(Uuid::nil()), RiskProfile::default());

        let (tx, rx) = mpsc::channel(8);
        let handle = pipeline.spawn_batcher(rx, Arc::new(FxHashMap::default()));

        tx.send(batch_order()).await.unwrap();
        // Not enough orders ever arrive to hit batch_size; only the interval
        // timeout can flush this one.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pipeline.oms.active_orders().len(), 1);

        drop(tx);
        handle.await.unwrap();
    }
}
