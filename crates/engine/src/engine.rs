//! Engine wiring
//!
//! Owns the configuration handle and the long-running loops:
//! - scan loop feeding scan reports to a single report consumer
//! - pending transaction supervisor feeding the drop-oldest queue
//! - sandwich consumer draining the queue one event at a time
//!
//! Everything stops when the shared cancellation token fires.

use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use arb_core::{ConfigHandle, ConfigResult, EngineConfig, OpportunityCandidate};
use arb_detector::{
    ArbitrageScanner, ConstantProductEstimator, RouterCalldataDecoder, SandwichDetector,
    ScanReport,
};
use arb_executor::{ExecutionGate, GateOutcome, TradeExecutor};
use arb_price_feed::{
    pending_queue, BackoffPolicy, GasEstimator, PendingTxEvent, PendingTxSource, PriceSource,
    QueueStats, SubscriptionSupervisor,
};

/// External services the engine talks to
pub struct Collaborators {
    pub prices: Arc<dyn PriceSource>,
    pub gas: Arc<dyn GasEstimator>,
    pub executor: Arc<dyn TradeExecutor>,
    /// Sandwich detection only runs when a pending tx source is present
    pub pending: Option<Arc<dyn PendingTxSource>>,
}

/// Engine counters
#[derive(Debug, Default)]
pub struct EngineStats {
    pub reports: AtomicU64,
    pub candidates: AtomicU64,
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub failed: AtomicU64,
    pub observations: AtomicU64,
    pub pending_dropped: AtomicU64,
}

impl EngineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

pub struct Engine {
    config: Arc<ConfigHandle>,
    scanner: Arc<ArbitrageScanner>,
    detector: Arc<SandwichDetector>,
    gate: Arc<ExecutionGate>,
    pending: Option<Arc<dyn PendingTxSource>>,
    cancel: CancellationToken,
    stats: EngineStats,
}

impl Engine {
    /// Validates `config`; nothing starts on an invalid configuration
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> ConfigResult<Self> {
        let config = Arc::new(ConfigHandle::new(config)?);

        let Collaborators {
            prices,
            gas,
            executor,
            pending,
        } = collaborators;

        let scanner = Arc::new(ArbitrageScanner::new(Arc::clone(&prices), Arc::clone(&gas)));
        let detector = Arc::new(SandwichDetector::new(
            Arc::clone(&prices),
            Arc::clone(&gas),
            Arc::new(RouterCalldataDecoder::new()),
            Arc::new(ConstantProductEstimator),
        ));
        let gate = Arc::new(ExecutionGate::new(prices, gas, executor));

        Ok(Self {
            config,
            scanner,
            detector,
            gate,
            pending,
            cancel: CancellationToken::new(),
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    /// Swap in a new configuration; running passes finish on the old one
    pub fn reconfigure(&self, config: EngineConfig) -> ConfigResult<()> {
        self.config.replace(config)?;
        info!("Configuration updated");
        Ok(())
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Run every loop until shutdown
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!("Starting engine");
        let snapshot = self.config.snapshot();
        let mut tasks = JoinSet::new();

        let (report_tx, mut report_rx) = watch::channel::<Option<ScanReport>>(None);
        tasks.spawn(Arc::clone(&self.scanner).run(
            Arc::clone(&self.config),
            report_tx,
            self.cancel.clone(),
        ));

        let engine = Arc::clone(&self);
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = engine.cancel.cancelled() => break,
                    changed = report_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                // Only the newest report matters; older ones were superseded
                let Some(report) = report_rx.borrow_and_update().clone() else {
                    continue;
                };
                let config = engine.config.snapshot();
                engine.process_report(report, &config).await;
            }
            debug!("Report consumer stopped");
        });

        let mut queue_stats: Option<Arc<QueueStats>> = None;
        if let Some(source) = self.pending.clone() {
            let (producer, consumer, stats) = pending_queue(snapshot.sandwich.queue_capacity);
            queue_stats = Some(stats);

            let backoff = BackoffPolicy::from_millis(
                snapshot.sandwich.reconnect_initial_ms,
                snapshot.sandwich.reconnect_max_ms,
            );
            let supervisor = SubscriptionSupervisor::new(source, backoff, producer);
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                supervisor.run(cancel).await;
            });

            let engine = Arc::clone(&self);
            tasks.spawn(async move {
                let mut events = Box::pin(consumer.into_stream());
                loop {
                    let event = tokio::select! {
                        _ = engine.cancel.cancelled() => break,
                        event = events.next() => match event {
                            Some(event) => event,
                            None => break,
                        },
                    };
                    tokio::select! {
                        _ = engine.cancel.cancelled() => break,
                        _ = engine.process_pending(event) => {}
                    }
                }
                debug!("Sandwich consumer stopped");
            });
        } else {
            info!("No pending transaction feed configured, sandwich detection disabled");
        }

        self.cancel.cancelled().await;
        info!("Shutdown requested, waiting for tasks");

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Engine task failed: {}", e);
            }
        }

        if let Some(stats) = queue_stats {
            self.stats.pending_dropped.store(stats.dropped(), Ordering::Relaxed);
        }
        self.log_stats();
        Ok(())
    }

    /// Offer a pass's candidates to the gate in order, stopping after the
    /// configured number of submission attempts. Returns the number submitted.
    pub async fn process_report(&self, report: ScanReport, config: &EngineConfig) -> usize {
        EngineStats::bump(&self.stats.reports);
        self.stats
            .candidates
            .fetch_add(report.len() as u64, Ordering::Relaxed);

        let limit = config.arbitrage.max_executions_per_scan;
        let mut attempts = 0;
        let mut submitted = 0;

        for candidate in report {
            if attempts >= limit {
                break;
            }
            match self.offer(candidate, config).await {
                Some(true) => {
                    attempts += 1;
                    submitted += 1;
                }
                Some(false) => attempts += 1,
                None => {}
            }
        }
        submitted
    }

    /// Inspect one pending transaction and act on its legs
    pub async fn process_pending(&self, event: PendingTxEvent) {
        let config = self.config.snapshot();
        let Some(signal) = self.detector.inspect(&event, &config).await else {
            return;
        };
        EngineStats::bump(&self.stats.observations);

        if !config.sandwich.execute {
            return;
        }
        // Legs are submitted independently; one failing does not cancel the other
        for leg in signal.legs() {
            self.offer(leg, &config).await;
        }
    }

    /// `Some(true)` submitted, `Some(false)` submission failed, `None` rejected
    async fn offer(&self, candidate: OpportunityCandidate, config: &EngineConfig) -> Option<bool> {
        match self.gate.execute(candidate, config).await {
            Ok(GateOutcome::Submitted { .. }) => {
                EngineStats::bump(&self.stats.submitted);
                Some(true)
            }
            Ok(GateOutcome::Rejected(decision)) => {
                EngineStats::bump(&self.stats.rejected);
                if let Some(reason) = decision.reject_reason() {
                    debug!("Candidate {} rejected: {}", decision.candidate.id, reason);
                }
                None
            }
            Err(e) => {
                EngineStats::bump(&self.stats.failed);
                warn!("Execution failed, not retrying: {}", e);
                Some(false)
            }
        }
    }

    fn log_stats(&self) {
        let scanner = self.scanner.stats();
        let detector = self.detector.stats();
        info!(
            scans = scanner.scans_completed(),
            skipped_ticks = scanner.ticks_skipped(),
            candidates = EngineStats::get(&self.stats.candidates),
            submitted = EngineStats::get(&self.stats.submitted),
            rejected = EngineStats::get(&self.stats.rejected),
            failed = EngineStats::get(&self.stats.failed),
            pending_seen = detector.events_seen(),
            observations = EngineStats::get(&self.stats.observations),
            pending_dropped = EngineStats::get(&self.stats.pending_dropped),
            "Engine stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, B256, U256};
    use alloy_sol_types::SolCall;
    use arb_core::{
        FeedResult, OpportunityKind, PairKey, PricePoint, Reserves, RouterConfig, TrackedPair,
        VenueId,
    };
    use arb_detector::decoder::IUniswapV2Router;
    use arb_executor::DryRunExecutor;
    use arb_price_feed::{FixedGasEstimator, InMemoryPriceSource, PendingTxStream};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn pair() -> PairKey {
        PairKey::new(Address::repeat_byte(1), Address::repeat_byte(2))
    }

    fn config() -> EngineConfig {
        EngineConfig {
            tracked_pairs: vec![TrackedPair {
                token_a: Address::repeat_byte(1),
                token_b: Address::repeat_byte(2),
                symbol: None,
            }],
            venues: vec!["a".into(), "b".into(), "c".into()],
            ..Default::default()
        }
    }

    struct Fixture {
        engine: Arc<Engine>,
        prices: Arc<InMemoryPriceSource>,
        executor: Arc<DryRunExecutor>,
    }

    fn fixture(config: EngineConfig, pending: Option<Arc<dyn PendingTxSource>>) -> Fixture {
        let prices = Arc::new(InMemoryPriceSource::new());
        let executor = Arc::new(DryRunExecutor::new());
        let engine = Engine::new(
            config,
            Collaborators {
                prices: prices.clone(),
                gas: Arc::new(FixedGasEstimator::new(1.0)),
                executor: executor.clone(),
                pending,
            },
        )
        .unwrap();
        Fixture {
            engine: Arc::new(engine),
            prices,
            executor,
        }
    }

    fn candidate(sell: &str, buy: &str, net: f64) -> OpportunityCandidate {
        OpportunityCandidate::new(
            OpportunityKind::Arbitrage,
            pair(),
            PricePoint::live(sell.into(), 105.0),
            PricePoint::live(buy.into(), 100.0),
            10.0,
            1.0,
            net,
        )
    }

    fn report(candidates: Vec<OpportunityCandidate>) -> ScanReport {
        ScanReport {
            candidates,
            health: arb_detector::ScanHealth::Healthy,
            pairs_scanned: 1,
            quotes_ok: 3,
            quotes_failed: 0,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let result = Engine::new(
            EngineConfig::default(),
            Collaborators {
                prices: Arc::new(InMemoryPriceSource::new()),
                gas: Arc::new(FixedGasEstimator::new(1.0)),
                executor: Arc::new(DryRunExecutor::new()),
                pending: None,
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_one_execution_per_scan_by_default() {
        let f = fixture(config(), None);
        f.prices.set_price(&VenueId::from("a"), pair(), 100.0);
        f.prices.set_price(&VenueId::from("b"), pair(), 105.0);
        f.prices.set_price(&VenueId::from("c"), pair(), 105.0);

        let cfg = f.engine.config().snapshot();
        let submitted = f
            .engine
            .process_report(
                report(vec![candidate("b", "a", 48.7), candidate("c", "a", 48.7)]),
                &cfg,
            )
            .await;

        assert_eq!(submitted, 1);
        assert_eq!(f.executor.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_does_not_use_up_the_slot() {
        let f = fixture(config(), None);
        f.prices.set_price(&VenueId::from("a"), pair(), 100.0);
        f.prices.set_price(&VenueId::from("b"), pair(), 100.0); // spread gone
        f.prices.set_price(&VenueId::from("c"), pair(), 105.0);

        let cfg = f.engine.config().snapshot();
        let submitted = f
            .engine
            .process_report(
                report(vec![candidate("b", "a", 48.7), candidate("c", "a", 48.7)]),
                &cfg,
            )
            .await;

        assert_eq!(submitted, 1);
        let sent = f.executor.submitted();
        assert_eq!(sent[0].candidate.sell.venue.as_str(), "c");
        assert_eq!(EngineStats::get(&f.engine.stats().rejected), 1);
    }

    #[tokio::test]
    async fn test_reconfigure_rejects_invalid_config() {
        let f = fixture(config(), None);
        assert!(f.engine.reconfigure(EngineConfig::default()).is_err());
        assert_eq!(f.engine.config().snapshot().venues.len(), 3);

        let mut next = config();
        next.arbitrage.max_executions_per_scan = 3;
        f.engine.reconfigure(next).unwrap();
        assert_eq!(f.engine.config().snapshot().arbitrage.max_executions_per_scan, 3);
    }

    fn router() -> Address {
        Address::repeat_byte(0x7a)
    }

    fn sandwich_config(execute: bool) -> EngineConfig {
        let mut cfg = config();
        cfg.sandwich.execute = execute;
        cfg.sandwich.routers.push(RouterConfig {
            address: router(),
            venue: "a".into(),
        });
        cfg
    }

    /// Pending buy of the base token with 1.0 quote token routed to venue "a"
    fn routed_swap() -> PendingTxEvent {
        let input = IUniswapV2Router::swapExactTokensForTokensCall {
            amountIn: U256::from(1_000_000_000_000_000_000u128),
            amountOutMin: U256::ZERO,
            path: vec![Address::repeat_byte(2), Address::repeat_byte(1)],
            to: Address::repeat_byte(0x11),
            deadline: U256::from(1_700_000_000u64),
        }
        .abi_encode();
        PendingTxEvent::new(B256::repeat_byte(5), Some(router()), Bytes::from(input), U256::ZERO)
    }

    #[tokio::test]
    async fn test_accepted_sandwich_leg_is_submitted() {
        let f = fixture(sandwich_config(true), None);
        f.prices.set_reserves(&VenueId::from("a"), pair(), Reserves { base: 1.0, quote: 100.0 });

        f.engine.process_pending(routed_swap()).await;

        let stats = f.engine.stats();
        assert_eq!(EngineStats::get(&stats.observations), 1);
        assert_eq!(EngineStats::get(&stats.submitted), 1);
        let sent = f.executor.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].candidate.kind, OpportunityKind::FrontRun);
        assert_eq!(sent[0].candidate.source_tx, Some(B256::repeat_byte(5)));
        // Post estimate (101 - 0.003)^2 / 100 against the live 100.0
        assert!((sent[0].revalidated_profit - 18.9192).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_sandwich_observation_only_by_default() {
        let f = fixture(sandwich_config(false), None);
        f.prices.set_reserves(&VenueId::from("a"), pair(), Reserves { base: 1.0, quote: 100.0 });

        f.engine.process_pending(routed_swap()).await;

        assert_eq!(EngineStats::get(&f.engine.stats().observations), 1);
        assert_eq!(f.executor.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_sandwich_leg_is_not_retried() {
        let f = fixture(sandwich_config(true), None);
        f.prices.set_reserves(&VenueId::from("a"), pair(), Reserves { base: 1.0, quote: 100.0 });
        f.executor.fail_with("nonce too low");

        f.engine.process_pending(routed_swap()).await;
        f.engine.process_pending(routed_swap()).await;

        let stats = f.engine.stats();
        assert_eq!(EngineStats::get(&stats.failed), 2);
        assert_eq!(EngineStats::get(&stats.submitted), 0);
        assert_eq!(EngineStats::get(&stats.observations), 2);
    }

    #[tokio::test]
    async fn test_reconfigured_fee_reaches_sandwich_estimate() {
        let f = fixture(sandwich_config(true), None);
        f.prices.set_reserves(&VenueId::from("a"), pair(), Reserves { base: 1.0, quote: 100.0 });

        let mut next = sandwich_config(true);
        next.trading_fee_rate = 0.0;
        f.engine.reconfigure(next).unwrap();
        f.engine.process_pending(routed_swap()).await;

        // post 102.01: gross 20.1, no fees, gas 1.0
        let sent = f.executor.submitted();
        assert_eq!(sent.len(), 1);
        assert!((sent[0].revalidated_profit - 19.1).abs() < 1e-9);
    }

    /// Feed that yields a fixed batch once, then idles
    struct OneShotFeed(Mutex<Option<Vec<PendingTxEvent>>>);

    #[async_trait]
    impl PendingTxSource for OneShotFeed {
        async fn subscribe(&self) -> FeedResult<PendingTxStream> {
            let batch = self.0.lock().take();
            match batch {
                Some(events) => Ok(futures::stream::iter(events.into_iter().map(Ok))
                    .chain(futures::stream::pending())
                    .boxed()),
                None => Ok(futures::stream::pending().boxed()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_scans_and_shuts_down() {
        let events = vec![PendingTxEvent::new(
            B256::repeat_byte(1),
            Some(Address::repeat_byte(0x7a)),
            Bytes::new(),
            U256::ZERO,
        )];
        let feed: Arc<dyn PendingTxSource> = Arc::new(OneShotFeed(Mutex::new(Some(events))));

        let f = fixture(config(), Some(feed));
        f.prices.set_price(&VenueId::from("a"), pair(), 100.0);
        f.prices.set_price(&VenueId::from("b"), pair(), 105.0);
        f.prices.set_price(&VenueId::from("c"), pair(), 102.0);

        let handle = tokio::spawn(Arc::clone(&f.engine).run());
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        f.engine.shutdown();
        handle.await.unwrap().unwrap();

        let stats = f.engine.stats();
        assert!(EngineStats::get(&stats.reports) >= 2);
        assert!(EngineStats::get(&stats.submitted) >= 2);
        // One execution per pass even though every pass finds three candidates
        assert_eq!(
            EngineStats::get(&stats.submitted),
            EngineStats::get(&stats.reports)
        );
        // Undecodable pending tx is inspected and dropped
        assert_eq!(f.engine.detector.stats().events_seen(), 1);
        assert_eq!(EngineStats::get(&stats.observations), 0);
    }
}
