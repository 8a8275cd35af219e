//! Cross-venue arbitrage scanner

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use arb_core::{
    ConfigHandle, EngineConfig, OpportunityCandidate, OpportunityKind, PairKey, PricePoint, Quote,
    VenueId,
};
use arb_price_feed::{GasEstimator, PriceSource};

use crate::evaluator::OpportunityEvaluator;

/// How much of the market a scan pass could see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanHealth {
    Healthy,
    /// Some venue quotes failed; the rest were scanned
    Degraded { failed_quotes: usize },
    /// Every quote request failed
    SourcesUnavailable,
    /// Spreads existed but gas could not be priced
    GasUnavailable,
}

/// Result of one scan pass
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Ordered by descending net profit
    pub candidates: Vec<OpportunityCandidate>,
    pub health: ScanHealth,
    pub pairs_scanned: usize,
    pub quotes_ok: usize,
    pub quotes_failed: usize,
    pub duration: Duration,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

impl IntoIterator for ScanReport {
    type Item = OpportunityCandidate;
    type IntoIter = std::vec::IntoIter<OpportunityCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Scan loop counters
#[derive(Debug, Default)]
pub struct ScannerStats {
    scans_started: AtomicU64,
    scans_completed: AtomicU64,
    ticks_skipped: AtomicU64,
    candidates_found: AtomicU64,
}

impl ScannerStats {
    pub fn scans_started(&self) -> u64 {
        self.scans_started.load(Ordering::Relaxed)
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::Relaxed)
    }

    pub fn candidates_found(&self) -> u64 {
        self.candidates_found.load(Ordering::Relaxed)
    }
}

/// Clears the in-flight flag however the scan task ends
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Valid quotes for one pair, in configured venue order
struct PairQuotes {
    pair: PairKey,
    quotes: Vec<Quote>,
    failed: usize,
}

/// Main arbitrage scanner
pub struct ArbitrageScanner {
    prices: Arc<dyn PriceSource>,
    gas: Arc<dyn GasEstimator>,
    in_flight: Arc<AtomicBool>,
    stats: ScannerStats,
}

impl ArbitrageScanner {
    pub fn new(prices: Arc<dyn PriceSource>, gas: Arc<dyn GasEstimator>) -> Self {
        Self {
            prices,
            gas,
            in_flight: Arc::new(AtomicBool::new(false)),
            stats: ScannerStats::default(),
        }
    }

    pub fn stats(&self) -> &ScannerStats {
        &self.stats
    }

    /// One pass over every tracked pair and venue combination
    pub async fn scan(&self, config: &EngineConfig) -> ScanReport {
        let start = Instant::now();
        let evaluator = OpportunityEvaluator::new(config.trading_fee_rate);

        let pairs = join_all(
            config
                .pair_keys()
                .map(|pair| self.fetch_pair(pair, &config.venues)),
        )
        .await;

        let quotes_ok: usize = pairs.iter().map(|p| p.quotes.len()).sum();
        let quotes_failed: usize = pairs.iter().map(|p| p.failed).sum();

        // Unordered venue combinations with a non-zero spread; higher price sells
        let mut spreads = Vec::new();
        for entry in &pairs {
            for (i, a) in entry.quotes.iter().enumerate() {
                for b in &entry.quotes[i + 1..] {
                    if a.price == b.price {
                        continue;
                    }
                    let (sell, buy) = if a.price > b.price { (a, b) } else { (b, a) };
                    spreads.push((
                        entry.pair,
                        PricePoint::live(sell.venue.clone(), sell.price),
                        PricePoint::live(buy.venue.clone(), buy.price),
                    ));
                }
            }
        }

        let mut report = ScanReport {
            candidates: Vec::new(),
            health: if quotes_ok == 0 && quotes_failed > 0 {
                ScanHealth::SourcesUnavailable
            } else if quotes_failed > 0 {
                ScanHealth::Degraded {
                    failed_quotes: quotes_failed,
                }
            } else {
                ScanHealth::Healthy
            },
            pairs_scanned: pairs.len(),
            quotes_ok,
            quotes_failed,
            duration: Duration::ZERO,
        };

        if report.health == ScanHealth::SourcesUnavailable {
            error!(
                "All {} venue quotes failed, no market data this pass",
                quotes_failed
            );
        }

        if !spreads.is_empty() {
            match self.gas.current().await {
                Ok(gas) => {
                    let threshold = config.arbitrage.min_profit_threshold;
                    let amount = config.arbitrage.trade_amount;
                    report.candidates = spreads
                        .into_iter()
                        .filter_map(|(pair, sell, buy)| {
                            evaluator.price_candidate(
                                OpportunityKind::Arbitrage,
                                pair,
                                sell,
                                buy,
                                amount,
                                gas.cost_per_trade,
                                threshold,
                            )
                        })
                        .collect();
                    report
                        .candidates
                        .sort_by(|a, b| b.net_profit.total_cmp(&a.net_profit));
                }
                Err(e) => {
                    error!("Gas estimate unavailable, skipping pass: {}", e);
                    report.health = ScanHealth::GasUnavailable;
                }
            }
        }

        report.duration = start.elapsed();
        self.stats
            .candidates_found
            .fetch_add(report.candidates.len() as u64, Ordering::Relaxed);

        if report.candidates.is_empty() {
            debug!(
                "Scan completed in {:?}, {} pairs, no opportunities",
                report.duration, report.pairs_scanned
            );
        } else {
            info!(
                "Found {} opportunities in {:?}",
                report.candidates.len(),
                report.duration
            );
            for c in &report.candidates {
                info!(
                    "Opportunity: {} {} net={:.4} spread={:.6}",
                    c.pair,
                    c.route_label(),
                    c.net_profit,
                    c.spread()
                );
            }
        }

        report
    }

    async fn fetch_pair(&self, pair: PairKey, venues: &[VenueId]) -> PairQuotes {
        let results = join_all(venues.iter().map(|venue| self.prices.get_quote(venue, pair))).await;

        let mut quotes = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (venue, result) in venues.iter().zip(results) {
            match result {
                Ok(quote) if quote.is_valid() => quotes.push(quote),
                Ok(quote) => {
                    warn!("Discarding invalid quote {} from {} for {}", quote.price, venue, pair);
                    failed += 1;
                }
                Err(e) => {
                    warn!("Quote failed for {}: {}", pair, e);
                    failed += 1;
                }
            }
        }

        PairQuotes { pair, quotes, failed }
    }

    /// Run continuous scanning until cancelled.
    ///
    /// A tick that fires while the previous pass is still running is skipped.
    /// Each pass loads one config snapshot and uses it throughout. Finished
    /// reports replace any the consumer has not picked up yet.
    pub async fn run(
        self: Arc<Self>,
        config: Arc<ConfigHandle>,
        reports: watch::Sender<Option<ScanReport>>,
        cancel: CancellationToken,
    ) {
        info!("Starting arbitrage scanner");
        let reports = Arc::new(reports);

        let mut period = config.snapshot().arbitrage.scan_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = config.snapshot();
                    let configured = snapshot.arbitrage.scan_interval();

                    if self.in_flight.swap(true, Ordering::AcqRel) {
                        let skipped = self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Previous scan still running, skipping tick ({} skipped)", skipped);
                    } else {
                        self.stats.scans_started.fetch_add(1, Ordering::Relaxed);
                        let guard = InFlight(Arc::clone(&self.in_flight));
                        let scanner = Arc::clone(&self);
                        let reports = Arc::clone(&reports);
                        let cancel = cancel.clone();

                        tokio::spawn(async move {
                            let _guard = guard;
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    debug!("Abandoning in-flight scan");
                                }
                                _ = async {
                                    let report = scanner.scan(&snapshot).await;
                                    scanner.stats.scans_completed.fetch_add(1, Ordering::Relaxed);
                                    reports.send_replace(Some(report));
                                } => {}
                            }
                        });
                    }

                    if configured != period {
                        info!("Scan interval changed from {:?} to {:?}", period, configured);
                        period = configured;
                        interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Scanner shutdown requested");
                    break;
                }
            }
        }
    }
}
