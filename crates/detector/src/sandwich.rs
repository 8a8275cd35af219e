//! Pending transaction (front-run / back-run) detection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use arb_core::{
    EngineConfig, OpportunityCandidate, OpportunityKind, PendingTxObservation, PricePoint,
};
use arb_price_feed::{GasEstimator, PendingTxEvent, PriceSource};

use crate::decoder::TradeDecoder;
use crate::evaluator::{price_impact, OpportunityEvaluator};
use crate::impact::PostTradeEstimator;

/// Observation plus whichever legs cleared the threshold.
///
/// The legs are independent; one may be present without the other.
#[derive(Debug, Clone)]
pub struct SandwichSignal {
    pub observation: PendingTxObservation,
    pub front_run: Option<OpportunityCandidate>,
    pub back_run: Option<OpportunityCandidate>,
}

impl SandwichSignal {
    pub fn legs(self) -> impl Iterator<Item = OpportunityCandidate> {
        self.front_run.into_iter().chain(self.back_run)
    }
}

#[derive(Debug, Default)]
pub struct DetectorStats {
    events_seen: AtomicU64,
    trades_decoded: AtomicU64,
    observations: AtomicU64,
    legs_emitted: AtomicU64,
}

impl DetectorStats {
    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }

    pub fn trades_decoded(&self) -> u64 {
        self.trades_decoded.load(Ordering::Relaxed)
    }

    pub fn observations(&self) -> u64 {
        self.observations.load(Ordering::Relaxed)
    }

    pub fn legs_emitted(&self) -> u64 {
        self.legs_emitted.load(Ordering::Relaxed)
    }
}

pub struct SandwichDetector {
    prices: Arc<dyn PriceSource>,
    gas: Arc<dyn GasEstimator>,
    decoder: Arc<dyn TradeDecoder>,
    estimator: Arc<dyn PostTradeEstimator>,
    stats: DetectorStats,
}

impl SandwichDetector {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        gas: Arc<dyn GasEstimator>,
        decoder: Arc<dyn TradeDecoder>,
        estimator: Arc<dyn PostTradeEstimator>,
    ) -> Self {
        Self {
            prices,
            gas,
            decoder,
            estimator,
            stats: DetectorStats::default(),
        }
    }

    pub fn stats(&self) -> &DetectorStats {
        &self.stats
    }

    /// Inspect one pending transaction
    pub async fn inspect(&self, event: &PendingTxEvent, config: &EngineConfig) -> Option<SandwichSignal> {
        self.stats.events_seen.fetch_add(1, Ordering::Relaxed);

        let trade = self.decoder.decode(event, config)?;
        self.stats.trades_decoded.fetch_add(1, Ordering::Relaxed);

        let quote = match self.prices.get_quote(&trade.venue, trade.pair).await {
            Ok(quote) if quote.is_valid() => quote,
            Ok(quote) => {
                warn!("Invalid pre-trade quote {} on {} for {}", quote.price, trade.venue, trade.pair);
                return None;
            }
            Err(e) => {
                warn!("Pre-trade quote failed for tx {}: {}", trade.tx_hash, e);
                return None;
            }
        };

        let Some(post) = self.estimator.estimate(&quote, &trade, config.trading_fee_rate) else {
            debug!(tx = %trade.tx_hash, venue = %trade.venue, "No reserves to estimate post-trade price");
            return None;
        };

        let impact = price_impact(quote.price, post.value());
        if !(impact > config.sandwich.price_impact_threshold) {
            trace!(tx = %trade.tx_hash, impact, "Impact below threshold");
            return None;
        }

        self.stats.observations.fetch_add(1, Ordering::Relaxed);
        info!(
            "Pending tx {} moves {} on {}: {:.4} -> {:.4} ({:+.2}%)",
            trade.tx_hash,
            trade.pair,
            trade.venue,
            quote.price,
            post.value(),
            impact * 100.0
        );

        let mut signal = SandwichSignal {
            observation: PendingTxObservation {
                tx_hash: trade.tx_hash,
                pair: trade.pair,
                venue: trade.venue.clone(),
                pre_price: quote.price,
                post_estimate: post,
                impact,
                observed_at: chrono::Utc::now(),
            },
            front_run: None,
            back_run: None,
        };

        let gas = match self.gas.current().await {
            Ok(gas) => gas.cost_per_trade,
            Err(e) => {
                warn!("Gas estimate unavailable, not pricing legs for {}: {}", trade.tx_hash, e);
                return Some(signal);
            }
        };

        let evaluator = OpportunityEvaluator::new(config.trading_fee_rate);
        let amount = config.sandwich.trade_amount;
        let threshold = config.sandwich.min_profit_threshold;

        // Buy now at the observed price, sell into the moved price
        signal.front_run = evaluator
            .price_candidate(
                OpportunityKind::FrontRun,
                trade.pair,
                PricePoint::estimated(trade.venue.clone(), post),
                PricePoint::live(trade.venue.clone(), quote.price),
                amount,
                gas,
                threshold,
            )
            .map(|c| c.with_source_tx(trade.tx_hash));

        // Buy at the moved price, sell once it reverts
        signal.back_run = evaluator
            .price_candidate(
                OpportunityKind::BackRun,
                trade.pair,
                PricePoint::live(trade.venue.clone(), quote.price),
                PricePoint::estimated(trade.venue.clone(), post),
                amount,
                gas,
                threshold,
            )
            .map(|c| c.with_source_tx(trade.tx_hash));

        for leg in signal.front_run.iter().chain(signal.back_run.iter()) {
            self.stats.legs_emitted.fetch_add(1, Ordering::Relaxed);
            info!(
                "Sandwich leg {} on {}: net={:.4}",
                leg.kind, leg.pair, leg.net_profit
            );
        }

        Some(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodedTrade, RouterCalldataDecoder};
    use crate::impact::ConstantProductEstimator;
    use alloy_primitives::{Address, Bytes, B256, U256};
    use arb_core::{EstimatedPrice, PairKey, PriceBasis, Quote, Reserves, TrackedPair, VenueId};
    use arb_price_feed::{FixedGasEstimator, InMemoryPriceSource};

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
            venues: vec!["uniswap-v2".into()],
            ..Default::default()
        }
    }

    /// Every event is a trade on the tracked pair
    struct AnyTrade;

    impl TradeDecoder for AnyTrade {
        fn decode(&self, event: &PendingTxEvent, _config: &EngineConfig) -> Option<DecodedTrade> {
            event.to.map(|_| DecodedTrade {
                tx_hash: event.tx_hash,
                venue: "uniswap-v2".into(),
                pair: pair(),
                token_in: pair().quote(),
                amount_in: 1.0,
            })
        }
    }

    /// Post-trade price fixed in advance
    struct FixedPost(f64);

    impl PostTradeEstimator for FixedPost {
        fn estimate(&self, _quote: &Quote, _trade: &DecodedTrade, _fee_rate: f64) -> Option<EstimatedPrice> {
            EstimatedPrice::new(self.0)
        }
    }

    fn detector(post: f64) -> (SandwichDetector, Arc<InMemoryPriceSource>) {
        let prices = Arc::new(InMemoryPriceSource::new());
        prices.set_price(&VenueId::from("uniswap-v2"), pair(), 100.0);
        let detector = SandwichDetector::new(
            prices.clone(),
            Arc::new(FixedGasEstimator::new(1.0)),
            Arc::new(AnyTrade),
            Arc::new(FixedPost(post)),
        );
        (detector, prices)
    }

    fn event(n: u8) -> PendingTxEvent {
        PendingTxEvent::new(B256::repeat_byte(n), Some(Address::repeat_byte(0x7a)), Bytes::new(), U256::ZERO)
    }

    #[tokio::test]
    async fn test_two_percent_impact_emits_front_run_only() {
        let (detector, _) = detector(102.0);
        let signal = detector.inspect(&event(1), &config()).await.unwrap();

        assert!((signal.observation.impact - 0.02).abs() < 1e-12);
        assert_eq!(signal.observation.pre_price, 100.0);

        let front = signal.front_run.as_ref().unwrap();
        assert_eq!(front.sell.basis, PriceBasis::Estimated);
        assert_eq!(front.buy.basis, PriceBasis::Live);
        assert!((front.net_profit - 18.88).abs() < 1e-9);
        assert_eq!(front.source_tx, Some(B256::repeat_byte(1)));

        // evaluate(100, 102, ...) is a loss, so the back-run is gated out
        assert!(signal.back_run.is_none());
    }

    #[tokio::test]
    async fn test_impact_below_threshold_is_ignored() {
        let (detector, _) = detector(100.5);
        assert!(detector.inspect(&event(1), &config()).await.is_none());
        assert_eq!(detector.stats().observations(), 0);
    }

    #[tokio::test]
    async fn test_price_drop_is_not_an_observation() {
        let (detector, _) = detector(97.0);
        assert!(detector.inspect(&event(1), &config()).await.is_none());
    }

    #[tokio::test]
    async fn test_legs_gated_independently() {
        let (detector, _) = detector(102.0);
        let mut cfg = config();
        cfg.sandwich.min_profit_threshold = 20.0;

        let signal = detector.inspect(&event(1), &cfg).await.unwrap();
        assert!(signal.front_run.is_none());
        assert!(signal.back_run.is_none());
    }

    #[tokio::test]
    async fn test_missing_quote_skips_event() {
        let (detector, prices) = detector(102.0);
        prices.set_failing(&"uniswap-v2".into(), true);
        assert!(detector.inspect(&event(1), &config()).await.is_none());
        assert_eq!(detector.stats().trades_decoded(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_event_is_skipped() {
        let prices = Arc::new(InMemoryPriceSource::new());
        let detector = SandwichDetector::new(
            prices,
            Arc::new(FixedGasEstimator::new(1.0)),
            Arc::new(RouterCalldataDecoder::new()),
            Arc::new(ConstantProductEstimator),
        );
        assert!(detector.inspect(&event(1), &config()).await.is_none());
        assert_eq!(detector.stats().events_seen(), 1);
        assert_eq!(detector.stats().trades_decoded(), 0);
    }

    #[tokio::test]
    async fn test_quote_without_reserves_is_skipped() {
        let prices = Arc::new(InMemoryPriceSource::new());
        prices.set_price(&"uniswap-v2".into(), pair(), 100.0);
        let detector = SandwichDetector::new(
            prices.clone(),
            Arc::new(FixedGasEstimator::new(1.0)),
            Arc::new(AnyTrade),
            Arc::new(ConstantProductEstimator),
        );
        assert!(detector.inspect(&event(1), &config()).await.is_none());

        // Same trade against a pool with reserves goes through the estimator
        prices.set_reserves(&"uniswap-v2".into(), pair(), Reserves { base: 1.0, quote: 100.0 });
        let signal = detector.inspect(&event(2), &config()).await;
        assert!(signal.is_some());
    }

    #[tokio::test]
    async fn test_post_estimate_follows_snapshot_fee() {
        let prices = Arc::new(InMemoryPriceSource::new());
        prices.set_reserves(&"uniswap-v2".into(), pair(), Reserves { base: 1.0, quote: 100.0 });
        let detector = SandwichDetector::new(
            prices,
            Arc::new(FixedGasEstimator::new(1.0)),
            Arc::new(AnyTrade),
            Arc::new(ConstantProductEstimator),
        );

        let mut free = config();
        free.trading_fee_rate = 0.0;
        let mut taxed = config();
        taxed.trading_fee_rate = 0.4;

        // 1 quote in: post = (101 - fee)^2 / 100
        let before = detector.inspect(&event(1), &free).await.unwrap();
        let after = detector.inspect(&event(2), &taxed).await.unwrap();
        assert!((before.observation.post_estimate.value() - 102.01).abs() < 1e-9);
        assert!((after.observation.post_estimate.value() - 101.2036).abs() < 1e-9);
    }
}
