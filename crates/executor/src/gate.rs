//! Execution gate
//!
//! Candidates are priced from data that may be a full scan interval old. The
//! gate re-fetches every live price the candidate depends on, recomputes the
//! net profit with the same arithmetic the detectors use and only then hands
//! the decision to the executor.

use futures::future::join;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use arb_core::{
    EngineConfig, ExecutionDecision, ExecutionReceipt, ExecutionResult, OpportunityCandidate,
    PairKey, PricePoint, RejectReason, SourceError, SourceResult,
};
use arb_detector::evaluator;
use arb_price_feed::{GasEstimator, PriceSource};

use crate::submitter::TradeExecutor;

/// What happened to a candidate offered to the gate
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Rejected(ExecutionDecision),
    Submitted {
        decision: ExecutionDecision,
        receipt: ExecutionReceipt,
    },
}

impl GateOutcome {
    pub fn decision(&self) -> &ExecutionDecision {
        match self {
            GateOutcome::Rejected(decision) => decision,
            GateOutcome::Submitted { decision, .. } => decision,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, GateOutcome::Submitted { .. })
    }
}

#[derive(Debug, Default)]
pub struct GateStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl GateStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Accepted decisions whose submission failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub struct ExecutionGate {
    prices: Arc<dyn PriceSource>,
    gas: Arc<dyn GasEstimator>,
    executor: Arc<dyn TradeExecutor>,
    stats: GateStats,
}

impl ExecutionGate {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        gas: Arc<dyn GasEstimator>,
        executor: Arc<dyn TradeExecutor>,
    ) -> Self {
        Self {
            prices,
            gas,
            executor,
            stats: GateStats::default(),
        }
    }

    pub fn stats(&self) -> &GateStats {
        &self.stats
    }

    /// Current price for a live point; estimated points are carried as-is
    async fn refresh(&self, point: &PricePoint, pair: PairKey) -> SourceResult<f64> {
        if !point.is_live() {
            return Ok(point.price);
        }
        let quote = self.prices.get_quote(&point.venue, pair).await?;
        if quote.is_valid() {
            Ok(quote.price)
        } else {
            Err(SourceError::InvalidQuote {
                venue: point.venue.clone(),
                price: quote.price,
            })
        }
    }

    /// Re-validate a candidate against fresh prices
    pub async fn confirm(&self, candidate: OpportunityCandidate, config: &EngineConfig) -> ExecutionDecision {
        let pair = candidate.pair;
        let (sell, buy) = join(
            self.refresh(&candidate.sell, pair),
            self.refresh(&candidate.buy, pair),
        )
        .await;

        let (sell, buy) = match (sell, buy) {
            (Ok(sell), Ok(buy)) => (sell, buy),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Cannot revalidate {} {}: {}", candidate.kind, candidate.id, e);
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                let last_known = candidate.net_profit;
                return ExecutionDecision::reject(
                    candidate,
                    last_known,
                    RejectReason::RevalidationUnavailable(e.to_string()),
                );
            }
        };

        let gas = match self.gas.current().await {
            Ok(gas) => gas.cost_per_trade,
            Err(e) => {
                debug!("Gas refresh failed, using detection estimate: {}", e);
                candidate.gas_cost
            }
        };

        let profit = evaluator::evaluate(sell, buy, candidate.trade_amount, config.trading_fee_rate, gas);
        let threshold = config.min_profit_for(candidate.kind);

        if profit > threshold {
            self.stats.accepted.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Confirmed {} {}: {:.4} -> {:.4}",
                candidate.kind, candidate.pair, candidate.net_profit, profit
            );
            ExecutionDecision::accept(candidate, profit)
        } else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            info!(
                "Rejected {} {}: profit decayed {:.4} -> {:.4} (min {:.4})",
                candidate.kind, candidate.pair, candidate.net_profit, profit, threshold
            );
            ExecutionDecision::reject(candidate, profit, RejectReason::ProfitDecayed { threshold })
        }
    }

    /// Confirm, then submit on acceptance. Submission errors are returned, not retried.
    pub async fn execute(
        &self,
        candidate: OpportunityCandidate,
        config: &EngineConfig,
    ) -> ExecutionResult<GateOutcome> {
        let decision = self.confirm(candidate, config).await;
        if !decision.is_accepted() {
            return Ok(GateOutcome::Rejected(decision));
        }

        match self.executor.submit(&decision).await {
            Ok(receipt) => {
                info!(
                    "Submitted {} {} expected={:.4} tx={} in {}us",
                    decision.candidate.kind,
                    decision.candidate.route_label(),
                    decision.revalidated_profit,
                    receipt.tx_hash.as_deref().unwrap_or("-"),
                    receipt.latency_us
                );
                Ok(GateOutcome::Submitted { decision, receipt })
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    "Submission failed for {} {}: {}",
                    decision.candidate.kind, decision.candidate.id, e
                );
                Err(e)
            }
        }
    }
}
