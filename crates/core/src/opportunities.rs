//! Opportunity and execution decision types

use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{EstimatedPrice, PairKey, VenueId};

/// Type of opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    /// Buy on venue A, sell on venue B
    Arbitrage,
    /// Buy before a pending trade lands, sell at the post-trade price
    FrontRun,
    /// Buy at the post-trade price, sell once the price reverts
    BackRun,
}

impl OpportunityKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpportunityKind::Arbitrage => "arbitrage",
            OpportunityKind::FrontRun => "front_run",
            OpportunityKind::BackRun => "back_run",
        }
    }

    pub fn is_sandwich_leg(&self) -> bool {
        matches!(self, OpportunityKind::FrontRun | OpportunityKind::BackRun)
    }
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a price point came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// Observed venue price; re-fetched at the gate
    Live,
    /// Post-trade estimate; carried through the gate unchanged
    Estimated,
}

/// One side of an opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub venue: VenueId,
    pub price: f64,
    pub basis: PriceBasis,
}

impl PricePoint {
    pub fn live(venue: VenueId, price: f64) -> Self {
        Self {
            venue,
            price,
            basis: PriceBasis::Live,
        }
    }

    pub fn estimated(venue: VenueId, price: EstimatedPrice) -> Self {
        Self {
            venue,
            price: price.value(),
            basis: PriceBasis::Estimated,
        }
    }

    pub fn is_live(&self) -> bool {
        self.basis == PriceBasis::Live
    }
}

/// Detected opportunity, consumed once by the execution gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub id: Uuid,
    pub kind: OpportunityKind,
    pub pair: PairKey,

    // Legs
    pub sell: PricePoint,
    pub buy: PricePoint,

    // Profit calculation
    pub trade_amount: f64,
    pub gas_cost: f64,
    pub net_profit: f64,

    /// Pending transaction that triggered a sandwich leg
    pub source_tx: Option<B256>,
    pub detected_at: DateTime<Utc>,
}

impl OpportunityCandidate {
    pub fn new(
        kind: OpportunityKind,
        pair: PairKey,
        sell: PricePoint,
        buy: PricePoint,
        trade_amount: f64,
        gas_cost: f64,
        net_profit: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            pair,
            sell,
            buy,
            trade_amount,
            gas_cost,
            net_profit,
            source_tx: None,
            detected_at: Utc::now(),
        }
    }

    pub fn with_source_tx(mut self, tx_hash: B256) -> Self {
        self.source_tx = Some(tx_hash);
        self
    }

    /// Price difference between the sell and buy side
    pub fn spread(&self) -> f64 {
        self.sell.price - self.buy.price
    }

    pub fn is_same_venue(&self) -> bool {
        self.sell.venue == self.buy.venue
    }

    pub fn route_label(&self) -> String {
        if self.is_same_venue() {
            format!("{} ({})", self.sell.venue, self.kind)
        } else {
            format!("buy {} -> sell {}", self.buy.venue, self.sell.venue)
        }
    }
}

/// Why the gate refused to commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Re-validated profit fell below the minimum threshold
    ProfitDecayed { threshold: f64 },
    /// Fresh prices could not be obtained
    RevalidationUnavailable(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ProfitDecayed { .. } => f.write_str("profit decayed"),
            RejectReason::RevalidationUnavailable(reason) => {
                write!(f, "revalidation unavailable: {}", reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

/// Terminal outcome of re-validating a candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionDecision {
    pub candidate: OpportunityCandidate,
    pub revalidated_profit: f64,
    pub verdict: Verdict,
    pub decided_at: DateTime<Utc>,
}

impl ExecutionDecision {
    pub fn accept(candidate: OpportunityCandidate, revalidated_profit: f64) -> Self {
        Self {
            candidate,
            revalidated_profit,
            verdict: Verdict::Accept,
            decided_at: Utc::now(),
        }
    }

    pub fn reject(
        candidate: OpportunityCandidate,
        revalidated_profit: f64,
        reason: RejectReason,
    ) -> Self {
        Self {
            candidate,
            revalidated_profit,
            verdict: Verdict::Reject(reason),
            decided_at: Utc::now(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accept)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.verdict {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(reason),
        }
    }
}

/// Pending trade whose estimated price impact crossed the threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTxObservation {
    pub tx_hash: B256,
    pub pair: PairKey,
    pub venue: VenueId,
    pub pre_price: f64,
    pub post_estimate: EstimatedPrice,
    /// `(post - pre) / pre`
    pub impact: f64,
    pub observed_at: DateTime<Utc>,
}
