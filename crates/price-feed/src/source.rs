//! Collaborator traits consumed by the detection loops

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use arb_core::{FeedResult, GasCost, PairKey, Quote, SourceResult, VenueId};

/// Current price of a pair on a venue
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_quote(&self, venue: &VenueId, pair: PairKey) -> SourceResult<Quote>;
}

/// Network gas price, expressed as a cost per trade
#[async_trait]
pub trait GasEstimator: Send + Sync {
    async fn current(&self) -> SourceResult<GasCost>;
}

/// Transaction seen in the mempool before inclusion
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTxEvent {
    pub tx_hash: B256,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
    pub seen_at: DateTime<Utc>,
}

impl PendingTxEvent {
    pub fn new(tx_hash: B256, to: Option<Address>, input: Bytes, value: U256) -> Self {
        Self {
            tx_hash,
            to,
            input,
            value,
            seen_at: Utc::now(),
        }
    }
}

/// Ordered stream of one pending transaction subscription
pub type PendingTxStream = BoxStream<'static, FeedResult<PendingTxEvent>>;

/// Opens pending transaction subscriptions.
///
/// A returned stream ends (or yields an error) when the underlying
/// connection drops; reconnecting is the caller's job.
#[async_trait]
pub trait PendingTxSource: Send + Sync {
    async fn subscribe(&self) -> FeedResult<PendingTxStream>;
}
