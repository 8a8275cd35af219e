//! In-memory sources
//!
//! Quotes are held in a DashMap keyed by (venue, pair) so tests, benches and
//! replay tooling can update prices concurrently with running scans.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use arb_core::{GasCost, PairKey, Quote, Reserves, SourceError, SourceResult, VenueId};

use crate::source::{GasEstimator, PriceSource};

/// Key for quote lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuoteKey {
    venue: VenueId,
    pair: PairKey,
}

/// Price source backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryPriceSource {
    quotes: DashMap<QuoteKey, Quote>,
    failing: DashSet<VenueId>,
    request_count: AtomicU64,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, venue: &VenueId, pair: PairKey, price: f64) {
        let quote = Quote::new(venue.clone(), pair, price);
        self.insert(quote);
    }

    /// Set reserves and derive the price from them
    pub fn set_reserves(&self, venue: &VenueId, pair: PairKey, reserves: Reserves) {
        let quote = Quote::new(venue.clone(), pair, reserves.quote / reserves.base)
            .with_reserves(reserves);
        self.insert(quote);
    }

    /// Make every request against `venue` fail (or succeed again)
    pub fn set_failing(&self, venue: &VenueId, failing: bool) {
        if failing {
            self.failing.insert(venue.clone());
        } else {
            self.failing.remove(venue);
        }
    }

    pub fn remove(&self, venue: &VenueId, pair: PairKey) {
        self.quotes.remove(&QuoteKey {
            venue: venue.clone(),
            pair,
        });
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    fn insert(&self, quote: Quote) {
        let key = QuoteKey {
            venue: quote.venue.clone(),
            pair: quote.pair,
        };
        self.quotes.insert(key, quote);
    }
}

#[async_trait]
impl PriceSource for InMemoryPriceSource {
    async fn get_quote(&self, venue: &VenueId, pair: PairKey) -> SourceResult<Quote> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        if self.failing.contains(venue) {
            return Err(SourceError::unavailable(venue, "venue marked as failing"));
        }

        let key = QuoteKey {
            venue: venue.clone(),
            pair,
        };
        self.quotes
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SourceError::unavailable(venue, format!("no quote for {}", pair)))
    }
}

/// Gas estimator returning a configurable fixed cost
#[derive(Debug)]
pub struct FixedGasEstimator {
    cost: RwLock<Option<GasCost>>,
    calls: AtomicU64,
}

impl FixedGasEstimator {
    pub fn new(cost_per_trade: f64) -> Self {
        Self {
            cost: RwLock::new(Some(GasCost {
                gas_price_wei: 0,
                cost_per_trade,
            })),
            calls: AtomicU64::new(0),
        }
    }

    /// Estimator that always fails
    pub fn unavailable() -> Self {
        Self {
            cost: RwLock::new(None),
            calls: AtomicU64::new(0),
        }
    }

    pub fn set_cost(&self, cost_per_trade: f64) {
        *self.cost.write() = Some(GasCost {
            gas_price_wei: 0,
            cost_per_trade,
        });
    }

    pub fn set_unavailable(&self) {
        *self.cost.write() = None;
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl GasEstimator for FixedGasEstimator {
    async fn current(&self) -> SourceResult<GasCost> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        (*self.cost.read())
            .ok_or_else(|| SourceError::EstimatorUnavailable("estimator disabled".to_string()))
    }
}
