//! Price quote types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PairKey, VenueId};

/// Pool reserves backing a quote, in human units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reserves {
    pub base: f64,
    pub quote: f64,
}

impl Reserves {
    pub fn is_usable(&self) -> bool {
        self.base.is_finite() && self.quote.is_finite() && self.base > 0.0 && self.quote > 0.0
    }
}

/// Price observation for a pair on one venue.
///
/// `price` is quote-token units per base-token unit of `pair`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub venue: VenueId,
    pub pair: PairKey,
    pub price: f64,
    pub reserves: Option<Reserves>,
    pub observed_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(venue: VenueId, pair: PairKey, price: f64) -> Self {
        Self {
            venue,
            pair,
            price,
            reserves: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_reserves(mut self, reserves: Reserves) -> Self {
        self.reserves = Some(reserves);
        self
    }

    /// A quote is only usable with a strictly positive, finite price
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }

    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.observed_at).num_milliseconds()
    }
}

/// Post-trade price that has not been observed on chain yet.
///
/// Kept separate from observed prices so an estimate is never passed where
/// a live quote is expected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatedPrice(f64);

impl EstimatedPrice {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}
