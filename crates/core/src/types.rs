//! Core type definitions

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token identifier (ERC-20 contract address)
pub type TokenId = Address;

/// Named liquidity source, e.g. `uniswap-v2`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(String);

impl VenueId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VenueId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Unordered token pair.
///
/// The smaller address is always stored as `base`, so `(A, B)` and `(B, A)`
/// produce the same key. Prices for a pair are expressed as units of
/// `quote` per one unit of `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawPair")]
pub struct PairKey {
    base: TokenId,
    quote: TokenId,
}

#[derive(Deserialize)]
struct RawPair {
    base: TokenId,
    quote: TokenId,
}

impl From<RawPair> for PairKey {
    fn from(raw: RawPair) -> Self {
        PairKey::new(raw.base, raw.quote)
    }
}

impl PairKey {
    pub fn new(a: TokenId, b: TokenId) -> Self {
        if a <= b {
            Self { base: a, quote: b }
        } else {
            Self { base: b, quote: a }
        }
    }

    pub fn base(&self) -> TokenId {
        self.base
    }

    pub fn quote(&self) -> TokenId {
        self.quote
    }

    pub fn contains(&self, token: TokenId) -> bool {
        self.base == token || self.quote == token
    }

    /// The token on the other side of the pair, if `token` belongs to it
    pub fn counterpart(&self, token: TokenId) -> Option<TokenId> {
        if token == self.base {
            Some(self.quote)
        } else if token == self.quote {
            Some(self.base)
        } else {
            None
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", short_hex(&self.base), short_hex(&self.quote))
    }
}

fn short_hex(address: &Address) -> String {
    let full = address.to_string();
    full.chars().take(10).collect()
}

/// Network gas price converted into a per-trade cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasCost {
    pub gas_price_wei: u128,
    /// Cost of one trade, in quote-token units
    pub cost_per_trade: f64,
}

impl GasCost {
    pub fn gas_price_gwei(&self) -> f64 {
        self.gas_price_wei as f64 / 1e9
    }
}

/// Receipt returned by a trade executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub tx_hash: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub latency_us: u64,
}
