//! Configuration types
//!
//! The engine reads configuration through [`ConfigHandle`], which hands out
//! immutable [`EngineConfig`] snapshots. Reconfiguration validates the new
//! config and swaps the pointer; a snapshot already loaded by a running scan
//! never changes underneath it.

use alloy_primitives::Address;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::{ConfigError, ConfigResult, OpportunityKind, PairKey, TokenId, VenueId};

/// Token pair to watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedPair {
    pub token_a: TokenId,
    pub token_b: TokenId,
    /// Optional label used in logs, e.g. `WETH/USDC`
    #[serde(default)]
    pub symbol: Option<String>,
}

impl TrackedPair {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.token_a, self.token_b)
    }
}

/// Token decimals override (defaults to 18)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDecimals {
    pub token: TokenId,
    pub decimals: u8,
}

/// Router contract mapped to the venue it trades on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub address: Address,
    pub venue: VenueId,
}

/// Cross-venue arbitrage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    /// Minimum net profit (quote units) for a candidate to be emitted
    pub min_profit_threshold: f64,
    pub scan_interval_ms: u64,
    /// Trade size per leg, in base-token units
    pub trade_amount: f64,
    /// Submissions attempted per scan pass, most profitable first
    pub max_executions_per_scan: usize,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold: 0.5,
            scan_interval_ms: 1_000,
            trade_amount: 10.0,
            max_executions_per_scan: 1,
        }
    }
}

impl ArbitrageConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

/// Pending-transaction (front-run / back-run) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandwichConfig {
    /// Minimum net profit per leg
    pub min_profit_threshold: f64,
    /// Relative impact `(post - pre) / pre` that triggers an observation
    pub price_impact_threshold: f64,
    pub trade_amount: f64,
    /// Submit accepted legs; observation only when false
    pub execute: bool,
    pub routers: Vec<RouterConfig>,
    /// Pending transactions buffered before the oldest are dropped
    pub queue_capacity: usize,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl Default for SandwichConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold: 5.0,
            price_impact_threshold: 0.01,  // 1%
            trade_amount: 10.0,
            execute: false,
            routers: vec![],
            queue_capacity: 1024,
            reconnect_initial_ms: 1_000,
            reconnect_max_ms: 30_000,
        }
    }
}

/// Complete engine configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracked_pairs: Vec<TrackedPair>,
    pub venues: Vec<VenueId>,
    /// Fee charged on each leg (0.003 = 0.3%)
    pub trading_fee_rate: f64,
    pub token_decimals: Vec<TokenDecimals>,
    pub arbitrage: ArbitrageConfig,
    pub sandwich: SandwichConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracked_pairs: vec![],
            venues: vec![],
            trading_fee_rate: 0.003,
            token_decimals: vec![],
            arbitrage: ArbitrageConfig::default(),
            sandwich: SandwichConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject anything the loops cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tracked_pairs.is_empty() {
            return Err(ConfigError::EmptyPairs);
        }
        let mut seen_pairs = HashSet::new();
        for pair in &self.tracked_pairs {
            let key = pair.key();
            if key.is_degenerate() {
                return Err(ConfigError::InvalidPair(format!(
                    "{} pairs a token with itself",
                    pair.token_a
                )));
            }
            if !seen_pairs.insert(key) {
                return Err(ConfigError::InvalidPair(format!("{} listed twice", key)));
            }
        }

        if self.venues.is_empty() {
            return Err(ConfigError::EmptyVenues);
        }
        let mut seen_venues = HashSet::new();
        for venue in &self.venues {
            if venue.as_str().trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: "venues",
                    reason: "empty venue name".to_string(),
                });
            }
            if !seen_venues.insert(venue) {
                return Err(ConfigError::DuplicateVenue(venue.clone()));
            }
        }

        check_threshold("arbitrage.min_profit_threshold", self.arbitrage.min_profit_threshold)?;
        check_threshold("sandwich.min_profit_threshold", self.sandwich.min_profit_threshold)?;
        check_threshold("sandwich.price_impact_threshold", self.sandwich.price_impact_threshold)?;

        // Both legs pay the fee, so anything at or above 50% eats the whole spread
        if !self.trading_fee_rate.is_finite() || !(0.0..0.5).contains(&self.trading_fee_rate) {
            return Err(ConfigError::InvalidValue {
                name: "trading_fee_rate",
                reason: format!("{} is outside [0, 0.5)", self.trading_fee_rate),
            });
        }

        check_positive("arbitrage.trade_amount", self.arbitrage.trade_amount)?;
        check_positive("sandwich.trade_amount", self.sandwich.trade_amount)?;

        if self.arbitrage.scan_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "arbitrage.scan_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sandwich.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "sandwich.queue_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sandwich.reconnect_initial_ms == 0
            || self.sandwich.reconnect_initial_ms > self.sandwich.reconnect_max_ms
        {
            return Err(ConfigError::InvalidValue {
                name: "sandwich.reconnect_initial_ms",
                reason: format!(
                    "{}ms must be non-zero and not exceed reconnect_max_ms ({}ms)",
                    self.sandwich.reconnect_initial_ms, self.sandwich.reconnect_max_ms
                ),
            });
        }

        for router in &self.sandwich.routers {
            if !self.venues.contains(&router.venue) {
                return Err(ConfigError::InvalidValue {
                    name: "sandwich.routers",
                    reason: format!("router {} maps to unknown venue {}", router.address, router.venue),
                });
            }
        }

        Ok(())
    }

    pub fn pair_keys(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.tracked_pairs.iter().map(TrackedPair::key)
    }

    pub fn is_tracked(&self, pair: &PairKey) -> bool {
        self.tracked_pairs.iter().any(|p| p.key() == *pair)
    }

    pub fn venue_for_router(&self, router: Address) -> Option<&VenueId> {
        self.sandwich
            .routers
            .iter()
            .find(|r| r.address == router)
            .map(|r| &r.venue)
    }

    /// Decimals for a token, 18 unless overridden
    pub fn decimals_of(&self, token: TokenId) -> u8 {
        self.token_decimals
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.decimals)
            .unwrap_or(18)
    }

    pub fn min_profit_for(&self, kind: OpportunityKind) -> f64 {
        match kind {
            OpportunityKind::Arbitrage => self.arbitrage.min_profit_threshold,
            OpportunityKind::FrontRun | OpportunityKind::BackRun => {
                self.sandwich.min_profit_threshold
            }
        }
    }

    pub fn trade_amount_for(&self, kind: OpportunityKind) -> f64 {
        match kind {
            OpportunityKind::Arbitrage => self.arbitrage.trade_amount,
            OpportunityKind::FrontRun | OpportunityKind::BackRun => self.sandwich.trade_amount,
        }
    }
}

fn check_threshold(name: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name,
            reason: format!("{} must be a positive number", value),
        })
    }
}

/// Atomically swappable, validated configuration
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<EngineConfig>,
}

impl ConfigHandle {
    pub fn new(config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            current: ArcSwap::from_pointee(config),
        })
    }

    /// Current snapshot; stays valid for as long as the caller holds it
    pub fn snapshot(&self) -> Arc<EngineConfig> {
        self.current.load_full()
    }

    /// Replace the snapshot. An invalid config leaves the current one in place.
    pub fn replace(&self, config: EngineConfig) -> ConfigResult<()> {
        config.validate()?;
        self.current.store(Arc::new(config));
        Ok(())
    }
}
