//! Settings loading
//!
//! Layering, lowest to highest priority:
//! 1. built-in defaults
//! 2. TOML file at `$ARB_CONFIG` (default `config/arb.toml`, optional)
//! 3. `ARB__*` environment variables, e.g. `ARB__ENGINE__TRADING_FEE_RATE=0.0025`

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use arb_core::{EngineConfig, VenueId};

pub const DEFAULT_CONFIG_PATH: &str = "config/arb.toml";

/// Subgraph endpoint serving one venue
#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphEndpoint {
    pub venue: VenueId,
    pub url: String,
}

/// Connection settings for the network-backed collaborators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    pub subgraphs: Vec<SubgraphEndpoint>,
    /// HTTP JSON-RPC endpoint used for gas prices
    pub rpc_url: Option<String>,
    /// WebSocket endpoint for pending transactions; sandwich detection is off without it
    pub ws_url: Option<String>,
    pub gas_units_per_trade: u64,
    /// Quote-token units per native token, to price gas
    pub native_token_price: f64,
    pub request_timeout_ms: u64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            subgraphs: vec![],
            rpc_url: None,
            ws_url: None,
            gas_units_per_trade: 21_000,
            native_token_price: 1.0,
            request_timeout_ms: 5_000,
        }
    }
}

impl AdapterSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn subgraph_map(&self) -> HashMap<VenueId, String> {
        self.subgraphs
            .iter()
            .map(|s| (s.venue.clone(), s.url.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub adapters: AdapterSettings,
}

impl Settings {
    /// Load from `$ARB_CONFIG` and the environment
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("ARB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let settings: Settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("ARB").separator("__").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    /// Parse a TOML document on its own, without the environment layer
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[engine]
venues = ["uniswap-v2", "sushiswap"]
trading_fee_rate = 0.003

[[engine.tracked_pairs]]
token_a = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
token_b = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
symbol = "WETH/USDC"

[engine.arbitrage]
min_profit_threshold = 0.75
scan_interval_ms = 500

[engine.sandwich]
execute = false

[[engine.sandwich.routers]]
address = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
venue = "uniswap-v2"

[adapters]
rpc_url = "http://localhost:8545"
native_token_price = 3000.0

[[adapters.subgraphs]]
venue = "uniswap-v2"
url = "https://example.invalid/uniswap-v2"
"#;

    #[test]
    fn test_sample_parses_and_validates() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        settings.engine.validate().unwrap();

        assert_eq!(settings.engine.arbitrage.min_profit_threshold, 0.75);
        assert_eq!(settings.engine.arbitrage.scan_interval_ms, 500);
        // Unset values keep their defaults
        assert_eq!(settings.engine.sandwich.min_profit_threshold, 5.0);
        assert_eq!(settings.engine.sandwich.routers.len(), 1);
        assert_eq!(settings.adapters.gas_units_per_trade, 21_000);
        assert_eq!(settings.adapters.native_token_price, 3000.0);
        assert_eq!(
            settings.adapters.subgraph_map().get(&VenueId::from("uniswap-v2")).map(String::as_str),
            Some("https://example.invalid/uniswap-v2")
        );
    }

    #[test]
    fn test_empty_document_fails_validation() {
        let settings = Settings::from_toml("").unwrap();
        assert!(settings.engine.validate().is_err());
    }
}
