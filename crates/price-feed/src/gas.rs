//! JSON-RPC gas price estimator

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use arb_core::{GasCost, SourceError, SourceResult};

use crate::source::GasEstimator;

/// Gas used by a plain transfer; the default per-trade budget
pub const DEFAULT_GAS_UNITS: u64 = 21_000;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

/// Estimator calling `eth_gasPrice` on every request
pub struct RpcGasEstimator {
    client: reqwest::Client,
    rpc_url: String,
    gas_units: u64,
    /// Quote-token units per native token
    native_price: f64,
}

impl RpcGasEstimator {
    pub fn new(
        rpc_url: impl Into<String>,
        gas_units: u64,
        native_price: f64,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            gas_units,
            native_price,
        })
    }

    pub fn cost_for(&self, gas_price_wei: u128) -> GasCost {
        GasCost {
            gas_price_wei,
            cost_per_trade: gas_price_wei as f64 * self.gas_units as f64 * 1e-18 * self.native_price,
        }
    }
}

fn parse_hex_quantity(raw: &str) -> SourceResult<u128> {
    let digits = raw.trim_start_matches("0x");
    u128::from_str_radix(digits, 16)
        .map_err(|e| SourceError::EstimatorUnavailable(format!("bad gas price {:?}: {}", raw, e)))
}

#[async_trait]
impl GasEstimator for RpcGasEstimator {
    async fn current(&self) -> SourceResult<GasCost> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_gasPrice",
            "params": []
        });

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::EstimatorUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| SourceError::EstimatorUnavailable(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(SourceError::EstimatorUnavailable(err.message));
        }
        let raw = response
            .result
            .ok_or_else(|| SourceError::EstimatorUnavailable("empty eth_gasPrice result".to_string()))?;

        let cost = self.cost_for(parse_hex_quantity(&raw)?);
        debug!(gwei = cost.gas_price_gwei(), cost = cost.cost_per_trade, "Gas price");
        Ok(cost)
    }
}
