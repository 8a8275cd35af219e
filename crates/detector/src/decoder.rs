//! Router calldata decoding
//!
//! Only Uniswap-V2 style exact-input swaps are recognised. Anything else
//! (unknown router, other selector, path outside the tracked pairs) is not
//! a trade as far as the detector is concerned.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolInterface};
use tracing::trace;

use arb_core::{EngineConfig, PairKey, TokenId, VenueId};
use arb_price_feed::PendingTxEvent;

sol! {
    interface IUniswapV2Router {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] path,
            address to,
            uint256 deadline
        ) external returns (uint256[] amounts);

        function swapExactETHForTokens(
            uint256 amountOutMin,
            address[] path,
            address to,
            uint256 deadline
        ) external payable returns (uint256[] amounts);

        function swapExactTokensForETH(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] path,
            address to,
            uint256 deadline
        ) external returns (uint256[] amounts);
    }
}

use IUniswapV2Router::IUniswapV2RouterCalls;

/// Pending swap on a tracked pair
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTrade {
    pub tx_hash: B256,
    pub venue: VenueId,
    pub pair: PairKey,
    pub token_in: TokenId,
    /// Input amount in token units (decimals applied)
    pub amount_in: f64,
}

impl DecodedTrade {
    /// True when the trade sells the pair's base token
    pub fn sells_base(&self) -> bool {
        self.token_in == self.pair.base()
    }
}

/// Interprets pending transactions as swaps
pub trait TradeDecoder: Send + Sync {
    fn decode(&self, event: &PendingTxEvent, config: &EngineConfig) -> Option<DecodedTrade>;
}

/// Decoder for the configured Uniswap-V2 style routers
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterCalldataDecoder;

impl RouterCalldataDecoder {
    pub fn new() -> Self {
        Self
    }

    /// (amount in raw units, token path) of a recognised swap
    fn swap_terms(event: &PendingTxEvent) -> Option<(U256, Vec<Address>)> {
        let call = IUniswapV2RouterCalls::abi_decode(&event.input, true).ok()?;
        match call {
            IUniswapV2RouterCalls::swapExactTokensForTokens(c) => Some((c.amountIn, c.path)),
            IUniswapV2RouterCalls::swapExactETHForTokens(c) => Some((event.value, c.path)),
            IUniswapV2RouterCalls::swapExactTokensForETH(c) => Some((c.amountIn, c.path)),
        }
    }
}

impl TradeDecoder for RouterCalldataDecoder {
    fn decode(&self, event: &PendingTxEvent, config: &EngineConfig) -> Option<DecodedTrade> {
        let Some(venue) = event.to.and_then(|to| config.venue_for_router(to)) else {
            trace!(tx = %event.tx_hash, "Not a configured router");
            return None;
        };

        let Some((raw_amount, path)) = Self::swap_terms(event) else {
            trace!(tx = %event.tx_hash, "Unrecognised router call");
            return None;
        };

        // Only the first hop has a known input amount
        let (token_in, token_out) = match path.as_slice() {
            [first, second, ..] => (*first, *second),
            _ => {
                trace!(tx = %event.tx_hash, "Swap path too short");
                return None;
            }
        };
        let pair = PairKey::new(token_in, token_out);
        if !config.is_tracked(&pair) {
            trace!(tx = %event.tx_hash, pair = %pair, "Swap on untracked pair");
            return None;
        }

        let amount_in = to_units(raw_amount, config.decimals_of(token_in))?;
        if amount_in <= 0.0 {
            return None;
        }

        Some(DecodedTrade {
            tx_hash: event.tx_hash,
            venue: venue.clone(),
            pair,
            token_in,
            amount_in,
        })
    }
}

/// Raw integer amount scaled down by `decimals`
pub fn to_units(raw: U256, decimals: u8) -> Option<f64> {
    let value: f64 = raw.to_string().parse().ok()?;
    let scaled = value / 10f64.powi(decimals as i32);
    scaled.is_finite().then_some(scaled)
}
