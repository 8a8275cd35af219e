//! Profit and price impact arithmetic
//!
//! Every net profit figure in the engine goes through [`evaluate`], whether
//! it comes from a cross-venue scan, a sandwich leg or a gate re-check.

use serde::Serialize;

use arb_core::{
    OpportunityCandidate, OpportunityKind, PairKey, PricePoint,
};

/// Components of a net profit figure, in quote-token units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitBreakdown {
    pub gross: f64,
    pub fees: f64,
    pub gas: f64,
    pub net: f64,
}

/// Profit of buying `trade_amount` at `price_buy` and selling at `price_sell`.
///
/// Fees are charged on the gross once per leg. A non-positive gross skips
/// the fee computation and only subtracts gas.
pub fn breakdown(
    price_sell: f64,
    price_buy: f64,
    trade_amount: f64,
    fee_rate: f64,
    gas_cost: f64,
) -> ProfitBreakdown {
    let gross = (price_sell - price_buy) * trade_amount;
    if gross <= 0.0 {
        return ProfitBreakdown {
            gross,
            fees: 0.0,
            gas: gas_cost,
            net: gross - gas_cost,
        };
    }

    let fees = gross * fee_rate * 2.0;
    ProfitBreakdown {
        gross,
        fees,
        gas: gas_cost,
        net: gross - fees - gas_cost,
    }
}

/// Net profit; see [`breakdown`]
pub fn evaluate(price_sell: f64, price_buy: f64, trade_amount: f64, fee_rate: f64, gas_cost: f64) -> f64 {
    breakdown(price_sell, price_buy, trade_amount, fee_rate, gas_cost).net
}

/// Relative move from `pre` to `post`
pub fn price_impact(pre: f64, post: f64) -> f64 {
    (post - pre) / pre
}

/// Evaluator bound to a fee rate
#[derive(Debug, Clone, Copy)]
pub struct OpportunityEvaluator {
    fee_rate: f64,
}

impl OpportunityEvaluator {
    pub fn new(fee_rate: f64) -> Self {
        Self { fee_rate }
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn evaluate(&self, price_sell: f64, price_buy: f64, trade_amount: f64, gas_cost: f64) -> f64 {
        evaluate(price_sell, price_buy, trade_amount, self.fee_rate, gas_cost)
    }

    pub fn breakdown(&self, sell: &PricePoint, buy: &PricePoint, trade_amount: f64, gas_cost: f64) -> ProfitBreakdown {
        breakdown(sell.price, buy.price, trade_amount, self.fee_rate, gas_cost)
    }

    /// Build a candidate if its net profit is strictly above `min_profit`
    #[allow(clippy::too_many_arguments)]
    pub fn price_candidate(
        &self,
        kind: OpportunityKind,
        pair: PairKey,
        sell: PricePoint,
        buy: PricePoint,
        trade_amount: f64,
        gas_cost: f64,
        min_profit: f64,
    ) -> Option<OpportunityCandidate> {
        let net = self.evaluate(sell.price, buy.price, trade_amount, gas_cost);
        (net > min_profit)
            .then(|| OpportunityCandidate::new(kind, pair, sell, buy, trade_amount, gas_cost, net))
    }
}
