//! Post-trade price estimation

use arb_core::{EstimatedPrice, Quote};

use crate::decoder::DecodedTrade;

/// Estimates the venue price after a pending trade lands
pub trait PostTradeEstimator: Send + Sync {
    /// `None` when the quote carries too little information to estimate.
    ///
    /// `fee_rate` comes from the snapshot the caller is working under.
    fn estimate(&self, quote: &Quote, trade: &DecodedTrade, fee_rate: f64) -> Option<EstimatedPrice>;
}

/// x * y = k pool model
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantProductEstimator;

impl PostTradeEstimator for ConstantProductEstimator {
    fn estimate(&self, quote: &Quote, trade: &DecodedTrade, fee_rate: f64) -> Option<EstimatedPrice> {
        let reserves = quote.reserves.filter(|r| r.is_usable())?;
        let k = reserves.base * reserves.quote;
        let effective_in = trade.amount_in * (1.0 - fee_rate);

        let (base_after, quote_after) = if trade.sells_base() {
            let base_after = reserves.base + effective_in;
            (base_after, k / base_after)
        } else {
            let quote_after = reserves.quote + effective_in;
            (k / quote_after, quote_after)
        };

        // Scale the observed price by the reserve ratio move so the estimate
        // stays anchored to what the venue reported
        let ratio_before = reserves.quote / reserves.base;
        let ratio_after = quote_after / base_after;
        EstimatedPrice::new(quote.price * ratio_after / ratio_before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use arb_core::{PairKey, Reserves};

    fn pair() -> PairKey {
        PairKey::new(Address::repeat_byte(1), Address::repeat_byte(2))
    }

    fn quote() -> Quote {
        Quote::new("uniswap-v2".into(), pair(), 100.0).with_reserves(Reserves {
            base: 1_000.0,
            quote: 100_000.0,
        })
    }

    fn trade(token_in: Address, amount_in: f64) -> DecodedTrade {
        DecodedTrade {
            tx_hash: B256::ZERO,
            venue: "uniswap-v2".into(),
            pair: pair(),
            token_in,
            amount_in,
        }
    }

    #[test]
    fn test_buying_base_raises_price() {
        // 1000 quote in: quote 101000, base 100000000/101000
        let post = ConstantProductEstimator
            .estimate(&quote(), &trade(Address::repeat_byte(2), 1_000.0), 0.0)
            .unwrap();
        let expected = 101_000.0 / (100_000_000.0 / 101_000.0);
        assert!((post.value() - expected).abs() < 1e-9);
        assert!(post.value() > 100.0);
    }

    #[test]
    fn test_selling_base_lowers_price() {
        let post = ConstantProductEstimator
            .estimate(&quote(), &trade(Address::repeat_byte(1), 10.0), 0.003)
            .unwrap();
        assert!(post.value() < 100.0);
    }

    #[test]
    fn test_no_reserves_no_estimate() {
        let bare = Quote::new("uniswap-v2".into(), pair(), 100.0);
        assert!(ConstantProductEstimator
            .estimate(&bare, &trade(Address::repeat_byte(2), 1.0), 0.003)
            .is_none());
    }

    #[test]
    fn test_higher_fee_moves_price_less() {
        let buy = trade(Address::repeat_byte(2), 1_000.0);
        let cheap = ConstantProductEstimator.estimate(&quote(), &buy, 0.003).unwrap();
        let dear = ConstantProductEstimator.estimate(&quote(), &buy, 0.05).unwrap();
        assert!(dear.value() < cheap.value());
        assert!(dear.value() > 100.0);
    }
}
