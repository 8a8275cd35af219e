//! Subgraph-backed price source
//!
//! Each venue exposes a Uniswap-V2 style GraphQL subgraph. The pair entity is
//! looked up by `token0-token1` id and the price derived from its reserves.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use arb_core::{PairKey, Quote, Reserves, SourceError, SourceResult, VenueId};

use crate::source::PriceSource;

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PairData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct PairData {
    pair: Option<PairEntity>,
}

#[derive(Debug, Deserialize)]
struct PairEntity {
    reserve0: String,
    reserve1: String,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

/// Price source querying one subgraph endpoint per venue
pub struct SubgraphPriceSource {
    client: reqwest::Client,
    endpoints: HashMap<VenueId, String>,
}

impl SubgraphPriceSource {
    pub fn new(endpoints: HashMap<VenueId, String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    fn pair_id(pair: PairKey) -> String {
        format!(
            "{}-{}",
            pair.base().to_string().to_lowercase(),
            pair.quote().to_string().to_lowercase()
        )
    }

    fn query(pair: PairKey) -> serde_json::Value {
        serde_json::json!({
            "query": format!(
                "{{ pair(id: \"{}\") {{ reserve0 reserve1 }} }}",
                Self::pair_id(pair)
            )
        })
    }
}

/// Turn a subgraph pair entity into a quote; reserves come back as decimal strings
fn quote_from_entity(venue: &VenueId, pair: PairKey, entity: &PairEntity) -> SourceResult<Quote> {
    let parse = |raw: &str| {
        raw.parse::<f64>()
            .map_err(|e| SourceError::unavailable(venue, format!("bad reserve {:?}: {}", raw, e)))
    };
    let reserves = Reserves {
        base: parse(&entity.reserve0)?,
        quote: parse(&entity.reserve1)?,
    };
    if !reserves.is_usable() {
        return Err(SourceError::InvalidQuote {
            venue: venue.clone(),
            price: reserves.quote / reserves.base,
        });
    }

    let quote = Quote::new(venue.clone(), pair, reserves.quote / reserves.base).with_reserves(reserves);
    if !quote.is_valid() {
        return Err(SourceError::InvalidQuote {
            venue: venue.clone(),
            price: quote.price,
        });
    }
    Ok(quote)
}

#[async_trait]
impl PriceSource for SubgraphPriceSource {
    async fn get_quote(&self, venue: &VenueId, pair: PairKey) -> SourceResult<Quote> {
        let url = self
            .endpoints
            .get(venue)
            .ok_or_else(|| SourceError::unavailable(venue, "no subgraph endpoint configured"))?;

        let response = self
            .client
            .post(url)
            .json(&Self::query(pair))
            .send()
            .await
            .map_err(|e| SourceError::unavailable(venue, e))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(
                venue,
                format!("HTTP {}", response.status()),
            ));
        }

        let body: GraphResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(venue, e))?;

        if let Some(err) = body.errors.first() {
            return Err(SourceError::unavailable(venue, &err.message));
        }

        let entity = body
            .data
            .and_then(|d| d.pair)
            .ok_or_else(|| SourceError::unavailable(venue, format!("pair {} not found", pair)))?;

        let quote = quote_from_entity(venue, pair, &entity)?;
        debug!(venue = %venue, pair = %pair, price = quote.price, "Subgraph quote");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn pair() -> PairKey {
        PairKey::new(Address::repeat_byte(0xbb), Address::repeat_byte(0xaa))
    }

    #[test]
    fn test_pair_id_is_canonical_lowercase() {
        let id = SubgraphPriceSource::pair_id(pair());
        assert!(id.starts_with("0xaaaa"));
        assert!(id.contains("-0xbbbb"));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"data":{"pair":{"reserve0":"10.0","reserve1":"1000.5"}}}"#;
        let parsed: GraphResponse = serde_json::from_str(body).unwrap();
        let entity = parsed.data.unwrap().pair.unwrap();

        let quote = quote_from_entity(&"uniswap-v2".into(), pair(), &entity).unwrap();
        assert!((quote.price - 100.05).abs() < 1e-9);
        assert_eq!(quote.reserves.unwrap().base, 10.0);
    }

    #[test]
    fn test_empty_reserves_are_invalid() {
        let entity = PairEntity {
            reserve0: "0".to_string(),
            reserve1: "1000".to_string(),
        };
        assert!(matches!(
            quote_from_entity(&"uniswap-v2".into(), pair(), &entity),
            Err(SourceError::InvalidQuote { .. })
        ));
    }

    #[test]
    fn test_graph_errors_parse() {
        let body = r#"{"data":null,"errors":[{"message":"indexing error"}]}"#;
        let parsed: GraphResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.errors[0].message, "indexing error");
    }
}
