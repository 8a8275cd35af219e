//! WebSocket pending transaction feed

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

use arb_core::{FeedError, FeedResult};

use crate::source::{PendingTxEvent, PendingTxSource, PendingTxStream};

/// Transaction object delivered by `newPendingTransactions` with full bodies
#[derive(Debug, Deserialize)]
struct RpcTransaction {
    hash: B256,
    to: Option<Address>,
    #[serde(default)]
    input: Bytes,
    #[serde(default)]
    value: U256,
}

/// `eth_subscribe` over a node WebSocket endpoint
#[derive(Debug, Clone)]
pub struct WsPendingTxSource {
    ws_url: String,
    full_transactions: bool,
}

impl WsPendingTxSource {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            full_transactions: true,
        }
    }

    /// Ask for hashes only; such events carry no calldata and decode as nothing
    pub fn hashes_only(mut self) -> Self {
        self.full_transactions = false;
        self
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newPendingTransactions", self.full_transactions]
        })
        .to_string()
    }
}

/// Parse one text frame.
///
/// `Ok(None)` for frames that carry no transaction (subscription ack,
/// unrelated notifications).
fn parse_message(text: &str) -> FeedResult<Option<PendingTxEvent>> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FeedError::InvalidMessage(e.to_string()))?;

    if let Some(err) = json.get("error") {
        return Err(FeedError::SubscriptionFailed(err.to_string()));
    }

    // Subscription confirmation
    if json.get("id").is_some() && json.get("result").is_some() {
        debug!("Pending tx subscription confirmed");
        return Ok(None);
    }

    if json.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
        return Ok(None);
    }

    let result = json
        .get("params")
        .and_then(|p| p.get("result"))
        .ok_or_else(|| FeedError::InvalidMessage("notification without result".to_string()))?;

    match result {
        serde_json::Value::String(hash) => {
            let tx_hash = hash
                .parse::<B256>()
                .map_err(|e| FeedError::InvalidMessage(e.to_string()))?;
            Ok(Some(PendingTxEvent::new(tx_hash, None, Bytes::new(), U256::ZERO)))
        }
        other => {
            let tx: RpcTransaction = serde_json::from_value(other.clone())
                .map_err(|e| FeedError::InvalidMessage(e.to_string()))?;
            Ok(Some(PendingTxEvent::new(tx.hash, tx.to, tx.input, tx.value)))
        }
    }
}

#[async_trait]
impl PendingTxSource for WsPendingTxSource {
    async fn subscribe(&self) -> FeedResult<PendingTxStream> {
        info!("Connecting to pending tx feed at {}", self.ws_url);

        let (ws_stream, _) = connect_async(&self.ws_url)
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        let (mut write, read) = ws_stream.split();

        write
            .send(Message::Text(self.subscribe_message()))
            .await
            .map_err(|e| FeedError::SubscriptionFailed(e.to_string()))?;

        info!("Subscribed to pending transactions");

        let stream = futures::stream::unfold(Some((write, read)), |state| async move {
            let (mut write, mut read) = state?;
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => match parse_message(&text) {
                        Ok(Some(event)) => return Some((Ok(event), Some((write, read)))),
                        Ok(None) => {}
                        Err(FeedError::InvalidMessage(reason)) => {
                            debug!("Skipping malformed frame: {}", reason);
                        }
                        Err(e) => return Some((Err(e), None)),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return Some((Err(FeedError::ConnectionFailed(e.to_string())), None));
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by server");
                        return None;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        return Some((Err(FeedError::ConnectionFailed(e.to_string())), None));
                    }
                    None => return None,
                    _ => {}
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
