//! Bounded pending transaction queue with drop-oldest overflow
//!
//! Built on a tokio broadcast channel with a single receiver: when the
//! consumer falls behind, the channel overwrites the oldest entries and the
//! consumer learns how many it missed through `Lagged`. Capacity is rounded up
//! to the next power of two.

use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

use crate::source::PendingTxEvent;

/// Counters shared by both ends of the queue
#[derive(Debug, Default)]
pub struct QueueStats {
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl QueueStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Events overwritten before the consumer reached them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer half
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: broadcast::Sender<PendingTxEvent>,
    stats: Arc<QueueStats>,
}

impl QueueProducer {
    /// Never blocks; overwrites the oldest event when full
    pub fn push(&self, event: PendingTxEvent) {
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        // Fails only once the consumer is gone, which means shutdown
        let _ = self.tx.send(event);
    }
}

/// Consumer half
#[derive(Debug)]
pub struct QueueConsumer {
    rx: broadcast::Receiver<PendingTxEvent>,
    stats: Arc<QueueStats>,
}

impl QueueConsumer {
    /// Events in arrival order; overflow is counted and logged, not surfaced
    pub fn into_stream(self) -> impl Stream<Item = PendingTxEvent> + Send + 'static {
        let stats = self.stats;
        BroadcastStream::new(self.rx).filter_map(move |item| {
            let stats = Arc::clone(&stats);
            async move {
                match item {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        let total = stats.dropped.fetch_add(missed, Ordering::Relaxed) + missed;
                        warn!(missed, total, "Pending tx queue full, dropped oldest events");
                        None
                    }
                }
            }
        })
    }
}

/// Create a queue holding at least `capacity` unprocessed events
pub fn pending_queue(capacity: usize) -> (QueueProducer, QueueConsumer, Arc<QueueStats>) {
    let (tx, rx) = broadcast::channel(capacity.max(1));
    let stats = Arc::new(QueueStats::default());
    (
        QueueProducer {
            tx,
            stats: Arc::clone(&stats),
        },
        QueueConsumer {
            rx,
            stats: Arc::clone(&stats),
        },
        stats,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, B256, U256};

    fn event(n: u8) -> PendingTxEvent {
        PendingTxEvent::new(B256::repeat_byte(n), None, Bytes::new(), U256::ZERO)
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let (producer, consumer, stats) = pending_queue(8);
        for n in 1..=3 {
            producer.push(event(n));
        }
        drop(producer);

        let hashes: Vec<_> = consumer.into_stream().map(|e| e.tx_hash).collect().await;
        assert_eq!(hashes, vec![B256::repeat_byte(1), B256::repeat_byte(2), B256::repeat_byte(3)]);
        assert_eq!(stats.dropped(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let (producer, consumer, stats) = pending_queue(4);
        for n in 1..=6 {
            producer.push(event(n));
        }
        drop(producer);

        let hashes: Vec<_> = consumer.into_stream().map(|e| e.tx_hash).collect().await;
        assert_eq!(
            hashes,
            (3..=6).map(B256::repeat_byte).collect::<Vec<_>>(),
            "newest events survive"
        );
        assert_eq!(stats.dropped(), 2);
        assert_eq!(stats.pushed(), 6);
    }
}
