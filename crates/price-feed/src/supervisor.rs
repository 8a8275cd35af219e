//! Supervised pending transaction subscription
//!
//! Keeps one subscription alive, reconnecting with capped exponential
//! backoff, and forwards events into the pending queue until cancelled.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::queue::QueueProducer;
use crate::source::PendingTxSource;

/// Reconnect delay doubling from `initial` up to `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    pub fn from_millis(initial_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(initial_ms), Duration::from_millis(max_ms))
    }

    /// Delay before reconnect number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_millis(1_000, 30_000)
    }
}

pub struct SubscriptionSupervisor {
    source: Arc<dyn PendingTxSource>,
    backoff: BackoffPolicy,
    producer: QueueProducer,
}

impl SubscriptionSupervisor {
    pub fn new(source: Arc<dyn PendingTxSource>, backoff: BackoffPolicy, producer: QueueProducer) -> Self {
        Self {
            source,
            backoff,
            producer,
        }
    }

    /// Run until cancelled. Returns the number of reconnects performed.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let mut attempt = 0u32;
        let mut reconnects = 0u64;

        info!("Starting pending tx subscription");

        loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.source.subscribe() => result,
            };

            match subscribed {
                Ok(mut stream) => loop {
                    let item = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!(reconnects, "Pending tx subscription stopped");
                            return reconnects;
                        }
                        item = stream.next() => item,
                    };
                    match item {
                        Some(Ok(event)) => {
                            // A delivered event means the connection is healthy again
                            attempt = 0;
                            self.producer.push(event);
                        }
                        Some(Err(e)) => {
                            warn!("Pending tx feed error: {}", e);
                            break;
                        }
                        None => {
                            info!("Pending tx stream ended");
                            break;
                        }
                    }
                },
                Err(e) => warn!("Pending tx subscription failed: {}", e),
            }

            let delay = self.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            reconnects += 1;
            warn!("Reconnecting pending tx feed in {:?} (attempt {})", delay, attempt);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(reconnects, "Pending tx subscription stopped");
        reconnects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::pending_queue;
    use crate::source::{PendingTxEvent, PendingTxStream};
    use alloy_primitives::{Bytes, B256, U256};
    use arb_core::{FeedError, FeedResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays scripted connection outcomes, then hangs on an idle stream
    struct ScriptedSource {
        script: Mutex<VecDeque<FeedResult<Vec<PendingTxEvent>>>>,
        subscribes: AtomicU32,
    }

    #[async_trait]
    impl PendingTxSource for ScriptedSource {
        async fn subscribe(&self) -> FeedResult<PendingTxStream> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().pop_front() {
                Some(Ok(events)) => Ok(futures::stream::iter(events.into_iter().map(Ok)).boxed()),
                Some(Err(e)) => Err(e),
                None => Ok(futures::stream::pending().boxed()),
            }
        }
    }

    fn event(n: u8) -> PendingTxEvent {
        PendingTxEvent::new(B256::repeat_byte(n), None, Bytes::new(), U256::ZERO)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::from_millis(1_000, 30_000);
        assert_eq!(policy.delay(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay(4), Duration::from_millis(16_000));
        assert_eq!(policy.delay(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_failure_and_stream_end() {
        let source = Arc::new(ScriptedSource {
            script: Mutex::new(VecDeque::from(vec![
                Err(FeedError::ConnectionFailed("refused".to_string())),
                Ok(vec![event(1), event(2)]),
            ])),
            subscribes: AtomicU32::new(0),
        });
        let (producer, consumer, stats) = pending_queue(16);
        let supervisor = SubscriptionSupervisor::new(
            source.clone(),
            BackoffPolicy::from_millis(10, 100),
            producer,
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        let received: Vec<_> = consumer.into_stream().take(2).map(|e| e.tx_hash).collect().await;
        assert_eq!(received, vec![B256::repeat_byte(1), B256::repeat_byte(2)]);

        // Let the supervisor notice the ended stream and resubscribe
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let reconnects = handle.await.unwrap();

        assert_eq!(reconnects, 2);
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 3);
        assert_eq!(stats.pushed(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let source = Arc::new(ScriptedSource {
            script: Mutex::new(VecDeque::new()),
            subscribes: AtomicU32::new(0),
        });
        let (producer, _consumer, _) = pending_queue(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reconnects = SubscriptionSupervisor::new(source, BackoffPolicy::default(), producer)
            .run(cancel)
            .await;
        assert_eq!(reconnects, 0);
    }
}
