//! Trade submission

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::info;

use arb_core::{ExecutionDecision, ExecutionError, ExecutionReceipt, ExecutionResult};

/// Submits accepted decisions on chain.
///
/// Errors are returned to the caller as-is; implementations must not retry.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn submit(&self, decision: &ExecutionDecision) -> ExecutionResult<ExecutionReceipt>;
}

/// Executor that logs and records decisions without touching the chain
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    submitted: Mutex<Vec<ExecutionDecision>>,
    fail_with: Mutex<Option<String>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following submission fail with `reason`
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail_with.lock() = Some(reason.into());
    }

    pub fn submitted(&self) -> Vec<ExecutionDecision> {
        self.submitted.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submitted.lock().len()
    }
}

#[async_trait]
impl TradeExecutor for DryRunExecutor {
    async fn submit(&self, decision: &ExecutionDecision) -> ExecutionResult<ExecutionReceipt> {
        let start = Instant::now();

        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(ExecutionError::SubmissionFailed(reason));
        }

        let candidate = &decision.candidate;
        info!(
            "[dry-run] {} {} {} amount={} expected={:.4}",
            candidate.kind,
            candidate.pair,
            candidate.route_label(),
            candidate.trade_amount,
            decision.revalidated_profit
        );

        self.submitted.lock().push(decision.clone());

        Ok(ExecutionReceipt {
            tx_hash: Some(format!("dry-run-{}", candidate.id)),
            submitted_at: Utc::now(),
            latency_us: start.elapsed().as_micros() as u64,
        })
    }
}
