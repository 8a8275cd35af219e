//! Trade execution
//!
//! Features:
//! - Re-validation of candidates against fresh prices before commit
//! - `TradeExecutor` seam for on-chain submission
//! - Dry-run executor for observation mode and tests

pub mod gate;
pub mod submitter;

pub use gate::{ExecutionGate, GateOutcome, GateStats};
pub use submitter::{DryRunExecutor, TradeExecutor};
