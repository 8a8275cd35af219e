//! Opportunity detection
//!
//! Features:
//! - Profit and price impact arithmetic (`evaluator`)
//! - Cross-venue arbitrage scanning on a fixed interval
//! - Router calldata decoding and post-trade price estimation
//! - Front-run / back-run detection over a pending transaction stream

pub mod decoder;
pub mod evaluator;
pub mod impact;
pub mod sandwich;
pub mod scanner;

pub use decoder::{DecodedTrade, RouterCalldataDecoder, TradeDecoder};
pub use evaluator::{OpportunityEvaluator, ProfitBreakdown};
pub use impact::{ConstantProductEstimator, PostTradeEstimator};
pub use sandwich::{DetectorStats, SandwichDetector, SandwichSignal};
pub use scanner::{ArbitrageScanner, ScanHealth, ScanReport, ScannerStats};
