//! Core types for the arbitrage / sandwich detection engine
//!
//! This crate provides the shared vocabulary used by every other crate:
//! - Venue, token pair and quote types
//! - Opportunity candidates and execution decisions
//! - The immutable configuration snapshot and its swappable handle
//! - Error taxonomy

pub mod types;
pub mod quotes;
pub mod opportunities;
pub mod config;
pub mod errors;

pub use types::*;
pub use quotes::*;
pub use opportunities::*;
pub use config::*;
pub use errors::*;
