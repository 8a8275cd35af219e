//! Engine runtime for the arbitrage / sandwich detector
//!
//! Wires the market data collaborators, detectors and execution gate into
//! long-running loops and loads their settings.

pub mod engine;
pub mod settings;

pub use engine::{Collaborators, Engine, EngineStats};
pub use settings::{AdapterSettings, Settings, SubgraphEndpoint};
