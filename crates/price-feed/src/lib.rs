//! Market data collaborators
//!
//! Features:
//! - `PriceSource`, `GasEstimator` and `PendingTxSource` traits
//! - Subgraph quotes and JSON-RPC gas prices over HTTP
//! - WebSocket pending transaction feed with supervised reconnects
//! - Bounded drop-oldest queue between the feed and its consumer
//! - In-memory sources for tests and replay

pub mod feeds;
pub mod gas;
pub mod memory;
pub mod queue;
pub mod source;
pub mod subgraph;
pub mod supervisor;

pub use feeds::WsPendingTxSource;
pub use gas::RpcGasEstimator;
pub use memory::{FixedGasEstimator, InMemoryPriceSource};
pub use queue::{pending_queue, QueueConsumer, QueueProducer, QueueStats};
pub use source::{GasEstimator, PendingTxEvent, PendingTxSource, PendingTxStream, PriceSource};
pub use subgraph::SubgraphPriceSource;
pub use supervisor::{BackoffPolicy, SubscriptionSupervisor};
