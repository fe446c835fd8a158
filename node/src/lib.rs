//! CAN Network staking node.
//!
//! The node is the process-level coordinator that:
//! - Opens the LMDB store and builds the staking engine on top of it
//! - Seeds and sweeps bearer-token sessions
//! - Serves the HTTP API and, when enabled, the WebSocket change feed
//! - Bridges engine events into the change feed and Prometheus metrics
//! - Shuts everything down on SIGINT/SIGTERM

pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use config::{NodeConfig, SessionSeed};
pub use error::NodeError;
pub use feed::publish_event;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::CanNode;
pub use shutdown::ShutdownController;
