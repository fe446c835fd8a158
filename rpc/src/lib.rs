//! JSON HTTP API for the CAN Network staking service.
//!
//! Provides endpoints for:
//! - Profiles, balances and display names
//! - Coin and NFT stake creation, listing and reward claims
//! - Portfolio summaries
//! - Membership tier purchases
//! - The public transaction feed, NFT catalog and tier price list
//! - News, event registration and network statistics
//! - Session refresh and sign-out
//! - Health and Prometheus metrics
//!
//! Authenticated routes expect `Authorization: Bearer <token>`. Every store
//! call runs on the blocking pool and transient store failures are retried
//! with exponential backoff.

pub mod error;
pub mod handlers;
pub mod limits;
pub mod metrics;
pub mod retry;
pub mod server;

pub use error::RpcError;
pub use metrics::RpcMetrics;
pub use retry::RetryPolicy;
pub use server::{router, RpcServer, RpcState};
