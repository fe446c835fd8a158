//! Identity boundary of the staking service.
//!
//! The [`SessionRegistry`] issues opaque bearer tokens for accounts and
//! announces sign-in, sign-out and refresh on a broadcast channel. A
//! [`SessionContext`] is the one place a component learns who is signed in:
//! it is created at the root of a request or connection, subscribes to the
//! registry once, and republishes changes through a `watch` channel to
//! whatever needs identity.

pub mod context;
pub mod error;
pub mod registry;

pub use context::SessionContext;
pub use error::SessionError;
pub use registry::{Session, SessionEvent, SessionRegistry, SessionToken};
