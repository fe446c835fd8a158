//! WebSocket server for realtime change notifications.
//!
//! Clients subscribe per table and event kind:
//! - `profiles`: balance, tier and name changes (own account only)
//! - `staking_coin` / `staking_nft`: opened stakes and restarted windows
//!   (own account only)
//! - `transactions`: the public transaction log feed
//! - `news_events`: published news, announcements and events
//! - `event_registrations`: registrations added or cancelled (own account
//!   only)
//! - `network_stats`: the landing page statistics row
//!
//! The feed exists so user interfaces can refresh; it carries no state of
//! its own and losing a message never affects balances.

pub mod server;
pub mod subscriptions;

pub use server::{router, WebSocketServer, WsState};
pub use subscriptions::{
    ChangeKind, ChangeNotification, ClientMessage, EventFilter, ServerMessage, Table,
};
