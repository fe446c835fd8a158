//! Subscription management for WebSocket clients.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use can_types::{AccountId, Timestamp};

/// Logical tables whose changes are pushed to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    StakingCoin,
    StakingNft,
    Transactions,
    NewsEvents,
    EventRegistrations,
    NetworkStats,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Self::Profiles,
        Self::StakingCoin,
        Self::StakingNft,
        Self::Transactions,
        Self::NewsEvents,
        Self::EventRegistrations,
        Self::NetworkStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::StakingCoin => "staking_coin",
            Self::StakingNft => "staking_nft",
            Self::Transactions => "transactions",
            Self::NewsEvents => "news_events",
            Self::EventRegistrations => "event_registrations",
            Self::NetworkStats => "network_stats",
        }
    }

    /// Rows of private tables are only pushed to their owner's session.
    /// The transaction log, news and statistics are public.
    pub fn is_private(&self) -> bool {
        !matches!(
            self,
            Self::Transactions | Self::NewsEvents | Self::NetworkStats
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which change kinds a subscription wants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventFilter {
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    #[default]
    #[serde(rename = "*")]
    All,
}

impl EventFilter {
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            Self::All => true,
            Self::Insert => kind == ChangeKind::Insert,
            Self::Update => kind == ChangeKind::Update,
            Self::Delete => kind == ChangeKind::Delete,
        }
    }
}

/// One row change, as pushed to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub table: Table,
    pub event: ChangeKind,
    /// Owner of the row; absent on network-wide rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountId>,
    pub row: serde_json::Value,
    pub timestamp: Timestamp,
}

/// Messages a client may send.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        table: Table,
        #[serde(default)]
        event: EventFilter,
        #[serde(default)]
        account: Option<AccountId>,
    },
    Unsubscribe {
        table: Table,
    },
    Ping,
}

/// Control messages sent by the server. Row changes are sent as bare
/// [`ChangeNotification`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack { action: String, table: Table },
    Error { message: String },
    Lagged { table: Table, missed: u64 },
    Pong,
}

/// An active subscription on one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub table: Table,
    pub event: EventFilter,
    /// Only rows owned by this account. `None` means every row.
    pub account: Option<AccountId>,
}

impl Subscription {
    pub fn matches(&self, change: &ChangeNotification) -> bool {
        change.table == self.table
            && self.event.matches(change.event)
            && self
                .account
                .as_ref()
                .map_or(true, |a| change.account.as_ref() == Some(a))
    }
}

/// The subscriptions of one connection, at most one per table.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    active: HashMap<Table, Subscription>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the subscription for its table.
    pub fn subscribe(&mut self, subscription: Subscription) {
        self.active.insert(subscription.table, subscription);
    }

    /// Returns whether the table was subscribed.
    pub fn unsubscribe(&mut self, table: Table) -> bool {
        self.active.remove(&table).is_some()
    }

    pub fn get(&self, table: Table) -> Option<&Subscription> {
        self.active.get(&table)
    }

    /// Drop every subscription on a private table, returning which ones.
    pub fn drop_private(&mut self) -> Vec<Table> {
        let private: Vec<Table> = self
            .active
            .keys()
            .copied()
            .filter(Table::is_private)
            .collect();
        for table in &private {
            self.active.remove(table);
        }
        private
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    fn change(table: Table, event: ChangeKind, account: &str) -> ChangeNotification {
        ChangeNotification {
            table,
            event,
            account: Some(AccountId::new(account).unwrap()),
            row: json!({}),
            timestamp: Timestamp::new(0),
        }
    }

    #[test]
    fn parses_client_messages() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"action":"subscribe","table":"staking_coin","event":"update","account":"alice"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                table: Table::StakingCoin,
                event: EventFilter::Update,
                account: Some(alice()),
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","table":"transactions"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                table: Table::Transactions,
                event: EventFilter::All,
                account: None,
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"subscribe","table":"users"}"#).is_err());
    }

    #[test]
    fn wildcard_event_filter() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","table":"profiles","event":"*"}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Subscribe {
                event: EventFilter::All,
                ..
            }
        ));
    }

    #[test]
    fn subscription_matching() {
        let sub = Subscription {
            table: Table::StakingCoin,
            event: EventFilter::Insert,
            account: Some(alice()),
        };
        assert!(sub.matches(&change(Table::StakingCoin, ChangeKind::Insert, "alice")));
        assert!(!sub.matches(&change(Table::StakingCoin, ChangeKind::Update, "alice")));
        assert!(!sub.matches(&change(Table::StakingCoin, ChangeKind::Insert, "bob")));
        assert!(!sub.matches(&change(Table::StakingNft, ChangeKind::Insert, "alice")));

        let stats = ChangeNotification {
            table: Table::NetworkStats,
            event: ChangeKind::Update,
            account: None,
            row: json!({}),
            timestamp: Timestamp::new(0),
        };
        let everyone = Subscription {
            table: Table::NetworkStats,
            event: EventFilter::All,
            account: None,
        };
        let narrowed = Subscription {
            account: Some(alice()),
            ..everyone.clone()
        };
        assert!(everyone.matches(&stats));
        assert!(!narrowed.matches(&stats));
        assert!(serde_json::to_value(&stats).unwrap().get("account").is_none());
    }

    #[test]
    fn delete_filter() {
        let sub = Subscription {
            table: Table::EventRegistrations,
            event: EventFilter::Delete,
            account: Some(alice()),
        };
        assert!(sub.matches(&change(Table::EventRegistrations, ChangeKind::Delete, "alice")));
        assert!(!sub.matches(&change(Table::EventRegistrations, ChangeKind::Insert, "alice")));
    }

    #[test]
    fn server_messages_are_tagged() {
        let ack = ServerMessage::Ack {
            action: "subscribe".into(),
            table: Table::Transactions,
        };
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            json!({"type": "ack", "action": "subscribe", "table": "transactions"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Pong).unwrap(),
            json!({"type": "pong"})
        );
    }

    #[test]
    fn drop_private_keeps_public_feed() {
        let mut subs = ClientSubscriptions::new();
        for table in Table::ALL {
            subs.subscribe(Subscription {
                table,
                event: EventFilter::All,
                account: None,
            });
        }
        let mut dropped = subs.drop_private();
        dropped.sort_by_key(|t| t.as_str());
        assert_eq!(
            dropped,
            vec![
                Table::EventRegistrations,
                Table::Profiles,
                Table::StakingCoin,
                Table::StakingNft
            ]
        );
        assert_eq!(subs.len(), 3);
        assert!(subs.get(Table::Transactions).is_some());
        assert!(subs.get(Table::NetworkStats).is_some());
    }
}
