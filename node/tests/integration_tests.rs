//! Integration tests wiring the node together over a real LMDB directory:
//! config → store → engine → change feed, metrics and sessions.

use std::sync::Arc;

use can_nullables::NullClock;
use can_session::SessionToken;
use can_store::{NewsQuery, NewsStore, ProfileStore};
use can_types::{AccountId, CanAmount, Clock, NewsDraft, NewsKind};
use can_websocket::{ChangeKind, Table};

use can_node::{CanNode, NodeConfig, NodeError, SessionSeed};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config(dir: &tempfile::TempDir) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().to_path_buf(),
        lmdb_map_size: 64 * 1024 * 1024,
        rpc_port: 0,
        websocket_port: 0,
        enable_websocket: true,
        enable_metrics: true,
        enable_faucet: true,
        sessions: vec![SessionSeed {
            account: alice(),
            token: "dev-token-alice".to_string(),
        }],
        ..NodeConfig::default()
    }
}

fn alice() -> AccountId {
    AccountId::new("alice").unwrap()
}

fn node_at(dir: &tempfile::TempDir, clock: &Arc<NullClock>) -> CanNode {
    let clock: Arc<dyn Clock> = clock.clone();
    CanNode::with_clock(config(dir), clock).expect("node")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn seeded_sessions_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_000));
    let node = node_at(&dir, &clock);

    let token = SessionToken::parse("dev-token-alice").unwrap();
    let session = node.sessions.resolve(&token, clock.now()).unwrap();
    assert_eq!(session.account, alice());
    assert_eq!(node.metrics.as_ref().unwrap().active_sessions.get(), 1);
}

#[test]
fn malformed_seed_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir);
    cfg.sessions[0].token = "has space".to_string();
    assert!(matches!(CanNode::new(cfg), Err(NodeError::Session(_))));
}

#[tokio::test]
async fn engine_writes_reach_feed_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_000));
    let node = node_at(&dir, &clock);

    let mut coin_rx = node.ws_state.sender_for(Table::StakingCoin).subscribe();
    let mut tx_rx = node.ws_state.sender_for(Table::Transactions).subscribe();

    node.engine
        .deposit(&alice(), CanAmount::from_can(1_000), clock.now())
        .unwrap();
    let id = node
        .engine
        .create_coin_stake(&alice(), CanAmount::from_can(1_000), clock.now())
        .unwrap();
    clock.advance_days(365);
    let receipt = node.engine.claim(id, &alice(), clock.now()).unwrap();
    assert_eq!(receipt.credited, CanAmount::from_can(100));

    let inserted = coin_rx.recv().await.unwrap();
    assert_eq!(inserted.event, ChangeKind::Insert);
    let updated = coin_rx.recv().await.unwrap();
    assert_eq!(updated.event, ChangeKind::Update);
    assert_eq!(updated.timestamp, clock.now());

    let kinds: Vec<String> = [
        tx_rx.recv().await.unwrap(),
        tx_rx.recv().await.unwrap(),
        tx_rx.recv().await.unwrap(),
    ]
    .iter()
    .map(|c| c.row["kind"].as_str().unwrap().to_string())
    .collect();
    assert_eq!(kinds, ["deposit", "stake", "claim"]);

    let metrics = node.metrics.as_ref().unwrap();
    assert_eq!(metrics.deposits.get(), 1);
    assert_eq!(metrics.stakes_opened.with_label_values(&["coin"]).get(), 1);
    assert_eq!(metrics.claims_settled.get(), 1);
    assert_eq!(metrics.rewards_paid_raw.get(), 100_000_000);
}

#[tokio::test]
async fn stats_rows_follow_balance_moves() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_000));
    let node = node_at(&dir, &clock);
    let mut stats_rx = node.ws_state.sender_for(Table::NetworkStats).subscribe();

    node.engine
        .deposit(&alice(), CanAmount::from_can(500), clock.now())
        .unwrap();
    node.engine
        .create_coin_stake(&alice(), CanAmount::from_can(200), clock.now())
        .unwrap();

    stats_rx.recv().await.unwrap();
    let latest = stats_rx.recv().await.unwrap();
    assert_eq!(latest.account, None);
    assert_eq!(latest.row["circulating_supply"], "300");
    assert_eq!(latest.row["total_value_locked"], "200");
    assert_eq!(latest.row["total_transactions"], 2);
}

#[test]
fn configured_news_is_seeded_once() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_000));
    let mut cfg = config(&dir);
    cfg.news = vec![NewsDraft {
        kind: NewsKind::Event,
        title: "Launch party".into(),
        description: "Phase 1 launch".into(),
        content: None,
        image_url: None,
        location: Some("Da Nang".into()),
        starts_at: None,
        ends_at: None,
        max_attendees: Some(100),
        featured: true,
    }];
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    {
        let node = CanNode::with_clock(cfg.clone(), Arc::clone(&dyn_clock)).unwrap();
        assert_eq!(node.store.news_count().unwrap(), 1);
    }
    let node = CanNode::with_clock(cfg, dyn_clock).unwrap();
    let items = node.store.recent_news(&NewsQuery::latest(10)).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Launch party");
}

#[test]
fn balances_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_000));
    {
        let node = node_at(&dir, &clock);
        node.engine
            .deposit(&alice(), CanAmount::from_can(42), clock.now())
            .unwrap();
    }
    let node = node_at(&dir, &clock);
    assert_eq!(node.store.balance(&alice()).unwrap(), CanAmount::from_can(42));
}

#[tokio::test]
async fn start_then_stop() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(NullClock::new(1_000));
    let mut node = node_at(&dir, &clock);

    node.start().await.unwrap();
    assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
    node.stop().await.unwrap();
}
