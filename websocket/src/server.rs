//! WebSocket server implementation.
//!
//! Accepts WebSocket connections at `/ws` and lets clients subscribe to row
//! changes per table. Changes are delivered via one broadcast channel per
//! table and filtered per client by event kind and row owner.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use can_session::{SessionContext, SessionRegistry, SessionToken};
use can_types::{AccountId, Clock, SystemClock, Timestamp};

use crate::subscriptions::{
    ChangeKind, ChangeNotification, ClientMessage, ClientSubscriptions, EventFilter,
    ServerMessage, Subscription, Table,
};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Default capacity of each table's broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Shared state for the WebSocket server: one broadcast channel per table
/// plus the session registry used to authenticate connections.
pub struct WsState {
    channels: HashMap<Table, broadcast::Sender<Arc<ChangeNotification>>>,
    sessions: Option<Arc<SessionRegistry>>,
    clock: Arc<dyn Clock>,
}

impl WsState {
    /// State without authentication: private tables cannot be followed.
    pub fn new(channel_capacity: usize) -> Self {
        let channels = Table::ALL
            .into_iter()
            .map(|table| (table, broadcast::channel(channel_capacity).0))
            .collect();
        Self {
            channels,
            sessions: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionRegistry>, clock: Arc<dyn Clock>) -> Self {
        self.sessions = Some(sessions);
        self.clock = clock;
        self
    }

    /// Get the broadcast sender for a given table.
    pub fn sender_for(&self, table: Table) -> broadcast::Sender<Arc<ChangeNotification>> {
        match self.channels.get(&table) {
            Some(tx) => tx.clone(),
            // Every table gets a channel in `new`.
            None => broadcast::channel(1).0,
        }
    }

    /// Push a change to every subscriber of its table. Returns how many
    /// connections received it. Publishing never blocks and never fails:
    /// with nobody listening the change is dropped.
    pub fn publish(&self, change: ChangeNotification) -> usize {
        let Some(tx) = self.channels.get(&change.table) else {
            return 0;
        };
        tx.send(Arc::new(change)).unwrap_or(0)
    }

    /// Serialize `row` and publish it as a change on `table`.
    pub fn publish_change<T: Serialize>(
        &self,
        table: Table,
        event: ChangeKind,
        account: Option<&AccountId>,
        row: &T,
        timestamp: Timestamp,
    ) -> usize {
        let row = match serde_json::to_value(row) {
            Ok(row) => row,
            Err(e) => {
                warn!(%table, "could not serialize change row: {}", e);
                return 0;
            }
        };
        self.publish(ChangeNotification {
            table,
            event,
            account: account.cloned(),
            row,
            timestamp,
        })
    }

    /// Build the session context for a new connection.
    ///
    /// No token means an anonymous connection that may only follow public
    /// tables. A token that does not resolve is rejected outright.
    pub fn authorize(&self, token: Option<&str>) -> Result<SessionContext, StatusCode> {
        let Some(raw) = token else {
            return Ok(SessionContext::signed_out());
        };
        let registry = self.sessions.as_ref().ok_or(StatusCode::UNAUTHORIZED)?;
        let token = SessionToken::parse(raw).map_err(|_| StatusCode::UNAUTHORIZED)?;
        let session = registry
            .resolve(&token, self.clock.now())
            .map_err(|_| StatusCode::UNAUTHORIZED)?;
        Ok(SessionContext::new(Some(session)))
    }
}

/// The WebSocket server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    /// Create a new server with the default channel capacity.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: Arc::new(WsState::new(DEFAULT_CHANNEL_CAPACITY)),
        }
    }

    /// Create a new server with the provided shared state.
    pub fn with_state(port: u16, state: Arc<WsState>) -> Self {
        Self { port, state }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Serve connections until `shutdown` fires.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let app = self.router();
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("WebSocket server listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
    }
}

pub fn router(state: Arc<WsState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    State(state): State<Arc<WsState>>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let context = match state.authorize(params.token.as_deref()) {
        Ok(context) => context,
        Err(status) => return (status, "invalid session token").into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, context))
}

/// Handle a single WebSocket connection.
///
/// The flow:
/// 1. Split the socket into sender and receiver halves.
/// 2. Follow the connection's session, if any.
/// 3. Listen for client messages (subscribe, unsubscribe, ping).
/// 4. For each active subscription, spawn a forwarder task that reads from
///    the table's broadcast channel and sends matching changes to the client.
/// 5. On sign-out, drop the subscriptions on private tables.
/// 6. Abort all forwarder tasks when the client disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>, context: SessionContext) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(ws_sender));

    let follower = match (&state.sessions, context.current()) {
        (Some(registry), Some(_)) => Some(context.follow(registry)),
        _ => None,
    };
    let mut session_changes = context.subscribe();
    let mut session_open = context.current().is_some();

    let mut client_subs = ClientSubscriptions::new();
    let mut forwarders: HashMap<Table, JoinHandle<()>> = HashMap::new();

    debug!(user = ?context.current_user(), "WebSocket client connected");

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                    None => break,
                };
                match msg {
                    Message::Text(text) => {
                        handle_text_message(
                            &text,
                            &state,
                            &context,
                            &mut client_subs,
                            &mut forwarders,
                            &ws_sender,
                        )
                        .await;
                    }
                    Message::Close(_) => {
                        debug!("Client sent close frame");
                        break;
                    }
                    Message::Ping(data) => {
                        let mut sender = ws_sender.lock().await;
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
            changed = session_changes.changed(), if session_open => {
                if changed.is_err() {
                    session_open = false;
                    continue;
                }
                let signed_out = session_changes.borrow_and_update().is_none();
                if signed_out {
                    session_open = false;
                    for table in client_subs.drop_private() {
                        if let Some(handle) = forwarders.remove(&table) {
                            handle.abort();
                        }
                    }
                    send_json(&ws_sender, &ServerMessage::Error {
                        message: "session ended".to_string(),
                    })
                    .await;
                }
            }
        }
    }

    // Client disconnected: abort all forwarder tasks.
    for (table, handle) in forwarders.drain() {
        debug!("Aborting forwarder for table: {}", table);
        handle.abort();
    }
    if let Some(follower) = follower {
        follower.abort();
    }
    debug!("WebSocket client disconnected");
}

/// Process a text message from the client.
async fn handle_text_message(
    text: &str,
    state: &Arc<WsState>,
    context: &SessionContext,
    client_subs: &mut ClientSubscriptions,
    forwarders: &mut HashMap<Table, JoinHandle<()>>,
    ws_sender: &WsSender,
) {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            send_json(
                ws_sender,
                &ServerMessage::Error {
                    message: format!("Invalid message: {}", e),
                },
            )
            .await;
            return;
        }
    };

    match client_msg {
        ClientMessage::Subscribe {
            table,
            event,
            account,
        } => {
            let subscription = match scope_subscription(context, table, event, account) {
                Ok(subscription) => subscription,
                Err(message) => {
                    send_json(ws_sender, &ServerMessage::Error { message }).await;
                    return;
                }
            };

            // If already subscribed, abort the old forwarder first.
            if let Some(handle) = forwarders.remove(&table) {
                handle.abort();
            }
            client_subs.subscribe(subscription.clone());

            let rx = state.sender_for(table).subscribe();
            let sender = Arc::clone(ws_sender);
            let handle = tokio::spawn(forward_changes(rx, sender, subscription));
            forwarders.insert(table, handle);

            send_json(
                ws_sender,
                &ServerMessage::Ack {
                    action: "subscribe".to_string(),
                    table,
                },
            )
            .await;
            debug!("Client subscribed to {}", table);
        }
        ClientMessage::Unsubscribe { table } => {
            let was_subscribed = client_subs.unsubscribe(table);
            if let Some(handle) = forwarders.remove(&table) {
                handle.abort();
            }

            let reply = if was_subscribed {
                ServerMessage::Ack {
                    action: "unsubscribe".to_string(),
                    table,
                }
            } else {
                ServerMessage::Error {
                    message: format!("Not subscribed to {}", table),
                }
            };
            send_json(ws_sender, &reply).await;
            debug!("Client unsubscribed from {}", table);
        }
        ClientMessage::Ping => {
            send_json(ws_sender, &ServerMessage::Pong).await;
        }
    }
}

/// Apply the visibility rules to a subscribe request.
///
/// Private tables are always narrowed to the signed-in account; asking for
/// somebody else's rows is an error. The public feed accepts any filter.
pub fn scope_subscription(
    context: &SessionContext,
    table: Table,
    event: EventFilter,
    account: Option<AccountId>,
) -> Result<Subscription, String> {
    if !table.is_private() {
        return Ok(Subscription {
            table,
            event,
            account,
        });
    }
    let user = context
        .require_user()
        .map_err(|_| format!("sign in to follow {table}"))?;
    if account.as_ref().is_some_and(|a| *a != user) {
        return Err(format!("{table} of other accounts are not visible"));
    }
    Ok(Subscription {
        table,
        event,
        account: Some(user),
    })
}

/// Forwarder task: reads changes from a broadcast receiver and sends the
/// matching ones to the WebSocket client.
async fn forward_changes(
    mut rx: broadcast::Receiver<Arc<ChangeNotification>>,
    ws_sender: WsSender,
    subscription: Subscription,
) {
    loop {
        match rx.recv().await {
            Ok(change) => {
                if !subscription.matches(&change) {
                    continue;
                }
                let text = match serde_json::to_string(change.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("could not serialize change: {}", e);
                        continue;
                    }
                };
                let mut sender = ws_sender.lock().await;
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(
                    "Client lagged behind by {} changes on table {}",
                    missed, subscription.table
                );
                send_json(
                    &ws_sender,
                    &ServerMessage::Lagged {
                        table: subscription.table,
                        missed,
                    },
                )
                .await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Broadcast channel closed for table {}", subscription.table);
                break;
            }
        }
    }
}

async fn send_json(ws_sender: &WsSender, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => {
            let mut sender = ws_sender.lock().await;
            let _ = sender.send(Message::Text(text)).await;
        }
        Err(e) => warn!("could not serialize server message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    #[tokio::test]
    async fn publish_reaches_table_subscribers_only() {
        let state = WsState::new(16);
        let mut coin_rx = state.sender_for(Table::StakingCoin).subscribe();
        let mut tx_rx = state.sender_for(Table::Transactions).subscribe();

        let delivered = state.publish_change(
            Table::StakingCoin,
            ChangeKind::Insert,
            Some(&alice()),
            &json!({"id": 1}),
            Timestamp::new(5),
        );
        assert_eq!(delivered, 1);

        let change = coin_rx.recv().await.unwrap();
        assert_eq!(change.row, json!({"id": 1}));
        assert_eq!(change.event, ChangeKind::Insert);
        assert!(tx_rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_listeners_is_dropped() {
        let state = WsState::new(16);
        let delivered = state.publish_change(
            Table::Profiles,
            ChangeKind::Update,
            None,
            &json!({}),
            Timestamp::new(0),
        );
        assert_eq!(delivered, 0);
    }

    #[test]
    fn authorize_checks_tokens() {
        let registry = Arc::new(SessionRegistry::new(3_600));
        let session = registry.sign_in(alice(), Timestamp::now()).unwrap();
        let state = WsState::new(16).with_sessions(Arc::clone(&registry), Arc::new(SystemClock));

        let ctx = state.authorize(Some(session.token.as_str())).unwrap();
        assert_eq!(ctx.current_user(), Some(alice()));

        let anon = state.authorize(None).unwrap();
        assert_eq!(anon.current_user(), None);

        assert_eq!(
            state.authorize(Some("forged")).err(),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            WsState::new(16).authorize(Some("any")).err(),
            Some(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn private_tables_are_scoped_to_the_session() {
        let registry = SessionRegistry::new(3_600);
        let session = registry.sign_in(alice(), Timestamp::new(0)).unwrap();
        let ctx = SessionContext::new(Some(session));

        let sub = scope_subscription(&ctx, Table::Profiles, EventFilter::All, None).unwrap();
        assert_eq!(sub.account, Some(alice()));

        let bob = AccountId::new("bob").unwrap();
        assert!(scope_subscription(&ctx, Table::StakingNft, EventFilter::All, Some(bob.clone())).is_err());

        let anon = SessionContext::signed_out();
        assert!(scope_subscription(&anon, Table::StakingCoin, EventFilter::Insert, None).is_err());
        let public = scope_subscription(&anon, Table::Transactions, EventFilter::Insert, Some(bob)).unwrap();
        assert_eq!(public.account.as_ref().map(|a| a.as_str()), Some("bob"));
    }
}
