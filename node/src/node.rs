//! The running node: wires the store, engine, sessions and servers together.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use can_rpc::{RpcMetrics, RpcServer, RpcState};
use can_session::{SessionRegistry, SessionToken};
use can_staking::{EventBus, StakingEngine, StakingEvent};
use can_store::NewsStore;
use can_store_lmdb::environment::MAX_DBS;
use can_store_lmdb::{LmdbEnvironment, LmdbError};
use can_types::{Clock, SystemClock};
use can_websocket::{WebSocketServer, WsState};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::feed::publish_event;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;

/// How long `stop` waits for each background task to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A staking node.
pub struct CanNode {
    pub config: NodeConfig,
    pub store: Arc<LmdbEnvironment>,
    pub engine: Arc<StakingEngine<LmdbEnvironment>>,
    pub sessions: Arc<SessionRegistry>,
    pub ws_state: Arc<WsState>,
    pub metrics: Option<Arc<NodeMetrics>>,
    pub clock: Arc<dyn Clock>,
    shutdown: ShutdownController,
    tasks: Vec<JoinHandle<()>>,
}

impl CanNode {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a node reading time from `clock`. Opens the store and seeds the
    /// configured sessions; nothing is served until [`CanNode::start`].
    pub fn with_clock(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self, NodeError> {
        config.validate()?;

        let store = Arc::new(LmdbEnvironment::open(
            &config.data_dir,
            MAX_DBS,
            config.lmdb_map_size,
        )?);

        let sessions = Arc::new(SessionRegistry::new(config.session_ttl_secs));
        let now = clock.now();
        for seed in &config.sessions {
            let token = SessionToken::parse(&seed.token)?;
            sessions.sign_in_with_token(seed.account.clone(), token, now);
        }

        let metrics = if config.enable_metrics {
            let metrics = Arc::new(NodeMetrics::new()?);
            metrics.active_sessions.set(sessions.count() as i64);
            Some(metrics)
        } else {
            None
        };

        let ws_state = Arc::new(
            WsState::new(config.websocket_channel_capacity)
                .with_sessions(Arc::clone(&sessions), Arc::clone(&clock)),
        );

        let mut events = EventBus::new();
        if config.enable_websocket {
            let ws = Arc::clone(&ws_state);
            events.subscribe(Box::new(move |event: &StakingEvent| {
                publish_event(&ws, event);
            }));
        }
        if let Some(metrics) = &metrics {
            let metrics = Arc::clone(metrics);
            events.subscribe(Box::new(move |event: &StakingEvent| metrics.observe(event)));
        }

        let engine = Arc::new(StakingEngine::with_events(
            Arc::clone(&store),
            config.staking.clone(),
            events,
        ));
        Self::seed_news(&engine, &config, now)?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sessions = sessions.count(),
            "node initialised"
        );

        Ok(Self {
            config,
            store,
            engine,
            sessions,
            ws_state,
            metrics,
            clock,
            shutdown: ShutdownController::new(),
            tasks: Vec::new(),
        })
    }

    /// Publish the configured news once, into an empty store.
    fn seed_news(
        engine: &StakingEngine<LmdbEnvironment>,
        config: &NodeConfig,
        now: can_types::Timestamp,
    ) -> Result<(), NodeError> {
        if config.news.is_empty() || engine.store().news_count()? > 0 {
            return Ok(());
        }
        for draft in &config.news {
            engine.publish_news(draft.clone(), now)?;
        }
        tracing::info!(items = config.news.len(), "seeded news");
        Ok(())
    }

    /// Spawn the HTTP API, the WebSocket feed and the session sweeper.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if !self.tasks.is_empty() {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            rpc = self.config.enable_rpc,
            rpc_port = self.config.rpc_port,
            websocket = self.config.enable_websocket,
            websocket_port = self.config.websocket_port,
            faucet = self.config.enable_faucet,
            "node starting"
        );

        if self.config.enable_rpc {
            let mut state = RpcState::new(
                Arc::clone(&self.engine),
                Arc::clone(&self.sessions),
                Arc::clone(&self.clock),
            )
            .with_retry(self.config.retry.clone())
            .with_faucet(self.config.enable_faucet);
            if let Some(metrics) = &self.metrics {
                state = state.with_metrics(RpcMetrics::register(&metrics.registry)?);
            }
            let server = RpcServer::new(self.config.rpc_port, Arc::new(state));
            let shutdown = self.shutdown.subscribe();
            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = server.start(shutdown).await {
                    tracing::error!(error = %e, "RPC server failed");
                }
            }));
        }

        if self.config.enable_websocket {
            let server =
                WebSocketServer::with_state(self.config.websocket_port, Arc::clone(&self.ws_state));
            let shutdown = self.shutdown.subscribe();
            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = server.start(shutdown).await {
                    tracing::error!(error = %e, "WebSocket server failed");
                }
            }));
        }

        self.tasks.push(self.spawn_session_sweeper());
        Ok(())
    }

    fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let clock = Arc::clone(&self.clock);
        let metrics = self.metrics.clone();
        let period = Duration::from_secs(self.config.session_sweep_secs.max(1));
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = sessions.purge_expired(clock.now());
                        if purged > 0 {
                            tracing::debug!(purged, "expired sessions swept");
                        }
                        if let Some(metrics) = &metrics {
                            metrics.active_sessions.set(sessions.count() as i64);
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    /// Block until SIGINT/SIGTERM or [`CanNode::request_shutdown`].
    pub async fn wait_for_shutdown(&self) -> Result<(), NodeError> {
        self.shutdown.wait_for_signal().await?;
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Signal every task, wait for them to drain, then flush the store.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("node stopping");
        self.shutdown.shutdown();

        let mut timed_out = false;
        for task in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "background task ended abnormally"),
                Err(_) => timed_out = true,
            }
        }

        self.store.env().force_sync().map_err(LmdbError::from)?;
        tracing::info!("store flushed");

        if timed_out {
            return Err(NodeError::ShutdownTimeout);
        }
        Ok(())
    }
}
