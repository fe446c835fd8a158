//! HTTP server: shared state, routing, and the listener loop.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use can_session::{SessionContext, SessionError, SessionRegistry, SessionToken};
use can_staking::{StakingEngine, StakingError};
use can_store::StakingLedger;
use can_types::{AccountId, Clock};

use crate::handlers;
use crate::{RetryPolicy, RpcError, RpcMetrics};

/// Everything a request handler needs.
pub struct RpcState<S> {
    pub engine: Arc<StakingEngine<S>>,
    pub sessions: Arc<SessionRegistry>,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,
    pub faucet_enabled: bool,
    pub metrics: Option<RpcMetrics>,
}

impl<S: StakingLedger + Send + Sync + 'static> RpcState<S> {
    pub fn new(
        engine: Arc<StakingEngine<S>>,
        sessions: Arc<SessionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            sessions,
            clock,
            retry: RetryPolicy::default(),
            faucet_enabled: false,
            metrics: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_faucet(mut self, enabled: bool) -> Self {
        self.faucet_enabled = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: RpcMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The bearer token of the request, if well formed.
    pub fn bearer_token(&self, headers: &HeaderMap) -> Result<SessionToken, RpcError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(SessionError::Unauthenticated)?
            .to_str()
            .map_err(|_| SessionError::MalformedToken)?;
        let raw = value
            .strip_prefix("Bearer ")
            .ok_or(SessionError::MalformedToken)?;
        Ok(SessionToken::parse(raw)?)
    }

    /// Resolve the request's session into a context and return the signed-in
    /// account.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AccountId, RpcError> {
        let token = self.bearer_token(headers)?;
        let session = self.sessions.resolve(&token, self.clock.now())?;
        let context = SessionContext::new(Some(session));
        Ok(context.require_user()?)
    }

    /// Run a mutating engine call and count its outcome.
    pub async fn run_write<T, F>(&self, route: &'static str, op: F) -> Result<T, RpcError>
    where
        T: Send + 'static,
        F: Fn() -> Result<T, StakingError> + Send + Sync + 'static,
    {
        let result = self.retry.run(op).await;
        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind(),
            };
            metrics.observe(route, outcome);
        }
        result
    }
}

/// Build the API router.
pub fn router<S>(state: Arc<RpcState<S>>) -> Router
where
    S: StakingLedger + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::<S>))
        .route("/metrics", get(handlers::metrics::<S>))
        .route("/nfts", get(handlers::nfts::<S>))
        .route("/tiers", get(handlers::tiers))
        .route("/transactions", get(handlers::transactions::<S>))
        .route("/stats", get(handlers::stats::<S>))
        .route("/news", get(handlers::news::<S>))
        .route("/news/:id", get(handlers::news_item::<S>))
        .route(
            "/news/:id/registration",
            get(handlers::registration_status::<S>)
                .post(handlers::register_for_event::<S>)
                .delete(handlers::cancel_registration::<S>),
        )
        .route("/profile", get(handlers::get_profile::<S>))
        .route("/profile/username", put(handlers::set_username::<S>))
        .route("/stakes", get(handlers::list_stakes::<S>))
        .route("/stakes/coin", post(handlers::create_coin_stake::<S>))
        .route("/stakes/nft", post(handlers::create_nft_stake::<S>))
        .route("/stakes/:id", get(handlers::get_stake::<S>))
        .route("/stakes/:id/claim", post(handlers::claim::<S>))
        .route("/portfolio", get(handlers::portfolio::<S>))
        .route("/membership", post(handlers::purchase_membership::<S>))
        .route("/faucet", post(handlers::faucet::<S>))
        .route("/session/refresh", post(handlers::refresh_session::<S>))
        .route("/session", delete(handlers::sign_out::<S>))
        .layer(cors)
        .with_state(state)
}

/// The HTTP API server.
pub struct RpcServer<S> {
    pub port: u16,
    pub state: Arc<RpcState<S>>,
}

impl<S: StakingLedger + Send + Sync + 'static> RpcServer<S> {
    pub fn new(port: u16, state: Arc<RpcState<S>>) -> Self {
        Self { port, state }
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let app = router(Arc::clone(&self.state));
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("RPC server listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
    }
}
