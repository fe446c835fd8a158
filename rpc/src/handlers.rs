//! Request handlers and their request/response shapes.
//!
//! Every handler resolves the caller (when the route needs one), then runs
//! the engine call on the blocking pool through the node's retry policy.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use can_staking::{ClaimReceipt, Portfolio, RegistrationStatus, StakeView, StakingError};
use can_store::{NewsQuery, StakingLedger, TransactionQuery};
use can_types::{
    AccountId, CanAmount, EventRegistration, EventStatus, MembershipTier, NetworkStats, NewsId,
    NewsItem, NewsKind, NftListing, Profile, StakeId, StakeKind, Timestamp, TransactionKind,
    TransactionRecord,
};

use crate::error::RpcError;
use crate::limits::effective_limit;
use crate::server::RpcState;

type AppState<S> = State<Arc<RpcState<S>>>;

// ── Request types ──────────────────────────────────────────────────────

/// Body of `POST /stakes/coin` and `POST /faucet`. The amount may be a
/// decimal string or a JSON number.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
pub struct NftStakeRequest {
    pub nft_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub tier: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StakesParams {
    pub asset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    pub kind: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionsParams {
    pub account: Option<String>,
    pub phase: Option<u8>,
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

// ── Response types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct TierInfo {
    pub tier: MembershipTier,
    pub price: CanAmount,
}

/// A news item with its event schedule status and registration count.
#[derive(Debug, Serialize)]
pub struct NewsDetail {
    #[serde(flatten)]
    pub item: NewsItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_status: Option<EventStatus>,
    pub registrations: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub account: AccountId,
    pub expires_at: Timestamp,
}

// ── Input parsing ──────────────────────────────────────────────────────

/// Accept `"12.5"` or `12.5`. Negative, malformed and over-precise values
/// are `InvalidAmount`.
pub fn parse_amount(value: &Value) -> Result<CanAmount, RpcError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(StakingError::InvalidAmount(format!(
                "amount must be a decimal string or number, got {other}"
            ))
            .into())
        }
    };
    Ok(CanAmount::from_decimal_str(&text).map_err(StakingError::from)?)
}

fn parse_kind(raw: Option<&str>) -> Result<Option<StakeKind>, RpcError> {
    raw.map(|s| s.parse::<StakeKind>())
        .transpose()
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| RpcError::InvalidRequest(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, RpcError> {
    params
        .map(|Query(inner)| inner)
        .map_err(|e| RpcError::InvalidRequest(e.body_text()))
}

fn stake_id(path: Result<Path<u64>, PathRejection>) -> Result<StakeId, RpcError> {
    path.map(|Path(id)| StakeId::new(id))
        .map_err(|e| RpcError::InvalidRequest(e.body_text()))
}

fn news_id(path: Result<Path<u64>, PathRejection>) -> Result<NewsId, RpcError> {
    path.map(|Path(id)| NewsId::new(id))
        .map_err(|e| RpcError::InvalidRequest(e.body_text()))
}

// ── Public ─────────────────────────────────────────────────────────────

pub async fn health<S>(State(state): AppState<S>) -> Json<HealthResponse>
where
    S: StakingLedger + Send + Sync + 'static,
{
    Json(HealthResponse {
        status: "ok",
        sessions: state.sessions.count(),
    })
}

pub async fn metrics<S>(State(state): AppState<S>) -> Result<impl IntoResponse, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let metrics = state.metrics.as_ref().ok_or(RpcError::Disabled("metrics"))?;
    let text = metrics
        .render()
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        [("content-type", "text/plain; version=0.0.4")],
        text,
    ))
}

pub async fn nfts<S>(State(state): AppState<S>) -> Json<Vec<NftListing>>
where
    S: StakingLedger + Send + Sync + 'static,
{
    Json(state.engine.params().nft_catalog.clone())
}

pub async fn tiers() -> Json<Vec<TierInfo>> {
    Json(
        MembershipTier::ALL
            .iter()
            .map(|tier| TierInfo {
                tier: *tier,
                price: tier.price(),
            })
            .collect(),
    )
}

/// The public live feed, newest first.
pub async fn transactions<S>(
    State(state): AppState<S>,
    params: Result<Query<TransactionsParams>, QueryRejection>,
) -> Result<Json<Vec<TransactionRecord>>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let params = query(params)?;
    let account = params
        .account
        .map(AccountId::new)
        .transpose()
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<TransactionKind>)
        .transpose()
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let q = TransactionQuery {
        account,
        phase: params.phase,
        kind,
        limit: effective_limit(params.limit),
    };

    let engine = Arc::clone(&state.engine);
    let rows = state
        .retry
        .run(move || engine.recent_transactions(&q))
        .await?;
    Ok(Json(rows))
}

/// Landing page statistics.
pub async fn stats<S>(State(state): AppState<S>) -> Result<Json<NetworkStats>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let engine = Arc::clone(&state.engine);
    let stats = state.retry.run(move || engine.network_stats()).await?;
    Ok(Json(stats))
}

// ── News and events ────────────────────────────────────────────────────

/// Published news, newest first.
pub async fn news<S>(
    State(state): AppState<S>,
    params: Result<Query<NewsParams>, QueryRejection>,
) -> Result<Json<Vec<NewsItem>>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let params = query(params)?;
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<NewsKind>)
        .transpose()
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let q = NewsQuery {
        kind,
        featured_only: params.featured,
        limit: effective_limit(params.limit),
    };

    let engine = Arc::clone(&state.engine);
    let items = state.retry.run(move || engine.news(&q)).await?;
    Ok(Json(items))
}

pub async fn news_item<S>(
    State(state): AppState<S>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<NewsDetail>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let id = news_id(path)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let detail = state
        .retry
        .run(move || {
            let item = engine.news_item(id)?;
            let registrations = if item.is_event() {
                engine.registration_count(id)?
            } else {
                0
            };
            Ok(NewsDetail {
                event_status: item.event_status(now),
                item,
                registrations,
            })
        })
        .await?;
    Ok(Json(detail))
}

pub async fn registration_status<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<RegistrationStatus>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let account = state.authenticate(&headers)?;
    let id = news_id(path)?;
    let engine = Arc::clone(&state.engine);
    let status = state
        .retry
        .run(move || engine.registration_status(id, &account))
        .await?;
    Ok(Json(status))
}

pub async fn register_for_event<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Result<(StatusCode, Json<EventRegistration>), RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let account = state.authenticate(&headers)?;
    let id = news_id(path)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let registration = state
        .run_write("event_register", move || {
            engine.register_for_event(id, &account, now)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn cancel_registration<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let account = state.authenticate(&headers)?;
    let id = news_id(path)?;
    let engine = Arc::clone(&state.engine);
    state
        .run_write("event_unregister", move || {
            engine.cancel_registration(id, &account)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Profile ────────────────────────────────────────────────────────────

/// The caller's profile, created empty on first visit.
pub async fn get_profile<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
) -> Result<Json<Profile>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let profile = state
        .retry
        .run(move || engine.ensure_profile(&owner, now))
        .await?;
    Ok(Json(profile))
}

pub async fn set_username<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    payload: Result<Json<UsernameRequest>, JsonRejection>,
) -> Result<Json<Profile>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let req = body(payload)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let profile = state
        .retry
        .run(move || engine.set_username(&owner, &req.username, now))
        .await?;
    Ok(Json(profile))
}

// ── Stakes ─────────────────────────────────────────────────────────────

pub async fn list_stakes<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    params: Result<Query<StakesParams>, QueryRejection>,
) -> Result<Json<Vec<StakeView>>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let kind = parse_kind(query(params)?.asset.as_deref())?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let stakes = state
        .retry
        .run(move || engine.stakes(&owner, kind, now))
        .await?;
    Ok(Json(stakes))
}

pub async fn get_stake<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<StakeView>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let id = stake_id(path)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let view = state
        .retry
        .run(move || engine.stake(id, &owner, now))
        .await?;
    Ok(Json(view))
}

pub async fn create_coin_stake<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    payload: Result<Json<AmountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StakeView>), RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let principal = parse_amount(&body(payload)?.amount)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let view = state
        .run_write("stake_coin", move || {
            engine.open_coin_stake(&owner, principal, now)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn create_nft_stake<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    payload: Result<Json<NftStakeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StakeView>), RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let req = body(payload)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let view = state
        .run_write("stake_nft", move || {
            engine.open_nft_stake(&owner, &req.nft_id, now)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn claim<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<ClaimReceipt>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let id = stake_id(path)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let result = state
        .run_write("claim", move || engine.claim(id, &owner, now))
        .await;
    if let (Err(RpcError::Staking(StakingError::NothingToClaim { .. })), Some(metrics)) =
        (&result, &state.metrics)
    {
        metrics.claims_rejected.inc();
    }
    Ok(Json(result?))
}

pub async fn portfolio<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
) -> Result<Json<Portfolio>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let portfolio = state
        .retry
        .run(move || engine.portfolio(&owner, now))
        .await?;
    Ok(Json(portfolio))
}

// ── Membership and faucet ──────────────────────────────────────────────

pub async fn purchase_membership<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    payload: Result<Json<MembershipRequest>, JsonRejection>,
) -> Result<Json<Profile>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let owner = state.authenticate(&headers)?;
    let tier: MembershipTier = body(payload)?
        .tier
        .parse()
        .map_err(|e: can_types::ParseError| RpcError::InvalidRequest(e.to_string()))?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let profile = state
        .run_write("membership", move || engine.purchase_tier(&owner, tier, now))
        .await?;
    Ok(Json(profile))
}

pub async fn faucet<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
    payload: Result<Json<AmountRequest>, JsonRejection>,
) -> Result<Json<Profile>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    if !state.faucet_enabled {
        return Err(RpcError::Disabled("faucet"));
    }
    let owner = state.authenticate(&headers)?;
    let amount = parse_amount(&body(payload)?.amount)?;
    let now = state.clock.now();
    let engine = Arc::clone(&state.engine);
    let profile = state
        .run_write("faucet", move || engine.deposit(&owner, amount, now))
        .await?;
    Ok(Json(profile))
}

// ── Session ────────────────────────────────────────────────────────────

pub async fn refresh_session<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let token = state.bearer_token(&headers)?;
    let session = state.sessions.refresh(&token, state.clock.now())?;
    Ok(Json(SessionResponse {
        account: session.account,
        expires_at: session.expires_at,
    }))
}

pub async fn sign_out<S>(
    State(state): AppState<S>,
    headers: HeaderMap,
) -> Result<StatusCode, RpcError>
where
    S: StakingLedger + Send + Sync + 'static,
{
    let token = state.bearer_token(&headers)?;
    // Resolving first rejects expired and unknown tokens the same way as any
    // other authenticated route.
    state.sessions.resolve(&token, state.clock.now())?;
    state.sessions.sign_out(&token);
    Ok(StatusCode::NO_CONTENT)
}
