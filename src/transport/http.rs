//! HTTP transport.
//!
//! JSON routes under `/api` map one-to-one onto [`MatchEngine`] operations.
//! Match notifications are streamed as Server-Sent Events on
//! `GET /api/topics/{topic}/sse`, one stream per broadcast topic.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::broadcast::ChannelBroadcaster;
use crate::error::{ErrorKind, GameError, TransportError};
use crate::game::{MatchEngine, MatchId, Player};
use crate::sign::Sign;

/// Header carrying the caller's player id (UUID).
pub const PLAYER_ID_HEADER: &str = "x-player-id";
/// Optional display name header.
pub const PLAYER_NAME_HEADER: &str = "x-player-name";
/// Optional avatar URL header.
pub const PLAYER_IMAGE_HEADER: &str = "x-player-image";

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state for the axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
    /// Same broadcaster the engine publishes to; handlers subscribe here.
    pub topics: Arc<ChannelBroadcaster>,
}

// ============================================================================
// Server
// ============================================================================

/// A running HTTP server.
#[derive(Debug)]
pub struct HttpServer {
    local_addr: SocketAddr,
    handle: JoinHandle<Result<(), TransportError>>,
}

impl HttpServer {
    /// Binds `bind_addr` and starts serving in a background task until
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the listener cannot bind.
    pub async fn bind(
        bind_addr: &str,
        state: AppState,
        cancel: CancellationToken,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| TransportError::Bind(format!("{bind_addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind(format!("local_addr failed: {e}")))?;

        spawn_pruner(Arc::clone(&state.topics), cancel.clone());

        let router = build_router(state);
        let handle = tokio::spawn(async move {
            info!(%local_addr, "HTTP server started");
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await?;
            debug!("HTTP server shut down");
            Ok::<(), TransportError>(())
        });

        Ok(Self { local_addr, handle })
    }

    /// The address actually bound (useful with port 0).
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Serve`] if the server loop failed or panicked.
    pub async fn wait(self) -> Result<(), TransportError> {
        self.handle
            .await
            .map_err(|e| TransportError::Serve(std::io::Error::other(e)))?
    }
}

/// Periodically drops broadcast topics nobody is subscribed to.
fn spawn_pruner(topics: Arc<ChannelBroadcaster>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => topics.prune(),
            }
        }
    });
}

// ============================================================================
// Axum Router
// ============================================================================

/// Builds the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handle_health))
        .route("/api/signs", get(handle_signs))
        .route("/api/matches", post(handle_create))
        .route("/api/matches/code/{public_id}", get(handle_lookup))
        .route("/api/matches/{id}", get(handle_get))
        .route("/api/matches/{id}/players", get(handle_players))
        .route("/api/matches/{id}/join", post(handle_join))
        .route("/api/matches/{id}/ready", post(handle_ready))
        .route("/api/matches/{id}/not-ready", post(handle_not_ready))
        .route("/api/matches/{id}/pick", post(handle_pick))
        .route("/api/matches/{id}/next-round", post(handle_next_round))
        .route("/api/matches/{id}/leave", post(handle_leave))
        .route("/api/matches/{id}/end", post(handle_end))
        .route("/api/topics/{topic}/sse", get(handle_sse))
        .with_state(state)
}

type ApiResult<T> = Result<T, ApiError>;

async fn handle_health(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let active = state.engine.active_match_count().await?;
    Ok(Json(json!({ "status": "ok", "activeMatches": active })))
}

/// One entry of the sign ring listing.
#[derive(Debug, Serialize)]
pub struct SignInfo {
    pub name: Sign,
    pub position: usize,
    pub beats: Vec<Sign>,
}

/// The full ring with each sign's beats set.
#[must_use]
pub fn sign_listing() -> Vec<SignInfo> {
    Sign::ALL
        .iter()
        .map(|&sign| SignInfo {
            name: sign,
            position: sign.position(),
            beats: sign.beats(),
        })
        .collect()
}

async fn handle_signs() -> Json<Vec<SignInfo>> {
    Json(sign_listing())
}

async fn handle_create(
    State(state): State<AppState>,
    Identity(player): Identity,
) -> ApiResult<impl IntoResponse> {
    let host = player.id;
    state.engine.register_player(player).await?;
    let created = state.engine.create_match(host).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn handle_lookup(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let match_id = state.engine.match_id_by_public_id(&public_id).await?;
    Ok(Json(json!({ "matchId": match_id })))
}

async fn handle_get(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.get_match(id).await?))
}

async fn handle_players(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.players_by_match_id(id).await?))
}

async fn handle_join(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
) -> ApiResult<StatusCode> {
    let player_id = player.id;
    state.engine.register_player(player).await?;
    state.engine.join_match(id, player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_ready(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
) -> ApiResult<Json<serde_json::Value>> {
    let phase = state.engine.set_ready(id, player.id).await?;
    Ok(Json(json!({ "phase": phase })))
}

async fn handle_not_ready(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
) -> ApiResult<Json<serde_json::Value>> {
    let phase = state.engine.set_not_ready(id, player.id).await?;
    Ok(Json(json!({ "phase": phase })))
}

#[derive(Debug, Deserialize)]
struct PickBody {
    sign: String,
}

async fn handle_pick(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
    ApiJson(body): ApiJson<PickBody>,
) -> ApiResult<impl IntoResponse> {
    let sign: Sign = body.sign.parse()?;
    Ok(Json(state.engine.submit_pick(id, player.id, sign).await?))
}

async fn handle_next_round(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
) -> ApiResult<Json<serde_json::Value>> {
    let advanced = state.engine.next_round(id, player.id).await?;
    Ok(Json(json!({ "advanced": advanced })))
}

async fn handle_leave(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
) -> ApiResult<StatusCode> {
    state.engine.leave_match(id, player.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_end(
    State(state): State<AppState>,
    MatchPath(id): MatchPath,
    Identity(player): Identity,
) -> ApiResult<StatusCode> {
    state.engine.end_match(id, player.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/topics/{topic}/sse` handler.
///
/// Each broadcast message becomes one SSE event named after the match event.
/// Messages missed by a lagging subscriber are skipped.
async fn handle_sse(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    debug!(%topic, "SSE subscriber connected");
    let rx = state.topics.subscribe(&topic);
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let message = result.ok()?;
        SseEvent::default()
            .event(message.event)
            .json_data(message.payload)
            .ok()
            .map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Identity
// ============================================================================

/// Caller identity taken from the `x-player-*` headers.
#[derive(Debug, Clone)]
pub struct Identity(pub Player);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = header_text(&parts.headers, PLAYER_ID_HEADER)
            .ok_or_else(|| GameError::InvalidPlayerId(format!("missing {PLAYER_ID_HEADER}")))?;
        let id = Uuid::parse_str(&raw).map_err(|_| GameError::InvalidPlayerId(raw.clone()))?;
        Ok(Self(Player {
            id,
            name: header_text(&parts.headers, PLAYER_NAME_HEADER),
            image: header_text(&parts.headers, PLAYER_IMAGE_HEADER),
        }))
    }
}

/// Match id path segment; a malformed id is a JSON validation error.
#[derive(Debug, Clone, Copy)]
pub struct MatchPath(pub MatchId);

impl<S: Send + Sync> FromRequestParts<S> for MatchPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<MatchId>::from_request_parts(parts, state).await?;
        Ok(Self(id))
    }
}

/// JSON request body; parse failures are reported like every other error.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

// ============================================================================
// Errors
// ============================================================================

/// JSON error response: `{ "error": message, "kind": kind }`.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    /// HTTP status for this error's kind.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StateConflict => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message, "kind": self.kind }));
        (self.status(), body).into_response()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses a bind address string into a full `host:port` form.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`TransportError::Bind`] if the result is not a socket address.
pub fn parse_bind_addr(input: &str) -> Result<String, TransportError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|e| TransportError::Bind(format!("invalid bind address \"{input}\": {e}")))?;
    Ok(addr)
}

// ============================================================================
// Tests
// ============================================================================
