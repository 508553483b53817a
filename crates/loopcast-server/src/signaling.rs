//! Signaling boundary.
//!
//! POST /offer    : bearer-authenticated SDP offer in, SDP answer out
//! GET  /health   : liveness plus active session count
//! GET  /sessions : active sessions and their states
//!
//! [`serve`] binds the `[signaling]` listen address; [`app`] and [`router`]
//! are for embedding. The WebRTC stack itself is an external [`Transport`]. This module only
//! checks the request, opens the media sources, hands the offer over, and
//! starts a session on the sinks the transport returns.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use loopcast_media::SampleSink;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::SignalingConfig;
use crate::session::{SessionCoordinator, SessionSinks, SessionState};

// ── Transport seam ──────────────────────────────────────────────────

/// `{"type": "offer", "sdp": "..."}`, the browser's RTCSessionDescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

#[derive(Debug, Error)]
#[error("transport negotiation failed: {0}")]
pub struct TransportError(pub String);

/// What a transport hands back for an accepted offer.
pub struct Negotiated {
    /// Local description, returned once candidate gathering is complete.
    pub answer: SessionDescription,
    pub audio: Arc<dyn SampleSink>,
    pub video: Arc<dyn SampleSink>,
    /// Fires (or is dropped) when the peer connection reaches "closed".
    pub closed: oneshot::Receiver<()>,
}

/// External real-time transport.
pub trait Transport: Send + Sync + 'static {
    /// Create a peer connection for `offer` with exactly one audio track, one
    /// video track and one data channel, and complete the offer/answer
    /// exchange.
    fn negotiate(
        &self,
        offer: SessionDescription,
    ) -> impl Future<Output = Result<Negotiated, TransportError>> + Send;
}

// ── State ───────────────────────────────────────────────────────────

/// State shared by the signaling handlers.
pub struct SignalingState<T> {
    coordinator: SessionCoordinator,
    transport: Arc<T>,
    bearer_token: Arc<str>,
    sessions: Arc<DashMap<u64, watch::Receiver<SessionState>>>,
}

impl<T> Clone for SignalingState<T> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            transport: self.transport.clone(),
            bearer_token: self.bearer_token.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

impl<T: Transport> SignalingState<T> {
    pub fn new(coordinator: SessionCoordinator, transport: T, bearer_token: impl Into<Arc<str>>) -> Self {
        Self {
            coordinator,
            transport: Arc::new(transport),
            bearer_token: bearer_token.into(),
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Sessions currently registered (started and not yet torn down).
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// Build the signaling router. `static_dir`, when set, is served at `/`.
pub fn router<T: Transport>(state: SignalingState<T>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let mut app = Router::new()
        .route("/offer", post(offer::<T>))
        .route("/health", get(health::<T>))
        .route("/sessions", get(sessions::<T>))
        .with_state(state);
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.layer(TraceLayer::new_for_http()).layer(cors)
}

// ── Serving ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("signaling.bearer_token must be set to accept offers")]
    MissingToken,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("signaling server failed: {0}")]
    Serve(#[source] io::Error),
}

/// Router and shared state built from the `[signaling]` table. Fails if no
/// bearer token is configured.
pub fn app<T: Transport>(
    config: &SignalingConfig,
    coordinator: SessionCoordinator,
    transport: T,
) -> Result<(Router, SignalingState<T>), ServeError> {
    let token = config
        .bearer_token
        .as_deref()
        .ok_or(ServeError::MissingToken)?;
    let state = SignalingState::new(coordinator, transport, token);
    let routes = router(state.clone(), config.static_dir.as_deref());
    Ok((routes, state))
}

/// Bind `config.listen` and serve offers until `shutdown` resolves.
pub async fn serve<T, F>(
    config: &SignalingConfig,
    coordinator: SessionCoordinator,
    transport: T,
    shutdown: F,
) -> Result<(), ServeError>
where
    T: Transport,
    F: Future<Output = ()> + Send + 'static,
{
    let (service, _state) = app(config, coordinator, transport)?;
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.listen,
            source,
        })?;
    let local = listener.local_addr().map_err(ServeError::Serve)?;

    tracing::info!(addr = %local, "signaling listening");
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve)
}

// ── Handlers ────────────────────────────────────────────────────────

async fn offer<T: Transport>(
    State(state): State<SignalingState<T>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionDescription>, ApiError> {
    authorize(&headers, &state.bearer_token)?;

    let offer: SessionDescription = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid offer: {e}")))?;
    if offer.kind != SdpType::Offer {
        return Err(ApiError::bad_request("invalid offer: type must be \"offer\""));
    }

    let sources = state.coordinator.open_sources().map_err(|e| {
        tracing::error!(error = %e, "media sources unavailable");
        ApiError::internal(e.to_string())
    })?;

    let negotiated = state.transport.negotiate(offer).await.map_err(|e| {
        tracing::error!(error = %e, "offer rejected by transport");
        ApiError::internal(e.to_string())
    })?;

    let closed = negotiated.closed;
    let handle = state.coordinator.start(
        sources,
        SessionSinks {
            audio: negotiated.audio,
            video: negotiated.video,
        },
        async move {
            let _ = closed.await;
        },
    );

    let session_id = handle.id();
    state.sessions.insert(session_id, handle.watch_state());
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        match handle.wait().await {
            Ok(report) => report.log(),
            Err(e) => tracing::error!(session_id, error = %e, "session teardown failed"),
        }
        sessions.remove(&session_id);
    });

    Ok(Json(negotiated.answer))
}

async fn health<T: Transport>(State(state): State<SignalingState<T>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "active_sessions": state.active_sessions(),
    }))
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    id: u64,
    state: SessionState,
}

async fn sessions<T: Transport>(
    State(state): State<SignalingState<T>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    authorize(&headers, &state.bearer_token)?;

    let mut list: Vec<SessionSummary> = state
        .sessions
        .iter()
        .map(|entry| SessionSummary {
            id: *entry.key(),
            state: *entry.value().borrow(),
        })
        .collect();
    list.sort_by_key(|s| s.id);
    Ok(Json(list))
}

/// Exact match of `Authorization: Bearer <token>`.
fn authorize(headers: &HeaderMap, token: &str) -> Result<(), ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(p) if p == token => Ok(()),
        _ => Err(ApiError::unauthorized("unauthorized")),
    }
}

// ── Error type ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
