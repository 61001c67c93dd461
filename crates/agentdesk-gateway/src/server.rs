//! Gateway server: WebSocket sessions plus health and session inspection

use crate::auth::ResolvedAuth;
use crate::ws::handle_connection;
use agentdesk_agent::{Desk, SessionKey, SessionRegistry};
use agentdesk_core::GatewayConfig;
use axum::{
    extract::{Path as AxumPath, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for every connection of one gateway.
pub struct GatewayState {
    pub auth: ResolvedAuth,
    pub sessions: Arc<SessionRegistry>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(desk: Desk, auth: ResolvedAuth) -> Self {
        Self {
            auth,
            sessions: Arc::new(SessionRegistry::new(Arc::new(desk))),
            started_at: Instant::now(),
        }
    }
}

/// The gateway's HTTP surface, without binding a socket.
pub fn app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/sessions/:key", get(session_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

pub async fn start_gateway(desk: Desk, config: &GatewayConfig) -> anyhow::Result<()> {
    let auth = ResolvedAuth::from_config(&config.auth);
    if auth.is_required() && auth.token.is_none() {
        anyhow::bail!("token auth is enabled but no token is configured (use --token or --no-auth)");
    }

    let desk_name = desk.name().to_string();
    let entry = desk.entry_agent().to_string();
    let agents = desk.agents().list().join(", ");
    let state = Arc::new(GatewayState::new(desk, auth));

    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;

    info!("Agentdesk Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Desk:      {} (entry: {})", desk_name, entry);
    info!("  Agents:    {}", agents);
    info!("  Listening on: {}", bind_addr);
    info!("  WebSocket: ws://{}/ws", bind_addr);
    info!("  Sessions:  http://{}/sessions/{{key}}", bind_addr);
    info!("  Auth mode: {:?}", config.auth.mode);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let desk = state.sessions.desk();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "desk": desk.name(),
        "entry_agent": desk.entry_agent(),
        "agents": desk.agents().list(),
        "tools": desk.tools().list(),
        "read_only_tools": desk.tools().list_read_only(),
        "sessions": state.sessions.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// Dump one live session. Guarded by the gateway token as a bearer header.
async fn session_handler(
    AxumPath(key): AxumPath<String>,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = state.auth.verify_bearer(bearer) {
        return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
    }

    match state.sessions.snapshot(&SessionKey::new(&key)).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            format!("Session '{}' not found", key),
        )
            .into_response(),
    }
}
