//! WebSocket connection handling
//!
//! One socket is one session: it is opened when the client connects and
//! closed, with any running turn cancelled, when the client goes away.
//! RPC calls run in their own tasks so a slow turn never blocks pings or
//! auth; their responses come back through a channel to the writer.

use crate::rpc::{self, ConnectionContext};
use crate::server::GatewayState;
use agentdesk_core::{EventMessage, IncomingMessage, RpcResponse};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn to_json<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

/// Handle a WebSocket connection.
pub async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let desk = state.sessions.desk().clone();
    if let Some(json) = to_json(&EventMessage::info(env!("CARGO_PKG_VERSION"), desk.name())) {
        let _ = ws_tx.send(WsMessage::Text(json)).await;
    }

    let session = match state.sessions.open_new() {
        Ok(key) => key,
        Err(e) => {
            warn!("Could not open session: {}", e);
            return;
        }
    };
    info!(session = %session, desk = desk.name(), "client connected");
    if let Some(json) = to_json(&EventMessage::session_opened(session.as_str(), desk.entry_agent())) {
        let _ = ws_tx.send(WsMessage::Text(json)).await;
    }

    let mut ctx = ConnectionContext {
        authenticated: !state.auth.is_required(),
        session: session.clone(),
        sessions: state.sessions.clone(),
    };
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(64);

    'conn: loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let responses = handle_text_message(&text, &state, &mut ctx, &reply_tx);
                        for response_json in responses {
                            if ws_tx.send(WsMessage::Text(response_json)).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(_))) => {
                        if let Some(json) = to_json(&EventMessage::pong()) {
                            let _ = ws_tx.send(WsMessage::Text(json)).await;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {} // Binary, Pong
                }
            }

            Some(response_json) = reply_rx.recv() => {
                if ws_tx.send(WsMessage::Text(response_json)).await.is_err() {
                    break;
                }
            }
        }
    }

    state.sessions.close(&session);
    info!(session = %session, "client disconnected");
}

/// Handle a text frame. Returns JSON strings to send back right away;
/// RPC results arrive later on `reply_tx`.
fn handle_text_message(
    text: &str,
    state: &Arc<GatewayState>,
    ctx: &mut ConnectionContext,
    reply_tx: &mpsc::Sender<String>,
) -> Vec<String> {
    let mut responses = Vec::new();

    match serde_json::from_str::<IncomingMessage>(text) {
        Ok(IncomingMessage::Rpc(req)) => {
            if req.method == "auth" {
                let token = req.params["token"].as_str();
                let resp = match state.auth.verify_token(token) {
                    Ok(()) => {
                        ctx.authenticated = true;
                        info!(session = %ctx.session, "Client authenticated (RPC)");
                        RpcResponse::ok(&req.id, serde_json::json!({ "ok": true }))
                    }
                    Err(e) => {
                        warn!("Auth failed: {}", e);
                        RpcResponse::auth_error(&req.id, e.to_string())
                    }
                };
                responses.extend(to_json(&resp));
                return responses;
            }

            let ctx = ctx.clone();
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let result = rpc::route_rpc(&req.method, req.params, &ctx).await;
                // The socket may be gone by now, so send failures are ignored
                if let Ok(handoff) = result.as_ref().map(|v| &v["handoff"]) {
                    if let (Some(from), Some(to)) = (handoff["from"].as_str(), handoff["to"].as_str()) {
                        let event = EventMessage::handoff(ctx.session.as_str(), from, to);
                        if let Some(json) = to_json(&event) {
                            let _ = reply_tx.send(json).await;
                        }
                    }
                }
                if let Some(json) = to_json(&rpc::to_response(&req.id, result)) {
                    let _ = reply_tx.send(json).await;
                }
            });
        }

        Ok(IncomingMessage::Auth { token }) => match state.auth.verify_token(token.as_deref()) {
            Ok(()) => {
                ctx.authenticated = true;
                responses.extend(to_json(&EventMessage::auth_result(true, None)));
                info!(session = %ctx.session, "Client authenticated (shorthand)");
            }
            Err(e) => {
                responses.extend(to_json(&EventMessage::auth_result(false, Some(&e.to_string()))));
                warn!("Auth failed: {}", e);
            }
        },

        Err(_) => {
            warn!("Unparseable message: {}", text.chars().take(100).collect::<String>());
            responses.extend(to_json(&RpcResponse::err("", -32700, "Parse error")));
        }
    }

    responses
}
