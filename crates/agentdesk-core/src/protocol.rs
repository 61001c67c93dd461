//! WebSocket protocol - JSON-RPC style
//!
//! Wire format:
//!
//! Client → Server (RPC request):
//!   { "id": "req-1", "method": "chat.send", "params": { "message": "I need a refill" } }
//!
//! Server → Client (RPC response):
//!   { "id": "req-1", "result": { "reply": "...", "agent": "support", "status": "completed" } }
//!   { "id": "req-1", "error": { "code": -32000, "message": "Not authenticated" } }
//!
//! Server → Client (Event push, no id):
//!   { "event": "session", "data": { "session": "3f2a...", "agent": "triage" } }
//!   { "event": "handoff", "data": { "session": "3f2a...", "from": "triage", "to": "support" } }
//!
//! Authentication:
//!   { "token": "secret" }  (shorthand)
//!   { "id": "1", "method": "auth", "params": { "token": "secret" } }  (RPC style)

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// RPC request from client.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Unified incoming message. Serde tries RPC first, then Auth shorthand.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Rpc(RpcRequest),
    Auth { token: Option<String> },
}

// ---------------------------------------------------------------------------
// Server → Client: RPC response
// ---------------------------------------------------------------------------

/// RPC response to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn method_not_found(id: impl Into<String>, method: &str) -> Self {
        Self::err(id, -32601, format!("Method not found: {}", method))
    }

    pub fn invalid_params(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::err(id, -32602, message)
    }

    pub fn internal_error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::err(id, -32603, message)
    }

    pub fn auth_error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::err(id, -32000, message)
    }
}

/// RPC error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Server → Client: Event push
// ---------------------------------------------------------------------------

/// Server-pushed event (no id, no request correlation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: String,
    pub data: serde_json::Value,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Sent once on connect.
    pub fn info(version: &str, desk: &str) -> Self {
        Self::new(
            "info",
            serde_json::json!({ "version": version, "desk": desk }),
        )
    }

    /// Sent once the connection's session exists.
    pub fn session_opened(session: &str, agent: &str) -> Self {
        Self::new(
            "session",
            serde_json::json!({ "session": session, "agent": agent }),
        )
    }

    /// The caller was transferred during a turn.
    pub fn handoff(session: &str, from: &str, to: &str) -> Self {
        Self::new(
            "handoff",
            serde_json::json!({ "session": session, "from": from, "to": to }),
        )
    }

    pub fn auth_result(ok: bool, error: Option<&str>) -> Self {
        Self::new("auth", serde_json::json!({ "ok": ok, "error": error }))
    }

    pub fn pong() -> Self {
        Self::new("pong", serde_json::json!({}))
    }
}
