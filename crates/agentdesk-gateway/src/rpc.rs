//! RPC router - dispatches JSON-RPC method calls to handlers
//!
//! A connection owns exactly one session, so no method takes a session
//! parameter; the key comes from the connection context.

use agentdesk_agent::{SessionKey, SessionRegistry, TurnReply, TurnStatus};
use agentdesk_core::{Error, RpcResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Connection context passed to RPC handlers.
#[derive(Clone)]
pub struct ConnectionContext {
    pub authenticated: bool,
    pub session: SessionKey,
    pub sessions: Arc<SessionRegistry>,
}

/// Result type for RPC handlers.
pub type RpcResult = Result<Value, (i32, String)>;

/// Route an RPC method call to the appropriate handler.
pub async fn route_rpc(method: &str, params: Value, ctx: &ConnectionContext) -> RpcResult {
    if !ctx.authenticated {
        return Err((-32000, "Not authenticated".to_string()));
    }

    match method {
        "chat.send" => handle_chat_send(params, ctx).await,
        "session.info" => handle_session_info(ctx).await,
        "ping" => Ok(json!({ "pong": true })),
        _ => Err((-32601, format!("Method not found: {}", method))),
    }
}

/// Convert an RPC result to an RpcResponse.
pub fn to_response(id: &str, result: RpcResult) -> RpcResponse {
    match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err((code, message)) => RpcResponse::err(id, code, message),
    }
}

fn error_code(error: &Error) -> i32 {
    match error {
        Error::SessionNotFound(_) => -32001,
        Error::Cancelled => -32002,
        _ => -32603,
    }
}

/// Wire shape of a finished turn.
pub fn turn_result(reply: &TurnReply) -> Value {
    let (status, reason) = match reply.status {
        TurnStatus::Completed => ("completed", None),
        TurnStatus::Fallback(reason) => ("fallback", Some(reason.as_str())),
    };
    let mut value = json!({
        "reply": reply.text,
        "agent": reply.agent,
        "status": status,
        "iterations": reply.iterations,
    });
    if let Some(reason) = reason {
        value["reason"] = Value::String(reason.to_string());
    }
    if let Some((from, to)) = reply.handoff() {
        value["handoff"] = json!({ "from": from, "to": to });
    }
    value
}

// ---------------------------------------------------------------------------
// chat.send - run one user turn
// ---------------------------------------------------------------------------

async fn handle_chat_send(params: Value, ctx: &ConnectionContext) -> RpcResult {
    let message = params["message"]
        .as_str()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| (-32602, "Missing required param: message".to_string()))?;

    info!(
        session = %ctx.session,
        "chat.send: {}",
        message.chars().take(50).collect::<String>()
    );

    let reply = ctx
        .sessions
        .turn(&ctx.session, message)
        .await
        .map_err(|e| (error_code(&e), e.to_string()))?;

    Ok(turn_result(&reply))
}

// ---------------------------------------------------------------------------
// session.info - active agent, slots and history of this connection
// ---------------------------------------------------------------------------

async fn handle_session_info(ctx: &ConnectionContext) -> RpcResult {
    let snapshot = ctx
        .sessions
        .snapshot(&ctx.session)
        .await
        .map_err(|e| (error_code(&e), e.to_string()))?;
    serde_json::to_value(snapshot).map_err(|e| (-32603, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdesk_agent::FallbackReason;

    #[test]
    fn fallback_turns_carry_a_reason() {
        let reply = TurnReply {
            text: "sorry".into(),
            agent: "billing".into(),
            started_with: "billing".into(),
            status: TurnStatus::Fallback(FallbackReason::ToolNotPermitted),
            iterations: 2,
        };
        let value = turn_result(&reply);
        assert_eq!(value["status"], "fallback");
        assert_eq!(value["reason"], "tool_not_permitted");
        assert_eq!(value["iterations"], 2);
    }

    #[test]
    fn completed_turns_have_no_reason() {
        let reply = TurnReply {
            text: "done".into(),
            agent: "triage".into(),
            started_with: "triage".into(),
            status: TurnStatus::Completed,
            iterations: 1,
        };
        let value = turn_result(&reply);
        assert_eq!(value["status"], "completed");
        assert!(value.get("reason").is_none());
        assert!(value.get("handoff").is_none());
    }

    #[test]
    fn handoff_is_reported_from_the_turn_itself() {
        let reply = TurnReply {
            text: "Which prescription?".into(),
            agent: "support".into(),
            started_with: "triage".into(),
            status: TurnStatus::Completed,
            iterations: 2,
        };
        let value = turn_result(&reply);
        assert_eq!(value["handoff"]["from"], "triage");
        assert_eq!(value["handoff"]["to"], "support");
    }

    #[test]
    fn error_codes() {
        assert_eq!(error_code(&Error::Cancelled), -32002);
        assert_eq!(error_code(&Error::SessionNotFound("x".into())), -32001);
        assert_eq!(error_code(&Error::Reasoning("down".into())), -32603);
    }
}
