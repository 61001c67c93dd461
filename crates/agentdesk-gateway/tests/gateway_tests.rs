//! End-to-end tests: a real gateway on an ephemeral port, driven over
//! WebSocket with a scripted reasoner.

use agentdesk_agent::{Decision, RouterConfig, ScriptedReasoner};
use agentdesk_core::AuthMode;
use agentdesk_demos::medical::{self, ClinicStore};
use agentdesk_gateway::{app, GatewayState, ResolvedAuth};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_gateway(auth: ResolvedAuth, steps: Vec<Decision>) -> (SocketAddr, Arc<GatewayState>) {
    let desk = medical::desk(
        Arc::new(ClinicStore::new()),
        RouterConfig::default(),
        Arc::new(ScriptedReasoner::new(steps)),
    )
    .unwrap();
    let state = Arc::new(GatewayState::new(desk, auth));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

fn token_auth() -> ResolvedAuth {
    ResolvedAuth {
        mode: AuthMode::Token,
        token: Some("secret".into()),
    }
}

async fn next_json(ws: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut Socket, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Connect and consume the `info` and `session` events. Returns the session key.
async fn connect(addr: SocketAddr) -> (Socket, String) {
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let info = next_json(&mut ws).await;
    assert_eq!(info["event"], "info");
    assert_eq!(info["data"]["desk"], "medical");
    let session = next_json(&mut ws).await;
    assert_eq!(session["event"], "session");
    assert_eq!(session["data"]["agent"], "triage");
    let key = session["data"]["session"].as_str().unwrap().to_string();
    (ws, key)
}

async fn wait_for_sessions(state: &GatewayState, expected: usize) {
    for _ in 0..50 {
        if state.sessions.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} sessions, found {}", expected, state.sessions.len());
}

#[tokio::test]
async fn chat_requires_auth() {
    let (addr, _) = spawn_gateway(token_auth(), vec![]).await;
    let (mut ws, _) = connect(addr).await;

    send(&mut ws, json!({"id": "1", "method": "chat.send", "params": {"message": "hi"}})).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["id"], "1");
    assert_eq!(resp["error"]["code"], -32000);

    send(&mut ws, json!({"token": "wrong"})).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["event"], "auth");
    assert_eq!(resp["data"]["ok"], false);
}

#[tokio::test]
async fn routes_a_refill_to_support() {
    let (addr, state) = spawn_gateway(
        token_auth(),
        vec![
            Decision::handoff("support"),
            Decision::reply("Which prescription should I reissue?"),
        ],
    )
    .await;
    let (mut ws, key) = connect(addr).await;
    assert!(state.sessions.contains(&agentdesk_agent::SessionKey::new(&key)));

    send(&mut ws, json!({"id": "a", "method": "auth", "params": {"token": "secret"}})).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["result"]["ok"], true);

    send(&mut ws, json!({"id": "2", "method": "chat.send", "params": {"message": "I need a refill"}})).await;
    let event = next_json(&mut ws).await;
    assert_eq!(event["event"], "handoff");
    assert_eq!(event["data"]["from"], "triage");
    assert_eq!(event["data"]["to"], "support");

    let resp = next_json(&mut ws).await;
    assert_eq!(resp["id"], "2");
    assert_eq!(resp["result"]["agent"], "support");
    assert_eq!(resp["result"]["status"], "completed");
    assert_eq!(resp["result"]["reply"], "Which prescription should I reissue?");
    assert_eq!(resp["result"]["iterations"], 2);
    assert_eq!(resp["result"]["handoff"]["to"], "support");

    send(&mut ws, json!({"id": "3", "method": "session.info"})).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["result"]["session"], key.as_str());
    assert_eq!(resp["result"]["active_agent"], "support");
    assert_eq!(resp["result"]["previous_agent"], "triage");
}

#[tokio::test]
async fn no_auth_mode_and_protocol_errors() {
    let (addr, _) = spawn_gateway(ResolvedAuth::disabled(), vec![]).await;
    let (mut ws, _) = connect(addr).await;

    send(&mut ws, json!({"id": "p", "method": "ping"})).await;
    assert_eq!(next_json(&mut ws).await["result"]["pong"], true);

    send(&mut ws, json!({"id": "x", "method": "sessions.delete"})).await;
    assert_eq!(next_json(&mut ws).await["error"]["code"], -32601);

    send(&mut ws, json!({"id": "m", "method": "chat.send", "params": {}})).await;
    assert_eq!(next_json(&mut ws).await["error"]["code"], -32602);

    ws.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(next_json(&mut ws).await["error"]["code"], -32700);
}

#[tokio::test]
async fn reasoning_failure_is_a_fallback_reply() {
    let (addr, _) = spawn_gateway(ResolvedAuth::disabled(), vec![]).await;
    let (mut ws, _) = connect(addr).await;

    // Empty script: the reasoner has nothing to say
    send(&mut ws, json!({"id": "1", "method": "chat.send", "params": {"message": "hello"}})).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["result"]["status"], "fallback");
    assert_eq!(resp["result"]["reason"], "malformed_decision");
    assert_eq!(resp["result"]["agent"], "triage");
    assert!(resp["result"].get("handoff").is_none());
}

#[tokio::test]
async fn each_socket_gets_its_own_session() {
    let (addr, state) = spawn_gateway(ResolvedAuth::disabled(), vec![]).await;
    let (ws_a, key_a) = connect(addr).await;
    let (ws_b, key_b) = connect(addr).await;
    assert_ne!(key_a, key_b);
    wait_for_sessions(&state, 2).await;

    drop(ws_a);
    wait_for_sessions(&state, 1).await;
    assert!(state.sessions.contains(&agentdesk_agent::SessionKey::new(&key_b)));

    drop(ws_b);
    wait_for_sessions(&state, 0).await;
}

#[tokio::test]
async fn health_and_session_endpoints() {
    let (addr, _) = spawn_gateway(token_auth(), vec![]).await;
    let (_ws, key) = connect(addr).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["desk"], "medical");
    assert_eq!(health["sessions"], 1);
    assert_eq!(health["read_only_tools"], json!(["list_appointments", "lookup_balance"]));

    let url = format!("http://{}/sessions/{}", addr, key);
    let denied = client.get(&url).send().await.unwrap();
    assert_eq!(denied.status().as_u16(), 401);

    let snapshot: Value = client
        .get(&url)
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["active_agent"], "triage");

    let missing = client
        .get(format!("http://{}/sessions/nope", addr))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}
