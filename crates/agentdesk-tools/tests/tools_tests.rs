//! Tests for agentdesk-tools: ToolResult, ToolContext and ToolRegistry

use agentdesk_core::{Error, SessionKey, Slots};
use agentdesk_tools::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Counts how often the handler actually runs.
struct CountingTool {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str { self.name }
    fn description(&self) -> &str { "Counts calls" }
    fn is_read_only(&self) -> bool { true }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"drug_id": {"type": "string"}}, "required": ["drug_id"]})
    }
    async fn execute(&self, args: Value, _ctx: &mut ToolContext<'_>) -> ToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ToolResult::text(format!("reissued {}", args["drug_id"].as_str().unwrap_or("?")))
    }
}

struct FailingTool;

#[async_trait::async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str { "fail" }
    fn description(&self) -> &str { "Always fails" }
    fn input_schema(&self) -> Value { json!({"type": "object", "properties": {}}) }
    async fn execute(&self, _args: Value, _ctx: &mut ToolContext<'_>) -> ToolResult {
        ToolResult::error("database unavailable")
    }
}

struct SlowTool;

#[async_trait::async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str { "slow" }
    fn description(&self) -> &str { "Never finishes" }
    fn input_schema(&self) -> Value { json!({"type": "object", "properties": {}}) }
    async fn execute(&self, _args: Value, _ctx: &mut ToolContext<'_>) -> ToolResult {
        std::future::pending::<()>().await;
        ToolResult::text("unreachable")
    }
}

struct IdentifyTool;

#[async_trait::async_trait]
impl Tool for IdentifyTool {
    fn name(&self) -> &str { "identify" }
    fn description(&self) -> &str { "Stores the caller's name" }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]})
    }
    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let previous = ctx.slot_str("name").map(String::from);
        ctx.set_slot("name", args["name"].clone());
        ctx.clear_slot("stale");
        ToolResult::text(format!(
            "previous={} agent={}",
            previous.as_deref().unwrap_or("-"),
            ctx.agent()
        ))
    }
}

fn permitted(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn registry_with_counter() -> (ToolRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut reg = ToolRegistry::new();
    reg.register(CountingTool { name: "reissue_prescription", calls: calls.clone() }).unwrap();
    reg.register(FailingTool).unwrap();
    reg.register(SlowTool).unwrap();
    reg.register(IdentifyTool).unwrap();
    (reg, calls)
}

// ===========================================================================
// ToolResult
// ===========================================================================

#[test]
fn tool_result_text() {
    let r = ToolResult::text("hello");
    assert!(!r.is_error());
    assert_eq!(r.to_content_string(), "hello");
}

#[test]
fn tool_result_error() {
    let r = ToolResult::error("boom");
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "Error: boom");
}

// ===========================================================================
// ToolContext
// ===========================================================================

#[test]
fn tool_context_staged_writes_shadow_slots() {
    let key = SessionKey::new("s1");
    let mut slots = Slots::new();
    slots.insert("customer_id".into(), json!("7"));
    slots.insert("name".into(), json!("Ann"));
    let mut ctx = ToolContext::new(&key, "sales", &slots);

    assert_eq!(ctx.slot_str("customer_id"), Some("7"));
    ctx.set_slot("customer_id", "8");
    ctx.clear_slot("name");
    assert_eq!(ctx.slot_str("customer_id"), Some("8"));
    assert!(ctx.slot("name").is_none());

    let updates = ctx.into_updates();
    assert_eq!(updates["customer_id"], json!("8"));
    assert_eq!(updates["name"], Value::Null);
    // The session's own slots are untouched
    assert_eq!(slots["customer_id"], json!("7"));
}

// ===========================================================================
// ToolRegistry
// ===========================================================================

#[test]
fn registry_default_is_empty() {
    let reg = ToolRegistry::new();
    assert!(reg.list().is_empty());
    assert!(reg.definitions_for(&permitted(&["anything"])).is_empty());
}

#[test]
fn registry_rejects_duplicates() {
    let (mut reg, _) = registry_with_counter();
    let err = reg.register(FailingTool).unwrap_err();
    assert!(matches!(err, Error::DuplicateTool(ref n) if n == "fail"));
}

#[test]
fn registry_lists_sorted() {
    let (reg, _) = registry_with_counter();
    assert_eq!(reg.list(), vec!["fail", "identify", "reissue_prescription", "slow"]);
    assert_eq!(reg.list_read_only(), vec!["reissue_prescription"]);
}

#[test]
fn definitions_only_cover_permitted_tools() {
    let (reg, _) = registry_with_counter();
    let defs = reg.definitions_for(&permitted(&["reissue_prescription", "not_registered"]));
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name, "reissue_prescription");
    assert_eq!(defs[0].input_schema["required"][0], "drug_id");
}

#[tokio::test]
async fn invoke_unknown_tool() {
    let (reg, _) = registry_with_counter();
    let key = SessionKey::new("s1");
    let slots = Slots::new();
    let allowed = permitted(&["ghost"]);
    let call = Invocation { session: &key, agent: "support", permitted: &allowed, slots: &slots };
    let err = reg.invoke(&call, "ghost", json!({}), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::UnknownTool(ref n) if n == "ghost"));
}

#[tokio::test]
async fn invoke_not_permitted_never_reaches_handler() {
    let (reg, calls) = registry_with_counter();
    let key = SessionKey::new("s1");
    let slots = Slots::new();
    let allowed = permitted(&["fail"]);
    let call = Invocation { session: &key, agent: "billing", permitted: &allowed, slots: &slots };
    let err = reg
        .invoke(&call, "reissue_prescription", json!({"drug_id": "X"}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolNotPermitted { ref agent, ref tool } if agent == "billing" && tool == "reissue_prescription"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invoke_permitted_tool_succeeds() {
    let (reg, calls) = registry_with_counter();
    let key = SessionKey::new("s1");
    let slots = Slots::new();
    let allowed = permitted(&["reissue_prescription"]);
    let call = Invocation { session: &key, agent: "support", permitted: &allowed, slots: &slots };
    let outcome = reg
        .invoke(&call, "reissue_prescription", json!({"drug_id": "X"}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.result, ToolResult::text("reissued X"));
    assert!(outcome.slot_updates.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invoke_missing_required_argument() {
    let (reg, calls) = registry_with_counter();
    let key = SessionKey::new("s1");
    let slots = Slots::new();
    let allowed = permitted(&["reissue_prescription"]);
    let call = Invocation { session: &key, agent: "support", permitted: &allowed, slots: &slots };
    let err = reg
        .invoke(&call, "reissue_prescription", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolExecution { ref message, .. } if message.contains("drug_id")));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invoke_handler_failure_is_tool_execution_error() {
    let (reg, _) = registry_with_counter();
    let key = SessionKey::new("s1");
    let slots = Slots::new();
    let allowed = permitted(&["fail"]);
    let call = Invocation { session: &key, agent: "billing", permitted: &allowed, slots: &slots };
    let err = reg.invoke(&call, "fail", json!({}), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::ToolExecution { ref name, ref message } if name == "fail" && message == "database unavailable"));
}

#[tokio::test]
async fn invoke_returns_staged_slot_updates() {
    let (reg, _) = registry_with_counter();
    let key = SessionKey::new("s1");
    let mut slots = Slots::new();
    slots.insert("name".into(), json!("Old"));
    let allowed = permitted(&["identify"]);
    let call = Invocation { session: &key, agent: "triage", permitted: &allowed, slots: &slots };
    let outcome = reg
        .invoke(&call, "identify", json!({"name": "Ann"}), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.slot_updates["name"], json!("Ann"));
    assert_eq!(outcome.slot_updates["stale"], Value::Null);
    assert_eq!(outcome.result, ToolResult::text("previous=Old agent=triage"));
}

#[tokio::test]
async fn invoke_cancelled_mid_call() {
    let (reg, _) = registry_with_counter();
    let key = SessionKey::new("s1");
    let slots = Slots::new();
    let allowed = permitted(&["slow"]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let call = Invocation { session: &key, agent: "support", permitted: &allowed, slots: &slots };
    let err = reg.invoke(&call, "slow", json!({}), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
