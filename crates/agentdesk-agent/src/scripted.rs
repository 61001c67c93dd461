//! Deterministic reasoner that replays queued decisions.
//!
//! Scripts can be queued per session so concurrent sessions sharing one
//! desk stay independent.

use crate::reasoner::{Decision, Reasoner, ReasoningRequest};
use agentdesk_core::{Error, Result, SessionKey};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ScriptStep {
    Decide(Decision),
    /// Reasoning failure (`Error::Reasoning`).
    Fail(String),
    /// Unusable output (`Error::MalformedDecision`).
    Malformed(String),
    /// Never answers; only cancellation ends the call.
    Hang,
}

impl From<Decision> for ScriptStep {
    fn from(d: Decision) -> Self {
        Self::Decide(d)
    }
}

#[derive(Default)]
pub struct ScriptedReasoner {
    shared: Mutex<VecDeque<ScriptStep>>,
    per_session: Mutex<HashMap<SessionKey, VecDeque<ScriptStep>>>,
    repeat: Option<ScriptStep>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        Self {
            shared: Mutex::new(steps.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Answers every call with the same step.
    pub fn repeating(step: impl Into<ScriptStep>) -> Self {
        Self {
            repeat: Some(step.into()),
            ..Default::default()
        }
    }

    pub async fn push(&self, step: impl Into<ScriptStep>) {
        self.shared.lock().await.push_back(step.into());
    }

    /// Queue steps consumed only by `session`. They take precedence over the
    /// shared queue.
    pub async fn script_for<I, S>(&self, session: &SessionKey, steps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        self.per_session
            .lock()
            .await
            .entry(session.clone())
            .or_default()
            .extend(steps.into_iter().map(Into::into));
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_step(&self, session: &SessionKey) -> Option<ScriptStep> {
        if let Some(step) = self
            .per_session
            .lock()
            .await
            .get_mut(session)
            .and_then(|queue| queue.pop_front())
        {
            return Some(step);
        }
        if let Some(step) = self.shared.lock().await.pop_front() {
            return Some(step);
        }
        self.repeat.clone()
    }
}

#[async_trait::async_trait]
impl Reasoner for ScriptedReasoner {
    async fn decide(&self, request: ReasoningRequest, cancel: &CancellationToken) -> Result<Decision> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let session = request.session.clone();
        self.requests.lock().await.push(request);

        match self.next_step(&session).await {
            Some(ScriptStep::Decide(decision)) => Ok(decision),
            Some(ScriptStep::Fail(message)) => Err(Error::Reasoning(message)),
            Some(ScriptStep::Malformed(message)) => Err(Error::MalformedDecision(message)),
            Some(ScriptStep::Hang) => {
                cancel.cancelled().await;
                Err(Error::Cancelled)
            }
            None => Err(Error::MalformedDecision("script exhausted".into())),
        }
    }
}
