//! Event dispatcher for the browser automation runtime.
//!
//! The guard check happens when the capability request is built, not at
//! execution time: an approval is the orchestrator's final word. A target
//! outside the allowlist is not silently dropped, it goes out at the
//! highest risk tier with the reason annotated, so the orchestrator (or a
//! human behind it) makes the call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::dispatch::Dispatcher;
use crate::error::{PluginError, PluginResult};
use crate::guard::DomainGuard;
use crate::protocol::{
    EventEnvelope, PluginDirective, RiskTier, EVENT_ACTION_APPROVED, EVENT_TASK_RECEIVED,
};
use crate::risk::classify;
use crate::session::SessionManager;

use super::engine::{BrowserEngine, EngineSessionFactory};

pub const CAP_OBSERVE: &str = "browser.observe";
pub const CAP_ACT: &str = "browser.act";
pub const CAP_EXTRACT: &str = "browser.extract";

/// Browser task types map one-to-one onto capabilities of the same name.
fn task_capability(task_type: &str) -> Option<&'static str> {
    match task_type {
        "browser.observe" => Some(CAP_OBSERVE),
        "browser.act" => Some(CAP_ACT),
        "browser.extract" => Some(CAP_EXTRACT),
        _ => None,
    }
}

/// Browser automation dispatcher over a pluggable engine.
pub struct BrowserDispatcher<E: BrowserEngine> {
    engine: Arc<E>,
    sessions: SessionManager<EngineSessionFactory<E>>,
    guard: DomainGuard,
    project: String,
}

impl<E: BrowserEngine> BrowserDispatcher<E> {
    pub fn new(
        engine: Arc<E>,
        guard: DomainGuard,
        idle_timeout: Duration,
        project: String,
    ) -> Self {
        let sessions = SessionManager::new(
            EngineSessionFactory::new(Arc::clone(&engine)),
            idle_timeout,
        );
        Self {
            engine,
            sessions,
            guard,
            project,
        }
    }

    /// The event's project, falling back to the configured default.
    fn project_of(&self, event: &EventEnvelope) -> String {
        event
            .project
            .clone()
            .unwrap_or_else(|| self.project.clone())
    }

    fn on_task(&self, event: &EventEnvelope) -> Vec<PluginDirective> {
        let Some(task_type) = event.payload_str("task_type") else {
            tracing::debug!(event_id = %event.event_id, "task event without task_type");
            return vec![PluginDirective::Noop];
        };
        let Some(capability) = task_capability(task_type) else {
            tracing::info!(task_type, "unknown task type");
            return vec![PluginDirective::Noop];
        };

        // A missing target rides the same escalation path as a rejected
        // one: the guard cannot vouch for it, so the orchestrator decides.
        let url = event.payload_str("url").unwrap_or_default();
        let mut risk_tier = classify(capability);
        let mut reason = format!("scheduled task {task_type} against {url}");
        if !self.guard.is_allowed(url) {
            risk_tier = RiskTier::Destructive;
            reason = format!(
                "domain policy violation: '{url}' is outside the allowlist ({task_type})"
            );
            tracing::warn!(url, task_type, "target outside domain allowlist, escalating");
        }

        vec![PluginDirective::request_capability(
            capability,
            Some(self.project_of(event)),
            reason,
            event.payload.clone(),
            risk_tier,
        )]
    }

    async fn on_approved(&self, event: &EventEnvelope) -> Vec<PluginDirective> {
        let Some(capability) = event.approved_capability() else {
            tracing::warn!(event_id = %event.event_id, "approval without capability id");
            return vec![PluginDirective::Noop];
        };
        let input = event.approved_input();
        let project = Some(self.project_of(event));

        let outcome = match capability {
            CAP_OBSERVE | CAP_ACT | CAP_EXTRACT => self.execute(capability, &input).await,
            other => {
                tracing::debug!(capability = other, "ignoring approval for unknown capability");
                return vec![PluginDirective::Noop];
            }
        };

        let url = input.get("url").and_then(Value::as_str).unwrap_or_default();
        match outcome {
            Ok(result) => vec![PluginDirective::enqueue_task(
                "browser.action.result",
                project,
                Some(format!("{capability} completed")),
                json!({
                    "capability": capability,
                    "url": url,
                    "status": "executed",
                    "result": result,
                }),
            )],
            Err(err) => {
                tracing::warn!(capability, url, error = %err, "capability execution failed");
                vec![PluginDirective::enqueue_task(
                    "browser.action.result",
                    project,
                    Some(format!("{capability} failed")),
                    json!({
                        "capability": capability,
                        "url": url,
                        "status": "failed",
                        "detail": err.to_string(),
                    }),
                )]
            }
        }
    }

    async fn execute(&self, capability: &str, input: &Value) -> PluginResult<Value> {
        let url = input
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| PluginError::Protocol("approval input missing 'url'".to_string()))?;

        let session = self.sessions.acquire().await?;
        match capability {
            CAP_ACT => {
                let instruction = input
                    .get("instruction")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                self.engine.act(&session, url, instruction).await
            }
            CAP_EXTRACT => {
                let query = input.get("query").and_then(Value::as_str).unwrap_or_default();
                self.engine.extract(&session, url, query).await
            }
            _ => self.engine.observe(&session, url).await,
        }
    }
}

#[async_trait]
impl<E: BrowserEngine> Dispatcher for BrowserDispatcher<E> {
    async fn handle_event(&mut self, event: &EventEnvelope) -> Vec<PluginDirective> {
        match event.event_type.as_str() {
            EVENT_TASK_RECEIVED => self.on_task(event),
            EVENT_ACTION_APPROVED => self.on_approved(event).await,
            other => {
                tracing::debug!(event_type = other, "unhandled event type");
                vec![PluginDirective::Noop]
            }
        }
    }

    async fn shutdown(&mut self) {
        self.sessions.release().await;
    }
}
