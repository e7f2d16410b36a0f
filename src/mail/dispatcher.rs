//! Event dispatcher for the mail triage runtime.
//!
//! Per logical request the dispatcher moves from idle through awaiting
//! authorization and executing, then back to idle: a `task.received` event
//! produces a capability request;
//! the matching `action.approved` event executes it. The composite triage
//! task is special: its approval covers one inbox scan, inside which label
//! and archive run directly while trash review and reply drafting go back
//! out as fresh capability requests.

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::config::SCAN_LIMIT;
use crate::dispatch::Dispatcher;
use crate::error::{PluginError, PluginResult};
use crate::protocol::{
    EventEnvelope, PluginDirective, EVENT_ACTION_APPROVED, EVENT_TASK_RECEIVED,
};
use crate::risk::classify;
use crate::rules::{evaluate, RuleAction, RuleSet};

use super::provider::{normalize, MailDraft, MailProvider};

pub const CAP_INBOX_LIST: &str = "mail.inbox.list";
pub const CAP_SEND: &str = "mail.send";
pub const CAP_LABEL: &str = "mail.label";
pub const CAP_ARCHIVE: &str = "mail.archive";
pub const CAP_TRASH: &str = "mail.trash";
pub const CAP_DELETE_PERMANENT: &str = "mail.delete.permanent";
pub const CAP_UNSUBSCRIBE: &str = "mail.unsubscribe";
pub const CAP_DRAFT_REPLY: &str = "mail.draft.reply";

/// Capability requested for each known task type. Unknown types get a `noop`.
static TASK_CAPABILITIES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("mail.triage", CAP_INBOX_LIST),
        ("mail.send", CAP_SEND),
        ("mail.label", CAP_LABEL),
        ("mail.archive", CAP_ARCHIVE),
        ("mail.trash", CAP_TRASH),
        ("mail.purge", CAP_DELETE_PERMANENT),
        ("mail.unsubscribe", CAP_UNSUBSCRIBE),
        ("mail.draft_reply", CAP_DRAFT_REPLY),
    ])
});

#[derive(Clone, Copy, Debug, Default)]
struct ScanCounts {
    scanned: u64,
    labeled: u64,
    archived: u64,
    escalated: u64,
    failed: u64,
}

/// Mail triage dispatcher over a pluggable provider.
pub struct MailDispatcher<P: MailProvider> {
    provider: P,
    rules: RuleSet,
    checkpoint: CheckpointStore,
    account: String,
    project: String,
}

impl<P: MailProvider> MailDispatcher<P> {
    pub fn new(
        provider: P,
        rules: RuleSet,
        checkpoint: CheckpointStore,
        account: String,
        project: String,
    ) -> Self {
        Self {
            provider,
            rules,
            checkpoint,
            account,
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
        let Some(&capability) = TASK_CAPABILITIES.get(task_type) else {
            tracing::info!(task_type, "unknown task type");
            return vec![PluginDirective::Noop];
        };

        let project = Some(self.project_of(event));
        let (reason, input) = if capability == CAP_INBOX_LIST {
            (
                "scheduled inbox triage scan".to_string(),
                json!({ "incremental": true, "account": self.account }),
            )
        } else {
            (format!("scheduled task {task_type}"), event.payload.clone())
        };

        vec![PluginDirective::request_capability(
            capability,
            project,
            reason,
            input,
            classify(capability),
        )]
    }

    async fn on_approved(&self, event: &EventEnvelope) -> Vec<PluginDirective> {
        let Some(capability) = event.approved_capability() else {
            tracing::warn!(event_id = %event.event_id, "approval without capability id");
            return vec![PluginDirective::Noop];
        };
        if capability == CAP_INBOX_LIST {
            self.run_scan(event).await
        } else {
            self.execute(capability, event).await
        }
    }

    /// One approved inbox scan: list, evaluate, act, escalate, summarize.
    ///
    /// Elevated requests are pushed before the summary so the orchestrator
    /// sees them in causal order. The cursor is persisted only when every
    /// per-message action succeeded; a retry after failures re-covers the
    /// same messages, and the orchestrator deduplicates repeated requests.
    async fn run_scan(&self, event: &EventEnvelope) -> Vec<PluginDirective> {
        let project = self.project_of(event);
        let scan_id = Uuid::new_v4().to_string();
        let input = event.approved_input();
        let incremental = input
            .get("incremental")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let cursor = if incremental {
            match self.checkpoint.load() {
                Ok(cursor) => cursor,
                Err(err) => {
                    tracing::warn!(error = %err, "checkpoint unreadable, scanning from the top");
                    None
                }
            }
        } else {
            None
        };

        let page = match self.provider.list_inbox(cursor.as_deref(), SCAN_LIMIT).await {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(error = %err, "inbox listing failed");
                return vec![self.summary(
                    &project,
                    &scan_id,
                    ScanCounts::default(),
                    "failed",
                    Some(err.to_string()),
                )];
            }
        };

        let mut counts = ScanCounts::default();
        let mut directives = Vec::new();
        for message in &page.messages {
            counts.scanned += 1;
            let subject = normalize(message);
            let Some(outcome) = evaluate(&self.rules.rules, &subject) else {
                continue;
            };
            tracing::debug!(message = %message.id, rule = outcome.name, "rule matched");

            for action in outcome.actions {
                match action {
                    RuleAction::Label(label) => {
                        match self.provider.apply_label(&message.id, label).await {
                            Ok(()) => counts.labeled += 1,
                            Err(err) => {
                                counts.failed += 1;
                                tracing::warn!(message = %message.id, label, error = %err, "label failed");
                            }
                        }
                    }
                    RuleAction::Archive => match self.provider.archive(&message.id).await {
                        Ok(()) => counts.archived += 1,
                        Err(err) => {
                            counts.failed += 1;
                            tracing::warn!(message = %message.id, error = %err, "archive failed");
                        }
                    },
                    RuleAction::RequestTrashReview => {
                        counts.escalated += 1;
                        directives.push(PluginDirective::request_capability(
                            CAP_TRASH,
                            Some(project.clone()),
                            format!(
                                "rule '{}' flagged message {} for trash review",
                                outcome.name, message.id
                            ),
                            json!({ "message_id": message.id, "scan_id": scan_id }),
                            classify(CAP_TRASH),
                        ));
                    }
                    RuleAction::DraftReply => {
                        counts.escalated += 1;
                        directives.push(PluginDirective::request_capability(
                            CAP_DRAFT_REPLY,
                            Some(project.clone()),
                            format!(
                                "rule '{}' requested a reply draft for message {}",
                                outcome.name, message.id
                            ),
                            json!({
                                "message_id": message.id,
                                "to": message.from,
                                "scan_id": scan_id,
                            }),
                            classify(CAP_DRAFT_REPLY),
                        ));
                    }
                }
            }
        }

        let mut detail = None;
        if counts.failed == 0 {
            if let Some(next) = page.next_cursor.as_deref() {
                if let Err(err) = self.checkpoint.store(next) {
                    tracing::warn!(error = %err, "checkpoint write failed");
                    detail = Some(format!("checkpoint write failed: {err}"));
                }
            }
        }

        let status = if counts.failed == 0 {
            "completed"
        } else {
            "completed_with_failures"
        };
        directives.push(self.summary(&project, &scan_id, counts, status, detail));
        directives
    }

    /// Execute one directly approved capability and report the outcome.
    async fn execute(&self, capability: &str, event: &EventEnvelope) -> Vec<PluginDirective> {
        let input = event.approved_input();
        let outcome = match capability {
            CAP_SEND => self.perform_send(&input).await,
            CAP_LABEL => self.perform_label(&input).await,
            CAP_ARCHIVE => self.perform_simple(&input, "archived", |id| self.provider.archive(id)).await,
            CAP_TRASH => self.perform_simple(&input, "trashed", |id| self.provider.trash(id)).await,
            CAP_DELETE_PERMANENT => {
                self.perform_simple(&input, "permanently deleted", |id| {
                    self.provider.delete_permanent(id)
                })
                .await
            }
            CAP_UNSUBSCRIBE => {
                self.perform_simple(&input, "unsubscribed from", |id| {
                    self.provider.unsubscribe(id)
                })
                .await
            }
            CAP_DRAFT_REPLY => self.perform_draft(&input).await,
            other => {
                tracing::debug!(capability = other, "ignoring approval for unknown capability");
                return vec![PluginDirective::Noop];
            }
        };

        let project = Some(self.project_of(event));
        match outcome {
            Ok(detail) => vec![PluginDirective::enqueue_task(
                "mail.action.result",
                project,
                Some(detail.clone()),
                json!({ "capability": capability, "status": "executed", "detail": detail }),
            )],
            Err(err) => {
                tracing::warn!(capability, error = %err, "capability execution failed");
                vec![PluginDirective::enqueue_task(
                    "mail.action.result",
                    project,
                    Some(format!("{capability} failed")),
                    json!({
                        "capability": capability,
                        "status": "failed",
                        "detail": err.to_string(),
                    }),
                )]
            }
        }
    }

    async fn perform_send(&self, input: &Value) -> PluginResult<String> {
        let draft = draft_from(input)?;
        self.provider.send(&draft).await?;
        Ok(format!("sent message to {}", draft.to))
    }

    async fn perform_label(&self, input: &Value) -> PluginResult<String> {
        let id = require_str(input, "message_id")?;
        let label = require_str(input, "label")?;
        self.provider.apply_label(id, label).await?;
        Ok(format!("labeled message {id} as {label}"))
    }

    async fn perform_draft(&self, input: &Value) -> PluginResult<String> {
        let mut draft = draft_from(input)?;
        draft.in_reply_to = input
            .get("message_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.provider.create_draft(&draft).await?;
        Ok(format!("drafted reply to {}", draft.to))
    }

    async fn perform_simple<'a, F, Fut>(
        &self,
        input: &'a Value,
        verb: &str,
        op: F,
    ) -> PluginResult<String>
    where
        F: FnOnce(&'a str) -> Fut,
        Fut: std::future::Future<Output = PluginResult<()>>,
    {
        let id = require_str(input, "message_id")?;
        op(id).await?;
        Ok(format!("{verb} message {id}"))
    }

    fn summary(
        &self,
        project: &str,
        scan_id: &str,
        counts: ScanCounts,
        status: &str,
        detail: Option<String>,
    ) -> PluginDirective {
        let mut payload = json!({
            "scan_id": scan_id,
            "account": self.account,
            "scanned": counts.scanned,
            "labeled": counts.labeled,
            "archived": counts.archived,
            "escalated": counts.escalated,
            "failed": counts.failed,
            "status": status,
            "completed_at": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(detail) = detail {
            payload["detail"] = Value::String(detail);
        }
        PluginDirective::enqueue_task(
            "mail.triage.summary",
            Some(project.to_string()),
            Some(format!("triage scan {status}")),
            payload,
        )
    }
}

fn require_str<'a>(input: &'a Value, key: &str) -> PluginResult<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::Protocol(format!("approval input missing '{key}'")))
}

fn draft_from(input: &Value) -> PluginResult<MailDraft> {
    Ok(MailDraft {
        to: require_str(input, "to")?.to_string(),
        subject: input
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        body: input
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        in_reply_to: None,
    })
}

#[async_trait]
impl<P: MailProvider> Dispatcher for MailDispatcher<P> {
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
}
