//! Wire protocol between the orchestrator and a plugin worker.
//!
//! Both directions use UTF-8 text with one JSON object per line. The
//! orchestrator sends [`EventEnvelope`] lines on the worker's stdin and
//! consumes [`PluginDirective`] lines from its stdout. There is no framing
//! beyond the newline; `serde_json::to_string` guarantees a directive never
//! contains a literal unescaped newline.
//!
//! The envelope's `payload` is a schema-less map on purpose: each dispatcher
//! branch validates and coerces only the fields it needs, so new task types
//! can be introduced without a shared schema registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PluginError, PluginResult};

/// Event type for a newly scheduled task.
pub const EVENT_TASK_RECEIVED: &str = "task.received";

/// Event type for an authorization grant on a previously requested capability.
pub const EVENT_ACTION_APPROVED: &str = "action.approved";

/// Scoping label applied when the orchestrator omits `project`.
pub const DEFAULT_PROJECT: &str = "default";

/// Severity classification gating authorization strictness.
///
/// The ordering is load-bearing: `Safe < Sensitive < Destructive`. A
/// capability's tier is a static property of what it can do, never inferred
/// from its arguments.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Read-only or trivially reversible.
    #[default]
    Safe,
    /// Reversible but consequential (send, unsubscribe, discard-to-trash).
    Sensitive,
    /// Irreversible (permanent delete).
    Destructive,
}

/// One inbound notification from the orchestrator.
///
/// Immutable once received; dispatchers only read it. Unknown `event_type`
/// values are answered with a `noop` directive, never treated as fatal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Unique, opaque event identifier.
    pub event_id: String,
    /// Open enum; see [`EVENT_TASK_RECEIVED`] and [`EVENT_ACTION_APPROVED`].
    pub event_type: String,
    /// Orchestrator task this event belongs to, when there is one.
    #[serde(default)]
    pub task_id: Option<String>,
    /// The capability request this event answers, for `action.approved`.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Optional scoping label; [`DEFAULT_PROJECT`] when absent.
    #[serde(default)]
    pub project: Option<String>,
    /// Event-type-specific key/value map.
    #[serde(default)]
    pub payload: Value,
}

impl EventEnvelope {
    /// The event's project label, falling back to [`DEFAULT_PROJECT`].
    pub fn project_or_default(&self) -> &str {
        self.project.as_deref().unwrap_or(DEFAULT_PROJECT)
    }

    /// Fetch a string field from the payload map.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// The capability identifier carried by an `action.approved` payload.
    ///
    /// Accepts both the flat `capability_id` field and the nested
    /// `capability.id` form the orchestrator uses when it echoes a request.
    pub fn approved_capability(&self) -> Option<&str> {
        self.payload_str("capability_id").or_else(|| {
            self.payload
                .get("capability")
                .and_then(|cap| cap.get("id"))
                .and_then(Value::as_str)
        })
    }

    /// The echoed request input carried by an `action.approved` payload.
    pub fn approved_input(&self) -> Value {
        self.payload.get("input").cloned().unwrap_or(Value::Null)
    }
}

/// Reference to a capability in a request directive.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityRef {
    /// Capability identifier, e.g. `mail.send` or `browser.observe`.
    pub id: String,
    /// Project override; the originating task's project when absent.
    #[serde(default)]
    pub project: Option<String>,
}

/// One outbound instruction from plugin to orchestrator.
///
/// A closed sum type so the encode/decode boundary is matched exhaustively;
/// a missing case is a compile error rather than a runtime surprise. Each
/// directive is a complete, self-contained record the orchestrator can
/// persist or discard independently.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PluginDirective {
    /// "I want to do X, here is why, here is the risk."
    RequestCapability {
        capability: CapabilityRef,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        risk_tier: RiskTier,
    },
    /// "Record this outcome / schedule this follow-up."
    EnqueueTask {
        task_type: String,
        #[serde(default)]
        project: Option<String>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        payload: Value,
    },
    /// "Nothing to do."
    Noop,
}

impl PluginDirective {
    /// Build a capability request directive.
    pub fn request_capability(
        capability_id: impl Into<String>,
        project: Option<String>,
        reason: impl Into<String>,
        input: Value,
        risk_tier: RiskTier,
    ) -> Self {
        PluginDirective::RequestCapability {
            capability: CapabilityRef {
                id: capability_id.into(),
                project,
            },
            reason: reason.into(),
            input,
            risk_tier,
        }
    }

    /// Build a follow-up task directive.
    pub fn enqueue_task(
        task_type: impl Into<String>,
        project: Option<String>,
        reason: Option<String>,
        payload: Value,
    ) -> Self {
        PluginDirective::EnqueueTask {
            task_type: task_type.into(),
            project,
            reason,
            payload,
        }
    }
}

/// Decode one event line.
pub fn decode_event(line: &str) -> PluginResult<EventEnvelope> {
    serde_json::from_str(line).map_err(|err| PluginError::Protocol(err.to_string()))
}

/// Encode one directive as a single JSON line (without the trailing newline).
pub fn encode_directive(directive: &PluginDirective) -> PluginResult<String> {
    serde_json::to_string(directive).map_err(|err| PluginError::Protocol(err.to_string()))
}
