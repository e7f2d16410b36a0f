//! Rule definitions, the unit of YAML-loadable triage policy.
//!
//! A rule file looks like:
//!
//! ```yaml
//! rules:
//!   - name: receipts
//!     match:
//!       from_pattern: "receipt|invoice@"
//!     actions:
//!       - label: "Receipts"
//!       - archive
//!   - name: newsletters
//!     match:
//!       header: "List-Unsubscribe"
//!     actions:
//!       - label: "Newsletters"
//!       - archive
//!   - name: fallback
//!     match:
//!       always: true
//!     actions:
//!       - label: "Triage/Review"
//! ```
//!
//! File order is evaluation order. The catch-all `always` matcher is
//! conventionally placed last to realize a default bucket.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};

/// One ordered match-then-act entry in the triage decision table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Unique name, recorded in summaries and reasons for audit.
    pub name: String,
    /// Conjunction of optional matchers.
    #[serde(rename = "match", default)]
    pub matchers: MatchClause,
    /// Ordered list of effects applied when the rule wins.
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

/// The match clause of a rule. Present matchers AND together.
///
/// `sender_known` and `asks_question` are contextual: they need information
/// that is not in the local subject record, so a rule carrying only
/// contextual matchers cannot be decided here at all.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchClause {
    /// Case-insensitive regex tested against the sender address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_pattern: Option<String>,
    /// Case-insensitive regex tested against the subject line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_pattern: Option<String>,
    /// Requires the named header to exist in the subject's header map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Contextual: the sender is a known contact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_known: Option<bool>,
    /// Contextual: the message asks a question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asks_question: Option<bool>,
    /// Catch-all: matches unconditionally.
    #[serde(default)]
    pub always: bool,
}

impl MatchClause {
    /// Whether any contextual matcher is present.
    pub fn has_contextual(&self) -> bool {
        self.sender_known.is_some() || self.asks_question.is_some()
    }

    /// Whether any locally decidable matcher is present.
    pub fn has_local(&self) -> bool {
        self.from_pattern.is_some()
            || self.subject_pattern.is_some()
            || self.header.is_some()
            || self.always
    }
}

/// An effect applied when a rule wins.
///
/// `Label` and `Archive` run inside an already-approved scan envelope;
/// `RequestTrashReview` and `DraftReply` are elevated and always go back to
/// the orchestrator as fresh capability requests.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Apply the named label.
    Label(String),
    /// Move the message out of the inbox.
    Archive,
    /// Flag the message for trash review (requires authorization).
    RequestTrashReview,
    /// Draft a reply to the message (requires authorization).
    DraftReply,
}

/// The normalized subject record rules are evaluated against.
///
/// Provider-specific header structures are flattened into a plain
/// name to value map before evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subject {
    pub from: String,
    pub subject: String,
    pub headers: HashMap<String, String>,
}

/// An ordered rule list loaded from a YAML file.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse a rule set from a YAML string.
    pub fn from_yaml(yaml: &str) -> PluginResult<Self> {
        serde_yaml::from_str(yaml).map_err(|err| PluginError::Rules(err.to_string()))
    }

    /// Parse a rule set from a YAML file path.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            PluginError::Rules(format!("failed reading {}: {err}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Load a rule file, falling back to an empty set when the file is
    /// missing or unparseable. An empty set makes every scan a no-op apart
    /// from its summary, which is the safe default for a misconfigured
    /// worker.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_yaml_file(path) {
            Ok(rules) => {
                tracing::info!(path = %path.display(), count = rules.rules.len(), "loaded rule set");
                rules
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "rule set unavailable, using empty set");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
