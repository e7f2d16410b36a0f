//! Rule-based triage decision engine.
//!
//! An ordered rule set is evaluated against a normalized message; the first
//! rule whose match clause is satisfied wins. Order is part of the contract:
//! reordering the rule file changes behavior.

pub mod engine;
pub mod rule;

pub use engine::{evaluate, RuleOutcome};
pub use rule::{MatchClause, Rule, RuleAction, RuleSet, Subject};
