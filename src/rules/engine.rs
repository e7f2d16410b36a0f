//! First-match rule evaluation.

use regex::RegexBuilder;

use super::rule::{MatchClause, Rule, RuleAction, Subject};

/// The winning rule of an evaluation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleOutcome<'a> {
    pub name: &'a str,
    pub actions: &'a [RuleAction],
}

/// Evaluate rules in order and return the first match.
///
/// Rules whose match clause is purely contextual are skipped entirely: they
/// cannot be decided from the local subject record, and neither forcing a
/// match nor forcing a miss would be correct. A rule that mixes contextual
/// and local matchers is decided on its local matchers alone.
///
/// `None` means the list was exhausted without a match; callers treat that
/// as "do nothing", not as an error.
pub fn evaluate<'a>(rules: &'a [Rule], subject: &Subject) -> Option<RuleOutcome<'a>> {
    for rule in rules {
        if rule.matchers.has_contextual() && !rule.matchers.has_local() {
            tracing::debug!(rule = %rule.name, "skipping contextual-only rule");
            continue;
        }
        if clause_matches(&rule.name, &rule.matchers, subject) {
            return Some(RuleOutcome {
                name: &rule.name,
                actions: &rule.actions,
            });
        }
    }
    None
}

/// AND all locally decidable matchers of a clause.
fn clause_matches(rule_name: &str, clause: &MatchClause, subject: &Subject) -> bool {
    if let Some(pattern) = &clause.from_pattern {
        if !pattern_matches(rule_name, pattern, &subject.from) {
            return false;
        }
    }
    if let Some(pattern) = &clause.subject_pattern {
        if !pattern_matches(rule_name, pattern, &subject.subject) {
            return false;
        }
    }
    if let Some(header) = &clause.header {
        let present = subject
            .headers
            .keys()
            .any(|key| key.eq_ignore_ascii_case(header));
        if !present {
            return false;
        }
    }
    clause.has_local()
}

/// Case-insensitive regex test. A pattern that fails to compile makes the
/// whole rule a non-match; it must never crash the scan.
fn pattern_matches(rule_name: &str, pattern: &str, value: &str) -> bool {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex.is_match(value),
        Err(err) => {
            tracing::warn!(rule = %rule_name, pattern, error = %err, "pattern failed to compile");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::rules::rule::RuleSet;

    fn triage_rules() -> RuleSet {
        RuleSet::from_yaml(
            r#"
rules:
  - name: receipts
    match:
      from_pattern: "receipt|invoice@"
    actions:
      - label: "Receipts"
      - archive
  - name: newsletters
    match:
      header: "List-Unsubscribe"
    actions:
      - label: "Newsletters"
      - archive
  - name: spam-review
    match:
      subject_pattern: "urgent|act now|winner"
    actions:
      - label: "Spam/Review"
      - request_trash_review
  - name: fallback
    match:
      always: true
    actions:
      - label: "Triage/Review"
"#,
        )
        .unwrap()
    }

    fn subject(from: &str, subject_line: &str) -> Subject {
        Subject {
            from: from.to_string(),
            subject: subject_line.to_string(),
            headers: HashMap::new(),
        }
    }

    #[test]
    fn test_from_pattern_wins() {
        let rules = triage_rules();
        let outcome = evaluate(&rules.rules, &subject("receipt@store.com", "Your order")).unwrap();
        assert_eq!(outcome.name, "receipts");
    }

    #[test]
    fn test_header_presence_wins() {
        let rules = triage_rules();
        let mut s = subject("news@daily.com", "Digest");
        s.headers
            .insert("List-Unsubscribe".to_string(), "<mailto:x>".to_string());
        let outcome = evaluate(&rules.rules, &s).unwrap();
        assert_eq!(outcome.name, "newsletters");
    }

    #[test]
    fn test_subject_pattern_is_case_insensitive() {
        let rules = triage_rules();
        let outcome =
            evaluate(&rules.rules, &subject("", "URGENT: You are a winner!")).unwrap();
        assert_eq!(outcome.name, "spam-review");
    }

    #[test]
    fn test_catch_all_bucket() {
        let rules = triage_rules();
        let outcome = evaluate(&rules.rules, &subject("friend@x.com", "Lunch?")).unwrap();
        assert_eq!(outcome.name, "fallback");
        assert_eq!(
            outcome.actions,
            &[RuleAction::Label("Triage/Review".to_string())]
        );
    }

    #[test]
    fn test_first_match_beats_most_specific() {
        // Matches both "receipts" (from) and "spam-review" (subject); file
        // order decides, not specificity.
        let rules = triage_rules();
        let outcome = evaluate(
            &rules.rules,
            &subject("receipt@urgent-store.com", "URGENT receipt"),
        )
        .unwrap();
        assert_eq!(outcome.name, "receipts");
    }

    #[test]
    fn test_contextual_only_rule_is_skipped() {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - name: known-question
    match:
      sender_known: true
      asks_question: true
    actions:
      - draft_reply
  - name: fallback
    match:
      always: true
    actions:
      - label: "Triage/Review"
"#,
        )
        .unwrap();

        let outcome = evaluate(&rules.rules, &subject("friend@x.com", "Lunch?")).unwrap();
        assert_eq!(outcome.name, "fallback");
    }

    #[test]
    fn test_mixed_rule_decided_on_local_matchers() {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - name: known-receipts
    match:
      sender_known: true
      from_pattern: "receipt@"
    actions:
      - archive
"#,
        )
        .unwrap();

        assert!(evaluate(&rules.rules, &subject("receipt@store.com", "hi")).is_some());
        assert!(evaluate(&rules.rules, &subject("other@store.com", "hi")).is_none());
    }

    #[test]
    fn test_conjunction_requires_all_matchers() {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - name: both
    match:
      from_pattern: "billing@"
      subject_pattern: "overdue"
    actions:
      - archive
"#,
        )
        .unwrap();

        assert!(evaluate(&rules.rules, &subject("billing@x.com", "overdue notice")).is_some());
        assert!(evaluate(&rules.rules, &subject("billing@x.com", "welcome")).is_none());
        assert!(evaluate(&rules.rules, &subject("friend@x.com", "overdue")).is_none());
    }

    #[test]
    fn test_bad_pattern_is_a_non_match_not_a_crash() {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - name: broken
    match:
      from_pattern: "(unclosed"
    actions:
      - archive
  - name: fallback
    match:
      always: true
    actions:
      - label: "Triage/Review"
"#,
        )
        .unwrap();

        let outcome = evaluate(&rules.rules, &subject("anyone@x.com", "hi")).unwrap();
        assert_eq!(outcome.name, "fallback");
    }

    #[test]
    fn test_exhausted_list_returns_none() {
        let rules = RuleSet::from_yaml(
            r#"
rules:
  - name: narrow
    match:
      from_pattern: "nobody@"
    actions:
      - archive
"#,
        )
        .unwrap();

        assert!(evaluate(&rules.rules, &subject("friend@x.com", "hi")).is_none());
        assert!(evaluate(&[], &subject("friend@x.com", "hi")).is_none());
    }
}
