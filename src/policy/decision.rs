//! Request evaluation
//!
//! Evaluation is a left-to-right fold over the rule list: every matching
//! rule replaces the current decision, so the last match in file order wins.
//! The fold starts from a default deny.

use std::fmt;

use crate::policy::loader::PolicySet;
use crate::policy::rule::{Action, Rule};

/// The request attributes a policy looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDescriptor<'a> {
    pub method: &'a str,
    /// Request path without the query string
    pub path: &'a str,
}

impl<'a> RequestDescriptor<'a> {
    pub fn new(method: &'a str, path: &'a str) -> Self {
        Self { method, path }
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy)]
pub struct Decision<'p> {
    pub outcome: Action,
    pub matched_rule: Option<&'p Rule>,
}

/// Why a decision came out the way it did, for the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    MatchedAllowRule,
    MatchedDenyRule,
    DefaultPolicy,
}

impl<'p> Decision<'p> {
    pub fn default_deny() -> Self {
        Self {
            outcome: Action::Deny,
            matched_rule: None,
        }
    }

    fn from_rule(rule: &'p Rule) -> Self {
        Self {
            outcome: rule.action,
            matched_rule: Some(rule),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == Action::Allow
    }

    pub fn reason(&self) -> DecisionReason {
        match (self.outcome, self.matched_rule) {
            (_, None) => DecisionReason::DefaultPolicy,
            (Action::Allow, Some(_)) => DecisionReason::MatchedAllowRule,
            (Action::Deny, Some(_)) => DecisionReason::MatchedDenyRule,
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecisionReason::MatchedAllowRule => "matched allow rule",
            DecisionReason::MatchedDenyRule => "matched deny rule",
            DecisionReason::DefaultPolicy => "default policy, no matching rule",
        })
    }
}

impl PolicySet {
    /// Decides whether a request may be forwarded.
    pub fn evaluate(&self, request: &RequestDescriptor<'_>) -> Decision<'_> {
        self.rules()
            .iter()
            .fold(Decision::default_deny(), |decision, rule| {
                if rule.matches(request.method, request.path) {
                    Decision::from_rule(rule)
                } else {
                    decision
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_denies() {
        let policy = PolicySet::default();
        let decision = policy.evaluate(&RequestDescriptor::new("GET", "/"));

        assert_eq!(decision.outcome, Action::Deny);
        assert!(decision.matched_rule.is_none());
        assert_eq!(decision.reason(), DecisionReason::DefaultPolicy);
    }

    #[test]
    fn later_rule_overrides_earlier() {
        let policy = PolicySet::parse("DENY GET /a\nALLOW GET /a\n").unwrap();
        let decision = policy.evaluate(&RequestDescriptor::new("GET", "/a"));

        assert!(decision.is_allowed());
        assert_eq!(decision.matched_rule.unwrap().line_number, 2);
    }
}
