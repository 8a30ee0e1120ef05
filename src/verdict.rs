use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// Authorization outcome.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    #[serde(alias = "allowed")]
    Allow,
    #[serde(alias = "denied")]
    Deny,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("ALLOW"),
            Decision::Deny => f.write_str("DENY"),
        }
    }
}

/// What a single rule has to say about a pending operation.
///
/// `Undefined` means the rule abstains and evaluation moves on to the next rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
    Undefined,
}

impl Effect {
    pub fn decision(self) -> Option<Decision> {
        match self {
            Effect::Allow => Some(Decision::Allow),
            Effect::Deny => Some(Decision::Deny),
            Effect::Undefined => None,
        }
    }
}

impl From<Decision> for Effect {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Effect::Allow,
            Decision::Deny => Effect::Deny,
        }
    }
}

/// The decision for one check together with the rule that produced it.
///
/// `deciding_rule` is `None` when every rule abstained and the default
/// policy was applied.
#[derive(Clone)]
pub struct Verdict {
    decision: Decision,
    deciding_rule: Option<Arc<dyn Rule>>,
}

impl Verdict {
    pub fn new(decision: Decision, deciding_rule: Option<Arc<dyn Rule>>) -> Self {
        Self {
            decision,
            deciding_rule,
        }
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }

    pub fn deciding_rule(&self) -> Option<&Arc<dyn Rule>> {
        self.deciding_rule.as_ref()
    }

    /// Name of the deciding rule, if there was one and it is named.
    pub fn rule_name(&self) -> Option<&str> {
        self.deciding_rule.as_ref().and_then(|rule| rule.name())
    }
}

impl fmt::Debug for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match &self.deciding_rule {
            Some(rule) => rule.name().unwrap_or("(unnamed rule)"),
            None => "(none)",
        };
        f.debug_struct("Verdict")
            .field("rule", &rule)
            .field("decision", &self.decision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::FnRule;

    #[test]
    fn effect_to_decision() {
        assert_eq!(Some(Decision::Allow), Effect::Allow.decision());
        assert_eq!(Some(Decision::Deny), Effect::Deny.decision());
        assert_eq!(None, Effect::Undefined.decision());
    }

    #[test]
    fn verdict_debug_names_rule() {
        let rule: Arc<dyn Rule> = Arc::new(FnRule::new("allow patients", |_| Effect::Allow));
        let verdict = Verdict::new(Decision::Allow, Some(rule));
        assert_eq!(
            "Verdict { rule: \"allow patients\", decision: Allow }",
            format!("{:?}", verdict)
        );

        let verdict = Verdict::new(Decision::Deny, None);
        assert_eq!(None, verdict.rule_name());
        assert_eq!(
            "Verdict { rule: \"(none)\", decision: Deny }",
            format!("{:?}", verdict)
        );
    }

    #[test]
    fn decision_deserializes_from_settings_values() {
        let decision: Decision = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(Decision::Deny, decision);
        let decision: Decision = serde_json::from_str("\"allowed\"").unwrap();
        assert_eq!(Decision::Allow, decision);
    }
}
