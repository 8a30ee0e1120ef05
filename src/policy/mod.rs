mod cache;
pub use cache::RuleChainCache;

use std::sync::Arc;

use tracing::trace;

use crate::rule::{Rule, RuleInvocation};
use crate::{Decision, Verdict};

/// `tracing` target of the per-rule evaluation log. Enable it at `trace`
/// to see why a request was allowed or denied.
pub const TROUBLESHOOTING_TARGET: &str = "rest_authz::troubleshooting";

/// Ordered rules active for one request.
pub type RuleChain = Arc<[Arc<dyn Rule>]>;

/// Policy evaluator. Walks a rule chain in order and renders a `Verdict`.
///
/// The first rule that does not abstain decides and no later rule is
/// consulted. If every rule abstains the default decision applies, with no
/// deciding rule.
#[derive(Debug, Copy, Clone)]
pub struct Policy {
    default_decision: Decision,
}

impl Policy {
    pub fn new(default_decision: Decision) -> Self {
        Self { default_decision }
    }

    pub fn default_decision(&self) -> Decision {
        self.default_decision
    }

    pub fn evaluate(&self, chain: &[Arc<dyn Rule>], invocation: &RuleInvocation<'_>) -> Verdict {
        trace!(
            target: TROUBLESHOOTING_TARGET,
            rules = chain.len(),
            operation = %invocation.operation,
            input_type = invocation.input_resource.map_or("", |r| r.resource_type()),
            output_type = invocation.output_resource.map_or("", |r| r.resource_type()),
            pointcut = invocation.pointcut.map_or("", |p| p.name()),
            "applying rules"
        );

        for rule in chain {
            let effect = rule.apply(invocation);
            if let Some(decision) = effect.decision() {
                trace!(
                    target: TROUBLESHOOTING_TARGET,
                    rule = rule.name().unwrap_or("(unnamed rule)"),
                    %decision,
                    "rule decided"
                );
                return Verdict::new(decision, Some(rule.clone()));
            }
        }

        trace!(
            target: TROUBLESHOOTING_TARGET,
            default = %self.default_decision,
            "no rule decided, applying default"
        );
        Verdict::new(self.default_decision, None)
    }
}
