use tracing::warn;

use crate::{Error, RequestDetails, Result, Verdict};

/// Turns a `DENY` verdict into the request's failure.
///
/// Returning `Ok(())` lets processing continue past the checkpoint.
pub trait DenyHandler: Send + Sync {
    fn handle_deny(&self, request: &RequestDetails, verdict: &Verdict) -> Result<()>;
}

/// Fails with [`Error::Forbidden`], citing the deciding rule by name only.
#[derive(Debug, Default)]
pub struct DefaultDenyHandler;

impl DenyHandler for DefaultDenyHandler {
    fn handle_deny(&self, request: &RequestDetails, verdict: &Verdict) -> Result<()> {
        warn!(
            operation = %request.operation(),
            request_id = request.request_id().unwrap_or_default(),
            verdict = ?verdict,
            "access denied"
        );
        Err(Error::Forbidden(deny_message(verdict)))
    }
}

pub fn deny_message(verdict: &Verdict) -> String {
    match verdict.deciding_rule() {
        Some(rule) => format!(
            "Access denied by rule: {}",
            rule.name().unwrap_or("(unnamed rule)")
        ),
        None => "Access denied by default policy (no applicable rules)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{FixedRule, FnRule, Rule};
    use crate::{Decision, Effect, OperationKind};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn names_the_deciding_rule() {
        let rule: Arc<dyn Rule> = Arc::new(FixedRule::deny_all("deny everything else"));
        let verdict = Verdict::new(Decision::Deny, Some(rule));
        let request = RequestDetails::new(OperationKind::Read);

        assert_matches!(
            DefaultDenyHandler.handle_deny(&request, &verdict),
            Err(Error::Forbidden(message)) if message == "Access denied by rule: deny everything else"
        );
    }

    #[test]
    fn unnamed_rule_and_default_policy() {
        let rule: Arc<dyn Rule> = Arc::new(FnRule::unnamed(|_| Effect::Deny));
        let verdict = Verdict::new(Decision::Deny, Some(rule));
        assert_eq!("Access denied by rule: (unnamed rule)", deny_message(&verdict));

        let verdict = Verdict::new(Decision::Deny, None);
        assert_eq!(
            "Access denied by default policy (no applicable rules)",
            deny_message(&verdict)
        );
    }
}
