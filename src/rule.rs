use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::BoxError;
use crate::interceptor::AuthorizationSettings;
use crate::{Effect, IdType, OperationKind, Pointcut, RequestDetails, ResourceRef};

/// Flags affecting how rules apply. The engine only passes them through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationFlag {
    /// Compartment rules do not block reads they cannot prove are out of scope.
    DoNotProactivelyBlockCompartmentReadAccess,
    /// PATCH requests pass the incoming-request check; the stored result is
    /// still checked on update.
    AllowPatchRequestUnconditionally,
}

/// Everything a rule may inspect when deciding.
#[derive(Debug, Clone, Copy)]
pub struct RuleInvocation<'a> {
    pub operation: OperationKind,
    pub request: &'a RequestDetails,
    pub input_resource: Option<&'a ResourceRef>,
    pub input_resource_id: Option<&'a IdType>,
    pub output_resource: Option<&'a ResourceRef>,
    pub pointcut: Option<Pointcut>,
    /// Engine settings snapshot this evaluation runs under.
    pub settings: &'a AuthorizationSettings,
}

impl<'a> RuleInvocation<'a> {
    pub fn has_flag(&self, flag: AuthorizationFlag) -> bool {
        self.settings.has_flag(flag)
    }

    pub fn validation_support(&self) -> Option<&'a dyn ValidationSupport> {
        self.settings.validation_support()
    }

    /// Resource type of whatever is being checked, input first.
    pub fn resource_type(&self) -> Option<&'a str> {
        self.input_resource
            .map(|resource| resource.resource_type())
            .or_else(|| self.input_resource_id.map(IdType::resource_type))
            .or_else(|| self.output_resource.map(|resource| resource.resource_type()))
    }

    /// Tenant owning the resource being checked.
    pub fn resource_tenant(&self) -> Option<&'a str> {
        self.input_resource
            .or(self.output_resource)
            .and_then(|resource| resource.tenant())
    }
}

/// A single authorization rule.
///
/// Rules either decide (`Effect::Allow` / `Effect::Deny`) or abstain with
/// `Effect::Undefined`, letting the next rule in the chain decide.
pub trait Rule: Send + Sync {
    /// Name reported when this rule denies a request.
    fn name(&self) -> Option<&str> {
        None
    }

    fn apply(&self, invocation: &RuleInvocation<'_>) -> Effect;
}

impl fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name()).finish()
    }
}

/// Terminology lookups for rules that match on coded values.
pub trait ValidationSupport: Send + Sync {
    /// Whether `system|code` belongs to the value set at `value_set_url`.
    fn is_code_in_value_set(&self, value_set_url: &str, system: Option<&str>, code: &str) -> bool;
}

/// Supplies the ordered rule list for a request.
///
/// Called at most once per request and engine instance.
pub trait RuleFactory: Send + Sync {
    fn build_rules(&self, request: &RequestDetails) -> Result<Vec<Arc<dyn Rule>>, BoxError>;
}

impl<F> RuleFactory for F
where
    F: Fn(&RequestDetails) -> Result<Vec<Arc<dyn Rule>>, BoxError> + Send + Sync,
{
    fn build_rules(&self, request: &RequestDetails) -> Result<Vec<Arc<dyn Rule>>, BoxError> {
        self(request)
    }
}

/// Rule backed by a closure.
pub struct FnRule<F> {
    name: Option<String>,
    predicate: F,
}

impl<F> FnRule<F>
where
    F: Fn(&RuleInvocation<'_>) -> Effect + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: Some(name.into()),
            predicate,
        }
    }

    pub fn unnamed(predicate: F) -> Self {
        Self {
            name: None,
            predicate,
        }
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&RuleInvocation<'_>) -> Effect + Send + Sync,
{
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn apply(&self, invocation: &RuleInvocation<'_>) -> Effect {
        (self.predicate)(invocation)
    }
}

impl<F> fmt::Debug for FnRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("name", &self.name).finish()
    }
}

/// Decides every invocation the same way; typically closes a chain.
#[derive(Debug, Clone)]
pub struct FixedRule {
    name: String,
    effect: Effect,
}

impl FixedRule {
    pub fn allow_all(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            effect: Effect::Allow,
        }
    }

    pub fn deny_all(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            effect: Effect::Deny,
        }
    }
}

impl Rule for FixedRule {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn apply(&self, _invocation: &RuleInvocation<'_>) -> Effect {
        self.effect
    }
}

/// Allows operations on resources owned by one of the listed tenants, as
/// long as the request itself runs in one of them. Abstains otherwise.
#[derive(Debug, Clone)]
pub struct TenantRule {
    name: String,
    tenants: BTreeSet<String>,
}

impl TenantRule {
    pub fn new<I, S>(name: impl Into<String>, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            tenants: tenants.into_iter().map(Into::into).collect(),
        }
    }
}

impl Rule for TenantRule {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn apply(&self, invocation: &RuleInvocation<'_>) -> Effect {
        match invocation.request.tenant_id() {
            Some(tenant) if self.tenants.contains(tenant) => {}
            _ => return Effect::Undefined,
        }
        match invocation.resource_tenant() {
            Some(owner) if self.tenants.contains(owner) => Effect::Allow,
            Some(_) => Effect::Undefined,
            // nothing tenant-owned in play, the request tenant alone decides
            None => Effect::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resource;

    fn invoke(rule: &dyn Rule, request: &RequestDetails, output: Option<&ResourceRef>) -> Effect {
        let settings = AuthorizationSettings::default();
        rule.apply(&RuleInvocation {
            operation: request.operation(),
            request,
            input_resource: None,
            input_resource_id: request.id(),
            output_resource: output,
            pointcut: None,
            settings: &settings,
        })
    }

    #[test]
    fn tenant_rule_allows_own_tenant() {
        let rule = TenantRule::new("tenant A", vec!["A"]);
        let request = RequestDetails::new(OperationKind::Read).with_tenant("A");
        let own = Resource::new("Patient").with_tenant("A").into_ref();
        let foreign = Resource::new("Patient").with_tenant("B").into_ref();

        assert_eq!(Effect::Allow, invoke(&rule, &request, Some(&own)));
        assert_eq!(Effect::Undefined, invoke(&rule, &request, Some(&foreign)));
        assert_eq!(Effect::Allow, invoke(&rule, &request, None));
    }

    #[test]
    fn tenant_rule_abstains_for_other_request_tenant() {
        let rule = TenantRule::new("tenant A", vec!["A"]);
        let request = RequestDetails::new(OperationKind::Read).with_tenant("B");
        let own = Resource::new("Patient").with_tenant("A").into_ref();

        assert_eq!(Effect::Undefined, invoke(&rule, &request, Some(&own)));
        let anonymous = RequestDetails::new(OperationKind::Read);
        assert_eq!(Effect::Undefined, invoke(&rule, &anonymous, Some(&own)));
    }

    #[test]
    fn invocation_resource_type_prefers_input() {
        let settings = AuthorizationSettings::default();
        let request = RequestDetails::new(OperationKind::Delete);
        let id = IdType::type_only("Observation");
        let output = Resource::new("Patient").into_ref();
        let invocation = RuleInvocation {
            operation: OperationKind::Delete,
            request: &request,
            input_resource: None,
            input_resource_id: Some(&id),
            output_resource: Some(&output),
            pointcut: None,
            settings: &settings,
        };
        assert_eq!(Some("Observation"), invocation.resource_type());
    }

    #[test]
    fn rule_objects_debug_by_name() {
        let chain: Vec<Arc<dyn Rule>> = vec![
            Arc::new(FixedRule::deny_all("deny")),
            Arc::new(FnRule::unnamed(|_| Effect::Undefined)),
        ];
        assert_eq!(
            r#"[Rule { name: Some("deny") }, Rule { name: None }]"#,
            format!("{:?}", chain)
        );
    }

    #[test]
    fn closures_are_factories() {
        let factory = |_: &RequestDetails| -> Result<Vec<Arc<dyn Rule>>, BoxError> {
            Ok(vec![Arc::new(FixedRule::deny_all("deny")) as Arc<dyn Rule>])
        };
        let rules = factory
            .build_rules(&RequestDetails::new(OperationKind::Read))
            .unwrap();
        assert_eq!(Some("deny"), rules[0].name());
    }
}
