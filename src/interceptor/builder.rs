use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::deny::{DefaultDenyHandler, DenyHandler};
use crate::interceptor::AuthorizationInterceptor;
use crate::resource::{DefaultResourceWalker, ResourceWalker};
use crate::rule::{AuthorizationFlag, RuleFactory, ValidationSupport};
use crate::{Decision, Error, Result};

/// Settings document version understood by [`AuthorizationSettings::from_json`].
pub const SCHEMA_VERSION: &str = "2024-01-01";

/// Engine-wide settings. Immutable once built; changing them at runtime
/// means swapping in a new snapshot.
#[derive(Clone)]
pub struct AuthorizationSettings {
    default_policy: Decision,
    flags: BTreeSet<AuthorizationFlag>,
    validation_support: Option<Arc<dyn ValidationSupport>>,
}

impl AuthorizationSettings {
    pub fn new(default_policy: Decision) -> Self {
        Self {
            default_policy,
            flags: BTreeSet::new(),
            validation_support: None,
        }
    }

    pub fn with_validation_support(mut self, support: Arc<dyn ValidationSupport>) -> Self {
        self.validation_support = Some(support);
        self
    }

    pub fn with_flags<I>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = AuthorizationFlag>,
    {
        self.flags = flags.into_iter().collect();
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let version: SettingsVersion = serde_json::from_str(json).map_err(Error::Deserializing)?;
        if version.schema_version != SCHEMA_VERSION {
            return Err(Error::Configuration(format!(
                "unsupported schemaVersion {:?}, expected {:?}",
                version.schema_version, SCHEMA_VERSION
            )));
        }

        let definition: SettingsDefinition20240101 =
            serde_json::from_str(json).map_err(Error::Deserializing)?;
        let default_policy = match definition.default_policy {
            Some(value) => serde_json::from_value::<Decision>(value.clone()).map_err(|_| {
                Error::Configuration(format!("invalid defaultPolicy {}", value))
            })?,
            None => return Err(Error::Configuration("defaultPolicy is required".into())),
        };

        Ok(Self {
            default_policy,
            flags: definition.flags,
            validation_support: None,
        })
    }

    pub fn default_policy(&self) -> Decision {
        self.default_policy
    }

    pub fn flags(&self) -> &BTreeSet<AuthorizationFlag> {
        &self.flags
    }

    pub fn has_flag(&self, flag: AuthorizationFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Terminology lookups handed to rules, if configured.
    pub fn validation_support(&self) -> Option<&dyn ValidationSupport> {
        self.validation_support.as_deref()
    }
}

impl fmt::Debug for AuthorizationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationSettings")
            .field("default_policy", &self.default_policy)
            .field("flags", &self.flags)
            .field("validation_support", &self.validation_support.is_some())
            .finish()
    }
}

impl Default for AuthorizationSettings {
    fn default() -> Self {
        Self::new(Decision::Deny)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsVersion {
    schema_version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDefinition20240101 {
    #[serde(default)]
    default_policy: Option<Value>,
    #[serde(default)]
    flags: BTreeSet<AuthorizationFlag>,
}

/// Assembles an [`AuthorizationInterceptor`].
///
/// A rule factory is mandatory. Settings come from JSON, from the builder
/// methods, or both; builder methods override the JSON document.
#[derive(Default)]
pub struct AuthorizationInterceptorBuilder {
    json: Option<String>,
    default_decision: Option<Decision>,
    flags: Option<BTreeSet<AuthorizationFlag>>,
    rule_factory: Option<Arc<dyn RuleFactory>>,
    deny_handler: Option<Arc<dyn DenyHandler>>,
    walker: Option<Arc<dyn ResourceWalker>>,
    validation_support: Option<Arc<dyn ValidationSupport>>,
}

impl AuthorizationInterceptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Self {
        Self {
            json: Some(json.into()),
            ..Self::default()
        }
    }

    pub fn with_default_decision(mut self, decision: Decision) -> Self {
        self.default_decision = Some(decision);
        self
    }

    pub fn with_flags<I>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = AuthorizationFlag>,
    {
        self.flags = Some(flags.into_iter().collect());
        self
    }

    pub fn with_rule_factory(mut self, factory: impl RuleFactory + 'static) -> Self {
        self.rule_factory = Some(Arc::new(factory));
        self
    }

    pub fn with_deny_handler(mut self, handler: impl DenyHandler + 'static) -> Self {
        self.deny_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_walker(mut self, walker: impl ResourceWalker + 'static) -> Self {
        self.walker = Some(Arc::new(walker));
        self
    }

    pub fn with_validation_support(mut self, support: impl ValidationSupport + 'static) -> Self {
        self.validation_support = Some(Arc::new(support));
        self
    }

    pub fn build(self) -> Result<AuthorizationInterceptor> {
        let mut settings = match &self.json {
            Some(json) => AuthorizationSettings::from_json(json)?,
            None => AuthorizationSettings::default(),
        };
        if let Some(decision) = self.default_decision {
            settings.default_policy = decision;
        }
        if let Some(flags) = self.flags {
            settings.flags = flags;
        }
        if let Some(support) = self.validation_support {
            settings.validation_support = Some(support);
        }

        let rule_factory = self
            .rule_factory
            .ok_or_else(|| Error::Configuration("a rule factory is required".into()))?;
        let deny_handler = self
            .deny_handler
            .unwrap_or_else(|| Arc::new(DefaultDenyHandler));
        let walker = self
            .walker
            .unwrap_or_else(|| Arc::new(DefaultResourceWalker));

        Ok(AuthorizationInterceptor::new(
            settings,
            rule_factory,
            deny_handler,
            walker,
        ))
    }
}
