use std::sync::Arc;

use tracing::debug;

use crate::context::{InstanceToken, UserDataKey};
use crate::policy::RuleChain;
use crate::rule::RuleFactory;
use crate::{Error, RequestDetails, Result};

const SLOT: &str = "rule-chain";

/// Builds the rule chain once per request and keeps it in the request's
/// user data under this engine instance's token.
#[derive(Debug, Copy, Clone)]
pub struct RuleChainCache {
    key: UserDataKey,
}

impl RuleChainCache {
    pub fn new(token: InstanceToken) -> Self {
        Self {
            key: UserDataKey::new(token, SLOT),
        }
    }

    /// Returns the cached chain, asking `factory` for it on first use. A
    /// factory failure is returned as [`Error::ChainBuild`] and nothing is
    /// cached.
    pub fn get_or_build(
        &self,
        request: &mut RequestDetails,
        factory: &dyn RuleFactory,
    ) -> Result<RuleChain> {
        if let Some(chain) = request.user_data().get::<RuleChain>(&self.key) {
            return Ok(chain.clone());
        }

        let rules = factory.build_rules(request).map_err(Error::ChainBuild)?;
        debug!(
            rules = rules.len(),
            operation = %request.operation(),
            "built authorization rule list"
        );
        let chain: RuleChain = Arc::from(rules);
        request.user_data_mut().insert(self.key, chain.clone());
        Ok(chain)
    }

    pub fn is_built(&self, request: &RequestDetails) -> bool {
        request.user_data().contains_key(&self.key)
    }
}
