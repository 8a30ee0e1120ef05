//! The authorization engine, bound to the server's request lifecycle.
//!
//! Every checkpoint funnels into [`AuthorizationInterceptor::decide`], which
//! builds the request's rule chain on first use and renders a [`Verdict`].
//! A `DENY` at any checkpoint is handed to the [`DenyHandler`] and, by
//! default, ends the request with [`Error::Forbidden`].

mod builder;
pub use builder::{AuthorizationInterceptorBuilder, AuthorizationSettings, SCHEMA_VERSION};

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::broadcaster::{Hook, InterceptorBroadcaster};
use crate::context::InstanceToken;
use crate::deny::DenyHandler;
use crate::expander::ResourceExpander;
use crate::pointcut::{BulkExportParameters, HookFlow, HookParams, Pointcut};
use crate::policy::{Policy, RuleChainCache};
use crate::resource::ResourceWalker;
use crate::rule::{RuleFactory, RuleInvocation};
use crate::seen::SeenResourceTracker;
use crate::{Direction, IdType, OperationKind, RequestDetails, ResourceRef, Result, Verdict};

/// Request attribute holding the parameters of a bulk export being started.
pub const REQUEST_ATTRIBUTE_BULK_DATA_EXPORT_OPTIONS: &str =
    "AuthorizationInterceptor_BulkDataExportOptions";

/// Pointcuts the engine listens on.
pub const AUTHORIZATION_POINTCUTS: &[Pointcut] = &[
    Pointcut::ServerIncomingRequestPreHandled,
    Pointcut::StoragePreshowResources,
    Pointcut::ServerOutgoingResponse,
    Pointcut::StoragePrestorageResourceCreated,
    Pointcut::StoragePrestorageResourceUpdated,
    Pointcut::StoragePrestorageResourceDeleted,
    Pointcut::StorageCascadeDelete,
    Pointcut::StoragePreDeleteExpunge,
    Pointcut::StorageInitiateBulkExport,
];

pub struct AuthorizationInterceptor {
    id: String,
    settings: RwLock<Arc<AuthorizationSettings>>,
    rule_factory: Arc<dyn RuleFactory>,
    deny_handler: Arc<dyn DenyHandler>,
    expander: ResourceExpander,
    chain_cache: RuleChainCache,
    seen: SeenResourceTracker,
}

impl fmt::Debug for AuthorizationInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationInterceptor")
            .field("id", &self.id)
            .field("settings", &*self.settings())
            .finish()
    }
}

impl AuthorizationInterceptor {
    pub(crate) fn new(
        settings: AuthorizationSettings,
        rule_factory: Arc<dyn RuleFactory>,
        deny_handler: Arc<dyn DenyHandler>,
        walker: Arc<dyn ResourceWalker>,
    ) -> Self {
        let token = InstanceToken::generate();
        Self {
            id: format!("authorization-{}", token),
            settings: RwLock::new(Arc::new(settings)),
            rule_factory,
            deny_handler,
            expander: ResourceExpander::new(walker),
            chain_cache: RuleChainCache::new(token),
            seen: SeenResourceTracker::new(token),
        }
    }

    pub fn builder() -> AuthorizationInterceptorBuilder {
        AuthorizationInterceptorBuilder::new()
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<AuthorizationSettings> {
        Arc::clone(&self.settings.read())
    }

    /// Swaps in new settings. Evaluations already running keep the snapshot
    /// they started with.
    pub fn replace_settings(&self, settings: AuthorizationSettings) {
        debug!(
            default_policy = %settings.default_policy(),
            flags = ?settings.flags(),
            "replacing authorization settings"
        );
        *self.settings.write() = Arc::new(settings);
    }

    /// Registers this engine on every authorization pointcut.
    pub fn register_with(self: &Arc<Self>, broadcaster: &InterceptorBroadcaster, order: i32) {
        for pointcut in AUTHORIZATION_POINTCUTS {
            broadcaster.register(*pointcut, self.clone(), order);
        }
    }

    /// Renders a verdict without enforcing it.
    ///
    /// Fails only when the rule chain cannot be built.
    pub fn decide(
        &self,
        operation: OperationKind,
        request: &mut RequestDetails,
        input_resource: Option<&ResourceRef>,
        input_resource_id: Option<&IdType>,
        output_resource: Option<&ResourceRef>,
        pointcut: Option<Pointcut>,
    ) -> Result<Verdict> {
        let chain = self
            .chain_cache
            .get_or_build(request, self.rule_factory.as_ref())?;
        let settings = self.settings();

        let invocation = RuleInvocation {
            operation,
            request,
            input_resource,
            input_resource_id,
            output_resource,
            pointcut,
            settings: &settings,
        };
        Ok(Policy::new(settings.default_policy()).evaluate(&chain, &invocation))
    }

    fn apply_rules_and_fail_if_deny(
        &self,
        operation: OperationKind,
        request: &mut RequestDetails,
        input_resource: Option<&ResourceRef>,
        input_resource_id: Option<&IdType>,
        output_resource: Option<&ResourceRef>,
        pointcut: Pointcut,
    ) -> Result<()> {
        let verdict = self.decide(
            operation,
            request,
            input_resource,
            input_resource_id,
            output_resource,
            Some(pointcut),
        )?;
        if verdict.is_allowed() {
            return Ok(());
        }
        self.deny_handler.handle_deny(request, &verdict)
    }

    fn incoming_request_pre_handled(&self, request: &mut RequestDetails) -> Result<()> {
        let (input_resource, input_resource_id) = match request.operation().direction() {
            Direction::In | Direction::Both => {
                // type-level operations without a body still name a target
                let id = request.id().cloned().or_else(|| {
                    request
                        .resource_name()
                        .filter(|name| !name.is_empty())
                        .map(IdType::type_only)
                });
                (request.resource().cloned(), id)
            }
            Direction::Out => (None, request.id().cloned()),
            Direction::None => {
                trace!(operation = %request.operation(), "operation not subject to authorization");
                return Ok(());
            }
        };

        self.apply_rules_and_fail_if_deny(
            request.operation(),
            request,
            input_resource.as_ref(),
            input_resource_id.as_ref(),
            None,
            Pointcut::ServerIncomingRequestPreHandled,
        )
    }

    fn check_outgoing_resource(
        &self,
        request: &mut RequestDetails,
        response: Option<&ResourceRef>,
        pointcut: Pointcut,
    ) -> Result<()> {
        let operation = request.operation();
        if !operation.direction().examines_output() {
            return Ok(());
        }
        let response = match response {
            Some(response) => response,
            None => return Ok(()),
        };
        if !self.seen.check_and_mark(request, response) {
            return Ok(());
        }

        let resources = self
            .expander
            .expand(response, operation, request.resource_name());
        for resource in &resources {
            // the payload itself was marked above
            if !Arc::ptr_eq(resource, response) && !self.seen.check_and_mark(request, resource) {
                continue;
            }
            self.apply_rules_and_fail_if_deny(operation, request, None, None, Some(resource), pointcut)?;
        }
        Ok(())
    }

    fn check_user_operation(
        &self,
        operation: OperationKind,
        request: &mut RequestDetails,
        resource: &ResourceRef,
        pointcut: Pointcut,
    ) -> Result<()> {
        self.apply_rules_and_fail_if_deny(
            operation,
            request,
            Some(resource),
            resource.id(),
            None,
            pointcut,
        )
    }

    fn pre_update(
        &self,
        request: &mut RequestDetails,
        old_resource: Option<&ResourceRef>,
        new_resource: &ResourceRef,
        pointcut: Pointcut,
    ) -> Result<()> {
        if let Some(old_resource) = old_resource {
            self.check_user_operation(OperationKind::Update, request, old_resource, pointcut)?;
        }
        self.check_user_operation(OperationKind::Update, request, new_resource, pointcut)
    }

    fn initiate_bulk_export(
        &self,
        request: &mut RequestDetails,
        parameters: &BulkExportParameters,
    ) -> Result<()> {
        request.set_attribute(
            REQUEST_ATTRIBUTE_BULK_DATA_EXPORT_OPTIONS,
            serde_json::to_value(parameters)?,
        );
        // every export style is checked as a server-level operation
        self.apply_rules_and_fail_if_deny(
            OperationKind::ExtendedOperationServer,
            request,
            None,
            None,
            None,
            Pointcut::StorageInitiateBulkExport,
        )
    }
}

impl Hook for AuthorizationInterceptor {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, params: &mut HookParams<'_>) -> Result<HookFlow> {
        let pointcut = params.pointcut();
        match params {
            HookParams::IncomingRequestPreHandled { request } => {
                self.incoming_request_pre_handled(request)?;
            }
            HookParams::PreshowResources { request, resources } => {
                for resource in resources.iter() {
                    self.check_outgoing_resource(&mut **request, Some(resource), pointcut)?;
                }
            }
            HookParams::OutgoingResponse { request, response } => {
                self.check_outgoing_resource(request, *response, pointcut)?;
            }
            HookParams::ResourceCreated { request, resource } => {
                self.check_user_operation(OperationKind::Create, request, *resource, pointcut)?;
            }
            HookParams::ResourceUpdated {
                request,
                old_resource,
                new_resource,
            } => {
                self.pre_update(request, *old_resource, *new_resource, pointcut)?;
            }
            HookParams::ResourceDeleted { request, resource } => {
                self.check_user_operation(OperationKind::Delete, request, *resource, pointcut)?;
            }
            // both run under the request's own kind, which is what the rules see
            HookParams::CascadeDelete { request, resource } => {
                let operation = request.operation();
                self.check_user_operation(operation, request, *resource, pointcut)?;
            }
            HookParams::PreDeleteExpunge { request } => {
                let operation = request.operation();
                self.apply_rules_and_fail_if_deny(operation, request, None, None, None, pointcut)?;
            }
            HookParams::InitiateBulkExport {
                request,
                parameters,
            } => {
                self.initiate_bulk_export(request, *parameters)?;
            }
            HookParams::IncomingRequestPreProcessed { .. } | HookParams::HandleException { .. } => {}
        }
        Ok(HookFlow::Continue)
    }
}
