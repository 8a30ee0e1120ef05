#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cognitive_complexity,
    clippy::large_enum_variant,
    clippy::similar_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::too_many_arguments
)]
pub mod broadcaster;
pub mod context;
pub mod deny;
mod errors;
pub mod expander;
mod id;
pub mod interceptor;
mod operation;
pub mod outcome;
pub mod pointcut;
pub mod policy;
pub mod resource;
pub mod rule;
pub mod seen;
mod verdict;

pub use broadcaster::{Hook, InterceptorBroadcaster};
pub use context::{InstanceToken, RequestDetails, UserData};
pub use deny::{DefaultDenyHandler, DenyHandler};
pub use errors::{BoxError, Error, Result};
pub use id::IdType;
pub use interceptor::{
    AuthorizationInterceptor, AuthorizationInterceptorBuilder, AuthorizationSettings,
    REQUEST_ATTRIBUTE_BULK_DATA_EXPORT_OPTIONS,
};
pub use operation::{resolve, Direction, OperationKind};
pub use outcome::{ExceptionHandlingInterceptor, OperationOutcome};
pub use pointcut::{BulkExportParameters, ExportStyle, HookFlow, HookParams, Pointcut};
pub use policy::{Policy, RuleChain};
pub use resource::{BundleType, DefaultResourceWalker, Resource, ResourceRef, ResourceWalker, Tag};
pub use rule::{
    AuthorizationFlag, FixedRule, FnRule, Rule, RuleFactory, RuleInvocation, TenantRule,
    ValidationSupport,
};
pub use verdict::{Decision, Effect, Verdict};
