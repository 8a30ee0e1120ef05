//! Resource model consumed by the authorization engine.
//!
//! Only what authorization needs is modelled: the resource type, its id,
//! meta tags, the owning tenant, the bundle type of containers, and the
//! resources nested inside it. Resources are shared as [`ResourceRef`]
//! and compared by identity when deduplicating checks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, IdType, Result};

pub type ResourceRef = Arc<Resource>;

pub const BUNDLE: &str = "Bundle";
pub const PARAMETERS: &str = "Parameters";
pub const OPERATION_OUTCOME: &str = "OperationOutcome";

/// Bundle types checked as a single unit rather than member by member.
pub const STANDALONE_BUNDLE_TYPES: &[BundleType] = &[BundleType::Document, BundleType::Message];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Document,
    Message,
    Transaction,
    TransactionResponse,
    Batch,
    BatchResponse,
    History,
    Searchset,
    Collection,
}

impl BundleType {
    pub fn is_standalone(self) -> bool {
        STANDALONE_BUNDLE_TYPES.contains(&self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub system: Option<String>,
    pub code: String,
}

impl Tag {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resource {
    resource_type: String,
    id: Option<IdType>,
    tags: Vec<Tag>,
    tenant: Option<String>,
    bundle_type: Option<BundleType>,
    children: Vec<ResourceRef>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    pub fn bundle(bundle_type: BundleType, entries: Vec<ResourceRef>) -> Self {
        Self {
            resource_type: BUNDLE.to_string(),
            bundle_type: Some(bundle_type),
            children: entries,
            ..Self::default()
        }
    }

    pub fn parameters(resources: Vec<ResourceRef>) -> Self {
        Self {
            resource_type: PARAMETERS.to_string(),
            children: resources,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id_part: impl Into<String>) -> Self {
        self.id = Some(IdType::new(self.resource_type.clone(), id_part));
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Adds a nested resource (bundle entry, parameter value or contained resource).
    pub fn with_child(mut self, child: ResourceRef) -> Self {
        self.children.push(child);
        self
    }

    pub fn into_ref(self) -> ResourceRef {
        Arc::new(self)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> Option<&IdType> {
        self.id.as_ref()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn has_tag(&self, system: &str, code: &str) -> bool {
        self.tags
            .iter()
            .any(|tag| tag.code == code && tag.system.as_deref() == Some(system))
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn bundle_type(&self) -> Option<BundleType> {
        self.bundle_type
    }

    pub fn children(&self) -> &[ResourceRef] {
        &self.children
    }

    pub fn is_bundle(&self) -> bool {
        self.resource_type == BUNDLE
    }

    pub fn is_parameters(&self) -> bool {
        self.resource_type == PARAMETERS
    }

    pub fn is_operation_outcome(&self) -> bool {
        self.resource_type == OPERATION_OUTCOME
    }

    /// Builds the model from a JSON resource. Every JSON object becomes its
    /// own instance, so a resource included twice yields two instances.
    pub fn from_json(json: &Value) -> Result<ResourceRef> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::InvalidRequest("Resource must be a JSON object".into()))?;
        let resource_type = object
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("Resource is missing resourceType".into()))?;

        let mut resource = Resource::new(resource_type);

        if let Some(id) = object.get("id").and_then(Value::as_str) {
            resource = resource.with_id(id);
        }

        if let Some(meta) = object.get("meta") {
            if let Some(tags) = meta.get("tag") {
                resource.tags = serde_json::from_value(tags.clone()).map_err(invalid)?;
            }
            if let Some(tenant) = meta.get("tenant").and_then(Value::as_str) {
                resource.tenant = Some(tenant.to_string());
            }
        }

        if resource.is_bundle() {
            if let Some(bundle_type) = object.get("type") {
                resource.bundle_type =
                    Some(serde_json::from_value(bundle_type.clone()).map_err(invalid)?);
            }
            for entry in array(object.get("entry")) {
                if let Some(child) = entry.get("resource") {
                    resource.children.push(Resource::from_json(child)?);
                }
            }
        }

        if resource.is_parameters() {
            for parameter in array(object.get("parameter")) {
                collect_parameter(parameter, &mut resource.children)?;
            }
        }

        for contained in array(object.get("contained")) {
            resource.children.push(Resource::from_json(contained)?);
        }

        Ok(resource.into_ref())
    }
}

fn invalid(err: serde_json::Error) -> Error {
    Error::InvalidRequest(err.to_string())
}

fn array(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn collect_parameter(parameter: &Value, children: &mut Vec<ResourceRef>) -> Result<()> {
    if let Some(resource) = parameter.get("resource") {
        children.push(Resource::from_json(resource)?);
    }
    for part in array(parameter.get("part")) {
        collect_parameter(part, children)?;
    }
    Ok(())
}

/// Walks the resource graph below a root resource.
pub trait ResourceWalker: Send + Sync {
    /// Every populated resource reachable from `root`, pre-order, `root` first.
    fn all_resources(&self, root: &ResourceRef) -> Vec<ResourceRef>;
}

#[derive(Debug, Default)]
pub struct DefaultResourceWalker;

impl ResourceWalker for DefaultResourceWalker {
    fn all_resources(&self, root: &ResourceRef) -> Vec<ResourceRef> {
        let mut resources = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(next) = stack.pop() {
            stack.extend(next.children().iter().rev().cloned());
            resources.push(next);
        }
        resources
    }
}
