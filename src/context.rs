use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::{IdType, OperationKind, ResourceRef};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque token namespacing one engine instance's entries in [`UserData`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InstanceToken(u64);

impl InstanceToken {
    pub fn generate() -> Self {
        InstanceToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UserDataKey {
    token: InstanceToken,
    slot: &'static str,
}

impl UserDataKey {
    pub fn new(token: InstanceToken, slot: &'static str) -> Self {
        Self { token, slot }
    }
}

/// Request-scoped key/value storage, dropped together with the request.
#[derive(Default)]
pub struct UserData {
    entries: HashMap<UserDataKey, Box<dyn Any + Send + Sync>>,
}

impl UserData {
    pub fn get<T: Any>(&self, key: &UserDataKey) -> Option<&T> {
        self.entries.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: UserDataKey, value: T) {
        self.entries.insert(key, Box::new(value));
    }

    /// Returns the entry under `key`, creating it with `init` on first use.
    ///
    /// `init` runs at most once per key and type; its error is returned
    /// without storing anything.
    pub fn get_or_try_insert_with<T, E, F>(&mut self, key: UserDataKey, init: F) -> Result<&mut T, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        let present = self.entries.get(&key).map_or(false, |value| value.is::<T>());
        if !present {
            let value = init()?;
            self.entries.insert(key, Box::new(value));
        }
        match self.entries.get_mut(&key).and_then(|value| value.downcast_mut()) {
            Some(value) => Ok(value),
            None => unreachable!("user data entry was stored above"),
        }
    }

    pub fn contains_key(&self, key: &UserDataKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Everything the engine knows about the request being processed.
///
/// A fresh instance is created for every request, including requests that
/// resume a page of an earlier search; nothing here is shared between them.
#[derive(Debug)]
pub struct RequestDetails {
    operation: OperationKind,
    request_id: Option<String>,
    resource_name: Option<String>,
    id: Option<IdType>,
    resource: Option<ResourceRef>,
    tenant_id: Option<String>,
    attributes: HashMap<String, Value>,
    user_data: UserData,
}

impl RequestDetails {
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            request_id: None,
            resource_name: None,
            id: None,
            resource: None,
            tenant_id: None,
            attributes: HashMap::new(),
            user_data: UserData::default(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_resource_name(mut self, resource_name: impl Into<String>) -> Self {
        self.resource_name = Some(resource_name.into());
        self
    }

    pub fn with_id(mut self, id: IdType) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    pub fn id(&self) -> Option<&IdType> {
        self.id.as_ref()
    }

    pub fn resource(&self) -> Option<&ResourceRef> {
        self.resource.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }
}
