use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use crate::context::{InstanceToken, UserDataKey};
use crate::{RequestDetails, ResourceRef};

const SLOT: &str = "seen-resources";

/// Resources already checked during the current request, keyed by identity.
///
/// Two equal but distinct instances are tracked separately. The tracker holds
/// a reference to every resource it has seen so an address is never reused
/// while the request is alive.
#[derive(Debug, Default)]
pub struct SeenResources {
    seen: HashMap<usize, ResourceRef>,
}

impl SeenResources {
    /// Returns `true` the first time `resource` is offered.
    pub fn mark(&mut self, resource: &ResourceRef) -> bool {
        let key = Arc::as_ptr(resource) as usize;
        if self.seen.contains_key(&key) {
            return false;
        }
        self.seen.insert(key, resource.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Request-scoped access to one engine instance's [`SeenResources`].
#[derive(Debug, Copy, Clone)]
pub struct SeenResourceTracker {
    key: UserDataKey,
}

impl SeenResourceTracker {
    pub fn new(token: InstanceToken) -> Self {
        Self {
            key: UserDataKey::new(token, SLOT),
        }
    }

    /// `true` if `resource` has not been checked yet in this request; the
    /// resource is recorded as checked.
    pub fn check_and_mark(&self, request: &mut RequestDetails, resource: &ResourceRef) -> bool {
        let seen = request
            .user_data_mut()
            .get_or_try_insert_with::<SeenResources, Infallible, _>(self.key, || {
                Ok(SeenResources::default())
            });
        match seen {
            Ok(seen) => seen.mark(resource),
            Err(never) => match never {},
        }
    }

    pub fn seen_count(&self, request: &RequestDetails) -> usize {
        request
            .user_data()
            .get::<SeenResources>(&self.key)
            .map_or(0, SeenResources::len)
    }
}
