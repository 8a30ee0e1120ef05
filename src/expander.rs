use std::sync::Arc;

use tracing::debug;

use crate::resource::{ResourceWalker, OPERATION_OUTCOME};
use crate::{OperationKind, Resource, ResourceRef};

/// Flattens a response payload into the resources that are authorized one
/// by one.
pub struct ResourceExpander {
    walker: Arc<dyn ResourceWalker>,
}

impl ResourceExpander {
    pub fn new(walker: Arc<dyn ResourceWalker>) -> Self {
        Self { walker }
    }

    /// Resources in `payload` that need an independent check for an
    /// operation of `kind` on `resource_name`.
    pub fn expand(
        &self,
        payload: &ResourceRef,
        kind: OperationKind,
        resource_name: Option<&str>,
    ) -> Vec<ResourceRef> {
        if !kind.returns_container() {
            return vec![payload.clone()];
        }

        let resources = if examine_children(payload) {
            self.members(payload)
        } else {
            single_excluding_outcome(payload, kind, resource_name)
        };

        debug!(
            resource_type = payload.resource_type(),
            operation = %kind,
            count = resources.len(),
            "expanded response payload"
        );
        resources
    }

    /// Every nested resource except the container itself. Nested
    /// `OperationOutcome`s are never authorized.
    pub fn members(&self, container: &ResourceRef) -> Vec<ResourceRef> {
        let mut resources = self.walker.all_resources(container);
        if resources
            .first()
            .map_or(false, |first| Arc::ptr_eq(first, container))
        {
            resources.remove(0);
        }
        resources.retain(|resource| !resource.is_operation_outcome());
        resources
    }
}

/// Parameters are always opened up; bundles are unless their type is
/// standalone (document, message).
pub fn examine_children(resource: &Resource) -> bool {
    if resource.is_parameters() {
        return true;
    }
    if resource.is_bundle() {
        let standalone = resource
            .bundle_type()
            .map_or(false, |bundle_type| bundle_type.is_standalone());
        return !standalone;
    }
    false
}

fn single_excluding_outcome(
    payload: &ResourceRef,
    kind: OperationKind,
    resource_name: Option<&str>,
) -> Vec<ResourceRef> {
    let excluded = payload.is_operation_outcome()
        && kind.excludes_operation_outcome()
        && resource_name.map_or(false, |name| name != OPERATION_OUTCOME);
    if excluded {
        Vec::new()
    } else {
        vec![payload.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BundleType, DefaultResourceWalker};
    use test_case::test_case;

    fn expander() -> ResourceExpander {
        ResourceExpander::new(Arc::new(DefaultResourceWalker))
    }

    fn types(resources: &[ResourceRef]) -> Vec<&str> {
        resources.iter().map(|r| r.resource_type()).collect()
    }

    #[test]
    fn searchset_expands_to_members_without_outcome() {
        let patient = Resource::new("Patient").with_id("1").into_ref();
        let bundle = Resource::bundle(
            BundleType::Searchset,
            vec![
                patient.clone(),
                Resource::new("Patient").with_id("2").into_ref(),
                Resource::new("Patient").with_id("3").into_ref(),
                Resource::new("OperationOutcome").into_ref(),
            ],
        )
        .into_ref();

        let resources = expander().expand(&bundle, OperationKind::SearchType, Some("Patient"));
        assert_eq!(vec!["Patient", "Patient", "Patient"], types(&resources));
        assert!(Arc::ptr_eq(&patient, &resources[0]));
    }

    #[test_case(BundleType::Document; "document")]
    #[test_case(BundleType::Message; "message")]
    fn standalone_bundle_is_checked_as_a_unit(bundle_type: BundleType) {
        let bundle = Resource::bundle(
            bundle_type,
            vec![
                Resource::new("Composition").into_ref(),
                Resource::new("Patient").into_ref(),
            ],
        )
        .into_ref();

        let resources = expander().expand(&bundle, OperationKind::SearchType, Some("Bundle"));
        assert_eq!(1, resources.len());
        assert!(Arc::ptr_eq(&bundle, &resources[0]));
    }

    #[test]
    fn parameters_always_expand_recursively() {
        let nested = Resource::new("Observation")
            .with_child(Resource::new("Device").into_ref())
            .into_ref();
        let parameters = Resource::parameters(vec![
            Resource::new("Patient").into_ref(),
            nested,
            Resource::new("OperationOutcome").into_ref(),
        ])
        .into_ref();

        let resources =
            expander().expand(&parameters, OperationKind::ExtendedOperationType, None);
        assert_eq!(vec!["Patient", "Observation", "Device"], types(&resources));
    }

    #[test]
    fn non_container_operations_return_payload() {
        let bundle = Resource::bundle(
            BundleType::Searchset,
            vec![Resource::new("Patient").into_ref()],
        )
        .into_ref();

        let resources = expander().expand(&bundle, OperationKind::Read, Some("Bundle"));
        assert_eq!(vec!["Bundle"], types(&resources));
    }

    #[test_case(OperationKind::SearchType, Some("Patient") => 0; "search excludes outcome")]
    #[test_case(OperationKind::GetPage, Some("Patient") => 0; "page excludes outcome")]
    #[test_case(OperationKind::SearchType, Some("OperationOutcome") => 1; "search for outcomes")]
    #[test_case(OperationKind::SearchSystem, None => 1; "system search without name")]
    #[test_case(OperationKind::HistoryType, Some("Patient") => 0; "type history excludes outcome")]
    #[test_case(OperationKind::HistoryInstance, Some("Patient") => 1; "instance history keeps outcome")]
    #[test_case(OperationKind::Read, Some("Patient") => 1; "read keeps outcome")]
    fn plain_operation_outcome(kind: OperationKind, resource_name: Option<&str>) -> usize {
        let outcome = Resource::new("OperationOutcome").into_ref();
        expander().expand(&outcome, kind, resource_name).len()
    }
}
