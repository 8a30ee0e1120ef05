//! Extension points fired by the server during request processing.
//!
//! Every [`Pointcut`] has exactly one argument shape, carried by the matching
//! [`HookParams`] variant. Hooks match on the variant they care about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::outcome::OperationOutcome;
use crate::{Error, RequestDetails, ResourceRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pointcut {
    /// Before routing. Hooks may stop processing.
    ServerIncomingRequestPreProcessed,
    /// After routing, before the handler method runs.
    ServerIncomingRequestPreHandled,
    /// Resources fetched from storage, before they are shown.
    StoragePreshowResources,
    /// Final response payload, before it is serialized.
    ServerOutgoingResponse,
    StoragePrestorageResourceCreated,
    StoragePrestorageResourceUpdated,
    StoragePrestorageResourceDeleted,
    /// A conflicting resource is about to be removed by a cascading delete.
    StorageCascadeDelete,
    StoragePreDeleteExpunge,
    StorageInitiateBulkExport,
    /// A request failed. Hooks may stop further handling.
    ServerHandleException,
}

impl Pointcut {
    /// Whether a hook may end dispatch early by returning [`HookFlow::Stop`].
    pub fn is_stoppable(self) -> bool {
        matches!(
            self,
            Pointcut::ServerIncomingRequestPreProcessed | Pointcut::ServerHandleException
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Pointcut::ServerIncomingRequestPreProcessed => "SERVER_INCOMING_REQUEST_PRE_PROCESSED",
            Pointcut::ServerIncomingRequestPreHandled => "SERVER_INCOMING_REQUEST_PRE_HANDLED",
            Pointcut::StoragePreshowResources => "STORAGE_PRESHOW_RESOURCES",
            Pointcut::ServerOutgoingResponse => "SERVER_OUTGOING_RESPONSE",
            Pointcut::StoragePrestorageResourceCreated => "STORAGE_PRESTORAGE_RESOURCE_CREATED",
            Pointcut::StoragePrestorageResourceUpdated => "STORAGE_PRESTORAGE_RESOURCE_UPDATED",
            Pointcut::StoragePrestorageResourceDeleted => "STORAGE_PRESTORAGE_RESOURCE_DELETED",
            Pointcut::StorageCascadeDelete => "STORAGE_CASCADE_DELETE",
            Pointcut::StoragePreDeleteExpunge => "STORAGE_PRE_DELETE_EXPUNGE",
            Pointcut::StorageInitiateBulkExport => "STORAGE_INITIATE_BULK_EXPORT",
            Pointcut::ServerHandleException => "SERVER_HANDLE_EXCEPTION",
        }
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a hook asks the broadcaster to do next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    /// Skip the remaining hooks. Honored only by stoppable pointcuts.
    Stop,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportStyle {
    System,
    Patient,
    Group,
}

/// Parameters of a `$export` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkExportParameters {
    pub export_style: ExportStyle,
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub patient_ids: Vec<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl BulkExportParameters {
    pub fn system() -> Self {
        Self {
            export_style: ExportStyle::System,
            resource_types: Vec::new(),
            patient_ids: Vec::new(),
            group_id: None,
        }
    }

    pub fn patients<I, S>(patient_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            export_style: ExportStyle::Patient,
            patient_ids: patient_ids.into_iter().map(Into::into).collect(),
            ..Self::system()
        }
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            export_style: ExportStyle::Group,
            group_id: Some(group_id.into()),
            ..Self::system()
        }
    }
}

/// Arguments passed to the hooks of one pointcut.
#[derive(Debug)]
pub enum HookParams<'a> {
    IncomingRequestPreProcessed {
        request: &'a mut RequestDetails,
    },
    IncomingRequestPreHandled {
        request: &'a mut RequestDetails,
    },
    PreshowResources {
        request: &'a mut RequestDetails,
        resources: &'a [ResourceRef],
    },
    OutgoingResponse {
        request: &'a mut RequestDetails,
        response: Option<&'a ResourceRef>,
    },
    ResourceCreated {
        request: &'a mut RequestDetails,
        resource: &'a ResourceRef,
    },
    ResourceUpdated {
        request: &'a mut RequestDetails,
        old_resource: Option<&'a ResourceRef>,
        new_resource: &'a ResourceRef,
    },
    ResourceDeleted {
        request: &'a mut RequestDetails,
        resource: &'a ResourceRef,
    },
    CascadeDelete {
        request: &'a mut RequestDetails,
        resource: &'a ResourceRef,
    },
    PreDeleteExpunge {
        request: &'a mut RequestDetails,
    },
    InitiateBulkExport {
        request: &'a mut RequestDetails,
        parameters: &'a BulkExportParameters,
    },
    HandleException {
        request: &'a mut RequestDetails,
        error: &'a Error,
        outcome: &'a mut Option<OperationOutcome>,
    },
}

impl<'a> HookParams<'a> {
    pub fn pointcut(&self) -> Pointcut {
        match self {
            HookParams::IncomingRequestPreProcessed { .. } => {
                Pointcut::ServerIncomingRequestPreProcessed
            }
            HookParams::IncomingRequestPreHandled { .. } => Pointcut::ServerIncomingRequestPreHandled,
            HookParams::PreshowResources { .. } => Pointcut::StoragePreshowResources,
            HookParams::OutgoingResponse { .. } => Pointcut::ServerOutgoingResponse,
            HookParams::ResourceCreated { .. } => Pointcut::StoragePrestorageResourceCreated,
            HookParams::ResourceUpdated { .. } => Pointcut::StoragePrestorageResourceUpdated,
            HookParams::ResourceDeleted { .. } => Pointcut::StoragePrestorageResourceDeleted,
            HookParams::CascadeDelete { .. } => Pointcut::StorageCascadeDelete,
            HookParams::PreDeleteExpunge { .. } => Pointcut::StoragePreDeleteExpunge,
            HookParams::InitiateBulkExport { .. } => Pointcut::StorageInitiateBulkExport,
            HookParams::HandleException { .. } => Pointcut::ServerHandleException,
        }
    }

    pub fn request(&self) -> &RequestDetails {
        match self {
            HookParams::IncomingRequestPreProcessed { request }
            | HookParams::IncomingRequestPreHandled { request }
            | HookParams::PreshowResources { request, .. }
            | HookParams::OutgoingResponse { request, .. }
            | HookParams::ResourceCreated { request, .. }
            | HookParams::ResourceUpdated { request, .. }
            | HookParams::ResourceDeleted { request, .. }
            | HookParams::CascadeDelete { request, .. }
            | HookParams::PreDeleteExpunge { request }
            | HookParams::InitiateBulkExport { request, .. }
            | HookParams::HandleException { request, .. } => request,
        }
    }
}
