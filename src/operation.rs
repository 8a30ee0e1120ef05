use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Classification of the action a request performs, as supplied by the router.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    AddTags,
    DeleteTags,
    GetTags,
    GetPage,
    GraphqlRequest,
    ExtendedOperationServer,
    ExtendedOperationType,
    ExtendedOperationInstance,
    Create,
    Delete,
    HistoryInstance,
    HistorySystem,
    HistoryType,
    Read,
    SearchSystem,
    SearchType,
    Transaction,
    Update,
    Validate,
    Vread,
    Metadata,
    MetaAdd,
    Meta,
    MetaDelete,
    Patch,
}

/// Which payloads of an operation must be authorized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Request body and target id.
    In,
    /// Response body.
    Out,
    Both,
    /// Operation is not subject to authorization.
    None,
}

impl Direction {
    pub fn examines_input(self) -> bool {
        matches!(self, Direction::In | Direction::Both)
    }

    pub fn examines_output(self) -> bool {
        matches!(self, Direction::Out | Direction::Both)
    }
}

impl OperationKind {
    pub fn code(self) -> &'static str {
        match self {
            OperationKind::AddTags => "add-tags",
            OperationKind::DeleteTags => "delete-tags",
            OperationKind::GetTags => "get-tags",
            OperationKind::GetPage => "get-page",
            OperationKind::GraphqlRequest => "graphql-request",
            OperationKind::ExtendedOperationServer => "extended-operation-server",
            OperationKind::ExtendedOperationType => "extended-operation-type",
            OperationKind::ExtendedOperationInstance => "extended-operation-instance",
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::HistoryInstance => "history-instance",
            OperationKind::HistorySystem => "history-system",
            OperationKind::HistoryType => "history-type",
            OperationKind::Read => "read",
            OperationKind::SearchSystem => "search-system",
            OperationKind::SearchType => "search-type",
            OperationKind::Transaction => "transaction",
            OperationKind::Update => "update",
            OperationKind::Validate => "validate",
            OperationKind::Vread => "vread",
            OperationKind::Metadata => "metadata",
            OperationKind::MetaAdd => "$meta-add",
            OperationKind::Meta => "$meta",
            OperationKind::MetaDelete => "$meta-delete",
            OperationKind::Patch => "patch",
        }
    }

    /// Fixed direction table.
    pub fn direction(self) -> Direction {
        match self {
            // legacy tag operations are not relevant
            OperationKind::AddTags | OperationKind::DeleteTags | OperationKind::GetTags => {
                Direction::None
            }

            OperationKind::ExtendedOperationInstance
            | OperationKind::ExtendedOperationServer
            | OperationKind::ExtendedOperationType => Direction::Both,

            // capability statement requests still need an explicit metadata rule
            OperationKind::Metadata => Direction::In,

            OperationKind::Delete => Direction::In,

            OperationKind::Create | OperationKind::Update | OperationKind::Patch => Direction::In,

            OperationKind::Meta | OperationKind::MetaAdd | OperationKind::MetaDelete => {
                Direction::None
            }

            OperationKind::GetPage
            | OperationKind::HistoryInstance
            | OperationKind::HistorySystem
            | OperationKind::HistoryType
            | OperationKind::Read
            | OperationKind::SearchSystem
            | OperationKind::SearchType
            | OperationKind::Vread => Direction::Out,

            OperationKind::Transaction => Direction::Both,

            OperationKind::Validate => Direction::None,

            OperationKind::GraphqlRequest => Direction::Both,
        }
    }

    /// Response payloads of these kinds are containers whose members are
    /// checked one by one.
    pub fn returns_container(self) -> bool {
        matches!(
            self,
            OperationKind::SearchSystem
                | OperationKind::SearchType
                | OperationKind::HistoryInstance
                | OperationKind::HistorySystem
                | OperationKind::HistoryType
                | OperationKind::Transaction
                | OperationKind::GetPage
                | OperationKind::ExtendedOperationServer
                | OperationKind::ExtendedOperationType
                | OperationKind::ExtendedOperationInstance
        )
    }

    /// Kinds whose plain `OperationOutcome` responses are not authorized
    /// unless the request explicitly targets `OperationOutcome`.
    pub fn excludes_operation_outcome(self) -> bool {
        matches!(
            self,
            OperationKind::SearchType
                | OperationKind::SearchSystem
                | OperationKind::HistorySystem
                | OperationKind::HistoryType
                | OperationKind::GetPage
        )
    }
}

/// Resolves the examination direction for an operation code reported by the
/// router. Unknown codes mean the table is missing a mapping.
pub fn resolve(code: &str) -> Result<Direction> {
    Ok(code.parse::<OperationKind>()?.direction())
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        let kind = match code {
            "add-tags" => OperationKind::AddTags,
            "delete-tags" => OperationKind::DeleteTags,
            "get-tags" => OperationKind::GetTags,
            "get-page" => OperationKind::GetPage,
            "graphql-request" => OperationKind::GraphqlRequest,
            "extended-operation-server" => OperationKind::ExtendedOperationServer,
            "extended-operation-type" => OperationKind::ExtendedOperationType,
            "extended-operation-instance" => OperationKind::ExtendedOperationInstance,
            "create" => OperationKind::Create,
            "delete" => OperationKind::Delete,
            "history-instance" => OperationKind::HistoryInstance,
            "history-system" => OperationKind::HistorySystem,
            "history-type" => OperationKind::HistoryType,
            "read" => OperationKind::Read,
            "search-system" => OperationKind::SearchSystem,
            "search-type" => OperationKind::SearchType,
            "transaction" => OperationKind::Transaction,
            "update" => OperationKind::Update,
            "validate" => OperationKind::Validate,
            "vread" => OperationKind::Vread,
            "metadata" => OperationKind::Metadata,
            "$meta-add" => OperationKind::MetaAdd,
            "$meta" => OperationKind::Meta,
            "$meta-delete" => OperationKind::MetaDelete,
            "patch" => OperationKind::Patch,
            other => return Err(Error::Classification(other.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
