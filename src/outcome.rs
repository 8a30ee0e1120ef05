use std::error::Error as _;

use serde::Serialize;
use tracing::{error, warn};

use crate::broadcaster::Hook;
use crate::pointcut::{HookFlow, HookParams};
use crate::resource::OPERATION_OUTCOME;
use crate::{Error, Result};

/// Issue code used for every failure reported by the server.
pub const PROCESSING: &str = "processing";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// Body returned to the client when a request fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    resource_type: &'static str,
    issue: Vec<Issue>,
    #[serde(skip)]
    status: u16,
}

impl OperationOutcome {
    pub fn new(status: u16) -> Self {
        Self {
            resource_type: OPERATION_OUTCOME,
            issue: Vec::new(),
            status,
        }
    }

    /// Single `error` issue carrying the error's message.
    pub fn from_error(error: &Error) -> Self {
        let mut outcome = Self::new(error.status_code());
        outcome.add_issue(IssueSeverity::Error, error.to_string());
        outcome
    }

    pub fn add_issue(&mut self, severity: IssueSeverity, diagnostics: impl Into<String>) {
        self.issue.push(Issue {
            severity,
            code: PROCESSING.to_string(),
            diagnostics: Some(diagnostics.into()),
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issue
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

/// Translates request failures into an [`OperationOutcome`] and ends
/// exception handling.
///
/// Messages of client errors are logged at `warn`; server errors at `error`.
#[derive(Debug, Default)]
pub struct ExceptionHandlingInterceptor {
    include_source_chain: bool,
}

impl ExceptionHandlingInterceptor {
    pub const ID: &'static str = "exception-handling";

    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the error's source chain to the diagnostics. Helps diagnose
    /// failures but exposes internals to the caller.
    pub fn with_source_chain(mut self, include: bool) -> Self {
        self.include_source_chain = include;
        self
    }

    pub fn outcome_for(&self, err: &Error) -> OperationOutcome {
        let status = err.status_code();
        if status < 500 {
            warn!(status, "Failure during REST processing: {}", err);
        } else {
            error!(status, error = ?err, "Failure during REST processing");
        }

        if !self.include_source_chain {
            return OperationOutcome::from_error(err);
        }

        let mut diagnostics = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            diagnostics.push_str("\n\nCaused by: ");
            diagnostics.push_str(&cause.to_string());
            source = cause.source();
        }
        let mut outcome = OperationOutcome::new(status);
        outcome.add_issue(IssueSeverity::Error, diagnostics);
        outcome
    }
}

impl Hook for ExceptionHandlingInterceptor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn invoke(&self, params: &mut HookParams<'_>) -> Result<HookFlow> {
        match params {
            HookParams::HandleException { error, outcome, .. } => {
                // an earlier hook already produced a response
                if outcome.is_none() {
                    **outcome = Some(self.outcome_for(error));
                }
                Ok(HookFlow::Stop)
            }
            _ => Ok(HookFlow::Continue),
        }
    }
}
