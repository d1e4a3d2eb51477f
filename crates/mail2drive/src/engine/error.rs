use serde::Serialize;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::db::DatabaseError;
use crate::mailbox::MailboxError;
use crate::render::RenderError;
use crate::storage::UploadError;

/// Step of a run that can fail after the run record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStep {
    ResolveCredential,
    Search,
    ValidateDestination,
    Claim,
    Fetch,
    Render,
    Upload,
}

impl RunStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStep::ResolveCredential => "resolve_credential",
            RunStep::Search => "search",
            RunStep::ValidateDestination => "validate_destination",
            RunStep::Claim => "claim",
            RunStep::Fetch => "fetch",
            RunStep::Render => "render",
            RunStep::Upload => "upload",
        }
    }

    /// Code recorded when the collaborator gives nothing more specific.
    fn default_code(&self) -> &'static str {
        match self {
            RunStep::ResolveCredential => "credential_error",
            RunStep::Search => "search_failed",
            RunStep::ValidateDestination => "destination_missing",
            RunStep::Claim => "ledger_error",
            RunStep::Fetch => "fetch_failed",
            RunStep::Render => "render_failed",
            RunStep::Upload => "upload_failed",
        }
    }
}

/// A failure that ends a run. It is written to the run ledger and
/// returned to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{} failed: {}", .step.as_str(), .message)]
pub struct RunError {
    pub step: RunStep,
    pub message: String,
    pub code: Option<String>,
}

impl RunError {
    pub fn new(step: RunStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            code: Some(step.default_code().to_string()),
        }
    }

    /// Upstream HTTP statuses take precedence over the step code.
    fn with_status(step: RunStep, message: String, status: Option<u16>) -> Self {
        let code = match status {
            Some(status) => format!("http_{}", status),
            None => step.default_code().to_string(),
        };
        Self {
            step,
            message,
            code: Some(code),
        }
    }

    pub fn destination_missing() -> Self {
        Self::new(RunStep::ValidateDestination, "destination folder is not set on the rule")
    }

    /// Any claim failure other than a duplicate is a ledger failure.
    pub fn claim(err: &DatabaseError) -> Self {
        Self::new(RunStep::Claim, format!("claim failed: {}", err))
    }

    pub fn search(err: &MailboxError) -> Self {
        Self::with_status(RunStep::Search, err.to_string(), err.status())
    }

    pub fn fetch(err: &MailboxError) -> Self {
        Self::with_status(RunStep::Fetch, err.to_string(), err.status())
    }

    pub fn render(err: &RenderError) -> Self {
        Self::new(RunStep::Render, err.to_string())
    }

    pub fn upload(err: &UploadError) -> Self {
        Self::with_status(RunStep::Upload, err.to_string(), err.status())
    }
}

impl From<&CredentialError> for RunError {
    fn from(err: &CredentialError) -> Self {
        Self {
            step: RunStep::ResolveCredential,
            message: err.to_string(),
            code: Some(err.code().to_string()),
        }
    }
}

/// Failures that happen before a run record exists. None of them leave
/// anything in the ledgers.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Forbidden")]
    Forbidden,

    #[error("Rule not found: {0}")]
    NotFound(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] DatabaseError),
}
