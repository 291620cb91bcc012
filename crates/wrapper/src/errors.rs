//! Error taxonomy for the commit-status wrapper.
//!
//! [`WrapperError`] is what a caller of the lifecycle sees. Its variants map
//! one-to-one to the stage at which an invocation stopped:
//!
//! | Variant | Stage | Status calls made |
//! |---------|-------|-------------------|
//! | [`WrapperError::Resolution`] | context resolution | none |
//! | [`WrapperError::Setup`] | repository / commit lookup | none |
//! | [`WrapperError::Stopped`] | stop before the work started | none, or PENDING only |
//! | [`WrapperError::StatusUpdate`] | PENDING or SUCCESS update | PENDING (+ SUCCESS) |
//! | [`WrapperError::Work`] | enclosed work failed | PENDING + FAILURE |
//! | [`WrapperError::WorkAndStatusUpdate`] | work failed, FAILURE update failed | PENDING + FAILURE |
//!
//! Port-level errors ([`ClientError`]) and the work's own failure
//! ([`WorkError`]) are carried inside, never flattened into strings.

use thiserror::Error;

use crate::{CommitState, StopCause};

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Message used when account or repository cannot be determined.
pub const UNABLE_TO_INFER_DATA: &str =
    "Unable to infer git data, please specify repo, credentialsId, account and sha values";

/// Message used when no commit SHA can be determined.
pub const UNABLE_TO_INFER_COMMIT: &str = "Could not infer exact commit to use, please specify one";

/// Message used when credentials inference itself breaks.
pub const UNABLE_TO_INFER_CREDENTIALS_ID: &str =
    "Can not infer exact credentialsId to use, please specify one";

/// The context field a resolution failure relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    CredentialsId,
    Account,
    Repo,
    Sha,
}

impl std::fmt::Display for ContextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CredentialsId => "credentialsId",
            Self::Account => "account",
            Self::Repo => "repo",
            Self::Sha => "sha",
        })
    }
}

/// A build-metadata source could not answer a question it was asked.
///
/// Distinct from "nothing to infer" (which is `Ok(None)` on
/// [`BuildMetadata`](crate::BuildMetadata)): this is a broken source, such as an
/// origin URL that does not name a repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InferenceError {
    /// Description of what went wrong while inferring.
    pub message: String,
}

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Required context could not be determined from any source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolutionError {
    /// The field that could not be resolved.
    pub field: ContextField,
    /// User-facing message naming what to configure.
    pub message: String,
    /// The inference failure that led here, if any.
    #[source]
    pub cause: Option<InferenceError>,
}

impl ResolutionError {
    pub(crate) fn new(
        field: ContextField,
        message: &str,
        cause: Option<InferenceError>,
    ) -> Self {
        Self {
            field,
            message: message.to_owned(),
            cause,
        }
    }
}

// ---------------------------------------------------------------------------
// Status client port
// ---------------------------------------------------------------------------

/// Errors returned by a [`StatusClient`](crate::StatusClient) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The repository or commit does not exist (or is invisible to the
    /// credentials in use).
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Credentials are missing, unknown, or rejected.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The request never produced an HTTP response.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The API answered with an unexpected status code.
    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered with a body that could not be understood.
    #[error("Invalid response from GitHub API: {message}")]
    InvalidResponse { message: String },

    /// The call did not finish within the time allowed after a stop request.
    #[error("Timed out after stop was requested")]
    TimedOut,
}

// ---------------------------------------------------------------------------
// Enclosed work
// ---------------------------------------------------------------------------

/// The enclosed work's own failure.
///
/// Not a fault of the wrapper; it selects the FAILURE terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    /// The work ran to completion and reported failure.
    #[error("Enclosed work failed: {message}")]
    Failed {
        message: String,
        /// Process exit code, when the work was an external command.
        exit_code: Option<i32>,
    },

    /// The work unwound because a stop was requested.
    #[error("Enclosed work was stopped: {cause}")]
    Stopped { cause: StopCause },
}

impl WorkError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            exit_code: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

/// Which lookup failed during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Repository,
    Commit,
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Repository => "repository",
            Self::Commit => "commit",
        })
    }
}

/// Errors surfaced by one wrapper invocation.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// Account, repository, or SHA could not be determined.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Repository or commit lookup failed; PENDING was never sent.
    #[error("Unable to resolve {stage}: {source}")]
    Setup {
        stage: SetupStage,
        #[source]
        source: ClientError,
    },

    /// A PENDING or SUCCESS update failed.
    ///
    /// For PENDING the work never started. For SUCCESS the work itself
    /// succeeded; see [`WrapperError::work_succeeded`].
    #[error("Failed to set {state} status: {source}")]
    StatusUpdate {
        state: CommitState,
        #[source]
        source: ClientError,
    },

    /// The enclosed work failed and FAILURE was recorded.
    #[error(transparent)]
    Work(WorkError),

    /// The enclosed work failed and recording FAILURE failed too.
    #[error("{work} (additionally, failed to set {state} status: {status})")]
    WorkAndStatusUpdate {
        #[source]
        work: WorkError,
        state: CommitState,
        status: ClientError,
    },

    /// A stop arrived before the enclosed work started.
    #[error("Stopped before the enclosed work started: {cause}")]
    Stopped { cause: StopCause },
}

impl WrapperError {
    /// Returns `true` when the enclosed work succeeded but the invocation still
    /// failed because its SUCCESS status could not be recorded.
    pub fn work_succeeded(&self) -> bool {
        matches!(
            self,
            Self::StatusUpdate {
                state: CommitState::Success,
                ..
            }
        )
    }

    /// Returns the enclosed work's own failure, if it failed.
    pub fn work_error(&self) -> Option<&WorkError> {
        match self {
            Self::Work(work) | Self::WorkAndStatusUpdate { work, .. } => Some(work),
            _ => None,
        }
    }

    /// Returns the status-update failure, if one occurred.
    pub fn status_error(&self) -> Option<&ClientError> {
        match self {
            Self::StatusUpdate { source, .. } => Some(source),
            Self::WorkAndStatusUpdate { status, .. } => Some(status),
            _ => None,
        }
    }
}
