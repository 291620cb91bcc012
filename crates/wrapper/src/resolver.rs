//! Context resolution: explicit values first, then build metadata, then the
//! environment.
//!
//! Resolution runs once, before any network call, and has no side effects.
//! Per field:
//!
//! | Field | Order | On failure |
//! |-------|-------|------------|
//! | `credentialsId` | explicit → build credentials | anonymous (legal) |
//! | `account`, `repo` | explicit → source-control origin | [`ResolutionError`] |
//! | `sha` | explicit → PR head → checkout → `GIT_COMMIT` | [`ResolutionError`] |
//! | `targetUrl` | explicit → build result URL | no target URL |
//! | `gitApiUrl` | explicit → [`DEFAULT_API_URL`] | - |
//! | `gitHubContext` | explicit → [`DEFAULT_STATUS_LABEL`](crate::DEFAULT_STATUS_LABEL) | - |

use crate::context::non_empty;
use crate::errors::{UNABLE_TO_INFER_COMMIT, UNABLE_TO_INFER_CREDENTIALS_ID, UNABLE_TO_INFER_DATA};
use crate::{
    Account, CommitSha, ContextField, CredentialsId, EnvironmentLookup, InferenceError,
    PartialContext, RepositoryName, ResolutionError, StatusContext, StatusLabel, DEFAULT_API_URL,
};

/// Environment variable consulted when no commit can be inferred from build
/// metadata.
pub const COMMIT_FALLBACK_VAR: &str = "GIT_COMMIT";

/// Owner and repository parsed from a source-control origin URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    pub account: String,
    pub repo: String,
}

/// Facts the host build system can supply about the current build.
///
/// `Ok(None)` means the host has nothing to offer; `Err` means the host tried
/// and failed.
pub trait BuildMetadata: Send + Sync {
    /// URL of the build's configured source-control origin.
    fn source_origin(&self) -> Result<Option<String>, InferenceError>;

    /// Tip commit of the pull request being built, if this is a PR build.
    fn pull_request_head_sha(&self) -> Result<Option<String>, InferenceError>;

    /// Revision checked out for the build (a merge commit for PR builds).
    fn checkout_sha(&self) -> Result<Option<String>, InferenceError>;

    /// Credentials configured for the build's source control.
    fn credentials_id(&self) -> Result<Option<String>, InferenceError>;

    /// URL of this build's result page.
    fn result_url(&self) -> Option<String>;

    fn infer_account(&self) -> Result<Option<String>, InferenceError> {
        Ok(self.infer_coordinates()?.map(|c| c.account))
    }

    fn infer_repo(&self) -> Result<Option<String>, InferenceError> {
        Ok(self.infer_coordinates()?.map(|c| c.repo))
    }

    /// The commit to report on, preferring the PR head over the checkout.
    fn infer_commit_sha(&self) -> Result<Option<String>, InferenceError> {
        match non_empty(self.pull_request_head_sha()?) {
            Some(head) => Ok(Some(head)),
            None => Ok(non_empty(self.checkout_sha()?)),
        }
    }

    fn infer_coordinates(&self) -> Result<Option<RepositoryCoordinates>, InferenceError> {
        match non_empty(self.source_origin()?) {
            Some(origin) => parse_origin(&origin).map(Some),
            None => Ok(None),
        }
    }
}

/// Extracts owner and repository from a git remote URL.
///
/// Accepts `https://host/owner/repo(.git)`, `ssh://git@host[:port]/owner/repo`,
/// and scp-style `git@host:owner/repo(.git)`. Only the last two path segments
/// are used, so GitHub Enterprise path prefixes are tolerated.
pub fn parse_origin(origin: &str) -> Result<RepositoryCoordinates, InferenceError> {
    let trimmed = origin.trim();
    let path = if let Some((_, rest)) = trimmed.split_once("://") {
        rest.split_once('/').map(|(_, path)| path).unwrap_or("")
    } else if let Some((_, path)) = trimmed.split_once(':') {
        path
    } else {
        trimmed
    };

    let mut segments = path
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(repo), Some(account)) => Ok(RepositoryCoordinates {
            account: account.to_string(),
            repo: repo.to_string(),
        }),
        _ => Err(InferenceError::new(format!(
            "origin '{trimmed}' does not name an owner and repository"
        ))),
    }
}

/// Resolves the status context for one invocation.
pub fn resolve(
    explicit: &PartialContext,
    env: &dyn EnvironmentLookup,
    metadata: &dyn BuildMetadata,
) -> Result<StatusContext, ResolutionError> {
    let credentials_id = match non_empty(explicit.credentials_id.clone()) {
        Some(id) => CredentialsId::new(id),
        None => metadata
            .credentials_id()
            .map_err(|e| {
                ResolutionError::new(
                    ContextField::CredentialsId,
                    UNABLE_TO_INFER_CREDENTIALS_ID,
                    Some(e),
                )
            })?
            .and_then(CredentialsId::new),
    };

    // One origin lookup serves both account and repo.
    let coordinates = if non_empty(explicit.account.clone()).is_some()
        && non_empty(explicit.repo.clone()).is_some()
    {
        Ok(None)
    } else {
        metadata.infer_coordinates()
    };

    let account = resolve_required(
        explicit.account.clone(),
        || coordinates.clone().map(|c| c.map(|c| c.account)),
        ContextField::Account,
    )?;
    let account = Account::new(account).ok_or_else(|| unable_to_infer(ContextField::Account))?;

    let repo = resolve_required(
        explicit.repo.clone(),
        || coordinates.clone().map(|c| c.map(|c| c.repo)),
        ContextField::Repo,
    )?;
    let repo = RepositoryName::new(repo).ok_or_else(|| unable_to_infer(ContextField::Repo))?;

    let sha = resolve_sha(explicit, env, metadata)?;

    let target_url =
        non_empty(explicit.target_url.clone()).or_else(|| non_empty(metadata.result_url()));

    let api_url = non_empty(explicit.git_api_url.clone())
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let status_label = non_empty(explicit.git_hub_context.clone())
        .and_then(StatusLabel::new)
        .unwrap_or_default();

    let context = StatusContext {
        credentials_id,
        api_url,
        account,
        repo,
        sha,
        description: non_empty(explicit.description.clone()),
        target_url,
        status_label,
    };
    tracing::debug!(
        repository = %context.full_name(),
        sha = %context.sha,
        label = %context.status_label,
        anonymous = context.credentials_id.is_none(),
        "Resolved status context"
    );
    Ok(context)
}

fn unable_to_infer(field: ContextField) -> ResolutionError {
    ResolutionError::new(field, UNABLE_TO_INFER_DATA, None)
}

fn resolve_required(
    explicit: Option<String>,
    infer: impl FnOnce() -> Result<Option<String>, InferenceError>,
    field: ContextField,
) -> Result<String, ResolutionError> {
    if let Some(value) = non_empty(explicit) {
        return Ok(value);
    }
    match infer() {
        Ok(value) => non_empty(value).ok_or_else(|| unable_to_infer(field)),
        Err(e) => Err(ResolutionError::new(field, UNABLE_TO_INFER_DATA, Some(e))),
    }
}

fn resolve_sha(
    explicit: &PartialContext,
    env: &dyn EnvironmentLookup,
    metadata: &dyn BuildMetadata,
) -> Result<CommitSha, ResolutionError> {
    if let Some(sha) = non_empty(explicit.sha.clone()).and_then(CommitSha::new) {
        return Ok(sha);
    }
    // A broken metadata source still allows the environment fallback; its
    // error is kept as the cause if that fallback is absent too.
    let (inferred, cause) = match metadata.infer_commit_sha() {
        Ok(sha) => (sha, None),
        Err(e) => {
            tracing::debug!(error = %e, "Commit inference from build metadata failed");
            (None, Some(e))
        }
    };
    inferred
        .or_else(|| env.get_non_empty(COMMIT_FALLBACK_VAR))
        .and_then(CommitSha::new)
        .ok_or_else(|| ResolutionError::new(ContextField::Sha, UNABLE_TO_INFER_COMMIT, cause))
}
