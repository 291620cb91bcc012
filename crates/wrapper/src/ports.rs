//! Port traits implemented by infrastructure crates.
//!
//! The wrapper knows nothing about HTTP, tokens, or proxies beyond the values it
//! passes through; the `github` crate supplies the concrete [`StatusClient`].

use async_trait::async_trait;

use crate::{Account, ClientError, CommitSha, CredentialsId, RepositoryName, StatusUpdate};

/// Everything needed to look up a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub api_url: String,
    pub credentials_id: Option<CredentialsId>,
    pub account: Account,
    pub repo: RepositoryName,
    /// Proxy to reach `api_url` through, already selected for that host.
    pub proxy: Option<String>,
}

/// Commit-status operations against a GitHub-compatible API.
///
/// Handles are owned by one lifecycle invocation and never persisted.
#[async_trait]
pub trait StatusClient: Send + Sync {
    /// Validated repository handle.
    type Repository: Send + Sync;
    /// Validated commit handle.
    type Commit: Send + Sync;

    /// Looks up a repository, validating credentials on the way.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] if the repository does not exist or is not
    /// visible; [`ClientError::Auth`] if the credentials are unknown or rejected.
    async fn resolve_repository(
        &self,
        target: &RepositoryTarget,
    ) -> Result<Self::Repository, ClientError>;

    /// Looks up a commit within a resolved repository.
    async fn resolve_commit(
        &self,
        repository: &Self::Repository,
        sha: &CommitSha,
    ) -> Result<Self::Commit, ClientError>;

    /// Attaches a status to a commit.
    async fn set_status(
        &self,
        repository: &Self::Repository,
        commit: &Self::Commit,
        update: &StatusUpdate,
    ) -> Result<(), ClientError>;
}
