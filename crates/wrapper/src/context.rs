//! Explicit configuration and the fully resolved status context.

use serde::{Deserialize, Serialize};

use crate::{Account, CommitSha, CredentialsId, RepositoryName, StatusLabel};

/// API endpoint used when no GitHub Enterprise URL is configured.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Status label used when none is configured.
pub const DEFAULT_STATUS_LABEL: &str = "gitStatusWrapper";

// Names of the entries exposed to the enclosed work.
pub const ENV_CONTEXT: &str = "GIT_STATUS_CONTEXT";
pub const ENV_ACCOUNT: &str = "GIT_STATUS_ACCOUNT";
pub const ENV_REPO: &str = "GIT_STATUS_REPO";
pub const ENV_SHA: &str = "GIT_STATUS_SHA";
pub const ENV_TARGET_URL: &str = "GIT_STATUS_TARGET_URL";
pub const ENV_API_URL: &str = "GIT_STATUS_API_URL";

/// The caller-supplied configuration surface.
///
/// Every field is optional; empty strings count as unset. Field names follow
/// the step's historical parameter names so configuration files written for it
/// keep working.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialContext {
    pub git_hub_context: Option<String>,
    pub git_api_url: Option<String>,
    pub credentials_id: Option<String>,
    pub account: Option<String>,
    pub repo: Option<String>,
    pub sha: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
}

impl PartialContext {
    /// Fills every unset field of `self` from `fallback`.
    ///
    /// Used to layer command-line values over a configuration file.
    pub fn or(self, fallback: PartialContext) -> Self {
        fn pick(primary: Option<String>, fallback: Option<String>) -> Option<String> {
            non_empty(primary).or_else(|| non_empty(fallback))
        }
        Self {
            git_hub_context: pick(self.git_hub_context, fallback.git_hub_context),
            git_api_url: pick(self.git_api_url, fallback.git_api_url),
            credentials_id: pick(self.credentials_id, fallback.credentials_id),
            account: pick(self.account, fallback.account),
            repo: pick(self.repo, fallback.repo),
            sha: pick(self.sha, fallback.sha),
            description: pick(self.description, fallback.description),
            target_url: pick(self.target_url, fallback.target_url),
        }
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Fully resolved, immutable context for one invocation.
///
/// Built once by [`resolve`](crate::resolve); `account`, `repo` and `sha` are
/// guaranteed present by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusContext {
    pub credentials_id: Option<CredentialsId>,
    pub api_url: String,
    pub account: Account,
    pub repo: RepositoryName,
    pub sha: CommitSha,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub status_label: StatusLabel,
}

impl StatusContext {
    /// Returns `"account/repo"`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.account, self.repo)
    }

    /// Entries exposed to the enclosed work while it runs.
    ///
    /// Credentials are deliberately absent.
    pub fn environment_overrides(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            (ENV_CONTEXT.to_string(), self.status_label.to_string()),
            (ENV_ACCOUNT.to_string(), self.account.to_string()),
            (ENV_REPO.to_string(), self.repo.to_string()),
            (ENV_SHA.to_string(), self.sha.to_string()),
            (ENV_API_URL.to_string(), self.api_url.clone()),
        ];
        if let Some(url) = &self.target_url {
            entries.push((ENV_TARGET_URL.to_string(), url.clone()));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_values_win_over_file_values() {
        let flags = PartialContext {
            repo: Some("widget".into()),
            sha: Some(String::new()),
            ..Default::default()
        };
        let file = PartialContext {
            repo: Some("gadget".into()),
            sha: Some("abc123".into()),
            account: Some("acme".into()),
            ..Default::default()
        };

        let merged = flags.or(file);
        assert_eq!(merged.repo.as_deref(), Some("widget"));
        assert_eq!(merged.sha.as_deref(), Some("abc123"));
        assert_eq!(merged.account.as_deref(), Some("acme"));
        assert_eq!(merged.target_url, None);
    }
}
