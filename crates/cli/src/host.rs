//! The host build system as seen from a CI job: process environment, CI
//! provider variables, and the local git checkout.
//!
//! Supported providers, checked in this order:
//!
//! | Fact | GitHub Actions | Jenkins | Other |
//! |------|----------------|---------|-------|
//! | origin | `GITHUB_SERVER_URL` + `GITHUB_REPOSITORY` | `GIT_URL` | `git remote` |
//! | PR head | event payload `pull_request.head.sha` | `ghprbActualCommit` | - |
//! | checkout | `GITHUB_SHA` | - | `git rev-parse HEAD` |
//! | result URL | run URL | `BUILD_URL` | `CI_JOB_URL` |

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use serde::Deserialize;
use wrapper::{BuildMetadata, EnvironmentLookup, InferenceError};

/// Token variables probed, in order, when inferring a credentials id.
pub const TOKEN_VARIABLES: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentLookup for ProcessEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Deserialize)]
struct PullRequestEvent {
    pull_request: PullRequestPayload,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    head: PullRequestHead,
}

#[derive(Deserialize)]
struct PullRequestHead {
    sha: String,
}

/// Build metadata read from CI variables and, optionally, a git checkout.
pub struct CiBuildMetadata {
    env: Arc<dyn EnvironmentLookup>,
    checkout: Option<PathBuf>,
}

impl CiBuildMetadata {
    /// `checkout` is the directory to run `git` in; `None` disables git probing.
    pub fn new(env: Arc<dyn EnvironmentLookup>, checkout: Option<PathBuf>) -> Self {
        Self { env, checkout }
    }

    fn git(&self, args: &[&str]) -> Option<String> {
        let dir = self.checkout.as_ref()?;
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| tracing::debug!(error = %e, "git unavailable"))
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    fn is_pull_request_event(&self) -> bool {
        matches!(
            self.env.get_non_empty("GITHUB_EVENT_NAME").as_deref(),
            Some("pull_request" | "pull_request_target")
        )
    }

    fn actions_pull_request_head(&self) -> Result<Option<String>, InferenceError> {
        if !self.is_pull_request_event() {
            return Ok(None);
        }
        let Some(path) = self.env.get_non_empty("GITHUB_EVENT_PATH") else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| InferenceError::new(format!("cannot read event payload {path}: {e}")))?;
        let event: PullRequestEvent = serde_json::from_str(&text).map_err(|e| {
            InferenceError::new(format!("event payload {path} has no pull request head: {e}"))
        })?;
        Ok(Some(event.pull_request.head.sha))
    }
}

impl BuildMetadata for CiBuildMetadata {
    fn source_origin(&self) -> Result<Option<String>, InferenceError> {
        if let (Some(server), Some(repository)) = (
            self.env.get_non_empty("GITHUB_SERVER_URL"),
            self.env.get_non_empty("GITHUB_REPOSITORY"),
        ) {
            return Ok(Some(format!(
                "{}/{}",
                server.trim_end_matches('/'),
                repository
            )));
        }
        if let Some(url) = self.env.get_non_empty("GIT_URL") {
            return Ok(Some(url));
        }
        Ok(self.git(&["config", "--get", "remote.origin.url"]))
    }

    fn pull_request_head_sha(&self) -> Result<Option<String>, InferenceError> {
        if let Some(head) = self.actions_pull_request_head()? {
            return Ok(Some(head));
        }
        Ok(self.env.get_non_empty("ghprbActualCommit"))
    }

    fn checkout_sha(&self) -> Result<Option<String>, InferenceError> {
        if let Some(sha) = self.env.get_non_empty("GITHUB_SHA") {
            return Ok(Some(sha));
        }
        Ok(self.git(&["rev-parse", "HEAD"]))
    }

    fn credentials_id(&self) -> Result<Option<String>, InferenceError> {
        Ok(TOKEN_VARIABLES
            .iter()
            .find(|var| self.env.get_non_empty(var).is_some())
            .map(|var| var.to_string()))
    }

    fn result_url(&self) -> Option<String> {
        if let Some(url) = self.env.get_non_empty("BUILD_URL") {
            return Some(url);
        }
        if let (Some(server), Some(repository), Some(run_id)) = (
            self.env.get_non_empty("GITHUB_SERVER_URL"),
            self.env.get_non_empty("GITHUB_REPOSITORY"),
            self.env.get_non_empty("GITHUB_RUN_ID"),
        ) {
            return Some(format!(
                "{}/{}/actions/runs/{}",
                server.trim_end_matches('/'),
                repository,
                run_id
            ));
        }
        self.env.get_non_empty("CI_JOB_URL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn metadata(vars: &[(&str, &str)]) -> CiBuildMetadata {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CiBuildMetadata::new(Arc::new(env), None)
    }

    #[test]
    fn github_actions_origin_and_run_url() {
        let m = metadata(&[
            ("GITHUB_SERVER_URL", "https://github.com"),
            ("GITHUB_REPOSITORY", "acme/widget"),
            ("GITHUB_RUN_ID", "42"),
            ("GITHUB_SHA", "mergesha"),
        ]);
        assert_eq!(m.infer_account().unwrap().as_deref(), Some("acme"));
        assert_eq!(m.infer_repo().unwrap().as_deref(), Some("widget"));
        assert_eq!(m.infer_commit_sha().unwrap().as_deref(), Some("mergesha"));
        assert_eq!(
            m.result_url().as_deref(),
            Some("https://github.com/acme/widget/actions/runs/42")
        );
    }

    #[test]
    fn pull_request_event_head_preferred_over_merge_sha() {
        let dir = tempfile::tempdir().unwrap();
        let event = dir.path().join("event.json");
        std::fs::write(
            &event,
            r#"{"action":"synchronize","pull_request":{"number":7,"head":{"sha":"headsha"}}}"#,
        )
        .unwrap();
        let event = event.to_string_lossy().to_string();

        let m = metadata(&[
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_EVENT_PATH", event.as_str()),
            ("GITHUB_SHA", "mergesha"),
        ]);
        assert_eq!(m.infer_commit_sha().unwrap().as_deref(), Some("headsha"));
    }

    #[test]
    fn malformed_pull_request_event_is_an_inference_error() {
        let dir = tempfile::tempdir().unwrap();
        let event = dir.path().join("event.json");
        std::fs::write(&event, r#"{"action":"opened"}"#).unwrap();
        let event = event.to_string_lossy().to_string();

        let m = metadata(&[
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_EVENT_PATH", event.as_str()),
        ]);
        assert!(m.pull_request_head_sha().is_err());
    }

    #[test]
    fn push_event_ignores_payload() {
        let m = metadata(&[
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_EVENT_PATH", "/does/not/exist.json"),
            ("GITHUB_SHA", "pushsha"),
        ]);
        assert_eq!(m.infer_commit_sha().unwrap().as_deref(), Some("pushsha"));
    }

    #[test]
    fn jenkins_variables() {
        let m = metadata(&[
            ("GIT_URL", "git@github.com:acme/widget.git"),
            ("ghprbActualCommit", "prhead"),
            ("BUILD_URL", "https://jenkins.example.com/job/widget/12/"),
        ]);
        assert_eq!(m.infer_account().unwrap().as_deref(), Some("acme"));
        assert_eq!(m.infer_commit_sha().unwrap().as_deref(), Some("prhead"));
        assert_eq!(
            m.result_url().as_deref(),
            Some("https://jenkins.example.com/job/widget/12/")
        );
    }

    #[test]
    fn nothing_to_infer_without_ci_or_git() {
        let m = metadata(&[]);
        assert_eq!(m.source_origin().unwrap(), None);
        assert_eq!(m.infer_commit_sha().unwrap(), None);
        assert_eq!(m.credentials_id().unwrap(), None);
        assert_eq!(m.result_url(), None);
    }

    #[test]
    fn credentials_id_names_first_token_variable_set() {
        let m = metadata(&[("GH_TOKEN", "ghp_x")]);
        assert_eq!(m.credentials_id().unwrap().as_deref(), Some("GH_TOKEN"));

        let m = metadata(&[("GITHUB_TOKEN", "ghp_y"), ("GH_TOKEN", "ghp_x")]);
        assert_eq!(m.credentials_id().unwrap().as_deref(), Some("GITHUB_TOKEN"));
    }
}
