//! [`StatusClient`] over the GitHub REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wrapper::{ClientError, CommitSha, CredentialsId, RepositoryTarget, StatusClient, StatusUpdate};

use crate::CredentialStore;

const USER_AGENT: &str = concat!("git-status-wrapper/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A repository validated against the API, together with the HTTP client and
/// token used to reach it.
#[derive(Debug, Clone)]
pub struct GitHubRepository {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
    full_name: String,
    html_url: Option<String>,
}

impl GitHubRepository {
    /// `owner/name` as reported by the API.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn html_url(&self) -> Option<&str> {
        self.html_url.as_deref()
    }
}

/// A commit validated against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubCommit {
    sha: String,
}

impl GitHubCommit {
    /// Full SHA as reported by the API (the configured SHA may be abbreviated).
    pub fn sha(&self) -> &str {
        &self.sha
    }
}

/// What a successful connection check learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionInfo {
    /// Authenticated as the given login.
    Authenticated { login: String },
    /// Anonymous access works.
    Anonymous,
}

#[derive(Deserialize)]
struct RepositoryResponse {
    full_name: String,
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    context: &'a str,
}

/// GitHub (or GitHub Enterprise) commit-status client.
#[derive(Clone)]
pub struct GitHubClient {
    credentials: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that `api_url` is reachable and, if given, that the credentials
    /// are accepted.
    pub async fn check_connection(
        &self,
        api_url: &str,
        credentials_id: Option<&CredentialsId>,
        proxy: Option<&str>,
    ) -> Result<ConnectionInfo, ClientError> {
        let http = self.http_client(proxy)?;
        let api_url = api_url.trim_end_matches('/');
        match self.token_for(credentials_id)? {
            Some(token) => {
                let request = authorize(http.get(format!("{api_url}/user")), Some(&token));
                let user: UserResponse = fetch_json(request, "authenticated user").await?;
                Ok(ConnectionInfo::Authenticated { login: user.login })
            }
            None => {
                let request = authorize(http.get(format!("{api_url}/rate_limit")), None);
                let _: serde_json::Value = fetch_json(request, "rate limit").await?;
                Ok(ConnectionInfo::Anonymous)
            }
        }
    }

    fn http_client(&self, proxy: Option<&str>) -> Result<reqwest::Client, ClientError> {
        // Proxies come only from explicit configuration, never from the
        // process environment.
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .no_proxy();
        if let Some(url) = proxy {
            let proxy = reqwest::Proxy::all(url).map_err(|e| ClientError::Network {
                message: format!("invalid proxy '{url}': {e}"),
            })?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|e| ClientError::Network {
            message: e.to_string(),
        })
    }

    fn token_for(&self, id: Option<&CredentialsId>) -> Result<Option<String>, ClientError> {
        match id {
            None => Ok(None),
            Some(id) => match self.credentials.token(id) {
                Some(token) => Ok(Some(token)),
                None => Err(ClientError::Auth {
                    message: format!("no credentials found for id '{id}'"),
                }),
            },
        }
    }
}

#[async_trait]
impl StatusClient for GitHubClient {
    type Repository = GitHubRepository;
    type Commit = GitHubCommit;

    async fn resolve_repository(
        &self,
        target: &RepositoryTarget,
    ) -> Result<GitHubRepository, ClientError> {
        let token = self.token_for(target.credentials_id.as_ref())?;
        let http = self.http_client(target.proxy.as_deref())?;
        let api_url = target.api_url.trim_end_matches('/').to_string();
        let what = format!("repository {}/{}", target.account, target.repo);

        let request = authorize(
            http.get(format!("{api_url}/repos/{}/{}", target.account, target.repo)),
            token.as_deref(),
        );
        let repo: RepositoryResponse = fetch_json(request, &what).await?;
        tracing::debug!(repository = %repo.full_name, "Resolved repository");

        Ok(GitHubRepository {
            http,
            api_url,
            token,
            full_name: repo.full_name,
            html_url: repo.html_url,
        })
    }

    async fn resolve_commit(
        &self,
        repository: &GitHubRepository,
        sha: &CommitSha,
    ) -> Result<GitHubCommit, ClientError> {
        let request = authorize(
            repository.http.get(format!(
                "{}/repos/{}/commits/{}",
                repository.api_url, repository.full_name, sha
            )),
            repository.token.as_deref(),
        );
        let commit: CommitResponse = fetch_json(request, &format!("commit {sha}")).await?;
        tracing::debug!(sha = %commit.sha, "Resolved commit");
        Ok(GitHubCommit { sha: commit.sha })
    }

    async fn set_status(
        &self,
        repository: &GitHubRepository,
        commit: &GitHubCommit,
        update: &StatusUpdate,
    ) -> Result<(), ClientError> {
        let body = StatusRequest {
            state: update.state.as_str(),
            target_url: update.target_url.as_deref(),
            description: update.description.as_deref(),
            context: update.label.as_str(),
        };
        let request = authorize(
            repository.http.post(format!(
                "{}/repos/{}/statuses/{}",
                repository.api_url, repository.full_name, commit.sha
            )),
            repository.token.as_deref(),
        )
        .json(&body);

        let response = send(request).await?;
        check_status(response, &format!("commit {}", commit.sha)).await?;
        Ok(())
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    let request = request
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .header("X-GitHub-Api-Version", API_VERSION);
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    request.send().await.map_err(|e| ClientError::Network {
        message: e.to_string(),
    })
}

async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> Result<T, ClientError> {
    let response = check_status(send(request).await?, what).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::InvalidResponse {
            message: e.to_string(),
        })
}

/// Maps non-success responses onto [`ClientError`].
async fn check_status(response: Response, what: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .map(|m| m.message)
        .unwrap_or(body);

    Err(match status {
        // GitHub answers 422 for a SHA that names no commit.
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => ClientError::NotFound {
            what: what.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth { message },
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnvCredentialStore;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wrapper::{Account, CommitState, EnvironmentLookup, RepositoryName, StatusLabel};

    fn client() -> GitHubClient {
        let env: Arc<dyn EnvironmentLookup> = Arc::new(HashMap::from([(
            "GITHUB_TOKEN".to_string(),
            "ghp_test".to_string(),
        )]));
        GitHubClient::new(Arc::new(EnvCredentialStore::new(env)))
    }

    fn target(server: &MockServer, credentials: Option<&str>) -> RepositoryTarget {
        RepositoryTarget {
            api_url: server.uri(),
            credentials_id: credentials.and_then(CredentialsId::new),
            account: Account::new("acme").unwrap(),
            repo: RepositoryName::new("widget").unwrap(),
            proxy: None,
        }
    }

    async fn mount_repository(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "acme/widget",
                "html_url": "https://github.com/acme/widget"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn resolves_repository_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": "acme/widget",
                "html_url": "https://github.com/acme/widget"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let repo = client()
            .resolve_repository(&target(&server, Some("GITHUB_TOKEN")))
            .await
            .unwrap();
        assert_eq!(repo.full_name(), "acme/widget");
        assert_eq!(repo.html_url(), Some("https://github.com/acme/widget"));
    }

    #[tokio::test]
    async fn missing_repository_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })),
            )
            .mount(&server)
            .await;

        let err = client()
            .resolve_repository(&target(&server, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn rejected_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let err = client()
            .resolve_repository(&target(&server, Some("GITHUB_TOKEN")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::Auth {
                message: "Bad credentials".into()
            }
        );
    }

    #[tokio::test]
    async fn unknown_credentials_id_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client()
            .resolve_repository(&target(&server, Some("JENKINS_GITHUB")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth { .. }));
    }

    #[tokio::test]
    async fn unknown_commit_is_not_found() {
        let server = MockServer::start().await;
        mount_repository(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/commits/deadbeef"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "No commit found for SHA: deadbeef"
            })))
            .mount(&server)
            .await;

        let client = client();
        let repo = client
            .resolve_repository(&target(&server, None))
            .await
            .unwrap();
        let err = client
            .resolve_commit(&repo, &CommitSha::new("deadbeef").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
    }

    #[tokio::test]
    async fn posts_status_against_full_sha() {
        let server = MockServer::start().await;
        mount_repository(&server).await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/commits/abc123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "sha": "abc123def456" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widget/statuses/abc123def456"))
            .and(body_json(json!({
                "state": "pending",
                "target_url": "https://ci.example.com/job/1",
                "context": "gitStatusWrapper"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client();
        let repo = client
            .resolve_repository(&target(&server, None))
            .await
            .unwrap();
        let commit = client
            .resolve_commit(&repo, &CommitSha::new("abc123").unwrap())
            .await
            .unwrap();
        assert_eq!(commit.sha(), "abc123def456");

        let update = StatusUpdate {
            state: CommitState::Pending,
            target_url: Some("https://ci.example.com/job/1".into()),
            description: None,
            label: StatusLabel::default(),
        };
        client.set_status(&repo, &commit, &update).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_on_status_is_api_error() {
        let server = MockServer::start().await;
        mount_repository(&server).await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widget/statuses/abc123"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let client = client();
        let repo = client
            .resolve_repository(&target(&server, None))
            .await
            .unwrap();
        let commit = GitHubCommit {
            sha: "abc123".into(),
        };
        let update = StatusUpdate {
            state: CommitState::Success,
            target_url: None,
            description: Some("Build".into()),
            label: StatusLabel::default(),
        };

        let err = client.set_status(&repo, &commit, &update).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Api {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[tokio::test]
    async fn connection_check_reports_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "ci-bot" })))
            .mount(&server)
            .await;

        let info = client()
            .check_connection(&server.uri(), CredentialsId::new("GITHUB_TOKEN").as_ref(), None)
            .await
            .unwrap();
        assert_eq!(
            info,
            ConnectionInfo::Authenticated {
                login: "ci-bot".into()
            }
        );
    }

    #[tokio::test]
    async fn anonymous_connection_check_uses_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resources": {} })))
            .mount(&server)
            .await;

        let info = client()
            .check_connection(&server.uri(), None, None)
            .await
            .unwrap();
        assert_eq!(info, ConnectionInfo::Anonymous);
    }
}
