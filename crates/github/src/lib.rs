//! GitHub infrastructure adapter.
//!
//! Implements the [`wrapper::StatusClient`] port against the GitHub REST API
//! (github.com or a GitHub Enterprise `/api/v3` endpoint):
//!
//! - `GET /repos/{owner}/{repo}`: repository lookup and credential check
//! - `GET /repos/{owner}/{repo}/commits/{sha}`: commit lookup (expands
//!   abbreviated SHAs)
//! - `POST /repos/{owner}/{repo}/statuses/{sha}`: status update
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain lifecycle rules. HTTP
//! transport, authentication headers, proxy selection, and mapping of response
//! codes onto [`wrapper::ClientError`] live here; the [`wrapper`] crate never
//! sees them.

mod client;
mod credentials;
mod proxy;

pub use client::{ConnectionInfo, GitHubClient, GitHubCommit, GitHubRepository};
pub use credentials::{CredentialStore, EnvCredentialStore};
pub use proxy::ProxyConfig;
