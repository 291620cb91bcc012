//! Credential lookup by id.

use std::sync::Arc;

use wrapper::{CredentialsId, EnvironmentLookup};

/// Maps a credentials id to a GitHub token.
pub trait CredentialStore: Send + Sync {
    /// Returns the token stored under `id`, or `None` if there is no such entry.
    fn token(&self, id: &CredentialsId) -> Option<String>;
}

/// Treats each credentials id as the name of an environment entry holding a
/// token, e.g. `GITHUB_TOKEN`.
#[derive(Clone)]
pub struct EnvCredentialStore {
    env: Arc<dyn EnvironmentLookup>,
}

impl EnvCredentialStore {
    pub fn new(env: Arc<dyn EnvironmentLookup>) -> Self {
        Self { env }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn token(&self, id: &CredentialsId) -> Option<String> {
        self.env
            .get_non_empty(id.as_str())
            .map(|token| token.trim().to_string())
    }
}
