//! Configuration file loading and layering.
//!
//! Precedence, highest first: command-line flags, the configuration file, then
//! inference (for context fields) or the process environment (for proxies).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use github::ProxyConfig;
use serde::Deserialize;
use wrapper::{
    CredentialsId, EnvironmentLookup, PartialContext, DEFAULT_API_URL, DEFAULT_STOP_GRACE,
};

use crate::cli::{CheckArgs, ContextArgs, ProxyArgs};

/// File consulted when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".git-status-wrapper.toml";

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub git_hub_context: Option<String>,
    pub git_api_url: Option<String>,
    pub credentials_id: Option<String>,
    pub account: Option<String>,
    pub repo: Option<String>,
    pub sha: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub proxy: Option<String>,
    pub no_proxy: Vec<String>,
    pub stop_grace_secs: Option<u64>,
}

impl FileConfig {
    /// Loads `path`, or the default file from `cwd` if present.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>, cwd: &Path) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (cwd.join(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    fn partial_context(&self) -> PartialContext {
        PartialContext {
            git_hub_context: self.git_hub_context.clone(),
            git_api_url: self.git_api_url.clone(),
            credentials_id: self.credentials_id.clone(),
            account: self.account.clone(),
            repo: self.repo.clone(),
            sha: self.sha.clone(),
            description: self.description.clone(),
            target_url: self.target_url.clone(),
        }
    }
}

/// Effective settings for one `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub explicit: PartialContext,
    pub proxy: ProxyConfig,
    pub stop_grace: Duration,
}

impl Settings {
    pub fn merge(
        context: &ContextArgs,
        proxy: &ProxyArgs,
        stop_grace_secs: Option<u64>,
        file: &FileConfig,
        env: &dyn EnvironmentLookup,
    ) -> Self {
        let stop_grace = stop_grace_secs
            .or(file.stop_grace_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STOP_GRACE);
        Self {
            explicit: context.to_partial().or(file.partial_context()),
            proxy: proxy_config(proxy, file, env),
            stop_grace,
        }
    }
}

/// Effective settings for one `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSettings {
    pub api_url: String,
    pub credentials_id: Option<CredentialsId>,
    pub proxy: ProxyConfig,
}

impl CheckSettings {
    pub fn merge(args: &CheckArgs, file: &FileConfig, env: &dyn EnvironmentLookup) -> Self {
        let api_url = first_set(&args.api_url, &file.git_api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let credentials_id =
            first_set(&args.credentials_id, &file.credentials_id).and_then(CredentialsId::new);
        Self {
            api_url,
            credentials_id,
            proxy: proxy_config(&args.proxy, file, env),
        }
    }
}

fn first_set(flag: &Option<String>, file: &Option<String>) -> Option<String> {
    [flag, file]
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
        .cloned()
}

/// Proxy settings from flags, then the file, then `HTTPS_PROXY` / `NO_PROXY`.
pub fn proxy_config(args: &ProxyArgs, file: &FileConfig, env: &dyn EnvironmentLookup) -> ProxyConfig {
    let url = args
        .proxy
        .clone()
        .filter(|p| !p.trim().is_empty())
        .or_else(|| file.proxy.clone().filter(|p| !p.trim().is_empty()))
        .or_else(|| env.get_non_empty("HTTPS_PROXY"))
        .or_else(|| env.get_non_empty("https_proxy"));
    let no_proxy = if !args.no_proxy.is_empty() {
        args.no_proxy.clone()
    } else if !file.no_proxy.is_empty() {
        file.no_proxy.clone()
    } else {
        env.get_non_empty("NO_PROXY")
            .or_else(|| env.get_non_empty("no_proxy"))
            .map(|list| ProxyConfig::parse_no_proxy(&list))
            .unwrap_or_default()
    };
    ProxyConfig::new(url, no_proxy)
}
