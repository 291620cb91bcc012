use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use wrapper::PartialContext;

/// Log format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Wraps a command with GitHub commit-status notifications.
#[derive(Debug, Parser)]
#[command(name = "git-status-wrapper", version, about)]
pub struct Cli {
    /// Log output format (default: text, or GIT_STATUS_WRAPPER_LOG_FORMAT)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Configuration file (default: .git-status-wrapper.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Mark the commit PENDING, run the command, then mark SUCCESS or FAILURE
    Run(RunArgs),
    /// Check that the API is reachable with the configured credentials
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    #[command(flatten)]
    pub proxy: ProxyArgs,

    /// Seconds to wait for the command and the final status after a stop
    #[arg(long)]
    pub stop_grace_secs: Option<u64>,

    /// Command to run, after `--`
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// GitHub API endpoint (default: https://api.github.com)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Credentials id naming the token to use (anonymous if omitted)
    #[arg(long)]
    pub credentials_id: Option<String>,

    #[command(flatten)]
    pub proxy: ProxyArgs,
}

/// The configuration surface of the status context.
#[derive(Debug, Clone, Default, Args)]
pub struct ContextArgs {
    /// Status label distinguishing this status line (default: gitStatusWrapper)
    #[arg(long = "context")]
    pub git_hub_context: Option<String>,

    /// GitHub API endpoint, for GitHub Enterprise
    #[arg(long)]
    pub api_url: Option<String>,

    /// Credentials id naming the token to use
    #[arg(long)]
    pub credentials_id: Option<String>,

    /// Account owning the repository
    #[arg(long)]
    pub account: Option<String>,

    /// Repository name
    #[arg(long)]
    pub repo: Option<String>,

    /// Commit SHA to report on
    #[arg(long)]
    pub sha: Option<String>,

    /// Short description attached to each status
    #[arg(long)]
    pub description: Option<String>,

    /// Link shown next to the status (default: this build's URL)
    #[arg(long)]
    pub target_url: Option<String>,
}

impl ContextArgs {
    pub fn to_partial(&self) -> PartialContext {
        PartialContext {
            git_hub_context: self.git_hub_context.clone(),
            git_api_url: self.api_url.clone(),
            credentials_id: self.credentials_id.clone(),
            account: self.account.clone(),
            repo: self.repo.clone(),
            sha: self.sha.clone(),
            description: self.description.clone(),
            target_url: self.target_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ProxyArgs {
    /// Proxy for API calls (default: HTTPS_PROXY)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Hosts reached without the proxy, comma-separated (default: NO_PROXY)
    #[arg(long, value_delimiter = ',')]
    pub no_proxy: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_trailing_command() {
        let cli = Cli::parse_from([
            "git-status-wrapper",
            "run",
            "--context",
            "ci/test",
            "--sha",
            "abc123",
            "--",
            "cargo",
            "test",
            "--all",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.command, vec!["cargo", "test", "--all"]);
                let partial = args.context.to_partial();
                assert_eq!(partial.git_hub_context.as_deref(), Some("ci/test"));
                assert_eq!(partial.sha.as_deref(), Some("abc123"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_requires_a_command() {
        assert!(Cli::try_parse_from(["git-status-wrapper", "run"]).is_err());
    }

    #[test]
    fn no_proxy_splits_on_commas() {
        let cli = Cli::parse_from([
            "git-status-wrapper",
            "check",
            "--no-proxy",
            "localhost,.corp",
        ]);
        match cli.command {
            Commands::Check(args) => assert_eq!(args.proxy.no_proxy, vec!["localhost", ".corp"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
