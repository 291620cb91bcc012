//! git-status-wrapper entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags, then the TOML file, then inference.
//! 2. **Wire observability**: `tracing-subscriber` to stderr, plus an OTLP
//!    exporter when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Construct infrastructure**: the GitHub client, the credential store,
//!    and CI metadata, injected into [`wrapper::LifecycleController`].
//! 4. **Map outcomes to exit codes**: the command's own code when it failed
//!    with one, 130 when stopped, 2 when the context could not be resolved,
//!    1 otherwise.

mod cli;
mod config;
mod host;
mod observability;
mod signals;
mod work;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use github::{ConnectionInfo, EnvCredentialStore, GitHubClient};
use wrapper::{
    CancellationHandler, EnvironmentLookup, LifecycleController, WorkError, WrapperError,
    DEFAULT_API_URL,
};

use crate::cli::{CheckArgs, Cli, Commands, RunArgs};
use crate::config::{CheckSettings, FileConfig, Settings};
use crate::host::{CiBuildMetadata, ProcessEnvironment};

const EXIT_FAILURE: u8 = 1;
const EXIT_UNRESOLVED: u8 = 2;
const EXIT_STOPPED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let observability = match observability::init(cli.log_format) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let code = match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    };

    observability.shutdown();
    code
}

async fn dispatch(cli: Cli) -> Result<()> {
    let env: Arc<dyn EnvironmentLookup> = Arc::new(ProcessEnvironment);
    let cwd = std::env::current_dir()?;
    let file = FileConfig::load(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Run(args) => run(args, &file, env, cwd).await,
        Commands::Check(args) => check(args, &file, env).await,
    }
}

async fn run(
    args: RunArgs,
    file: &FileConfig,
    env: Arc<dyn EnvironmentLookup>,
    cwd: std::path::PathBuf,
) -> Result<()> {
    let settings = Settings::merge(
        &args.context,
        &args.proxy,
        args.stop_grace_secs,
        file,
        env.as_ref(),
    );
    let api_url = settings
        .explicit
        .git_api_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(DEFAULT_API_URL);

    let client = GitHubClient::new(Arc::new(EnvCredentialStore::new(env.clone())));
    let controller = LifecycleController::new(client)
        .with_proxy(settings.proxy.proxy_for(api_url))
        .with_stop_grace(settings.stop_grace);
    let metadata = CiBuildMetadata::new(env.clone(), Some(cwd));

    let (handle, stop) = CancellationHandler::channel();
    let signals = signals::forward_stop_signals(handle);

    let command = args.command;
    let result = controller
        .resolve_and_run(&settings.explicit, env, &metadata, stop, |overlay, stop| {
            work::run_command(command, overlay, stop)
        })
        .await;
    signals.abort();

    if let Err(e) = &result {
        if e.work_succeeded() {
            tracing::warn!("Command succeeded but its SUCCESS status was not recorded");
        }
    }
    Ok(result?)
}

async fn check(args: CheckArgs, file: &FileConfig, env: Arc<dyn EnvironmentLookup>) -> Result<()> {
    let settings = CheckSettings::merge(&args, file, env.as_ref());
    let api_url = settings.api_url;
    let proxy = settings.proxy.proxy_for(&api_url);

    let client = GitHubClient::new(Arc::new(EnvCredentialStore::new(env)));
    match client
        .check_connection(&api_url, settings.credentials_id.as_ref(), proxy.as_deref())
        .await?
    {
        ConnectionInfo::Authenticated { login } => {
            tracing::info!(%api_url, %login, "Authenticated");
        }
        ConnectionInfo::Anonymous => tracing::info!(%api_url, "Anonymous access"),
    }
    println!("Success");
    Ok(())
}

fn exit_code(error: &anyhow::Error) -> u8 {
    let Some(error) = error.downcast_ref::<WrapperError>() else {
        return EXIT_FAILURE;
    };
    match error {
        WrapperError::Resolution(_) => EXIT_UNRESOLVED,
        WrapperError::Stopped { .. } => EXIT_STOPPED,
        _ => match error.work_error() {
            Some(WorkError::Stopped { .. }) => EXIT_STOPPED,
            Some(WorkError::Failed {
                exit_code: Some(code),
                ..
            }) => u8::try_from(*code)
                .ok()
                .filter(|c| *c != 0)
                .unwrap_or(EXIT_FAILURE),
            _ => EXIT_FAILURE,
        },
    }
}
