//! The enclosed work: an external command run with the status overlay.

use std::process::Stdio;

use tokio::process::Command;
use wrapper::{EnvironmentOverlay, StopSignal, WorkError};

/// Runs `argv` to completion, killing it if `stop` fires first.
///
/// The child inherits stdio and the process environment, plus every
/// variable in `env`'s overrides.
pub async fn run_command(
    argv: Vec<String>,
    env: EnvironmentOverlay,
    stop: StopSignal,
) -> Result<(), WorkError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(WorkError::failed("no command given"));
    };

    let mut child = Command::new(program)
        .args(args)
        .envs(env.overrides())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| WorkError::failed(format!("failed to start {program}: {e}")))?;

    tracing::info!(%program, pid = child.id(), "Started command");

    let cause = tokio::select! {
        biased;
        status = child.wait() => {
            let status = status
                .map_err(|e| WorkError::failed(format!("failed to wait for {program}: {e}")))?;
            if status.success() {
                tracing::info!(%program, "Command succeeded");
                return Ok(());
            }
            tracing::warn!(%program, %status, "Command failed");
            return Err(WorkError::Failed {
                message: format!("{program} exited with {status}"),
                exit_code: status.code(),
            });
        }
        cause = stop.stopped() => cause,
    };

    tracing::warn!(%program, %cause, "Killing command");
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Command already exited");
    }
    let _ = child.wait().await;
    Err(WorkError::Stopped { cause })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use wrapper::{CancellationHandler, StopCause};

    fn overlay(vars: &[(&str, &str)]) -> EnvironmentOverlay {
        let base: Arc<HashMap<String, String>> = Arc::new(HashMap::new());
        EnvironmentOverlay::with_overrides(
            base,
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let result = run_command(sh("exit 0"), overlay(&[]), StopSignal::never()).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_the_code() {
        let result = run_command(sh("exit 3"), overlay(&[]), StopSignal::never()).await;
        match result {
            Err(WorkError::Failed { exit_code, .. }) => assert_eq!(exit_code, Some(3)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn overlay_variables_are_visible_to_the_command() {
        let result = run_command(
            sh(r#"test "$GIT_STATUS_CONTEXT" = "ci/test""#),
            overlay(&[("GIT_STATUS_CONTEXT", "ci/test")]),
            StopSignal::never(),
        )
        .await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn missing_program_is_a_failure() {
        let result = run_command(
            vec!["/nonexistent/definitely-not-here".into()],
            overlay(&[]),
            StopSignal::never(),
        )
        .await;
        assert!(matches!(result, Err(WorkError::Failed { exit_code: None, .. })));
    }

    #[tokio::test]
    async fn stop_kills_the_command() {
        let (handle, signal) = CancellationHandler::channel();
        let task = tokio::spawn(run_command(sh("sleep 30"), overlay(&[]), signal));

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop(Some(StopCause::new("test")));

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("command was not killed")
            .unwrap();
        assert_eq!(
            result,
            Err(WorkError::Stopped {
                cause: StopCause::new("test")
            })
        );
    }
}
