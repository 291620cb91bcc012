//! Forwarding of host termination signals into the stop channel.

use tokio::task::JoinHandle;
use wrapper::{StopCause, StopHandle};

/// Turns the first SIGINT or SIGTERM into a stop request.
pub fn forward_stop_signals(handle: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cause = wait_for_signal().await;
        handle.stop(Some(cause));
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> StopCause {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            None
        }
    };

    tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => StopCause::new("interrupted (SIGINT)"),
        Some(_) = async {
            match terminate.as_mut() {
                Some(s) => s.recv().await,
                None => std::future::pending().await,
            }
        } => StopCause::new("terminated (SIGTERM)"),
        else => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> StopCause {
    match tokio::signal::ctrl_c().await {
        Ok(()) => StopCause::new("interrupted (Ctrl-C)"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending().await
        }
    }
}
