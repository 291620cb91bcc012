//! External stop requests and their propagation into the enclosed work.
//!
//! A stop is one-shot: the first [`StopHandle::stop`] wins and later calls are
//! ignored. The controller never sends a status from here; it only races its
//! own blocking calls against [`StopSignal::stopped`] and forwards the signal to
//! the work, which then resolves through the normal outcome path.

use tokio::sync::watch;

/// Why a stop was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCause(String);

impl StopCause {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StopCause {
    fn default() -> Self {
        Self::new("stop requested")
    }
}

impl std::fmt::Display for StopCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates connected stop handles and signals.
pub struct CancellationHandler;

impl CancellationHandler {
    /// Returns a sending half and a receiving half that share one stop state.
    pub fn channel() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(None);
        (StopHandle { tx }, StopSignal { rx })
    }
}

/// Sending half; requests a stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<Option<StopCause>>,
}

impl StopHandle {
    /// Requests a stop with an optional cause. Only the first request counts.
    pub fn stop(&self, cause: Option<StopCause>) {
        let cause = cause.unwrap_or_default();
        let first = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause.clone());
            true
        });
        if first {
            tracing::info!(%cause, "Stop requested");
        }
    }
}

/// Receiving half; observed by the controller and the enclosed work.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<Option<StopCause>>,
}

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(None);
        Self { rx }
    }

    /// Returns the cause if a stop has already been requested.
    pub fn cause(&self) -> Option<StopCause> {
        self.rx.borrow().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Completes with the cause once a stop is requested.
    ///
    /// Pends forever if every [`StopHandle`] is dropped without stopping.
    pub async fn stopped(&self) -> StopCause {
        let mut rx = self.rx.clone();
        let fired = rx
            .wait_for(Option::is_some)
            .await
            .map(|cause| cause.clone().unwrap_or_default());
        match fired {
            Ok(cause) => cause,
            Err(_) => std::future::pending().await,
        }
    }
}
