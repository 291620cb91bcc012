//! The commit-status lifecycle around one enclosed unit of work.
//!
//! ```text
//! resolve repository ─► resolve commit ─► PENDING ─► work ─► SUCCESS | FAILURE
//!        │                    │              │
//!        └─ Setup error ──────┘              └─ StatusUpdate error (work never starts)
//! ```
//!
//! Invariants:
//!
//! - PENDING is attempted at most once and is acknowledged before the work
//!   starts.
//! - Exactly one terminal update is attempted once the work's outcome is known,
//!   and none if the work never started.
//! - At most one status-client call is outstanding at any time.
//! - A stop before the work starts aborts without further status calls; a stop
//!   while the work runs is forwarded to it, and its outcome flows through the
//!   normal terminal path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;

use crate::{
    resolve, BuildMetadata, ClientError, CommitState, EnvironmentLookup, EnvironmentOverlay,
    InvocationId, PartialContext, RepositoryTarget, SetupStage, StatusClient, StatusContext,
    StatusUpdate, StopSignal, Timestamp, WorkError, WrapperError,
};

/// How long the work and the terminal status call may take once a stop has
/// been requested, unless configured otherwise.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// One status update attempted during an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusAttempt {
    pub state: CommitState,
    pub at: Timestamp,
    pub acknowledged: bool,
}

/// What happened during one invocation, for logging and inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub invocation: InvocationId,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub attempts: Vec<StatusAttempt>,
}

impl LifecycleReport {
    fn new(invocation: InvocationId) -> Self {
        Self {
            invocation,
            started_at: Timestamp::now(),
            finished_at: None,
            attempts: Vec::new(),
        }
    }

    /// States attempted, in order.
    pub fn states(&self) -> Vec<CommitState> {
        self.attempts.iter().map(|a| a.state).collect()
    }
}

/// Drives one commit through PENDING and a terminal status around a unit of
/// work.
pub struct LifecycleController<C> {
    client: C,
    proxy: Option<String>,
    stop_grace: Duration,
}

impl<C: StatusClient> LifecycleController<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            proxy: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Routes repository lookups through `proxy`.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Resolves the context, then runs the lifecycle.
    ///
    /// A resolution failure returns before any status-client call.
    pub async fn resolve_and_run<F, Fut, T>(
        &self,
        explicit: &PartialContext,
        env: Arc<dyn EnvironmentLookup>,
        metadata: &dyn BuildMetadata,
        stop: StopSignal,
        work: F,
    ) -> Result<T, WrapperError>
    where
        F: FnOnce(EnvironmentOverlay, StopSignal) -> Fut,
        Fut: Future<Output = Result<T, WorkError>>,
    {
        let context = resolve(explicit, env.as_ref(), metadata)?;
        self.run(&context, env, stop, work).await
    }

    /// Runs `work` wrapped in the status lifecycle for `context`.
    ///
    /// `work` receives the environment overlay and the stop signal; it is
    /// expected to unwind promptly once the signal fires.
    pub async fn run<F, Fut, T>(
        &self,
        context: &StatusContext,
        env: Arc<dyn EnvironmentLookup>,
        stop: StopSignal,
        work: F,
    ) -> Result<T, WrapperError>
    where
        F: FnOnce(EnvironmentOverlay, StopSignal) -> Fut,
        Fut: Future<Output = Result<T, WorkError>>,
    {
        self.run_with_report(context, env, stop, work).await.0
    }

    /// Like [`run`](Self::run), also returning what was attempted.
    pub async fn run_with_report<F, Fut, T>(
        &self,
        context: &StatusContext,
        env: Arc<dyn EnvironmentLookup>,
        stop: StopSignal,
        work: F,
    ) -> (Result<T, WrapperError>, LifecycleReport)
    where
        F: FnOnce(EnvironmentOverlay, StopSignal) -> Fut,
        Fut: Future<Output = Result<T, WorkError>>,
    {
        let invocation = InvocationId::new_random();
        let span = tracing::info_span!(
            "invocation",
            %invocation,
            repository = %context.full_name(),
            sha = %context.sha,
            label = %context.status_label,
        );

        async move {
            let mut report = LifecycleReport::new(invocation);
            let result = self.drive(context, env, stop, work, &mut report).await;
            report.finished_at = Some(Timestamp::now());
            match &result {
                Ok(_) => tracing::info!(states = ?report.states(), "Lifecycle completed"),
                Err(e) => tracing::warn!(states = ?report.states(), error = %e, "Lifecycle failed"),
            }
            (result, report)
        }
        .instrument(span)
        .await
    }

    async fn drive<F, Fut, T>(
        &self,
        context: &StatusContext,
        env: Arc<dyn EnvironmentLookup>,
        stop: StopSignal,
        work: F,
        report: &mut LifecycleReport,
    ) -> Result<T, WrapperError>
    where
        F: FnOnce(EnvironmentOverlay, StopSignal) -> Fut,
        Fut: Future<Output = Result<T, WorkError>>,
    {
        let target = RepositoryTarget {
            api_url: context.api_url.clone(),
            credentials_id: context.credentials_id.clone(),
            account: context.account.clone(),
            repo: context.repo.clone(),
            proxy: self.proxy.clone(),
        };

        let repository = until_stopped(&stop, self.client.resolve_repository(&target))
            .await?
            .map_err(|source| WrapperError::Setup {
                stage: SetupStage::Repository,
                source,
            })?;
        let commit = until_stopped(&stop, self.client.resolve_commit(&repository, &context.sha))
            .await?
            .map_err(|source| WrapperError::Setup {
                stage: SetupStage::Commit,
                source,
            })?;

        let pending = self.send(&repository, &commit, context, CommitState::Pending, report);
        until_stopped(&stop, pending)
            .await?
            .map_err(|source| WrapperError::StatusUpdate {
                state: CommitState::Pending,
                source,
            })?;

        let overlay = EnvironmentOverlay::with_overrides(env, context.environment_overrides());
        let outcome = self.await_work(work(overlay, stop.clone()), &stop).await;

        let terminal = match outcome {
            Ok(_) => CommitState::Success,
            Err(_) => CommitState::Failure,
        };
        let send = self.send(&repository, &commit, context, terminal, report);
        let status = self.within_stop_grace(send, &stop).await;

        match (outcome, status) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(source)) => Err(WrapperError::StatusUpdate {
                state: terminal,
                source,
            }),
            (Err(work), Ok(())) => Err(WrapperError::Work(work)),
            (Err(work), Err(status)) => Err(WrapperError::WorkAndStatusUpdate {
                work,
                state: terminal,
                status,
            }),
        }
    }

    async fn await_work<Fut, T>(&self, work: Fut, stop: &StopSignal) -> Result<T, WorkError>
    where
        Fut: Future<Output = Result<T, WorkError>>,
    {
        tokio::pin!(work);
        let cause = tokio::select! {
            outcome = &mut work => return outcome,
            cause = stop.stopped() => cause,
        };

        // The work holds its own copy of the signal; give it time to unwind.
        tracing::info!(%cause, "Forwarding stop to enclosed work");
        match tokio::time::timeout(self.stop_grace, work).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.stop_grace.as_secs_f64(),
                    "Enclosed work did not finish after stop; abandoning it"
                );
                Err(WorkError::Stopped { cause })
            }
        }
    }

    /// Awaits a terminal status call. Once a stop is requested, before or
    /// during the call, it gets at most `stop_grace` more.
    async fn within_stop_grace<F>(&self, send: F, stop: &StopSignal) -> Result<(), ClientError>
    where
        F: Future<Output = Result<(), ClientError>>,
    {
        tokio::pin!(send);
        tokio::select! {
            result = &mut send => return result,
            _ = stop.stopped() => {}
        }
        tokio::time::timeout(self.stop_grace, send)
            .await
            .unwrap_or(Err(ClientError::TimedOut))
    }

    async fn send(
        &self,
        repository: &C::Repository,
        commit: &C::Commit,
        context: &StatusContext,
        state: CommitState,
        report: &mut LifecycleReport,
    ) -> Result<(), ClientError> {
        tracing::info!(
            "Setting {} status for {} on commit {}",
            state,
            context.status_label,
            context.sha
        );
        let update = StatusUpdate {
            state,
            target_url: context.target_url.clone(),
            description: context.description.clone(),
            label: context.status_label.clone(),
        };
        // Recorded before the call so an abandoned call still shows up.
        report.attempts.push(StatusAttempt {
            state,
            at: Timestamp::now(),
            acknowledged: false,
        });
        let result = self.client.set_status(repository, commit, &update).await;
        match &result {
            Ok(()) => {
                if let Some(attempt) = report.attempts.last_mut() {
                    attempt.acknowledged = true;
                }
            }
            Err(e) => tracing::warn!(%state, error = %e, "Status update failed"),
        }
        result
    }
}

/// Races `fut` against the stop signal, preferring the stop when both are ready.
async fn until_stopped<F: Future>(stop: &StopSignal, fut: F) -> Result<F::Output, WrapperError> {
    tokio::select! {
        biased;
        cause = stop.stopped() => Err(WrapperError::Stopped { cause }),
        output = fut => Ok(output),
    }
}
