//! Commit-status wrapper domain.
//!
//! Wraps an arbitrary unit of work with GitHub commit-status notifications:
//! the commit is marked PENDING before the work runs and SUCCESS or FAILURE
//! afterwards. Context that is not configured explicitly is inferred from the
//! surrounding build.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no network or process
//! I/O. It defines *what* is needed ([`StatusClient`], [`BuildMetadata`],
//! [`EnvironmentLookup`]); the `github` and `cli` crates define *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`Account`, `CommitSha`, etc.) |
//! | [`types`] | `CommitState`, `StatusUpdate`, `Timestamp` |
//! | [`errors`] | Error taxonomy, rooted at `WrapperError` |
//! | [`context`] | Explicit configuration and the resolved `StatusContext` |
//! | [`resolver`] | Context resolution and origin parsing |
//! | [`overlay`] | Environment lookup and the scoped overlay |
//! | [`cancellation`] | Stop handles and signals |
//! | [`ports`] | The `StatusClient` trait |
//! | [`lifecycle`] | `LifecycleController` |

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod identifiers;
pub mod lifecycle;
pub mod overlay;
pub mod ports;
pub mod resolver;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use cancellation::{CancellationHandler, StopCause, StopHandle, StopSignal};
pub use context::{
    PartialContext, StatusContext, DEFAULT_API_URL, DEFAULT_STATUS_LABEL, ENV_ACCOUNT,
    ENV_API_URL, ENV_CONTEXT, ENV_REPO, ENV_SHA, ENV_TARGET_URL,
};
pub use errors::{
    ClientError, ContextField, InferenceError, ResolutionError, SetupStage, WorkError,
    WrapperError,
};
pub use identifiers::{Account, CommitSha, CredentialsId, InvocationId, RepositoryName, StatusLabel};
pub use lifecycle::{LifecycleController, LifecycleReport, StatusAttempt, DEFAULT_STOP_GRACE};
pub use overlay::{EnvironmentLookup, EnvironmentOverlay};
pub use ports::{RepositoryTarget, StatusClient};
pub use resolver::{parse_origin, resolve, BuildMetadata, RepositoryCoordinates, COMMIT_FALLBACK_VAR};
pub use types::{CommitState, StatusUpdate, Timestamp};
