//! Shared value types for the commit-status lifecycle.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! behaviour: [`CommitState`] knows which transitions are terminal and
//! [`StatusUpdate`] is the exact payload handed to the
//! [`StatusClient`](crate::StatusClient) port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StatusLabel;

// ---------------------------------------------------------------------------
// Commit state
// ---------------------------------------------------------------------------

/// The state attached to a commit by one status update.
///
/// A lifecycle sends [`CommitState::Pending`] once, then exactly one of
/// [`CommitState::Success`] or [`CommitState::Failure`]. [`CommitState::Error`]
/// is part of the GitHub vocabulary but is never sent by the lifecycle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    /// The wrapped work is running.
    Pending,
    /// The wrapped work completed successfully.
    Success,
    /// The wrapped work failed or was stopped.
    Failure,
    /// The status could not be determined.
    Error,
}

impl CommitState {
    /// Returns the wire representation used by the GitHub statuses API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }

    /// Returns `true` for states that end a lifecycle.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Error => "ERROR",
        })
    }
}

// ---------------------------------------------------------------------------
// Status payload
// ---------------------------------------------------------------------------

/// One status update as sent to the [`StatusClient`](crate::StatusClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// State to attach to the commit.
    pub state: CommitState,

    /// Link shown next to the status in the GitHub UI.
    ///
    /// `None` when neither configuration nor the host supplied one.
    pub target_url: Option<String>,

    /// Short human-readable description.
    pub description: Option<String>,

    /// Status line label.
    pub label: StatusLabel,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
