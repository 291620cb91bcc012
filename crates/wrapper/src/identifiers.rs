//! Newtype domain identifiers.
//!
//! Every piece of resolved context that identifies something on the GitHub side
//! is a distinct newtype. This prevents accidentally passing, for example, an
//! [`Account`] where a [`RepositoryName`] is expected even though both are
//! strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or whitespace only.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single invocation of the wrapper step.
///
/// Generated fresh for every lifecycle run; recorded on the `invocation` span so
/// all activity of one wrapped unit of work can be correlated, including across
/// parallel build stages sharing a log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generates a new random invocation identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (GitHub / configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// The GitHub account (user or organisation) owning the repository.
    Account
}

string_id! {
    /// The repository name within its owning [`Account`] (no `owner/` prefix).
    RepositoryName
}

string_id! {
    /// A Git commit SHA, full or abbreviated, as supplied or inferred.
    CommitSha
}

string_id! {
    /// Names an entry in the host credential store holding a GitHub token.
    ///
    /// Absence (rather than an empty id) means anonymous access.
    CredentialsId
}

string_id! {
    /// The label distinguishing this status line from others on the same commit
    /// (GitHub's `context` field).
    StatusLabel
}

impl Default for StatusLabel {
    fn default() -> Self {
        Self(crate::DEFAULT_STATUS_LABEL.to_string())
    }
}
