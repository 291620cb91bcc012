//! Environment lookup and the scoped overlay exposed to the enclosed work.
//!
//! The overlay never writes into its base. Work that needs to hand the
//! overlay to a child process applies [`EnvironmentOverlay::overrides`] on top
//! of the inherited environment (for example via `Command::envs`), which leaves
//! the parent's own environment untouched for sibling invocations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Read-only access to an environment.
pub trait EnvironmentLookup: Send + Sync {
    /// Returns the value for `key`, or `None` if it is not set.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the value for `key` unless it is unset or blank.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }
}

impl EnvironmentLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl EnvironmentLookup for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

impl<T: EnvironmentLookup + ?Sized> EnvironmentLookup for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// An environment whose entries shadow those of a base environment.
///
/// Cheap to clone; the base is shared and never mutated.
#[derive(Clone)]
pub struct EnvironmentOverlay {
    base: Arc<dyn EnvironmentLookup>,
    overrides: BTreeMap<String, String>,
}

impl EnvironmentOverlay {
    /// Layers `overrides` on top of `base`. An empty `overrides` is valid and
    /// yields a pass-through view.
    pub fn with_overrides(
        base: Arc<dyn EnvironmentLookup>,
        overrides: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let overrides: BTreeMap<String, String> = overrides.into_iter().collect();
        tracing::trace!(keys = ?overrides.keys().collect::<Vec<_>>(), "Environment overrides");
        Self { base, overrides }
    }

    /// Returns the override entries only, in key order.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `true` if `key` is shadowed by this overlay.
    pub fn overrides_key(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }
}

impl EnvironmentLookup for EnvironmentOverlay {
    fn get(&self, key: &str) -> Option<String> {
        match self.overrides.get(key) {
            Some(value) => Some(value.clone()),
            None => self.base.get(key),
        }
    }
}

impl std::fmt::Debug for EnvironmentOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentOverlay")
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<HashMap<String, String>> {
        Arc::new(HashMap::from([
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("GIT_STATUS_SHA".to_string(), "old".to_string()),
        ]))
    }

    #[test]
    fn override_shadows_base_entry() {
        let base = base();
        let overlay = EnvironmentOverlay::with_overrides(
            base.clone(),
            [("GIT_STATUS_SHA".to_string(), "abc123".to_string())],
        );

        assert_eq!(overlay.get("GIT_STATUS_SHA").as_deref(), Some("abc123"));
        assert_eq!(overlay.get("PATH").as_deref(), Some("/usr/bin"));
        assert_eq!(overlay.get("MISSING"), None);
        // base untouched
        assert_eq!(HashMap::get(&*base, "GIT_STATUS_SHA").map(String::as_str), Some("old"));
    }

    #[test]
    fn empty_overlay_passes_through() {
        let overlay = EnvironmentOverlay::with_overrides(base(), Vec::new());
        assert_eq!(overlay.overrides().count(), 0);
        assert_eq!(overlay.get("PATH").as_deref(), Some("/usr/bin"));
    }

    #[test]
    fn blank_values_are_not_non_empty() {
        let env = HashMap::from([("GIT_COMMIT".to_string(), "  ".to_string())]);
        assert_eq!(env.get_non_empty("GIT_COMMIT"), None);
    }
}
