//! Scope tags
//!
//! Every merged definition must resolve to a registered scope tag. The two
//! built-in tags are always present; embedders add their own (e.g. `request`
//! or `session`) through [`Registry::register_scope`](crate::Registry::register_scope).

use crate::definition::{SCOPE_PROTOTYPE, SCOPE_SINGLETON};
use crate::{RegistryError, Result};
use indexmap::IndexSet;
use parking_lot::RwLock;

#[cfg(feature = "logging")]
use tracing::debug;

/// The set of scope tags known to one registry.
///
/// # Examples
///
/// ```rust
/// use component_registry::ScopeRegistry;
///
/// let scopes = ScopeRegistry::new();
/// assert!(scopes.is_registered("singleton"));
/// assert!(!scopes.is_registered("request"));
///
/// scopes.register("request").unwrap();
/// assert!(scopes.is_registered("request"));
/// ```
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    custom: RwLock<IndexSet<String>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional scope tag. Registering the same tag twice is a no-op.
    pub fn register(&self, scope: &str) -> Result<()> {
        let scope = scope.trim();
        if scope.is_empty() {
            return Err(RegistryError::InvalidScope {
                scope: scope.to_string(),
                reason: "scope name must not be empty".into(),
            });
        }
        if is_builtin(scope) {
            return Err(RegistryError::InvalidScope {
                scope: scope.to_string(),
                reason: "built-in scopes cannot be replaced".into(),
            });
        }

        if self.custom.write().insert(scope.to_string()) {
            #[cfg(feature = "logging")]
            debug!(
                target: "component_registry",
                scope = scope,
                "Registered custom scope"
            );
        }
        Ok(())
    }

    /// Check whether a tag names a built-in or registered scope
    #[inline]
    pub fn is_registered(&self, scope: &str) -> bool {
        is_builtin(scope) || self.custom.read().contains(scope)
    }

    /// All tags, built-ins first
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![SCOPE_SINGLETON.to_string(), SCOPE_PROTOTYPE.to_string()];
        names.extend(self.custom.read().iter().cloned());
        names
    }
}

#[inline]
fn is_builtin(scope: &str) -> bool {
    scope == SCOPE_SINGLETON || scope == SCOPE_PROTOTYPE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_builtins_always_registered() {
        let scopes = ScopeRegistry::new();
        assert!(scopes.is_registered(SCOPE_SINGLETON));
        assert!(scopes.is_registered(SCOPE_PROTOTYPE));
        assert_eq!(scopes.names(), vec!["singleton", "prototype"]);
    }

    #[test]
    fn test_custom_scope_registration_is_idempotent() {
        let scopes = ScopeRegistry::new();
        scopes.register("request").unwrap();
        scopes.register("request").unwrap();
        scopes.register("session").unwrap();
        assert_eq!(
            scopes.names(),
            vec!["singleton", "prototype", "request", "session"]
        );
    }

    #[test]
    fn test_builtin_and_blank_rejected() {
        let scopes = ScopeRegistry::new();
        assert_eq!(
            scopes.register("singleton").unwrap_err().kind(),
            ErrorKind::InvalidScope
        );
        assert_eq!(scopes.register("  ").unwrap_err().kind(), ErrorKind::InvalidScope);
    }
}
