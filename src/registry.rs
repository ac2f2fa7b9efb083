//! Component definition registry
//!
//! The `Registry` maps component names to their [`Definition`]s, keeps the
//! alias table, computes merged definitions on demand and owns the
//! dependency bookkeeping consulted by the instantiation engine.

use crate::definition::{Definition, DefinitionHolder};
use crate::dependency::{CreationGuard, DependencyTracker};
use crate::scope::ScopeRegistry;
use crate::{RegistryError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, info, trace, warn};

/// Prefix that asks for a factory component itself rather than its product
pub const FACTORY_PREFIX: char = '&';

/// Override policy of a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Re-registering a name with a different definition replaces it (logged)
    /// instead of failing with `DuplicateDefinition`
    pub allow_definition_overriding: bool,
    /// Re-pointing an existing alias at another name replaces it (logged)
    /// instead of failing with `InvalidAlias`
    pub allow_alias_overriding: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            allow_definition_overriding: true,
            allow_alias_overriding: false,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forbid both definition and alias overriding
    pub fn strict() -> Self {
        Self {
            allow_definition_overriding: false,
            allow_alias_overriding: false,
        }
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    pub fn allow_alias_overriding(mut self, allow: bool) -> Self {
        self.allow_alias_overriding = allow;
        self
    }
}

/// Definitions and aliases, guarded by one lock
#[derive(Debug, Default)]
struct RegistryState {
    definitions: IndexMap<String, Arc<Definition>>,
    /// alias -> target name (which may itself be an alias)
    aliases: IndexMap<String, String>,
}

impl RegistryState {
    /// Follow the alias chain from `name` to the name it finally denotes
    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(current) {
                Some(target) => current = target,
                None => break,
            }
        }
        current
    }
}

struct CachedMerge {
    generation: u64,
    definition: Arc<Definition>,
}

/// Registry of component definitions.
///
/// Reads are safe from many threads at once; registration and removal take a
/// single exclusive lock over the definition and alias tables. Merged
/// definitions are memoized and the whole cache is invalidated by any
/// mutation.
///
/// # Examples
///
/// ```rust
/// use component_registry::{Definition, Registry, Value};
///
/// let registry = Registry::new();
/// registry
///     .register(
///         "base",
///         Definition::new("app::Service")
///             .with_abstract(true)
///             .with_property("timeout", Value::literal("30")),
///     )
///     .unwrap();
/// registry
///     .register("svc", Definition::child_of("base").with_scope("prototype"))
///     .unwrap();
/// registry.register_alias("svc", "service").unwrap();
///
/// let merged = registry.merge("service").unwrap();
/// assert_eq!(merged.class_name.as_deref(), Some("app::Service"));
/// assert_eq!(merged.properties["timeout"], Value::literal("30"));
/// assert!(merged.is_prototype());
/// assert!(!merged.is_abstract);
/// ```
pub struct Registry {
    state: RwLock<RegistryState>,
    merged: DashMap<String, CachedMerge, RandomState>,
    /// Bumped on every mutation; cached merges from older generations are ignored
    generation: AtomicU64,
    dependencies: DependencyTracker,
    scopes: ScopeRegistry,
    parent: Option<Arc<Registry>>,
    config: RegistryConfig,
    depth: u32,
}

impl Registry {
    /// Create an empty root registry with the default override policy.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty root registry with a specific override policy.
    pub fn with_config(config: RegistryConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            depth = 0,
            allow_definition_overriding = config.allow_definition_overriding,
            allow_alias_overriding = config.allow_alias_overriding,
            "Creating new root registry"
        );

        Self::build(config, None, 0)
    }

    /// Create a registry that falls back to `parent` for names it does not hold.
    pub fn with_parent(parent: Arc<Registry>, config: RegistryConfig) -> Self {
        let depth = parent.depth + 1;

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            parent_depth = parent.depth,
            child_depth = depth,
            parent_definitions = parent.count(),
            "Creating child registry"
        );

        Self::build(config, Some(parent), depth)
    }

    fn build(config: RegistryConfig, parent: Option<Arc<Registry>>, depth: u32) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            merged: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8, // 8 shards balances creation speed vs concurrency
            ),
            generation: AtomicU64::new(0),
            dependencies: DependencyTracker::new(),
            scopes: ScopeRegistry::new(),
            parent,
            config,
            depth,
        }
    }

    /// Create a child registry of this one, sharing its override policy.
    #[inline]
    pub fn child(self: &Arc<Self>) -> Self {
        Self::with_parent(Arc::clone(self), self.config)
    }

    /// The parent registry consulted on lookup misses
    #[inline]
    pub fn parent(&self) -> Option<&Arc<Registry>> {
        self.parent.as_ref()
    }

    /// Distance from the root registry (0 = root)
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register `definition` under `name`, replacing any previous definition.
    ///
    /// Re-registering identical content always succeeds. Different content is
    /// accepted and logged as an override unless overriding is disabled, in
    /// which case this fails with `DuplicateDefinition`.
    pub fn register(&self, name: &str, definition: Definition) -> Result<()> {
        let mut state = self.state.write();
        self.register_locked(&mut state, name, definition)
    }

    fn register_locked(
        &self,
        state: &mut RegistryState,
        name: &str,
        definition: Definition,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RegistryError::invalid_name(name, "name must not be empty"));
        }

        if let Some(existing) = state.definitions.get(name) {
            if **existing == definition {
                #[cfg(feature = "logging")]
                trace!(
                    target: "component_registry",
                    component = name,
                    "Re-registering identical definition"
                );
            } else if !self.config.allow_definition_overriding {
                return Err(RegistryError::duplicate(name));
            } else {
                #[cfg(feature = "logging")]
                info!(
                    target: "component_registry",
                    component = name,
                    previous = existing.resource_description.as_deref().unwrap_or("<unknown>"),
                    replacement = definition.resource_description.as_deref().unwrap_or("<unknown>"),
                    "Overriding definition with a different definition"
                );
            }
        } else if state.aliases.contains_key(name) {
            if !self.config.allow_definition_overriding {
                return Err(RegistryError::duplicate(name));
            }

            #[cfg(feature = "logging")]
            warn!(
                target: "component_registry",
                component = name,
                alias_target = state.aliases.get(name).map(String::as_str).unwrap_or_default(),
                "Definition replaces an existing alias of the same name"
            );

            state.aliases.shift_remove(name);
        }

        state.definitions.insert(name.to_string(), Arc::new(definition));
        self.invalidate_merged();

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            component = name,
            depth = self.depth,
            definition_count = state.definitions.len(),
            "Registered component definition"
        );

        Ok(())
    }

    /// Register a definition and every alias it carries.
    ///
    /// All or nothing: if any alias is rejected the registry is left as it was.
    pub fn register_holder(&self, holder: &DefinitionHolder) -> Result<()> {
        let mut state = self.state.write();

        let previous = state.definitions.get(&holder.name).cloned();
        let touched: Vec<(String, Option<String>)> = std::iter::once(&holder.name)
            .chain(&holder.aliases)
            .map(|key| (key.clone(), state.aliases.get(key).cloned()))
            .collect();

        self.register_locked(&mut state, &holder.name, holder.definition.clone())?;
        for alias in &holder.aliases {
            if let Err(error) = self.alias_locked(&mut state, &holder.name, alias) {
                match previous {
                    Some(definition) => {
                        state.definitions.insert(holder.name.clone(), definition);
                    }
                    None => {
                        state.definitions.shift_remove(&holder.name);
                    }
                }
                for (key, target) in touched {
                    match target {
                        Some(target) => {
                            state.aliases.insert(key, target);
                        }
                        None => {
                            state.aliases.shift_remove(&key);
                        }
                    }
                }
                self.invalidate_merged();

                #[cfg(feature = "logging")]
                debug!(
                    target: "component_registry",
                    component = holder.name.as_str(),
                    alias = alias.as_str(),
                    "Rolled back definition after rejected alias"
                );

                return Err(error);
            }
        }
        Ok(())
    }

    /// Remove the definition registered under `name` (aliases are kept).
    pub fn remove(&self, name: &str) -> Result<Arc<Definition>> {
        let removed = {
            let mut state = self.state.write();
            let removed = state
                .definitions
                .shift_remove(name)
                .ok_or_else(|| RegistryError::not_found(name))?;
            self.invalidate_merged();
            removed
        };
        self.dependencies.remove(name);

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            component = name,
            depth = self.depth,
            "Removed component definition"
        );

        Ok(removed)
    }

    /// Register `alias` as another name for `name`.
    ///
    /// The target does not have to exist yet. Registering the same pair twice is
    /// a no-op; an alias that already denotes another name fails with
    /// `InvalidAlias` unless alias overriding is enabled.
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        let mut state = self.state.write();
        self.alias_locked(&mut state, name, alias)
    }

    fn alias_locked(&self, state: &mut RegistryState, name: &str, alias: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RegistryError::invalid_alias(name, alias, "name must not be empty"));
        }
        if alias.trim().is_empty() {
            return Err(RegistryError::invalid_alias(name, alias, "alias must not be empty"));
        }

        if alias == name {
            if state.aliases.shift_remove(alias).is_some() {
                self.invalidate_merged();
            }
            return Ok(());
        }

        if state.definitions.contains_key(alias) {
            return Err(RegistryError::invalid_alias(
                name,
                alias,
                "a component definition is already registered under that name",
            ));
        }

        if let Some(existing) = state.aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            if !self.config.allow_alias_overriding {
                return Err(RegistryError::invalid_alias(
                    name,
                    alias,
                    format!("alias is already registered for '{existing}'"),
                ));
            }

            #[cfg(feature = "logging")]
            info!(
                target: "component_registry",
                alias = alias,
                previous = existing.as_str(),
                replacement = name,
                "Overriding alias"
            );
        }

        if state.canonical(name) == alias || resolves_through(state, name, alias) {
            return Err(RegistryError::invalid_alias(
                name,
                alias,
                "alias would create a circular reference",
            ));
        }

        state.aliases.insert(alias.to_string(), name.to_string());
        self.invalidate_merged();

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            component = name,
            alias = alias,
            "Registered alias"
        );

        Ok(())
    }

    /// Remove an alias.
    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        let mut state = self.state.write();
        state
            .aliases
            .shift_remove(alias)
            .ok_or_else(|| RegistryError::not_found(alias))?;
        self.invalidate_merged();
        Ok(())
    }

    /// Register an additional scope tag accepted by [`merge`](Self::merge).
    pub fn register_scope(&self, scope: &str) -> Result<()> {
        self.scopes.register(scope)
    }

    /// Whether `scope` is known here or in any ancestor
    pub fn is_scope_registered(&self, scope: &str) -> bool {
        self.scopes.is_registered(scope)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_scope_registered(scope))
    }

    /// Scope tags registered locally, built-ins first
    pub fn scope_names(&self) -> Vec<String> {
        self.scopes.names()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Get the definition registered under `name` or an alias of it.
    ///
    /// Falls back to the parent chain when the name is unknown locally.
    pub fn get(&self, name: &str) -> Result<Arc<Definition>> {
        if let Some(definition) = self.get_local(name) {
            #[cfg(feature = "logging")]
            trace!(
                target: "component_registry",
                component = name,
                depth = self.depth,
                location = "local",
                "Definition found in current registry"
            );
            return Ok(definition);
        }

        match &self.parent {
            Some(parent) => parent.get(name),
            None => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "component_registry",
                    component = name,
                    depth = self.depth,
                    "Definition not found in registry or parent chain"
                );
                Err(RegistryError::not_found(name))
            }
        }
    }

    /// Try to get a definition, returning None if not found.
    #[inline]
    pub fn try_get(&self, name: &str) -> Option<Arc<Definition>> {
        self.get(name).ok()
    }

    fn get_local(&self, name: &str) -> Option<Arc<Definition>> {
        let state = self.state.read();
        let canonical = state.canonical(transformed_name(name));
        state.definitions.get(canonical).cloned()
    }

    /// Whether a definition is registered locally under exactly `name`.
    ///
    /// Does not resolve aliases or consult the parent registry.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().definitions.contains_key(name)
    }

    /// Whether `name` is taken locally by a definition or an alias
    pub fn is_name_in_use(&self, name: &str) -> bool {
        let state = self.state.read();
        state.definitions.contains_key(name) || state.aliases.contains_key(name)
    }

    /// Whether `name` is registered locally as an alias
    pub fn is_alias(&self, name: &str) -> bool {
        self.state.read().aliases.contains_key(name)
    }

    /// All locally registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.state.read().definitions.keys().cloned().collect()
    }

    /// Number of locally registered definitions
    #[inline]
    pub fn count(&self) -> usize {
        self.state.read().definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Every alias that resolves to `name`, directly or through other aliases
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let state = self.state.read();
        let mut found: Vec<String> = Vec::new();
        let mut pending = vec![name.to_string()];

        while let Some(target) = pending.pop() {
            for (alias, alias_target) in &state.aliases {
                if *alias_target == target && !found.contains(alias) && alias != name {
                    found.push(alias.clone());
                    pending.push(alias.clone());
                }
            }
        }
        found
    }

    /// The registered name `name` denotes: factory prefix stripped, aliases followed
    pub fn canonical_name(&self, name: &str) -> String {
        let state = self.state.read();
        state.canonical(transformed_name(name)).to_string()
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Compute the effective recipe of `name` by folding its parent chain.
    ///
    /// Unset child fields inherit from the parent; list and map fields are
    /// unioned with the child winning. A cycle in the parent chain fails with
    /// `CircularParent`, a missing parent with `NotFound`, and an effective scope
    /// that is not registered with `UnknownScope`.
    ///
    /// Every `depends_on` entry of the result is recorded as a dependency edge.
    pub fn merge(&self, name: &str) -> Result<Arc<Definition>> {
        let merged = self.merged_definition(name)?;
        for dependency in &merged.depends_on {
            self.register_dependency(name, dependency);
        }

        let scope = merged.effective_scope();
        if !self.is_scope_registered(scope) {
            return Err(RegistryError::UnknownScope {
                name: name.to_string(),
                scope: scope.to_string(),
            });
        }
        Ok(merged)
    }

    /// Sum of the generations of this registry and every ancestor; grows on any
    /// mutation anywhere in the chain
    fn chain_generation(&self) -> u64 {
        let local = self.generation.load(Ordering::Acquire);
        match &self.parent {
            Some(parent) => local.wrapping_add(parent.chain_generation()),
            None => local,
        }
    }

    fn merged_definition(&self, name: &str) -> Result<Arc<Definition>> {
        let generation = self.chain_generation();
        let canonical = self.canonical_name(name);

        if let Some(cached) = self.merged.get(&canonical) {
            if cached.generation == generation {
                #[cfg(feature = "logging")]
                trace!(
                    target: "component_registry",
                    component = canonical.as_str(),
                    "Merged definition served from cache"
                );
                return Ok(Arc::clone(&cached.definition));
            }
        }

        let merged = {
            let state = self.state.read();
            if !state.definitions.contains_key(&canonical) {
                drop(state);
                return match &self.parent {
                    Some(parent) => parent.merged_definition(name),
                    None => Err(RegistryError::not_found(name)),
                };
            }
            Arc::new(self.fold_parent_chain(&state, &canonical)?)
        };

        self.merged.insert(
            canonical,
            CachedMerge {
                generation,
                definition: Arc::clone(&merged),
            },
        );
        Ok(merged)
    }

    fn fold_parent_chain(&self, state: &RegistryState, name: &str) -> Result<Definition> {
        let max_depth = state.definitions.len() + 1;
        let mut chain: Vec<&Arc<Definition>> = Vec::new();
        let mut visited: Vec<&str> = Vec::new();
        let mut inherited: Option<Arc<Definition>> = None;

        let mut current_name = name;
        let mut current = state
            .definitions
            .get(name)
            .ok_or_else(|| RegistryError::not_found(name))?;

        loop {
            visited.push(current_name);
            chain.push(current);

            let parent_name = match current.parent_name.as_deref() {
                Some(parent) if !parent.trim().is_empty() => parent,
                _ => break,
            };
            let parent_canonical = state.canonical(transformed_name(parent_name));

            // A parent with the child's own name lives in the parent registry
            if parent_canonical == current_name {
                inherited = Some(self.merged_from_parent(parent_name)?);
                break;
            }

            if visited.contains(&parent_canonical) || visited.len() >= max_depth {
                let mut cycle: Vec<String> = visited.iter().map(|n| n.to_string()).collect();
                cycle.push(parent_canonical.to_string());
                return Err(RegistryError::CircularParent {
                    name: name.to_string(),
                    chain: cycle,
                });
            }

            match state.definitions.get(parent_canonical) {
                Some(parent) => {
                    current_name = parent_canonical;
                    current = parent;
                }
                None => {
                    inherited = Some(self.merged_from_parent(parent_name)?);
                    break;
                }
            }
        }

        let mut merged = match inherited {
            Some(base) => (*base).clone(),
            None => {
                let Some(root) = chain.pop() else {
                    return Err(RegistryError::not_found(name));
                };
                let mut root = (**root).clone();
                root.parent_name = None;
                root
            }
        };
        for definition in chain.iter().rev() {
            merged = definition.overlay(&merged);
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "component_registry",
            component = name,
            chain = ?visited,
            "Merged definition chain"
        );

        Ok(merged)
    }

    fn merged_from_parent(&self, parent_name: &str) -> Result<Arc<Definition>> {
        match &self.parent {
            Some(parent) => parent.merged_definition(parent_name),
            None => Err(RegistryError::not_found(parent_name)),
        }
    }

    /// Drop every memoized merge.
    ///
    /// Must be called after the mutation it reflects, while the state lock is
    /// still held.
    fn invalidate_merged(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.merged.clear();
    }

    // =========================================================================
    // Dependencies and creation state
    // =========================================================================

    /// Record that `dependent` depends on `dependency` (names are canonicalised).
    pub fn register_dependency(&self, dependent: &str, dependency: &str) -> bool {
        let dependent = self.canonical_name(dependent);
        let dependency = self.canonical_name(dependency);
        self.dependencies.register_dependency(&dependent, &dependency)
    }

    /// Names that depend on `name`
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependencies.dependents_of(&self.canonical_name(name))
    }

    /// Names `name` depends on
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.dependencies.dependencies_of(&self.canonical_name(name))
    }

    /// Whether `candidate` depends on `name`, directly or transitively
    pub fn is_dependent(&self, name: &str, candidate: &str) -> bool {
        self.dependencies
            .is_dependent(&self.canonical_name(name), &self.canonical_name(candidate))
    }

    /// See [`DependencyTracker::mark_creating`]
    pub fn mark_creating(&self, name: &str) -> Result<()> {
        self.dependencies.mark_creating(&self.canonical_name(name))
    }

    /// See [`DependencyTracker::unmark_creating`]
    pub fn unmark_creating(&self, name: &str) -> bool {
        self.dependencies.unmark_creating(&self.canonical_name(name))
    }

    #[inline]
    pub fn is_creating(&self, name: &str) -> bool {
        self.dependencies.is_creating(&self.canonical_name(name))
    }

    /// See [`DependencyTracker::begin_creation`]
    pub fn begin_creation(&self, name: &str) -> Result<CreationGuard<'_>> {
        self.dependencies.begin_creation(&self.canonical_name(name))
    }

    /// Teardown order for `names`: dependents before their dependencies
    pub fn destruction_order<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical: Vec<String> = names
            .into_iter()
            .map(|name| self.canonical_name(name.as_ref()))
            .collect();
        self.dependencies.destruction_order(canonical)
    }

    /// Teardown order for every local definition, ties broken by reverse registration order.
    ///
    /// Merges each definition first so declared `depends_on` entries are ordered
    /// too; definitions that fail to merge keep only their recorded edges.
    pub fn destruction_order_all(&self) -> Vec<String> {
        let mut names = self.names();
        for name in &names {
            let _ = self.merge(name);
        }
        names.reverse();
        self.dependencies.destruction_order(names)
    }

    /// Direct access to the dependency tracker
    #[inline]
    pub fn dependency_tracker(&self) -> &DependencyTracker {
        &self.dependencies
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Remove all definitions, aliases and dependency state from this registry.
    ///
    /// Does not affect the parent registry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let count = state.definitions.len();
        state.definitions.clear();
        state.aliases.clear();
        self.invalidate_merged();
        self.dependencies.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            depth = self.depth,
            definitions_removed = count,
            "Registry cleared"
        );
        #[cfg(not(feature = "logging"))]
        let _ = count;
    }
}

/// Whether following aliases from `start` ever reaches `alias`
fn resolves_through(state: &RegistryState, start: &str, alias: &str) -> bool {
    let mut current = start;
    for _ in 0..=state.aliases.len() {
        match state.aliases.get(current) {
            Some(target) if target == alias => return true,
            Some(target) => current = target,
            None => return false,
        }
    }
    false
}

/// Strip any factory dereference prefix from a requested name
pub fn transformed_name(name: &str) -> &str {
    name.trim_start_matches(FACTORY_PREFIX)
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("definition_count", &state.definitions.len())
            .field("alias_count", &state.aliases.len())
            .field("depth", &self.depth)
            .field("has_parent", &self.parent.is_some())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{SCOPE_PROTOTYPE, SCOPE_SINGLETON, Value};
    use crate::ErrorKind;

    fn service(class: &str) -> Definition {
        Definition::new(class)
    }

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new();
        registry.register("svc", service("app::Svc")).unwrap();

        let definition = registry.get("svc").unwrap();
        assert_eq!(definition.class_name.as_deref(), Some("app::Svc"));
        assert!(registry.contains("svc"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = Registry::new();
        let err = registry.register("", service("app::Svc")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);
        assert_eq!(
            registry.register("   ", service("app::Svc")).unwrap_err().kind(),
            ErrorKind::InvalidName
        );
    }

    #[test]
    fn test_names_preserve_registration_order() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(name, service("app::Svc")).unwrap();
        }
        registry.register("alpha", service("app::Other")).unwrap();

        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.names(), registry.names());

        registry.remove("zeta").unwrap();
        assert_eq!(registry.names(), vec!["alpha", "mid"]);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let registry = Registry::new();
        assert_eq!(registry.remove("nope").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(registry.get("nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_identical_reregistration_is_idempotent_even_when_strict() {
        let registry = Registry::with_config(RegistryConfig::strict());
        let definition = service("app::Svc").with_property("timeout", Value::literal("30"));

        registry.register("svc", definition.clone()).unwrap();
        let before = registry.merge("svc").unwrap();
        registry
            .register("svc", definition.with_resource_description("other.xml"))
            .unwrap();

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.merge("svc").unwrap(), before);
    }

    #[test]
    fn test_override_policy() {
        let lenient = Registry::new();
        lenient.register("svc", service("app::A")).unwrap();
        lenient.register("svc", service("app::B")).unwrap();
        assert_eq!(lenient.get("svc").unwrap().class_name.as_deref(), Some("app::B"));

        let strict = Registry::with_config(RegistryConfig::strict());
        strict.register("svc", service("app::A")).unwrap();
        let err = strict.register("svc", service("app::B")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDefinition);
        assert_eq!(strict.get("svc").unwrap().class_name.as_deref(), Some("app::A"));
    }

    #[test]
    fn test_alias_idempotent_and_conflicting() {
        let registry = Registry::new();
        registry.register_alias("x", "y").unwrap();
        registry.register_alias("x", "y").unwrap();

        registry.register_alias("x", "z").unwrap();
        let err = registry.register_alias("w", "z").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAlias);
    }

    #[test]
    fn test_alias_override_when_enabled() {
        let registry = Registry::with_config(RegistryConfig::new().allow_alias_overriding(true));
        registry.register("a", service("app::A")).unwrap();
        registry.register("b", service("app::B")).unwrap();
        registry.register_alias("a", "current").unwrap();
        registry.register_alias("b", "current").unwrap();

        assert_eq!(registry.get("current").unwrap().class_name.as_deref(), Some("app::B"));
    }

    #[test]
    fn test_alias_colliding_with_name_rejected() {
        let registry = Registry::new();
        registry.register("a", service("app::A")).unwrap();
        registry.register("b", service("app::B")).unwrap();

        let err = registry.register_alias("a", "b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAlias);
        assert!(registry.is_name_in_use("b"));
    }

    #[test]
    fn test_blank_alias_rejected() {
        let registry = Registry::new();
        assert_eq!(
            registry.register_alias("a", "").unwrap_err().kind(),
            ErrorKind::InvalidAlias
        );
        assert_eq!(
            registry.register_alias(" ", "b").unwrap_err().kind(),
            ErrorKind::InvalidAlias
        );
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let registry = Registry::new();
        registry.register_alias("a", "b").unwrap();
        registry.register_alias("b", "c").unwrap();

        let err = registry.register_alias("c", "a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAlias);
    }

    #[test]
    fn test_alias_to_itself_removes_alias() {
        let registry = Registry::new();
        registry.register_alias("a", "b").unwrap();
        registry.register_alias("b", "b").unwrap();
        assert!(!registry.is_alias("b"));
    }

    #[test]
    fn test_alias_before_target_and_chains() {
        let registry = Registry::new();
        registry.register_alias("svc", "service").unwrap();
        registry.register_alias("service", "api").unwrap();
        assert!(registry.get("api").is_err());

        registry.register("svc", service("app::Svc")).unwrap();
        assert_eq!(registry.get("api").unwrap(), registry.get("svc").unwrap());
        assert_eq!(registry.canonical_name("api"), "svc");
        assert_eq!(registry.canonical_name("&api"), "svc");

        let mut aliases = registry.aliases("svc");
        aliases.sort();
        assert_eq!(aliases, vec!["api", "service"]);
        assert!(registry.is_name_in_use("service"));
        assert!(!registry.contains("service"));
    }

    #[test]
    fn test_register_holder_rolls_back_on_rejected_alias() {
        let registry = Registry::new();
        registry.register("x", service("app::X")).unwrap();
        registry.register_alias("x", "shared").unwrap();

        let holder = DefinitionHolder::new("svc", service("app::Svc"))
            .with_aliases(vec!["svc2".to_string(), "shared".to_string()]);
        assert_eq!(
            registry.register_holder(&holder).unwrap_err().kind(),
            ErrorKind::InvalidAlias
        );
        assert!(!registry.contains("svc"));
        assert!(!registry.is_name_in_use("svc2"));
        assert_eq!(registry.canonical_name("shared"), "x");

        registry.register("svc", service("app::Old")).unwrap();
        assert!(registry.register_holder(&holder).is_err());
        assert_eq!(registry.get("svc").unwrap().class_name.as_deref(), Some("app::Old"));
        assert!(registry.aliases("svc").is_empty());

        let holder = DefinitionHolder::new("svc", service("app::Svc"))
            .with_aliases(vec!["svc2".to_string()]);
        registry.register_holder(&holder).unwrap();
        assert_eq!(registry.get("svc2").unwrap().class_name.as_deref(), Some("app::Svc"));
    }

    #[test]
    fn test_definition_replaces_alias_unless_strict() {
        let registry = Registry::new();
        registry.register_alias("svc", "service").unwrap();
        registry.register("service", service("app::Other")).unwrap();
        assert!(!registry.is_alias("service"));
        assert!(registry.contains("service"));

        let strict = Registry::with_config(RegistryConfig::strict());
        strict.register_alias("svc", "service").unwrap();
        assert_eq!(
            strict.register("service", service("app::Other")).unwrap_err().kind(),
            ErrorKind::DuplicateDefinition
        );
    }

    #[test]
    fn test_hierarchical_lookup_falls_through_to_parent() {
        let root = Arc::new(Registry::new());
        root.register("db", service("app::Db")).unwrap();

        let child = root.child();
        child.register("svc", service("app::Svc")).unwrap();

        assert_eq!(child.depth(), 1);
        assert!(child.get("db").is_ok());
        assert!(!child.contains("db"));
        assert!(root.get("svc").is_err());
    }

    #[test]
    fn test_merge_scalar_override_law() {
        let registry = Registry::new();
        registry
            .register("parent", service("app::Base").with_scope(SCOPE_PROTOTYPE))
            .unwrap();
        registry
            .register("inherits", Definition::child_of("parent"))
            .unwrap();
        registry
            .register(
                "overrides",
                Definition::child_of("parent").with_scope(SCOPE_SINGLETON),
            )
            .unwrap();

        assert_eq!(registry.merge("inherits").unwrap().effective_scope(), SCOPE_PROTOTYPE);
        assert_eq!(registry.merge("overrides").unwrap().effective_scope(), SCOPE_SINGLETON);
    }

    #[test]
    fn test_merge_long_chain() {
        let registry = Registry::new();
        registry
            .register("level0", service("app::Root").with_property("p0", Value::literal("0")))
            .unwrap();
        for i in 1..50 {
            registry
                .register(
                    &format!("level{i}"),
                    Definition::child_of(format!("level{}", i - 1))
                        .with_property(format!("p{i}"), Value::literal(i.to_string())),
                )
                .unwrap();
        }

        let merged = registry.merge("level49").unwrap();
        assert_eq!(merged.properties.len(), 50);
        assert_eq!(merged.class_name.as_deref(), Some("app::Root"));
    }

    #[test]
    fn test_merge_cycle_fails() {
        let registry = Registry::new();
        registry.register("a", Definition::child_of("b")).unwrap();
        registry.register("b", Definition::child_of("c")).unwrap();
        registry.register("c", Definition::child_of("a")).unwrap();

        let err = registry.merge("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircularParent);

        registry.register("self", Definition::child_of("loop")).unwrap();
        registry.register_alias("self", "loop").unwrap();
        assert!(registry.merge("self").is_err());
    }

    #[test]
    fn test_merge_missing_parent_fails_at_merge_time() {
        let registry = Registry::new();
        registry.register("child", Definition::child_of("later")).unwrap();
        assert_eq!(registry.merge("child").unwrap_err().kind(), ErrorKind::NotFound);

        registry.register("later", service("app::Later")).unwrap();
        assert_eq!(
            registry.merge("child").unwrap().class_name.as_deref(),
            Some("app::Later")
        );
    }

    #[test]
    fn test_merge_through_alias_parent() {
        let registry = Registry::new();
        registry
            .register("template", service("app::Base").with_abstract(true))
            .unwrap();
        registry.register_alias("template", "base").unwrap();
        registry.register("child", Definition::child_of("base")).unwrap();

        let merged = registry.merge("child").unwrap();
        assert_eq!(merged.class_name.as_deref(), Some("app::Base"));
        assert!(!merged.is_abstract);
        assert!(registry.merge("template").unwrap().is_abstract);
    }

    #[test]
    fn test_merge_same_name_parent_in_parent_registry() {
        let root = Arc::new(Registry::new());
        root.register("svc", service("app::Svc").with_property("timeout", Value::literal("30")))
            .unwrap();

        let child = root.child();
        child
            .register(
                "svc",
                Definition::child_of("svc").with_property("retries", Value::literal("3")),
            )
            .unwrap();

        let merged = child.merge("svc").unwrap();
        assert_eq!(merged.class_name.as_deref(), Some("app::Svc"));
        assert_eq!(merged.properties.len(), 2);
        assert!(child.merge("missing").is_err());
    }

    #[test]
    fn test_merge_delegates_to_parent_for_unknown_local_name() {
        let root = Arc::new(Registry::new());
        root.register("db", service("app::Db")).unwrap();
        let child = root.child();

        assert_eq!(child.merge("db").unwrap().class_name.as_deref(), Some("app::Db"));
    }

    #[test]
    fn test_merge_cache_invalidated_by_parent_change() {
        let registry = Registry::new();
        registry
            .register("base", service("app::Base").with_property("timeout", Value::literal("30")))
            .unwrap();
        registry.register("svc", Definition::child_of("base")).unwrap();

        let first = registry.merge("svc").unwrap();
        let cached = registry.merge("svc").unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        registry
            .register("base", service("app::Base").with_property("timeout", Value::literal("60")))
            .unwrap();
        assert_eq!(
            registry.merge("svc").unwrap().properties["timeout"],
            Value::literal("60")
        );
    }

    #[test]
    fn test_child_merge_cache_sees_parent_reregistration() {
        let root = Arc::new(Registry::new());
        root.register("svc", service("app::Svc").with_property("timeout", Value::literal("30")))
            .unwrap();

        let child = root.child();
        child.register("svc", Definition::child_of("svc")).unwrap();
        assert_eq!(child.merge("svc").unwrap().properties["timeout"], Value::literal("30"));

        root.register("svc", service("app::Svc").with_property("timeout", Value::literal("60")))
            .unwrap();
        assert_eq!(child.merge("svc").unwrap().properties["timeout"], Value::literal("60"));
    }

    #[test]
    fn test_merge_records_declared_dependencies() {
        let registry = Registry::new();
        registry
            .register("svc", service("app::Svc").with_depends_on("database"))
            .unwrap();
        registry.register("db", service("app::Db")).unwrap();
        registry.register_alias("db", "database").unwrap();

        registry.merge("svc").unwrap();
        assert_eq!(registry.dependencies_of("svc"), vec!["db"]);
        assert_eq!(registry.dependents_of("db"), vec!["svc"]);
    }

    #[test]
    fn test_destruction_order_all_includes_declared_dependencies() {
        let registry = Registry::new();
        registry
            .register("svc", service("app::Svc").with_depends_on("db"))
            .unwrap();
        registry.register("db", service("app::Db")).unwrap();
        registry.register("broken", Definition::child_of("missing")).unwrap();

        assert_eq!(registry.destruction_order_all(), vec!["broken", "svc", "db"]);
    }

    #[test]
    fn test_merge_rejects_unknown_scope() {
        let registry = Registry::new();
        registry
            .register("svc", service("app::Svc").with_scope("request"))
            .unwrap();
        assert_eq!(registry.merge("svc").unwrap_err().kind(), ErrorKind::UnknownScope);

        registry.register_scope("request").unwrap();
        assert_eq!(registry.merge("svc").unwrap().effective_scope(), "request");

        let child = Arc::new(registry).child();
        child
            .register("scoped", service("app::Scoped").with_scope("request"))
            .unwrap();
        assert!(child.merge("scoped").is_ok());
    }

    #[test]
    fn test_concurrent_merge_while_registering() {
        let registry = Registry::new();
        registry
            .register("base", service("app::Base").with_property("v", Value::literal("0")))
            .unwrap();
        registry.register("svc", Definition::child_of("base")).unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..200 {
                        let merged = registry.merge("svc").unwrap();
                        assert_eq!(merged.class_name.as_deref(), Some("app::Base"));
                        assert!(merged.properties.contains_key("v"));
                    }
                });
            }
            s.spawn(|| {
                for i in 0..200 {
                    registry
                        .register(
                            "base",
                            service("app::Base").with_property("v", Value::literal(i.to_string())),
                        )
                        .unwrap();
                }
            });
        });

        assert_eq!(
            registry.merge("svc").unwrap().properties["v"],
            Value::literal("199")
        );
    }

    #[test]
    fn test_dependencies_use_canonical_names() {
        let registry = Registry::new();
        registry.register("a", service("app::A")).unwrap();
        registry.register("b", service("app::B")).unwrap();
        registry.register("c", service("app::C")).unwrap();
        registry.register_alias("b", "bee").unwrap();

        registry.register_dependency("a", "bee");
        registry.register_dependency("b", "c");

        assert_eq!(registry.dependents_of("b"), vec!["a"]);
        assert_eq!(registry.dependencies_of("a"), vec!["b"]);
        assert!(registry.is_dependent("c", "a"));
        assert_eq!(registry.destruction_order(["a", "bee", "c"]), vec!["a", "b", "c"]);
        assert_eq!(registry.destruction_order_all(), vec!["a", "b", "c"]);

        registry.remove("b").unwrap();
        assert!(registry.dependencies_of("a").is_empty());
    }

    #[test]
    fn test_creation_marks_through_aliases() {
        let registry = Registry::new();
        registry.register("svc", service("app::Svc")).unwrap();
        registry.register_alias("svc", "service").unwrap();

        registry.mark_creating("svc").unwrap();
        assert!(registry.is_creating("service"));
        assert_eq!(
            registry.mark_creating("service").unwrap_err().kind(),
            ErrorKind::CircularDependency
        );
        assert!(registry.unmark_creating("svc"));

        {
            let _guard = registry.begin_creation("service").unwrap();
            assert!(registry.is_creating("svc"));
        }
        assert!(!registry.is_creating("svc"));
    }

    #[test]
    fn test_clear() {
        let registry = Registry::new();
        registry.register("a", service("app::A")).unwrap();
        registry.register_alias("a", "alias").unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert!(!registry.is_name_in_use("alias"));
    }
}
