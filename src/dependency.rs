//! Dependency bookkeeping
//!
//! Tracks "is depended on by" edges between component names, the set of names
//! currently being created, and derives a teardown order from the edges.

use crate::{RegistryError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct Edges {
    /// dependency -> names that depend on it
    dependents: IndexMap<String, IndexSet<String>>,
    /// dependent -> names it depends on
    dependencies: IndexMap<String, IndexSet<String>>,
}

/// Per-registry dependency edges and creation marks.
///
/// The edge maps are guarded together so they are always inverses of each
/// other. Creation marks live in a sharded map so unrelated creations on
/// different threads never contend on one lock.
///
/// # Examples
///
/// ```rust
/// use component_registry::DependencyTracker;
///
/// let tracker = DependencyTracker::new();
/// tracker.register_dependency("web", "service");
/// tracker.register_dependency("service", "database");
///
/// assert_eq!(tracker.dependents_of("database"), vec!["service"]);
/// assert_eq!(
///     tracker.destruction_order(["database", "service", "web"]),
///     vec!["web", "service", "database"]
/// );
/// ```
#[derive(Debug)]
pub struct DependencyTracker {
    edges: RwLock<Edges>,
    creating: DashMap<String, u64, RandomState>,
    sequence: AtomicU64,
}

impl DependencyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            edges: RwLock::new(Edges::default()),
            creating: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8,
            ),
            sequence: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Record that `dependent` depends on `dependency`.
    ///
    /// Returns `false` when the edge was already known.
    pub fn register_dependency(&self, dependent: &str, dependency: &str) -> bool {
        let mut edges = self.edges.write();
        let added = edges
            .dependents
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
        edges
            .dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());

        #[cfg(feature = "logging")]
        if added {
            trace!(
                target: "component_registry",
                dependent = dependent,
                dependency = dependency,
                "Registered dependency edge"
            );
        }

        added
    }

    /// Names that depend on `name`, in the order the edges were added
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.edges
            .read()
            .dependents
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names `name` depends on, in the order the edges were added
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.edges
            .read()
            .dependencies
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether anything depends on `name`
    pub fn has_dependents(&self, name: &str) -> bool {
        self.edges
            .read()
            .dependents
            .get(name)
            .is_some_and(|set| !set.is_empty())
    }

    /// Whether `candidate` depends on `name`, directly or transitively
    pub fn is_dependent(&self, name: &str, candidate: &str) -> bool {
        let edges = self.edges.read();
        let mut visited = HashSet::new();
        let mut pending = vec![name];

        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(dependents) = edges.dependents.get(current) {
                if dependents.contains(candidate) {
                    return true;
                }
                pending.extend(dependents.iter().map(String::as_str));
            }
        }
        false
    }

    /// Drop every edge touching `name`
    pub fn remove(&self, name: &str) {
        let mut edges = self.edges.write();
        if let Some(dependents) = edges.dependents.shift_remove(name) {
            for dependent in dependents {
                if let Some(set) = edges.dependencies.get_mut(&dependent) {
                    set.shift_remove(name);
                }
            }
        }
        if let Some(dependencies) = edges.dependencies.shift_remove(name) {
            for dependency in dependencies {
                if let Some(set) = edges.dependents.get_mut(&dependency) {
                    set.shift_remove(name);
                }
            }
        }
    }

    /// Forget all edges and creation marks
    pub fn clear(&self) {
        let mut edges = self.edges.write();
        edges.dependents.clear();
        edges.dependencies.clear();
        self.creating.clear();
    }

    /// Order in which `names` can be torn down.
    ///
    /// For every edge, the dependent comes before its dependency. Names are
    /// visited in the given order and edges in insertion order, so the result is
    /// deterministic; cycles are broken at the first name revisited. Edges through
    /// names outside the requested set still constrain the order.
    pub fn destruction_order<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: IndexSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        let edges = self.edges.read();
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(wanted.len());

        for name in &wanted {
            visit_dependents_first(name, &edges, &wanted, &mut visited, &mut order);
        }
        order
    }

    // =========================================================================
    // Creation marks
    // =========================================================================

    /// Mark `name` as being created.
    ///
    /// Fails with `CircularDependency` when it is already marked; the error
    /// carries every currently-creating name in the order the marks were taken.
    pub fn mark_creating(&self, name: &str) -> Result<()> {
        let already_creating = match self.creating.entry(name.to_string()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(self.sequence.fetch_add(1, Ordering::Relaxed));
                false
            }
        };

        if already_creating {
            let mut chain = self.creating_names();
            chain.push(name.to_string());

            #[cfg(feature = "logging")]
            debug!(
                target: "component_registry",
                component = name,
                chain = ?chain,
                "Component requested while already in creation"
            );

            return Err(RegistryError::CircularDependency {
                name: name.to_string(),
                chain,
            });
        }
        Ok(())
    }

    /// Clear the creation mark; returns whether one was set
    pub fn unmark_creating(&self, name: &str) -> bool {
        self.creating.remove(name).is_some()
    }

    #[inline]
    pub fn is_creating(&self, name: &str) -> bool {
        self.creating.contains_key(name)
    }

    /// Names currently being created, oldest mark first
    pub fn creating_names(&self) -> Vec<String> {
        let mut marks: Vec<(u64, String)> = self
            .creating
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        marks.sort_unstable();
        marks.into_iter().map(|(_, name)| name).collect()
    }

    /// Mark `name` as being created until the returned guard is dropped.
    ///
    /// The mark is released on every exit path of the creation attempt,
    /// including early returns and panics.
    pub fn begin_creation(&self, name: &str) -> Result<CreationGuard<'_>> {
        self.mark_creating(name)?;
        Ok(CreationGuard {
            tracker: self,
            name: name.to_string(),
        })
    }
}

/// Post-order walk over the dependents graph with an explicit stack, so deep
/// chains do not exhaust the thread stack.
fn visit_dependents_first<'a>(
    name: &'a str,
    edges: &'a Edges,
    wanted: &IndexSet<String>,
    visited: &mut HashSet<&'a str>,
    order: &mut Vec<String>,
) {
    if !visited.insert(name) {
        return;
    }
    // (name, index of the next dependent to visit)
    let mut stack: Vec<(&'a str, usize)> = vec![(name, 0)];

    while let Some((current, next)) = stack.last_mut() {
        let dependent = edges
            .dependents
            .get(*current)
            .and_then(|dependents| dependents.get_index(*next));

        match dependent {
            Some(dependent) => {
                *next += 1;
                if visited.insert(dependent.as_str()) {
                    stack.push((dependent.as_str(), 0));
                }
            }
            None => {
                let done = *current;
                stack.pop();
                if wanted.contains(done) {
                    order.push(done.to_string());
                }
            }
        }
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A creation mark that is released when dropped.
pub struct CreationGuard<'a> {
    tracker: &'a DependencyTracker,
    name: String,
}

impl CreationGuard<'_> {
    /// The component being created
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.tracker.unmark_creating(&self.name);
    }
}

impl std::fmt::Debug for CreationGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationGuard")
            .field("name", &self.name)
            .finish()
    }
}
