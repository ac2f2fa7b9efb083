//! Load orchestration
//!
//! A [`DefinitionContext`] owns everything needed to (re)build a registry
//! from configuration: locations, environment, loader, parser and hooks.
//! Each refresh compiles into a brand-new registry and publishes it only once
//! every document loaded cleanly.

use crate::compiler::{CompileHooks, DocumentCompiler};
use crate::document::DocumentParser;
use crate::environment::{Environment, StandardEnvironment};
use crate::locations::{ConfigLocations, DefaultLocations, NoDefaultLocations};
use crate::registry::{Registry, RegistryConfig};
use crate::resource::ResourceLoader;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// Unique context identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Generate a new unique context ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Builds registries from configured document locations.
///
/// # Examples
///
/// ```rust
/// use component_registry::{DefinitionContext, Element, MemoryDocuments};
/// use std::sync::Arc;
///
/// let docs = Arc::new(MemoryDocuments::new().with(
///     "app.xml",
///     Element::new("components").child(
///         Element::new("component").attr("id", "svc").attr("class", "app::Service"),
///     ),
/// ));
///
/// let mut context = DefinitionContext::new(docs.clone(), docs);
/// context.set_config_location("app.xml");
///
/// let registry = context.refresh().unwrap();
/// assert!(registry.contains("svc"));
/// assert_eq!(context.close(), vec!["svc"]);
/// ```
pub struct DefinitionContext {
    id: ContextId,
    display_name: String,
    parent: Option<Arc<Registry>>,
    locations: ConfigLocations,
    default_locations: Arc<dyn DefaultLocations>,
    environment: Arc<dyn Environment>,
    compiler: DocumentCompiler,
    config: RegistryConfig,
    registry: RwLock<Option<Arc<Registry>>>,
}

impl DefinitionContext {
    pub fn new(loader: Arc<dyn ResourceLoader>, parser: Arc<dyn DocumentParser>) -> Self {
        let id = ContextId::new();
        let environment: Arc<dyn Environment> = Arc::new(StandardEnvironment::new());
        Self {
            id,
            display_name: id.to_string(),
            parent: None,
            locations: ConfigLocations::new(),
            default_locations: Arc::new(NoDefaultLocations),
            compiler: DocumentCompiler::new(loader, parser).with_environment(Arc::clone(&environment)),
            environment,
            config: RegistryConfig::default(),
            registry: RwLock::new(None),
        }
    }

    /// Registries built by this context fall back to `parent` for lookups
    pub fn with_parent(mut self, parent: Arc<Registry>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.compiler = self.compiler.with_environment(Arc::clone(&environment));
        self.environment = environment;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CompileHooks>) -> Self {
        self.compiler = self.compiler.with_hooks(hooks);
        self
    }

    pub fn with_default_locations(mut self, defaults: Arc<dyn DefaultLocations>) -> Self {
        self.default_locations = defaults;
        self
    }

    pub fn with_registry_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// See [`ConfigLocations::set_config_location`]
    pub fn set_config_location(&mut self, location: &str) {
        self.locations.set_config_location(location);
    }

    /// See [`ConfigLocations::set_config_locations`]
    pub fn set_config_locations<I, S>(&mut self, locations: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.locations.set_config_locations(locations);
    }

    /// The locations the next refresh will load
    pub fn config_locations(&self) -> Result<Vec<String>> {
        self.locations
            .resolve(self.environment.as_ref(), self.default_locations.as_ref())
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[inline]
    pub fn parent(&self) -> Option<&Arc<Registry>> {
        self.parent.as_ref()
    }

    #[inline]
    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    /// Build a fresh registry from every configured location.
    ///
    /// The new registry replaces the current one only if all documents loaded;
    /// on failure the previous registry (if any) stays in place.
    pub fn refresh(&self) -> Result<Arc<Registry>> {
        let locations = self.config_locations()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            context = %self.id,
            locations = ?locations,
            "Refreshing context"
        );

        let registry = match &self.parent {
            Some(parent) => Registry::with_parent(Arc::clone(parent), self.config),
            None => Registry::with_config(self.config),
        };
        for location in &locations {
            self.compiler.load(location, &registry)?;
        }

        let registry = Arc::new(registry);
        let previous = self.registry.write().replace(Arc::clone(&registry));

        #[cfg(feature = "logging")]
        info!(
            target: "component_registry",
            context = %self.id,
            name = self.display_name.as_str(),
            definitions = registry.count(),
            replaced = previous.is_some(),
            "Context refreshed"
        );
        #[cfg(not(feature = "logging"))]
        drop(previous);

        Ok(registry)
    }

    /// The registry built by the last successful refresh
    pub fn registry(&self) -> Option<Arc<Registry>> {
        self.registry.read().clone()
    }

    /// Whether a refresh succeeded and the context has not been closed since
    pub fn is_active(&self) -> bool {
        self.registry.read().is_some()
    }

    /// Release the current registry.
    ///
    /// Returns the order in which its components should be torn down:
    /// dependents before their dependencies. Empty if the context was not active.
    pub fn close(&self) -> Vec<String> {
        let Some(registry) = self.registry.write().take() else {
            return Vec::new();
        };
        let order = registry.destruction_order_all();

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            context = %self.id,
            components = order.len(),
            "Closing context"
        );

        order
    }
}

impl std::fmt::Debug for DefinitionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionContext")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("has_parent", &self.parent.is_some())
            .field("locations", &self.locations)
            .field("active", &self.is_active())
            .finish()
    }
}
