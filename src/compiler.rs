//! Document compiler
//!
//! Walks a parsed document depth-first in document order and turns its
//! declarations into registrations. Imports are compiled recursively at the
//! point they appear, so later declarations (including those in later
//! imports) override earlier ones under the same name.
//!
//! Bad component and alias declarations are collected across the document and
//! everything it imports, and reported together as
//! [`RegistryError::ParseCollected`] once the walk has finished. Import and
//! placeholder failures abort the compile immediately.

use crate::declaration::{DeclarationParser, ScopeDefaults, tokenize};
use crate::definition::DefinitionHolder;
use crate::document::{DocumentParser, Element, NodeKind};
use crate::environment::{Environment, StandardEnvironment};
use crate::error::DeclarationError;
use crate::registry::Registry;
use crate::resource::{ResourceLoader, apply_relative_path, clean_path, is_absolute_location};
use crate::{RegistryError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

/// Attribute of a scope node listing the profiles it requires
pub const PROFILE_ATTRIBUTE: &str = "profile";
/// Attribute of an import directive naming its target
pub const RESOURCE_ATTRIBUTE: &str = "resource";
/// Attribute of an alias directive naming the target component
pub const ALIAS_NAME_ATTRIBUTE: &str = "name";
/// Attribute of an alias directive holding the alias
pub const ALIAS_ATTRIBUTE: &str = "alias";

/// Extension points of the compiler.
///
/// Every method has a no-op default; implement only what is needed.
pub trait CompileHooks: Send + Sync {
    /// Called on entering a scope node, after its profile gate passed
    fn pre_process(&self, _scope: &Element, _location: &str) {}

    /// Called after all children of a scope node were visited
    fn post_process(&self, _scope: &Element, _location: &str) {}

    /// Wrap or replace a parsed declaration before it is registered
    fn decorate(&self, _element: &Element, holder: DefinitionHolder) -> Result<DefinitionHolder> {
        Ok(holder)
    }

    /// Handle an element the compiler does not know
    fn custom_element(&self, _element: &Element, _registry: &Registry, _location: &str) -> Result<()> {
        Ok(())
    }

    /// A component declaration was registered
    fn component_registered(&self, _holder: &DefinitionHolder) {}

    /// An alias directive was registered
    fn alias_registered(&self, _name: &str, _alias: &str) {}

    /// An import directive was processed; `resolved` lists the loaded locations
    fn import_processed(&self, _location: &str, _resolved: &[String]) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl CompileHooks for NoopHooks {}

/// Compiles parsed documents into a [`Registry`].
///
/// # Examples
///
/// ```rust
/// use component_registry::{DocumentCompiler, Element, MemoryDocuments, Registry};
/// use std::sync::Arc;
///
/// let docs = Arc::new(MemoryDocuments::new().with(
///     "conf/app.xml",
///     Element::new("components").child(
///         Element::new("component")
///             .attr("id", "svc")
///             .attr("class", "app::Service"),
///     ),
/// ));
///
/// let compiler = DocumentCompiler::new(docs.clone(), docs);
/// let registry = Registry::new();
/// assert_eq!(compiler.load("conf/app.xml", &registry).unwrap(), 1);
/// assert!(registry.contains("svc"));
/// ```
#[derive(Clone)]
pub struct DocumentCompiler {
    loader: Arc<dyn ResourceLoader>,
    parser: Arc<dyn DocumentParser>,
    environment: Arc<dyn Environment>,
    hooks: Arc<dyn CompileHooks>,
}

impl DocumentCompiler {
    /// Create a compiler with an empty environment and no hooks.
    pub fn new(loader: Arc<dyn ResourceLoader>, parser: Arc<dyn DocumentParser>) -> Self {
        Self {
            loader,
            parser,
            environment: Arc::new(StandardEnvironment::new()),
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CompileHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[inline]
    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    #[inline]
    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }

    /// Compile `root`, a document loaded from `base_location`, into `registry`.
    ///
    /// Returns the number of definitions the registry gained. Bad declarations
    /// anywhere in the tree fail the compile with `ParseCollected` after every
    /// sibling has been processed.
    pub fn compile(&self, root: &Element, base_location: &str, registry: &Registry) -> Result<usize> {
        let before = registry.count();

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            location = base_location,
            "Compiling document"
        );

        let mut session = CompileSession {
            compiler: self,
            registry,
            base_location,
            import_stack: vec![base_location.to_string()],
            errors: Vec::new(),
        };
        session.compile_document(root, base_location)?;

        let added = registry.count().saturating_sub(before);

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            location = base_location,
            added = added,
            total = registry.count(),
            invalid = session.errors.len(),
            "Document compiled"
        );

        if session.errors.is_empty() {
            Ok(added)
        } else {
            Err(RegistryError::ParseCollected {
                location: base_location.to_string(),
                errors: session.errors,
            })
        }
    }

    /// Load, parse and compile the document at `location`.
    pub fn load(&self, location: &str, registry: &Registry) -> Result<usize> {
        let root = self.read_document(location)?;
        self.compile(&root, location, registry)
    }

    fn read_document(&self, location: &str) -> Result<Element> {
        let resource = self
            .loader
            .load(location)
            .map_err(|e| RegistryError::import_failed(location, e))?;
        self.parser
            .parse(&resource)
            .map_err(|e| RegistryError::import_failed(location, e))
    }
}

impl std::fmt::Debug for DocumentCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCompiler")
            .field("active_profiles", &self.environment.active_profiles())
            .finish_non_exhaustive()
    }
}

/// State of one `compile` call across all imported documents
struct CompileSession<'a> {
    compiler: &'a DocumentCompiler,
    registry: &'a Registry,
    base_location: &'a str,
    /// Documents currently being compiled, outermost first
    import_stack: Vec<String>,
    /// Bad declarations of every document compiled so far, in traversal order
    errors: Vec<DeclarationError>,
}

/// State of one document
struct DocumentState<'a> {
    location: String,
    declarations: DeclarationParser<'a>,
    next_index: usize,
}

impl DocumentState<'_> {
    fn take_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

impl<'a> CompileSession<'a> {
    fn compile_document(&mut self, root: &Element, location: &str) -> Result<()> {
        let mut state = DocumentState {
            location: location.to_string(),
            declarations: DeclarationParser::new(self.registry, location),
            next_index: 0,
        };

        self.visit_scope(root, &ScopeDefaults::default(), &mut state)
    }

    fn collect(
        &mut self,
        state: &DocumentState<'_>,
        index: usize,
        name: Option<String>,
        error: RegistryError,
    ) {
        #[cfg(feature = "logging")]
        warn!(
            target: "component_registry",
            location = state.location.as_str(),
            index = index,
            name = name.as_deref().unwrap_or("<unnamed>"),
            error = %error,
            "Invalid declaration"
        );

        self.errors.push(DeclarationError {
            location: state.location.clone(),
            index,
            name,
            error,
        });
    }

    fn visit_scope(
        &mut self,
        scope: &Element,
        enclosing: &ScopeDefaults,
        state: &mut DocumentState<'a>,
    ) -> Result<()> {
        if let Some(spec) = scope.non_blank_attribute(PROFILE_ATTRIBUTE) {
            let profiles = tokenize(spec);
            let specs: Vec<&str> = profiles.iter().map(String::as_str).collect();
            if !self.compiler.environment.accepts_profiles(&specs) {
                #[cfg(feature = "logging")]
                info!(
                    target: "component_registry",
                    location = state.location.as_str(),
                    profiles = spec,
                    "Skipped scope due to specified profiles not matching"
                );
                return Ok(());
            }
        }

        let defaults = match ScopeDefaults::derive(scope, enclosing) {
            Ok(defaults) => defaults,
            Err(error) => {
                let index = state.take_index();
                self.collect(state, index, None, error);
                enclosing.clone()
            }
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            location = state.location.as_str(),
            children = scope.children().len(),
            "Entering scope"
        );

        let compiler = self.compiler;
        let hooks = &compiler.hooks;
        hooks.pre_process(scope, &state.location);

        for child in scope.children() {
            match child.kind() {
                NodeKind::Import => self.import(child, state)?,
                NodeKind::Alias => self.alias(child, state),
                NodeKind::Component => self.component(child, &defaults, state),
                NodeKind::Scope => self.visit_scope(child, &defaults, state)?,
                NodeKind::Custom => {
                    let index = state.take_index();
                    if let Err(error) = hooks.custom_element(child, self.registry, &state.location) {
                        self.collect(state, index, Some(child.name().to_string()), error);
                    }
                }
            }
        }

        hooks.post_process(scope, &state.location);
        Ok(())
    }

    fn component(&mut self, element: &Element, defaults: &ScopeDefaults, state: &mut DocumentState<'a>) {
        let index = state.take_index();
        let compiler = self.compiler;
        let hooks = &compiler.hooks;

        let outcome = state
            .declarations
            .parse_component(element, defaults)
            .and_then(|holder| hooks.decorate(element, holder))
            .and_then(|holder| {
                self.registry.register_holder(&holder)?;
                Ok(holder)
            });

        match outcome {
            Ok(holder) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "component_registry",
                    name = holder.name.as_str(),
                    aliases = ?holder.aliases,
                    location = state.location.as_str(),
                    "Registered component declaration"
                );
                hooks.component_registered(&holder);
            }
            Err(error) => {
                let name = element
                    .non_blank_attribute(crate::declaration::ID_ATTRIBUTE)
                    .map(str::to_string);
                self.collect(state, index, name, error);
            }
        }
    }

    fn alias(&mut self, element: &Element, state: &mut DocumentState<'a>) {
        let index = state.take_index();
        let name = element.non_blank_attribute(ALIAS_NAME_ATTRIBUTE);
        let alias = element.non_blank_attribute(ALIAS_ATTRIBUTE);

        let (name, alias) = match (name, alias) {
            (Some(name), Some(alias)) => (name, alias),
            (None, _) => {
                let error = RegistryError::invalid_alias("", alias.unwrap_or_default(), "name must not be empty");
                self.collect(state, index, None, error);
                return;
            }
            (Some(name), None) => {
                let error = RegistryError::invalid_alias(name, "", "alias must not be empty");
                self.collect(state, index, Some(name.to_string()), error);
                return;
            }
        };

        match self.registry.register_alias(name, alias) {
            Ok(()) => self.compiler.hooks.alias_registered(name, alias),
            Err(error) => self.collect(state, index, Some(name.to_string()), error),
        }
    }

    fn import(&mut self, element: &Element, state: &mut DocumentState<'a>) -> Result<()> {
        state.take_index();

        let raw = element.non_blank_attribute(RESOURCE_ATTRIBUTE).ok_or_else(|| RegistryError::InvalidImport {
            reason: format!("resource location must not be empty (in '{}')", state.location),
        })?;
        let location = self.compiler.environment.resolve_required_placeholders(raw)?;
        let location = location.trim();
        if location.is_empty() {
            return Err(RegistryError::InvalidImport {
                reason: format!("resource location '{raw}' resolves to nothing (in '{}')", state.location),
            });
        }

        let target = if is_absolute_location(location) {
            location.to_string()
        } else {
            let relative = self.compiler.loader.resolve_relative(&state.location, location);
            let fallback = clean_path(&apply_relative_path(self.base_location, location));
            if self.compiler.loader.exists(&relative)
                && self.compile_import(location, &relative, Some(&fallback))?
            {
                return Ok(());
            }
            fallback
        };

        self.compile_import(location, &target, None)?;
        Ok(())
    }

    /// Compile the document at `target`.
    ///
    /// A load or parse failure is fatal unless `fallback` names a different
    /// location; then `Ok(false)` asks the caller to retry there.
    fn compile_import(
        &mut self,
        location: &str,
        target: &str,
        fallback: Option<&str>,
    ) -> Result<bool> {
        if self.import_stack.iter().any(|open| open == target) {
            let mut cycle = self.import_stack.clone();
            cycle.push(target.to_string());
            return Err(RegistryError::import_failed(
                target,
                format!("circular import: {}", cycle.join(" -> ")),
            ));
        }

        let root = match self.compiler.read_document(target) {
            Ok(root) => root,
            Err(_error) if fallback.is_some_and(|fallback| fallback != target) => {
                #[cfg(feature = "logging")]
                warn!(
                    target: "component_registry",
                    location = location,
                    resolved = target,
                    error = %_error,
                    "Relative import failed, retrying against the base location"
                );
                return Ok(false);
            }
            Err(error) => return Err(error),
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            location = location,
            resolved = target,
            from = self.import_stack.last().map(String::as_str).unwrap_or_default(),
            "Importing document"
        );

        self.import_stack.push(target.to_string());
        let result = self.compile_document(&root, target);
        self.import_stack.pop();
        result?;

        self.compiler
            .hooks
            .import_processed(location, &[target.to_string()]);
        Ok(true)
    }
}
