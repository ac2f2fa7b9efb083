//! Component definitions
//!
//! A [`Definition`] is the recipe for one named component: which type implements
//! it, how it is constructed, which properties are injected, its scope and a
//! handful of lifecycle flags. Recipe fields are optional so that a child
//! definition can leave them unset and inherit them from its parent when the
//! registry merges the chain (see [`Registry::merge`](crate::Registry::merge)).

use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Scope tag for one shared instance per registry
pub const SCOPE_SINGLETON: &str = "singleton";

/// Scope tag for a fresh instance on every request
pub const SCOPE_PROTOTYPE: &str = "prototype";

/// A value injected into a constructor argument or property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Literal text, converted by the instantiation engine
    Literal(String),
    /// Reference to another component by name
    Reference(String),
    /// Ordered collection of values
    List {
        items: Vec<Value>,
        /// Append to the parent definition's list instead of replacing it
        merge: Option<bool>,
    },
    /// Explicit null
    Null,
}

impl Value {
    /// Create a literal value
    #[inline]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Create a reference to another component
    #[inline]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    /// Create a list that replaces any inherited list
    #[inline]
    pub fn list(items: Vec<Value>) -> Self {
        Self::List { items, merge: None }
    }

    /// Names of all components this value refers to, nested lists included
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Reference(name) => vec![name.as_str()],
            Self::List { items, .. } => items.iter().flat_map(Value::references).collect(),
            Self::Literal(_) | Self::Null => Vec::new(),
        }
    }

    /// Combine `self` (child) with the inherited `parent` value.
    fn overlay(&self, parent: &Value) -> Value {
        match (self, parent) {
            (
                Self::List {
                    items,
                    merge: Some(true),
                },
                Self::List {
                    items: inherited, ..
                },
            ) => {
                let mut merged = inherited.clone();
                merged.extend(items.iter().cloned());
                Self::List {
                    items: merged,
                    merge: None,
                }
            }
            _ => self.clone(),
        }
    }
}

/// A constructor argument: a value plus optional matching hints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgValue {
    pub value: Value,
    /// Declared parameter type, used for type-matched arguments
    pub type_name: Option<String>,
    /// Declared parameter name
    pub name: Option<String>,
}

impl ArgValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            type_name: None,
            name: None,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn has_key(&self) -> bool {
        self.type_name.is_some() || self.name.is_some()
    }

    fn same_key(&self, other: &ArgValue) -> bool {
        self.has_key() && self.type_name == other.type_name && self.name == other.name
    }
}

/// Constructor arguments, either positional or type-matched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructorArgs {
    indexed: BTreeMap<usize, ArgValue>,
    generic: Vec<ArgValue>,
}

impl ConstructorArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the argument at a position, replacing any previous one
    pub fn add_indexed(&mut self, index: usize, arg: ArgValue) {
        self.indexed.insert(index, arg);
    }

    /// Add a type-matched argument; an argument with the same type/name hint is replaced
    pub fn add_generic(&mut self, arg: ArgValue) {
        if let Some(existing) = self.generic.iter_mut().find(|a| a.same_key(&arg)) {
            *existing = arg;
        } else if !self.generic.contains(&arg) {
            self.generic.push(arg);
        }
    }

    pub fn indexed(&self, index: usize) -> Option<&ArgValue> {
        self.indexed.get(&index)
    }

    pub fn indexed_args(&self) -> impl Iterator<Item = (usize, &ArgValue)> {
        self.indexed.iter().map(|(i, a)| (*i, a))
    }

    pub fn generic_args(&self) -> &[ArgValue] {
        &self.generic
    }

    pub fn contains_index(&self, index: usize) -> bool {
        self.indexed.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    fn overlay(&self, parent: &ConstructorArgs) -> ConstructorArgs {
        let mut merged = parent.clone();
        for (index, arg) in &self.indexed {
            merged.indexed.insert(*index, arg.clone());
        }
        for arg in &self.generic {
            merged.add_generic(arg.clone());
        }
        merged
    }
}

/// How the instantiation engine fills unset collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutowireMode {
    /// Only explicit references
    #[default]
    No,
    ByName,
    ByType,
    Constructor,
}

impl AutowireMode {
    /// Parse the declarative spelling (`no`, `byName`, `byType`, `constructor`)
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "no" => Some(Self::No),
            "byName" => Some(Self::ByName),
            "byType" => Some(Self::ByType),
            "constructor" => Some(Self::Constructor),
            _ => None,
        }
    }
}

/// What part of the application a definition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Application,
    Support,
    Infrastructure,
}

/// The construction recipe for one named component.
///
/// Content equality ignores [`resource_description`](Self::resource_description),
/// so the same declaration loaded from two documents compares equal.
///
/// # Examples
///
/// ```rust
/// use component_registry::{Definition, Value};
///
/// let definition = Definition::new("app::Service")
///     .with_scope("prototype")
///     .with_property("timeout", Value::literal("30"))
///     .with_depends_on("database");
///
/// assert!(definition.is_prototype());
/// assert_eq!(definition.properties["timeout"], Value::literal("30"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Definition {
    /// Opaque identifier of the implementing type
    pub class_name: Option<String>,
    /// Name of the definition this one inherits unset fields from
    pub parent_name: Option<String>,
    pub scope: Option<String>,
    pub lazy_init: Option<bool>,
    pub primary: Option<bool>,
    pub autowire_candidate: Option<bool>,
    pub autowire_mode: Option<AutowireMode>,
    pub constructor_args: ConstructorArgs,
    pub properties: IndexMap<String, Value>,
    /// Method name → component returned by that method
    pub lookup_methods: IndexMap<String, String>,
    pub factory_bean_name: Option<String>,
    pub factory_method_name: Option<String>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
    /// Components that must be created before this one
    pub depends_on: Vec<String>,
    /// Template only; never instantiated directly and never inherited
    pub is_abstract: bool,
    pub role: Role,
    pub description: Option<String>,
    /// The document this definition was declared in
    pub resource_description: Option<String>,
}

impl Definition {
    /// Create a definition for an implementing type
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    /// Create a definition that inherits from a parent definition
    pub fn child_of(parent_name: impl Into<String>) -> Self {
        Self {
            parent_name: Some(parent_name.into()),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_constructor_arg(mut self, index: usize, value: Value) -> Self {
        self.constructor_args.add_indexed(index, ArgValue::new(value));
        self
    }

    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn with_factory(
        mut self,
        factory_bean_name: impl Into<String>,
        factory_method_name: impl Into<String>,
    ) -> Self {
        self.factory_bean_name = Some(factory_bean_name.into());
        self.factory_method_name = Some(factory_method_name.into());
        self
    }

    pub fn with_resource_description(mut self, location: impl Into<String>) -> Self {
        self.resource_description = Some(location.into());
        self
    }

    /// The scope tag, defaulting to [`SCOPE_SINGLETON`] when unset or blank
    pub fn effective_scope(&self) -> &str {
        match self.scope.as_deref() {
            Some(scope) if !scope.is_empty() => scope,
            _ => SCOPE_SINGLETON,
        }
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.effective_scope() == SCOPE_SINGLETON
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.effective_scope() == SCOPE_PROTOTYPE
    }

    #[inline]
    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        self.primary.unwrap_or(false)
    }

    #[inline]
    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate.unwrap_or(true)
    }

    #[inline]
    pub fn autowire(&self) -> AutowireMode {
        self.autowire_mode.unwrap_or_default()
    }

    /// Every component name this recipe mentions: depends-on, references, factory
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.depends_on.iter().map(String::as_str).collect();
        for (_, arg) in self.constructor_args.indexed_args() {
            names.extend(arg.value.references());
        }
        for arg in self.constructor_args.generic_args() {
            names.extend(arg.value.references());
        }
        for value in self.properties.values() {
            names.extend(value.references());
        }
        names.extend(self.lookup_methods.values().map(String::as_str));
        if let Some(factory) = self.factory_bean_name.as_deref() {
            names.push(factory);
        }
        names
    }

    /// Produce the effective recipe of `self` layered over an already merged `parent`.
    ///
    /// Unset scalar fields are taken from the parent; constructor arguments,
    /// properties, lookup methods and depends-on are unioned with `self` winning
    /// on collisions. The abstract flag is never inherited.
    pub fn overlay(&self, parent: &Definition) -> Definition {
        let mut properties = parent.properties.clone();
        for (name, value) in &self.properties {
            let merged = match parent.properties.get(name) {
                Some(inherited) => value.overlay(inherited),
                None => value.clone(),
            };
            properties.insert(name.clone(), merged);
        }

        let mut lookup_methods = parent.lookup_methods.clone();
        lookup_methods.extend(
            self.lookup_methods
                .iter()
                .map(|(method, target)| (method.clone(), target.clone())),
        );

        let mut depends_on = parent.depends_on.clone();
        for name in &self.depends_on {
            if !depends_on.contains(name) {
                depends_on.push(name.clone());
            }
        }

        Definition {
            class_name: either(&self.class_name, &parent.class_name),
            parent_name: None,
            scope: either(&self.scope, &parent.scope),
            lazy_init: self.lazy_init.or(parent.lazy_init),
            primary: self.primary.or(parent.primary),
            autowire_candidate: self.autowire_candidate.or(parent.autowire_candidate),
            autowire_mode: self.autowire_mode.or(parent.autowire_mode),
            constructor_args: self.constructor_args.overlay(&parent.constructor_args),
            properties,
            lookup_methods,
            factory_bean_name: either(&self.factory_bean_name, &parent.factory_bean_name),
            factory_method_name: either(&self.factory_method_name, &parent.factory_method_name),
            init_method: either(&self.init_method, &parent.init_method),
            destroy_method: either(&self.destroy_method, &parent.destroy_method),
            depends_on,
            is_abstract: self.is_abstract,
            role: self.role,
            description: either(&self.description, &parent.description),
            resource_description: either(
                &self.resource_description,
                &parent.resource_description,
            ),
        }
    }
}

/// Nearest non-blank value, child first
fn either(child: &Option<String>, parent: &Option<String>) -> Option<String> {
    match child {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => parent.clone(),
    }
}

impl PartialEq for Definition {
    fn eq(&self, other: &Self) -> bool {
        let Definition {
            class_name,
            parent_name,
            scope,
            lazy_init,
            primary,
            autowire_candidate,
            autowire_mode,
            constructor_args,
            properties,
            lookup_methods,
            factory_bean_name,
            factory_method_name,
            init_method,
            destroy_method,
            depends_on,
            is_abstract,
            role,
            description,
            resource_description: _,
        } = self;

        *class_name == other.class_name
            && *parent_name == other.parent_name
            && *scope == other.scope
            && *lazy_init == other.lazy_init
            && *primary == other.primary
            && *autowire_candidate == other.autowire_candidate
            && *autowire_mode == other.autowire_mode
            && *constructor_args == other.constructor_args
            && *properties == other.properties
            && *lookup_methods == other.lookup_methods
            && *factory_bean_name == other.factory_bean_name
            && *factory_method_name == other.factory_method_name
            && *init_method == other.init_method
            && *destroy_method == other.destroy_method
            && *depends_on == other.depends_on
            && *is_abstract == other.is_abstract
            && *role == other.role
            && *description == other.description
    }
}

impl Eq for Definition {}

/// A definition together with the name and aliases it is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionHolder {
    pub name: String,
    pub aliases: Vec<String>,
    pub definition: Definition,
}

impl DefinitionHolder {
    pub fn new(name: impl Into<String>, definition: Definition) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            definition,
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }
}
