//! Component declarations
//!
//! Turns one `component` element into a [`DefinitionHolder`]: name and alias
//! derivation, recipe attributes, constructor arguments, properties and
//! lookup methods. Scope-level defaults are carried in [`ScopeDefaults`].

use crate::definition::{ArgValue, AutowireMode, Definition, DefinitionHolder, Value};
use crate::document::Element;
use crate::registry::Registry;
use crate::{RegistryError, Result};
use indexmap::IndexSet;

#[cfg(feature = "logging")]
use tracing::info;

pub const ID_ATTRIBUTE: &str = "id";
pub const NAME_ATTRIBUTE: &str = "name";
pub const CLASS_ATTRIBUTE: &str = "class";
pub const PARENT_ATTRIBUTE: &str = "parent";
pub const SCOPE_ATTRIBUTE: &str = "scope";
pub const ABSTRACT_ATTRIBUTE: &str = "abstract";
pub const LAZY_INIT_ATTRIBUTE: &str = "lazy-init";
pub const AUTOWIRE_ATTRIBUTE: &str = "autowire";
pub const AUTOWIRE_CANDIDATE_ATTRIBUTE: &str = "autowire-candidate";
pub const PRIMARY_ATTRIBUTE: &str = "primary";
pub const DEPENDS_ON_ATTRIBUTE: &str = "depends-on";
pub const FACTORY_BEAN_ATTRIBUTE: &str = "factory-bean";
pub const FACTORY_METHOD_ATTRIBUTE: &str = "factory-method";
pub const INIT_METHOD_ATTRIBUTE: &str = "init-method";
pub const DESTROY_METHOD_ATTRIBUTE: &str = "destroy-method";

pub const DEFAULT_LAZY_INIT_ATTRIBUTE: &str = "default-lazy-init";
pub const DEFAULT_AUTOWIRE_ATTRIBUTE: &str = "default-autowire";
pub const DEFAULT_MERGE_ATTRIBUTE: &str = "default-merge";
pub const DEFAULT_INIT_METHOD_ATTRIBUTE: &str = "default-init-method";
pub const DEFAULT_DESTROY_METHOD_ATTRIBUTE: &str = "default-destroy-method";

const CONSTRUCTOR_ARG_ELEMENT: &str = "constructor-arg";
const PROPERTY_ELEMENT: &str = "property";
const LOOKUP_METHOD_ELEMENT: &str = "lookup-method";
const DESCRIPTION_ELEMENT: &str = "description";
const VALUE_ELEMENT: &str = "value";
const REF_ELEMENT: &str = "ref";
const LIST_ELEMENT: &str = "list";
const NULL_ELEMENT: &str = "null";

const INDEX_ATTRIBUTE: &str = "index";
const TYPE_ATTRIBUTE: &str = "type";
const VALUE_ATTRIBUTE: &str = "value";
const REF_ATTRIBUTE: &str = "ref";
const BEAN_ATTRIBUTE: &str = "bean";
const MERGE_ATTRIBUTE: &str = "merge";

/// Attribute value meaning "inherit from the enclosing scope"
pub const DEFAULT_VALUE: &str = "default";

/// Separators allowed between names in multi-valued attributes
pub const MULTI_VALUE_DELIMITERS: &[char] = &[',', ';', ' ', '\t', '\n', '\r'];

/// Generated-name separator between the base name and the counter
pub const GENERATED_NAME_SEPARATOR: char = '#';

/// Split a multi-valued attribute into trimmed, non-empty tokens
pub fn tokenize(value: &str) -> Vec<String> {
    value
        .split(MULTI_VALUE_DELIMITERS)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Defaults a `components` scope applies to the declarations it contains.
///
/// Unset fields inherit from the enclosing scope; at the top level they stay
/// unset and the definition fields remain unset too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDefaults {
    pub lazy_init: Option<bool>,
    pub autowire: Option<AutowireMode>,
    pub merge: Option<bool>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
}

impl ScopeDefaults {
    /// Defaults for `scope`, inheriting anything it leaves unset from `enclosing`.
    pub fn derive(scope: &Element, enclosing: &ScopeDefaults) -> Result<ScopeDefaults> {
        let autowire = match explicit(scope, DEFAULT_AUTOWIRE_ATTRIBUTE) {
            Some(text) => Some(parse_autowire(text)?),
            None => enclosing.autowire,
        };

        Ok(ScopeDefaults {
            lazy_init: explicit(scope, DEFAULT_LAZY_INIT_ATTRIBUTE)
                .map(is_true)
                .or(enclosing.lazy_init),
            autowire,
            merge: explicit(scope, DEFAULT_MERGE_ATTRIBUTE)
                .map(is_true)
                .or(enclosing.merge),
            init_method: scope
                .non_blank_attribute(DEFAULT_INIT_METHOD_ATTRIBUTE)
                .map(str::to_string)
                .or_else(|| enclosing.init_method.clone()),
            destroy_method: scope
                .non_blank_attribute(DEFAULT_DESTROY_METHOD_ATTRIBUTE)
                .map(str::to_string)
                .or_else(|| enclosing.destroy_method.clone()),
        })
    }
}

/// Attribute value unless absent, blank or `default`
fn explicit<'a>(element: &'a Element, attribute: &str) -> Option<&'a str> {
    element
        .non_blank_attribute(attribute)
        .filter(|value| *value != DEFAULT_VALUE)
}

#[inline]
fn is_true(value: &str) -> bool {
    value == "true"
}

fn parse_autowire(text: &str) -> Result<AutowireMode> {
    AutowireMode::parse(text)
        .ok_or_else(|| RegistryError::invalid_declaration(format!("unknown autowire mode '{text}'")))
}

/// Parses the component declarations of one document.
///
/// Tracks the names and aliases already declared in the document. A reused
/// name overrides the earlier declaration, like a later import would, and is
/// logged.
pub struct DeclarationParser<'a> {
    registry: &'a Registry,
    location: String,
    used_names: IndexSet<String>,
}

impl<'a> DeclarationParser<'a> {
    pub fn new(registry: &'a Registry, location: impl Into<String>) -> Self {
        Self {
            registry,
            location: location.into(),
            used_names: IndexSet::new(),
        }
    }

    /// The document whose declarations this parser handles
    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Build the definition, name and aliases declared by `element`.
    pub fn parse_component(
        &mut self,
        element: &Element,
        defaults: &ScopeDefaults,
    ) -> Result<DefinitionHolder> {
        let id = element.non_blank_attribute(ID_ATTRIBUTE).map(str::to_string);
        let mut aliases = element
            .attribute(NAME_ATTRIBUTE)
            .map(tokenize)
            .unwrap_or_default();

        let mut name = match id {
            Some(id) => Some(id),
            None if !aliases.is_empty() => Some(aliases.remove(0)),
            None => None,
        };

        if let Some(declared) = &name {
            self.note_declared(declared, &aliases);
        }

        let definition = self.parse_definition(element, defaults)?;

        if name.is_none() {
            let generated = self.generate_name(&definition)?;
            if let Some(class_name) = &definition.class_name {
                // the plain class name stays usable for the first unnamed component
                if generated.len() > class_name.len()
                    && generated.starts_with(class_name.as_str())
                    && !self.registry.is_name_in_use(class_name)
                    && !self.used_names.contains(class_name)
                {
                    aliases.push(class_name.clone());
                }
            }
            name = Some(generated);
        }

        let name = name.ok_or_else(|| {
            RegistryError::invalid_declaration("component name could not be determined")
        })?;
        Ok(DefinitionHolder::new(name, definition).with_aliases(aliases))
    }

    fn note_declared(&mut self, name: &str, aliases: &[String]) {
        if !self.used_names.insert(name.to_string()) {
            #[cfg(feature = "logging")]
            info!(
                target: "component_registry",
                component = name,
                location = self.location.as_str(),
                "Component redeclared in the same document, the later declaration wins"
            );
        }
        self.used_names.extend(aliases.iter().cloned());
    }

    fn generate_name(&self, definition: &Definition) -> Result<String> {
        let base = match (
            &definition.class_name,
            &definition.parent_name,
            &definition.factory_bean_name,
        ) {
            (Some(class_name), _, _) => class_name.clone(),
            (None, Some(parent), _) => format!("{parent}$child"),
            (None, None, Some(factory)) => format!("{factory}$created"),
            (None, None, None) => {
                return Err(RegistryError::invalid_declaration(
                    "unnamed component specifies neither 'class' nor 'parent' nor 'factory-bean'",
                ));
            }
        };

        let mut counter = 0usize;
        loop {
            let candidate = format!("{base}{GENERATED_NAME_SEPARATOR}{counter}");
            if !self.registry.is_name_in_use(&candidate) && !self.used_names.contains(&candidate) {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    fn parse_definition(&self, element: &Element, defaults: &ScopeDefaults) -> Result<Definition> {
        let owned = |attribute: &str| element.non_blank_attribute(attribute).map(str::to_string);

        let autowire_mode = match explicit(element, AUTOWIRE_ATTRIBUTE) {
            Some(text) => Some(parse_autowire(text)?),
            None => defaults.autowire,
        };

        let mut definition = Definition {
            class_name: owned(CLASS_ATTRIBUTE),
            parent_name: owned(PARENT_ATTRIBUTE),
            scope: owned(SCOPE_ATTRIBUTE),
            lazy_init: explicit(element, LAZY_INIT_ATTRIBUTE)
                .map(is_true)
                .or(defaults.lazy_init),
            primary: element.non_blank_attribute(PRIMARY_ATTRIBUTE).map(is_true),
            autowire_candidate: explicit(element, AUTOWIRE_CANDIDATE_ATTRIBUTE).map(is_true),
            autowire_mode,
            factory_bean_name: owned(FACTORY_BEAN_ATTRIBUTE),
            factory_method_name: owned(FACTORY_METHOD_ATTRIBUTE),
            init_method: owned(INIT_METHOD_ATTRIBUTE).or_else(|| defaults.init_method.clone()),
            destroy_method: owned(DESTROY_METHOD_ATTRIBUTE)
                .or_else(|| defaults.destroy_method.clone()),
            depends_on: element
                .attribute(DEPENDS_ON_ATTRIBUTE)
                .map(tokenize)
                .unwrap_or_default(),
            is_abstract: element.attribute(ABSTRACT_ATTRIBUTE).is_some_and(is_true),
            resource_description: Some(self.location.clone()),
            ..Definition::default()
        };

        for child in element.children() {
            match child.name() {
                CONSTRUCTOR_ARG_ELEMENT => self.parse_constructor_arg(child, defaults, &mut definition)?,
                PROPERTY_ELEMENT => self.parse_property(child, defaults, &mut definition)?,
                LOOKUP_METHOD_ELEMENT => parse_lookup_method(child, &mut definition)?,
                DESCRIPTION_ELEMENT => {
                    definition.description = child.text().map(|text| text.trim().to_string());
                }
                _ => {}
            }
        }

        Ok(definition)
    }

    fn parse_constructor_arg(
        &self,
        element: &Element,
        defaults: &ScopeDefaults,
        definition: &mut Definition,
    ) -> Result<()> {
        let value = self.parse_value_of(element, CONSTRUCTOR_ARG_ELEMENT, defaults)?;
        let mut arg = ArgValue::new(value);
        if let Some(type_name) = element.non_blank_attribute(TYPE_ATTRIBUTE) {
            arg = arg.with_type(type_name);
        }
        if let Some(name) = element.non_blank_attribute(NAME_ATTRIBUTE) {
            arg = arg.with_name(name);
        }

        match element.non_blank_attribute(INDEX_ATTRIBUTE) {
            Some(index) => {
                let index: usize = index.parse().map_err(|_| {
                    RegistryError::invalid_declaration(format!(
                        "'index' of constructor-arg must be a non-negative integer, got '{index}'"
                    ))
                })?;
                if definition.constructor_args.contains_index(index) {
                    return Err(RegistryError::invalid_declaration(format!(
                        "ambiguous constructor-arg entries for index {index}"
                    )));
                }
                definition.constructor_args.add_indexed(index, arg);
            }
            None => definition.constructor_args.add_generic(arg),
        }
        Ok(())
    }

    fn parse_property(
        &self,
        element: &Element,
        defaults: &ScopeDefaults,
        definition: &mut Definition,
    ) -> Result<()> {
        let name = element
            .non_blank_attribute(NAME_ATTRIBUTE)
            .ok_or_else(|| RegistryError::invalid_declaration("property requires a 'name'"))?;
        if definition.properties.contains_key(name) {
            return Err(RegistryError::invalid_declaration(format!(
                "multiple 'property' definitions for property '{name}'"
            )));
        }
        let value = self.parse_value_of(element, PROPERTY_ELEMENT, defaults)?;
        definition.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// The value carried by a property or constructor-arg element.
    ///
    /// Exactly one of a `value` attribute, a `ref` attribute or a single value
    /// sub-element must be present.
    fn parse_value_of(
        &self,
        element: &Element,
        kind: &str,
        defaults: &ScopeDefaults,
    ) -> Result<Value> {
        let sub_elements: Vec<&Element> = element
            .children()
            .iter()
            .filter(|child| child.name() != DESCRIPTION_ELEMENT)
            .collect();
        if sub_elements.len() > 1 {
            return Err(RegistryError::invalid_declaration(format!(
                "{kind} must not contain more than one sub-element"
            )));
        }

        let value_attribute = element.attribute(VALUE_ATTRIBUTE);
        let ref_attribute = element.attribute(REF_ATTRIBUTE);

        match (value_attribute, ref_attribute, sub_elements.first()) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                Err(RegistryError::invalid_declaration(format!(
                    "{kind} is only allowed to contain either a 'ref' attribute, a 'value' attribute or a sub-element"
                )))
            }
            (Some(value), None, None) => Ok(Value::literal(value)),
            (None, Some(reference), None) => {
                let reference = reference.trim();
                if reference.is_empty() {
                    return Err(RegistryError::invalid_declaration(format!(
                        "{kind} contains an empty 'ref' attribute"
                    )));
                }
                Ok(Value::reference(reference))
            }
            (None, None, Some(sub_element)) => self.parse_value_element(sub_element, defaults),
            (None, None, None) => Err(RegistryError::invalid_declaration(format!(
                "{kind} must specify a ref or value"
            ))),
        }
    }

    fn parse_value_element(&self, element: &Element, defaults: &ScopeDefaults) -> Result<Value> {
        match element.name() {
            VALUE_ELEMENT => Ok(Value::literal(element.text().unwrap_or_default())),
            REF_ELEMENT => element
                .non_blank_attribute(BEAN_ATTRIBUTE)
                .map(Value::reference)
                .ok_or_else(|| {
                    RegistryError::invalid_declaration("'bean' is required for a ref element")
                }),
            NULL_ELEMENT => Ok(Value::Null),
            LIST_ELEMENT => {
                let merge = explicit(element, MERGE_ATTRIBUTE)
                    .map(is_true)
                    .or(defaults.merge);
                let items = element
                    .children()
                    .iter()
                    .filter(|child| child.name() != DESCRIPTION_ELEMENT)
                    .map(|child| self.parse_value_element(child, defaults))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List { items, merge })
            }
            other => Err(RegistryError::invalid_declaration(format!(
                "unknown value element '{other}'"
            ))),
        }
    }
}

fn parse_lookup_method(element: &Element, definition: &mut Definition) -> Result<()> {
    let method = element.non_blank_attribute(NAME_ATTRIBUTE);
    let component = element.non_blank_attribute(BEAN_ATTRIBUTE);
    match (method, component) {
        (Some(method), Some(component)) => {
            definition
                .lookup_methods
                .insert(method.to_string(), component.to_string());
            Ok(())
        }
        _ => Err(RegistryError::invalid_declaration(
            "lookup-method requires both 'name' and 'bean'",
        )),
    }
}
