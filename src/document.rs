//! Parsed document tree
//!
//! Markup syntax is not this crate's concern: a [`DocumentParser`] turns raw
//! bytes into an [`Element`] tree and the compiler only looks at element
//! names, attributes, text and child order.

use crate::error::{ParseError, ResourceError};
use crate::resource::{Resource, ResourceLoader};
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Grouping node; may nest and carries scope defaults and profiles
pub const COMPONENTS_ELEMENT: &str = "components";
/// One component declaration
pub const COMPONENT_ELEMENT: &str = "component";
/// Alias directive
pub const ALIAS_ELEMENT: &str = "alias";
/// Import directive
pub const IMPORT_ELEMENT: &str = "import";

/// What the compiler does with a child of a scope node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scope,
    Component,
    Alias,
    Import,
    /// Anything else; handed to the compile hooks
    Custom,
}

/// One node of a parsed document.
///
/// # Examples
///
/// ```rust
/// use component_registry::{Element, NodeKind};
///
/// let doc = Element::new("components")
///     .attr("default-lazy-init", "true")
///     .child(
///         Element::new("component")
///             .attr("id", "svc")
///             .attr("class", "app::Service"),
///     );
///
/// assert_eq!(doc.kind(), NodeKind::Scope);
/// assert_eq!(doc.children()[0].attribute("id"), Some("svc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: IndexMap<String, String>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a child element
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child elements
    pub fn children_from(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    /// Set the text content
    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name
    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value by name, `None` when absent or blank
    pub fn non_blank_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    #[inline]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Children with the given element name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// How the compiler treats this element inside a scope
    pub fn kind(&self) -> NodeKind {
        match self.name.as_str() {
            COMPONENTS_ELEMENT => NodeKind::Scope,
            COMPONENT_ELEMENT => NodeKind::Component,
            ALIAS_ELEMENT => NodeKind::Alias,
            IMPORT_ELEMENT => NodeKind::Import,
            _ => NodeKind::Custom,
        }
    }
}

/// Turns loaded bytes into an element tree.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, resource: &Resource) -> Result<Element, ParseError>;
}

/// In-memory documents keyed by location.
///
/// Serves as both the [`ResourceLoader`] and the [`DocumentParser`]: loading
/// returns an empty resource for a known location and parsing hands back the
/// stored tree. Useful for embedding pre-built trees and for tests.
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    documents: RwLock<IndexMap<String, Element>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(self, location: impl Into<String>, root: Element) -> Self {
        self.insert(location, root);
        self
    }

    /// Store (or replace) the tree served for `location`
    pub fn insert(&self, location: impl Into<String>, root: Element) {
        self.documents.write().insert(location.into(), root);
    }

    pub fn remove(&self, location: &str) -> Option<Element> {
        self.documents.write().shift_remove(location)
    }

    pub fn contains(&self, location: &str) -> bool {
        self.documents.read().contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceLoader for MemoryDocuments {
    fn load(&self, location: &str) -> Result<Resource, ResourceError> {
        if self.contains(location) {
            Ok(Resource::new(location, Vec::new()))
        } else {
            Err(ResourceError::NotFound {
                location: location.to_string(),
            })
        }
    }

    fn exists(&self, location: &str) -> bool {
        self.contains(location)
    }
}

impl DocumentParser for MemoryDocuments {
    fn parse(&self, resource: &Resource) -> Result<Element, ParseError> {
        self.documents
            .read()
            .get(resource.location())
            .cloned()
            .ok_or_else(|| ParseError {
                location: resource.location().to_string(),
                reason: "no document stored for this location".into(),
            })
    }
}
