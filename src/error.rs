//! Error types for the component registry

use std::fmt;
use thiserror::Error;

/// Errors that can occur while registering, merging or loading definitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A definition was registered under an empty or otherwise unusable name
    #[error("Invalid component name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// An alias could not be registered
    #[error("Cannot register alias '{alias}' for component '{name}': {reason}")]
    InvalidAlias {
        name: String,
        alias: String,
        reason: String,
    },

    /// Overriding is disabled and the name already holds a different definition
    #[error("Component definition '{name}' is already registered and overriding is not allowed")]
    DuplicateDefinition { name: String },

    /// No definition under this name in the registry or any ancestor
    #[error("No component definition named '{name}'")]
    NotFound { name: String },

    /// The parent-definition chain loops back on itself
    #[error("Circular parent chain while merging '{name}': {}", .chain.join(" -> "))]
    CircularParent { name: String, chain: Vec<String> },

    /// A component is requested while it is already being created
    #[error("Circular dependency detected while creating '{name}': {}", .chain.join(" -> "))]
    CircularDependency { name: String, chain: Vec<String> },

    /// An import directive is unusable as written
    #[error("Invalid import: {reason}")]
    InvalidImport { reason: String },

    /// An import target could not be loaded or parsed
    #[error("Failed to import '{location}': {reason}")]
    ImportResolution { location: String, reason: String },

    /// A `${...}` placeholder has no value and no default
    #[error("Could not resolve placeholder '{placeholder}' in value \"{text}\"")]
    UnresolvedPlaceholder { placeholder: String, text: String },

    /// Non-fatal declaration errors gathered while compiling a document and its imports
    #[error("{} invalid declaration(s) in '{location}': {}", .errors.len(), DisplayList(.errors))]
    ParseCollected {
        location: String,
        errors: Vec<DeclarationError>,
    },

    /// A component declaration lacks what is needed to build a definition
    #[error("Invalid declaration: {reason}")]
    InvalidDeclaration { reason: String },

    /// The effective scope of a merged definition is not a registered scope tag
    #[error("Component '{name}' uses unregistered scope '{scope}'")]
    UnknownScope { name: String, scope: String },

    /// A scope tag cannot be registered
    #[error("Cannot register scope '{scope}': {reason}")]
    InvalidScope { scope: String, reason: String },
}

/// Plain discriminant of a [`RegistryError`], for branching without matching fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidName,
    InvalidAlias,
    DuplicateDefinition,
    NotFound,
    CircularParent,
    CircularDependency,
    InvalidImport,
    ImportResolution,
    UnresolvedPlaceholder,
    ParseCollected,
    InvalidDeclaration,
    UnknownScope,
    InvalidScope,
}

impl RegistryError {
    /// Create a NotFound error for a name
    #[inline]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an InvalidName error
    #[inline]
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidAlias error
    #[inline]
    pub fn invalid_alias(
        name: impl Into<String>,
        alias: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAlias {
            name: name.into(),
            alias: alias.into(),
            reason: reason.into(),
        }
    }

    /// Create a DuplicateDefinition error
    #[inline]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateDefinition { name: name.into() }
    }

    /// Create an ImportResolution error
    #[inline]
    pub fn import_failed(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ImportResolution {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidDeclaration error
    #[inline]
    pub fn invalid_declaration(reason: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            reason: reason.into(),
        }
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::InvalidAlias { .. } => ErrorKind::InvalidAlias,
            Self::DuplicateDefinition { .. } => ErrorKind::DuplicateDefinition,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::CircularParent { .. } => ErrorKind::CircularParent,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::InvalidImport { .. } => ErrorKind::InvalidImport,
            Self::ImportResolution { .. } => ErrorKind::ImportResolution,
            Self::UnresolvedPlaceholder { .. } => ErrorKind::UnresolvedPlaceholder,
            Self::ParseCollected { .. } => ErrorKind::ParseCollected,
            Self::InvalidDeclaration { .. } => ErrorKind::InvalidDeclaration,
            Self::UnknownScope { .. } => ErrorKind::UnknownScope,
            Self::InvalidScope { .. } => ErrorKind::InvalidScope,
        }
    }
}

/// One bad declaration inside a compiled document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationError {
    /// Document the declaration appears in
    pub location: String,
    /// Position of the declaration in document order (0-based, nested scopes included)
    pub index: usize,
    /// Declared name, when one could be determined
    pub name: Option<String>,
    /// What went wrong
    pub error: RegistryError,
}

impl fmt::Display for DeclarationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}#{} '{}': {}", self.location, self.index, name, self.error),
            None => write!(f, "{}#{}: {}", self.location, self.index, self.error),
        }
    }
}

struct DisplayList<'a>(&'a [DeclarationError]);

impl fmt::Display for DisplayList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Errors reported by a [`ResourceLoader`](crate::ResourceLoader)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Nothing exists at the location
    #[error("Resource not found: {location}")]
    NotFound { location: String },

    /// The resource exists but could not be read
    #[error("Resource '{location}' could not be read: {reason}")]
    Unreadable { location: String, reason: String },
}

/// Error reported by a [`DocumentParser`](crate::DocumentParser)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse '{location}': {reason}")]
pub struct ParseError {
    pub location: String,
    pub reason: String,
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
