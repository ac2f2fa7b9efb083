//! # Component Registry - Declarative Component Definitions for Rust
//!
//! A registry of component *definitions*: named construction recipes that a
//! separate instantiation engine later turns into live objects. Definitions
//! are loaded from hierarchical documents with imports, aliases, profile
//! gates and nested scopes, merged along their parent chains and tracked for
//! creation cycles and teardown order.
//!
//! ## Features
//!
//! - **Override-aware registration** - later declarations replace earlier ones, or fail in strict mode
//! - **Aliases** - many names for one definition, chains resolved transitively
//! - **Definition inheritance** - merged recipes computed on demand and cached
//! - **Hierarchical registries** - lookups fall through to a parent registry
//! - **Dependency tracking** - creation-cycle detection and destruction ordering
//! - **Document compiler** - imports, profiles, `${...}` placeholders and scope defaults
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use component_registry::{Definition, Registry, Value};
//!
//! let registry = Registry::new();
//!
//! registry
//!     .register(
//!         "dataSource",
//!         Definition::new("app::Pool").with_property("url", Value::literal("postgres://localhost")),
//!     )
//!     .unwrap();
//! registry
//!     .register(
//!         "users",
//!         Definition::new("app::UserService")
//!             .with_constructor_arg(0, Value::reference("dataSource")),
//!     )
//!     .unwrap();
//! registry.register_alias("users", "userService").unwrap();
//!
//! let users = registry.merge("userService").unwrap();
//! assert_eq!(users.referenced_names(), vec!["dataSource"]);
//! assert!(users.is_singleton());
//! ```
//!
//! ## Loading Documents
//!
//! Markup parsing is pluggable through [`DocumentParser`]; [`MemoryDocuments`]
//! serves pre-built trees.
//!
//! ```rust
//! use component_registry::{DefinitionContext, Element, MemoryDocuments, StandardEnvironment, Value};
//! use std::sync::Arc;
//!
//! let docs = Arc::new(
//!     MemoryDocuments::new()
//!         .with(
//!             "conf/app.xml",
//!             Element::new("components")
//!                 .child(
//!                     Element::new("component")
//!                         .attr("id", "svc")
//!                         .attr("class", "app::Service")
//!                         .child(Element::new("property").attr("name", "timeout").attr("value", "30")),
//!                 )
//!                 .child(Element::new("import").attr("resource", "${env}.xml")),
//!         )
//!         .with(
//!             "conf/prod.xml",
//!             Element::new("components").child(
//!                 Element::new("component")
//!                     .attr("id", "svc")
//!                     .attr("class", "app::Service")
//!                     .child(Element::new("property").attr("name", "timeout").attr("value", "60")),
//!             ),
//!         ),
//! );
//!
//! let mut context = DefinitionContext::new(docs.clone(), docs)
//!     .with_environment(Arc::new(StandardEnvironment::new().with_property("env", "prod")));
//! context.set_config_location("conf/app.xml");
//!
//! let registry = context.refresh().unwrap();
//! assert_eq!(registry.merge("svc").unwrap().properties["timeout"], Value::literal("60"));
//! ```
//!
//! ## Hierarchical Registries
//!
//! ```rust
//! use component_registry::{Definition, Registry};
//! use std::sync::Arc;
//!
//! let shared = Arc::new(Registry::new());
//! shared.register("clock", Definition::new("app::Clock")).unwrap();
//!
//! let module = shared.child();
//! module.register("jobs", Definition::new("app::Jobs")).unwrap();
//!
//! // Lookups fall through to the parent...
//! assert!(module.get("clock").is_ok());
//! // ...but containment is local
//! assert!(!module.contains("clock"));
//! assert!(shared.get("jobs").is_err());
//! ```
//!
//! ## Concurrency
//!
//! - **Coarse writes**: one `RwLock` over definitions and aliases; registration is rare
//! - **Fine-grained creation marks**: per-name `DashMap` entries with `AHash`
//! - **Generation-stamped merge cache**: a stale entry costs at most one recomputation

mod compiler;
mod context;
mod declaration;
mod definition;
mod dependency;
mod document;
mod environment;
mod error;
mod locations;
#[cfg(feature = "logging")]
pub mod logging;
mod registry;
mod resource;
mod scope;

pub use compiler::*;
pub use context::*;
pub use declaration::*;
pub use definition::*;
pub use dependency::*;
pub use document::*;
pub use environment::*;
pub use error::*;
pub use locations::*;
pub use registry::*;
pub use resource::*;
pub use scope::*;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CompileHooks, ConfigLocations, Definition, DefinitionContext, DefinitionHolder,
        DocumentCompiler, DocumentParser, Element, Environment, ErrorKind, Registry,
        RegistryConfig, RegistryError, ResourceLoader, Result, StandardEnvironment, Value,
    };
    pub use std::sync::Arc;
}
