//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use component_registry::{
    Definition, DefinitionContext, Element, MemoryDocuments, Registry, RegistryConfig,
    StandardEnvironment,
};
use std::sync::Arc;

fn documents() -> MemoryDocuments {
    MemoryDocuments::new()
        .with(
            "conf/app.xml",
            Element::new("components")
                .attr("default-lazy-init", "true")
                .child(
                    Element::new("component")
                        .attr("id", "dataSource")
                        .attr("class", "app::Pool")
                        .child(Element::new("property").attr("name", "url").attr("value", "${db.url}")),
                )
                .child(
                    Element::new("component")
                        .attr("id", "users")
                        .attr("class", "app::UserService")
                        .attr("depends-on", "dataSource"),
                )
                .child(Element::new("alias").attr("name", "users").attr("alias", "userService"))
                .child(
                    Element::new("components")
                        .attr("profile", "metrics")
                        .child(Element::new("component").attr("id", "metrics").attr("class", "app::Metrics")),
                )
                .child(Element::new("import").attr("resource", "${env}.xml")),
        )
        .with(
            "conf/prod.xml",
            Element::new("components").child(
                Element::new("component")
                    .attr("id", "dataSource")
                    .attr("class", "app::ReplicatedPool"),
            ),
        )
}

fn main() {
    // Initialize logging - uses JSON if logging-json feature enabled,
    // pretty if logging-pretty enabled
    #[cfg(feature = "logging")]
    {
        component_registry::logging::init();
    }

    println!("=== Component Registry Logging Demo ===\n");

    let docs = Arc::new(documents());

    // Load documents (logs: "Refreshing context", "Compiling document", "Overriding definition with a different definition")
    let mut context = DefinitionContext::new(docs.clone(), docs)
        .with_display_name("demo")
        .with_environment(Arc::new(
            StandardEnvironment::new()
                .with_property("env", "prod")
                .with_property("db.url", "postgres://localhost/app"),
        ));
    context.set_config_location("conf/app.xml");

    let registry = match context.refresh() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Load failed: {e}");
            return;
        }
    };

    println!("Loaded components: {:?}", registry.names());
    println!("Aliases of 'users': {:?}", registry.aliases("users"));

    // Resolve through an alias (logs: "Merged definition chain")
    if let Ok(users) = registry.merge("userService") {
        println!("userService -> {:?}, lazy: {}", users.class_name, users.is_lazy_init());
    }

    // Child registry falls back to its parent
    let module = registry.child();
    let _ = module.register("jobs", Definition::new("app::Jobs").with_depends_on("users"));
    println!("Child sees dataSource: {}", module.get("dataSource").is_ok());

    // Strict registries reject differing duplicates
    let strict = Registry::with_config(RegistryConfig::strict());
    let _ = strict.register("svc", Definition::new("app::A"));
    if let Err(e) = strict.register("svc", Definition::new("app::B")) {
        println!("Strict registry: {e}");
    }

    // Creation marks (logs: "Component requested while already in creation")
    if let Ok(_guard) = registry.begin_creation("users") {
        if let Err(e) = registry.begin_creation("users") {
            println!("Re-entrant creation: {e}");
        }
    }

    registry.register_dependency("users", "dataSource");

    // Close the context (logs: "Closing context")
    println!("Teardown order: {:?}", context.close());

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}
