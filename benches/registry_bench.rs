//! Benchmarks for the component registry

use component_registry::{
    Definition, DocumentCompiler, Element, MemoryDocuments, Registry, Value,
};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn service(class: &str) -> Definition {
    Definition::new(class)
        .with_property("timeout", Value::literal("30"))
        .with_constructor_arg(0, Value::reference("dataSource"))
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");
    group.throughput(Throughput::Elements(1));

    group.bench_function("register", |b| {
        b.iter(|| {
            let registry = Registry::new();
            registry.register("svc", service("app::Service")).unwrap();
            black_box(registry)
        })
    });

    group.bench_function("register_with_alias", |b| {
        b.iter(|| {
            let registry = Registry::new();
            registry.register("svc", service("app::Service")).unwrap();
            registry.register_alias("svc", "service").unwrap();
            black_box(registry)
        })
    });

    group.bench_function("override_same_content", |b| {
        let registry = Registry::new();
        registry.register("svc", service("app::Service")).unwrap();
        b.iter(|| registry.register("svc", black_box(service("app::Service"))).unwrap())
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(1));

    let registry = Registry::new();
    for i in 0..100 {
        registry.register(&format!("svc{i}"), service("app::Service")).unwrap();
    }
    registry.register_alias("svc42", "a1").unwrap();
    registry.register_alias("a1", "a2").unwrap();

    group.bench_function("get", |b| b.iter(|| black_box(registry.get("svc42").unwrap())));

    group.bench_function("get_through_alias_chain", |b| {
        b.iter(|| black_box(registry.get("a2").unwrap()))
    });

    group.bench_function("try_get_missing", |b| {
        b.iter(|| black_box(registry.try_get("missing")))
    });

    let child = Arc::new(registry).child();
    group.bench_function("get_from_parent", |b| {
        b.iter(|| black_box(child.get("svc42").unwrap()))
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(1));

    let registry = Registry::new();
    registry
        .register("base", service("app::Service").with_abstract(true))
        .unwrap();
    let mut parent = "base".to_string();
    for i in 0..8 {
        let name = format!("level{i}");
        registry
            .register(
                &name,
                Definition::child_of(&parent).with_property(format!("p{i}"), Value::literal("x")),
            )
            .unwrap();
        parent = name;
    }

    group.bench_function("chain_8_cached", |b| {
        b.iter(|| black_box(registry.merge("level7").unwrap()))
    });

    // any registration drops the merge cache
    let top = registry.get("level7").unwrap();
    group.bench_function("chain_8_after_register", |b| {
        b.iter(|| {
            registry.register("level7", (*top).clone()).unwrap();
            black_box(registry.merge("level7").unwrap())
        })
    });

    group.finish();
}

fn bench_creation_tracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("creation");
    group.throughput(Throughput::Elements(1));

    let registry = Registry::new();

    group.bench_function("mark_unmark", |b| {
        b.iter(|| {
            registry.mark_creating("svc").unwrap();
            black_box(registry.unmark_creating("svc"))
        })
    });

    group.bench_function("guard", |b| {
        b.iter(|| {
            let guard = registry.begin_creation("svc").unwrap();
            black_box(&guard);
        })
    });

    for i in 0..50 {
        registry.register_dependency(&format!("svc{i}"), &format!("svc{}", i + 1));
    }
    group.bench_function("is_dependent_chain_50", |b| {
        b.iter(|| black_box(registry.is_dependent("svc50", "svc0")))
    });

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    let mut root = Element::new("components");
    for i in 0..50 {
        root = root.child(
            Element::new("component")
                .attr("id", format!("svc{i}"))
                .attr("class", "app::Service")
                .child(Element::new("property").attr("name", "timeout").attr("value", "30")),
        );
    }
    let docs = Arc::new(MemoryDocuments::new().with("app.xml", root));
    let compiler = DocumentCompiler::new(docs.clone(), docs);

    group.throughput(Throughput::Elements(50));
    group.bench_function("document_50_components", |b| {
        b.iter(|| {
            let registry = Registry::new();
            compiler.load("app.xml", &registry).unwrap();
            black_box(registry)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_lookup,
    bench_merge,
    bench_creation_tracking,
    bench_compile,
);

criterion_main!(benches);
