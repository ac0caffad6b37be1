//! Expression and condition benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fsmdsim_core::{ConditionRegistry, Expr, Number, Store};

fn scope() -> Store {
    let mut store = Store::with_names(["a", "b", "c", "d"]);
    store.set("a", Number::Int(12));
    store.set("b", Number::Int(8));
    store.set("c", Number::Real(2.5));
    store.set("d", Number::Int(-3));
    store
}

const EXPRESSIONS: &[(&str, &str)] = &[
    ("literal", "42"),
    ("arithmetic", "a * b + c / 2 - d % 5"),
    ("comparison", "a > b and not (c < d or a == 0)"),
    ("chained", "0 < d + 10 <= a < 100"),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr_parse");

    for (name, src) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::from_parameter(name), src, |b, src| {
            b.iter(|| black_box(Expr::parse(src).unwrap()))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr_evaluate");
    let scope = scope();

    for (name, src) in EXPRESSIONS {
        let expr = Expr::parse(src).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &expr, |b, expr| {
            b.iter(|| black_box(expr.evaluate(&scope).unwrap()))
        });
    }

    group.finish();
}

fn bench_condition_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_expand");
    let scope = scope();

    // Each level references the one below it.
    for depth in [1usize, 4, 16] {
        let mut registry = ConditionRegistry::new();
        registry.insert("c0", "a > b").unwrap();
        for i in 1..depth {
            registry
                .insert(format!("c{}", i), format!("c{} and b > d", i - 1))
                .unwrap();
        }
        let top = format!("c{}", depth - 1);

        group.bench_with_input(BenchmarkId::new("expand", depth), &top, |b, top| {
            b.iter(|| black_box(registry.expand(top).unwrap()))
        });

        let guard = registry.compile(&top).unwrap();
        group.bench_with_input(BenchmarkId::new("compiled", depth), &guard, |b, guard| {
            b.iter(|| black_box(guard.evaluate(&scope).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_evaluate, bench_condition_expansion);
criterion_main!(benches);
