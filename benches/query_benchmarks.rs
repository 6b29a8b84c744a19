//! Query performance benchmarks: base join, unfolding through a view,
//! SSR-rewritten join, and Kleene path closure.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pgview::{parse_statement, Config, GraphQuery, Statement, Value, Workspace};
use std::time::Duration;

/// A chain graph 1 -> 2 -> ... -> size of Person nodes
fn make_chain(size: i64, use_ssr_index: bool) -> Workspace {
    let mut config = Config::default();
    config.storage.persist_catalog = false;
    config.engine.use_ssr_index = use_ssr_index;
    let mut ws = Workspace::new("bench", config).expect("workspace");
    ws.execute("CREATE GRAPH g; CREATE NODE Person; CREATE EDGE Knows(Person -> Person);")
        .expect("schema");
    for i in 1..=size {
        ws.insert("N_g", vec![Value::Long(i), Value::string("Person")])
            .expect("node");
    }
    for i in 1..size {
        ws.insert(
            "E_g",
            vec![Value::Long(10_000 + i), Value::Long(i), Value::Long(i + 1), Value::string("Knows")],
        )
        .expect("edge");
    }
    ws
}

fn query(text: &str) -> GraphQuery {
    match parse_statement(text).expect("parse") {
        Statement::Query(q) => q,
        other => panic!("not a query: {other:?}"),
    }
}

const TWO_HOP: &str =
    "MATCH (a:Person)-[:Knows]->(b:Person), (b)-[:Knows]->(c:Person) FROM {} RETURN (a), (c)";

fn bench_base_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("base_join");
    for size in [100i64, 1_000] {
        let mut ws = make_chain(size, false);
        let q = query(&TWO_HOP.replace("{}", "g"));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ws.query(&q).expect("query"));
        });
    }
    group.finish();
}

fn bench_unfolded_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("unfolded_view");
    for size in [100i64, 1_000] {
        let mut ws = make_chain(size, false);
        ws.execute("CREATE VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person))")
            .expect("view");
        let q = query(&TWO_HOP.replace("{}", "v"));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ws.query(&q).expect("query"));
        });
    }
    group.finish();
}

fn bench_ssr_rewritten_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("ssr_rewritten_view");
    for size in [100i64, 1_000] {
        let mut ws = make_chain(size, true);
        ws.execute("CREATE HYBRID VIEW v ON g (MATCH (a:Person)-[k:Knows]->(b:Person))")
            .expect("view");
        let q = query(&TWO_HOP.replace("{}", "v"));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ws.query(&q).expect("query"));
        });
    }
    group.finish();
}

fn bench_kleene_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("kleene_path");
    group.sample_size(10);
    for size in [50i64, 200] {
        let mut ws = make_chain(size, false);
        let q = query("MATCH (a:Person)-[:Knows+]->(b:Person) FROM g RETURN (a), (b)");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ws.query(&q).expect("query"));
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));
    targets = bench_base_join, bench_unfolded_view, bench_ssr_rewritten_view, bench_kleene_path
}
criterion_main!(benches);
