//! Benchmarks for trail graph construction and queries
//!
//! Run with: cargo bench --package trail-map-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use trail_map_lib::{Edge, Point, PointKind, TrailGraph, loader};

/// Generate a ladder-shaped trail network with `rungs` crossings.
///
/// Two parallel paths joined at every rung by a cross edge.
fn generate_ladder(rungs: usize) -> (Vec<Point>, Vec<Edge>) {
    let mut points = Vec::with_capacity(rungs * 2);
    let mut edges = Vec::with_capacity(rungs * 3);

    for i in 0..rungs {
        let lat = 16.0 + i as f64 * 0.0001;
        points.push(Point::new(lat, 108.0, PointKind::Junction3Way));
        points.push(Point::new(lat, 108.0005, PointKind::Junction3Way));
    }

    for i in 0..rungs {
        let left = points[i * 2].id.clone();
        let right = points[i * 2 + 1].id.clone();
        edges.push(Edge::new(format!("rung-{i}"), left.clone(), right.clone()));
        if i + 1 < rungs {
            edges.push(Edge::new(
                format!("left-{i}"),
                left,
                points[(i + 1) * 2].id.clone(),
            ));
            edges.push(Edge::new(
                format!("right-{i}"),
                right,
                points[(i + 1) * 2 + 1].id.clone(),
            ));
        }
    }

    (points, edges)
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for rungs in [100usize, 1_000, 10_000] {
        let (points, edges) = generate_ladder(rungs);
        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rungs), &rungs, |b, _| {
            b.iter(|| TrailGraph::new(points.clone(), edges.clone(), Vec::new()).unwrap());
        });
    }
    group.finish();
}

fn bench_graph_queries(c: &mut Criterion) {
    let (points, edges) = generate_ladder(10_000);
    let graph = TrailGraph::new(points, edges, Vec::new()).unwrap();
    let ids: Vec<String> = graph.points().iter().map(|p| p.id.clone()).collect();

    c.bench_function("neighbors_all_points", |b| {
        b.iter(|| ids.iter().map(|id| graph.neighbors(id).len()).sum::<usize>());
    });

    c.bench_function("validate", |b| b.iter(|| graph.validate()));
}

fn bench_sample_site(c: &mut Criterion) {
    c.bench_function("load_sample_site", |b| {
        b.iter(|| loader::sample_site().unwrap())
    });
}

criterion_group!(
    benches,
    bench_graph_build,
    bench_graph_queries,
    bench_sample_site
);
criterion_main!(benches);
